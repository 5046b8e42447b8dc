//! Stream lifecycle events and the queue they are delivered on.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{jid::Jid, xml::Element};

/// Lifecycle events emitted by a stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
	/// The stream handshake completed for the first time on this connection.
	StreamConnected {
		/// Peer JID, as far as it is known at this point.
		peer: Option<Jid>,
	},
	/// The stream was re-established after SASL or StartTLS negotiation.
	StreamRestarted {
		/// Peer JID, as far as it is known at this point.
		peer: Option<Jid>,
	},
	/// A `<stream:features/>` element arrived from the receiver.
	GotFeatures {
		/// The features element as received.
		features: Element,
	},
	/// One side of the stream was authenticated.
	Authenticated {
		/// The authenticated JID.
		jid: Option<Jid>,
	},
}

/// Handle used to enqueue stream events for the application consumer.
///
/// Events ride an unbounded channel; the stream never blocks on a slow
/// consumer. A dropped receiver silently discards further events.
#[derive(Clone, Debug)]
pub struct EventQueue {
	sender: UnboundedSender<StreamEvent>,
}
impl EventQueue {
	/// Create a queue together with its consumer end.
	pub fn channel() -> (Self, UnboundedReceiver<StreamEvent>) {
		let (sender, receiver) = mpsc::unbounded_channel();

		(Self { sender }, receiver)
	}

	/// Enqueue an event.
	pub fn put(&self, event: StreamEvent) {
		if self.sender.send(event).is_err() {
			tracing::debug!("event queue receiver dropped; discarding event");
		}
	}
}

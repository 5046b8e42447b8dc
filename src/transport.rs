//! Seams between the stream engine and its transport.
//!
//! A transport owns the socket (and its TLS layering), parses the wire into
//! [`Element`](crate::xml::Element) trees, and reports parser events to the
//! [`StreamHandler`] registered via [`Transport::set_target`]. The stream
//! never touches I/O directly.

// self
use crate::{Result, _prelude::*, jid::Jid, xml::Element};

/// Attributes of an outgoing stream head.
///
/// Transports serialize this as the `<stream:stream>` opening tag and are
/// expected to announce `version="1.0"` alongside it.
#[derive(Clone, Debug)]
pub struct StreamHead {
	/// Default namespace for stanzas on this stream.
	pub stanza_namespace: String,
	/// Value of the `from` attribute, when one is to be sent.
	pub from: Option<Jid>,
	/// Value of the `to` attribute, when one is to be sent.
	pub to: Option<Jid>,
	/// Stream id; receivers generate one, initiators usually omit it.
	pub id: Option<String>,
	/// Value of the `xml:lang` attribute.
	pub language: String,
}

/// Capability the stream consumes to reach the wire.
pub trait Transport: Send {
	/// Whether the underlying connection is established.
	fn is_connected(&self) -> bool;

	/// Write a stream opening tag.
	fn send_stream_head(&mut self, head: StreamHead) -> Result<()>;

	/// Write a serialized element.
	fn send_element(&mut self, element: &Element) -> Result<()>;

	/// Close the stream gracefully, flushing pending output.
	fn disconnect(&mut self);

	/// Tear the connection down immediately.
	fn close(&mut self);

	/// Register the handler receiving parser events from this transport.
	fn set_target(&mut self, target: Arc<dyn StreamHandler>);
}

/// Parser events a transport delivers to its registered stream.
///
/// Events for one stream are delivered serially, from a single reader task.
pub trait StreamHandler: Send + Sync {
	/// The stream opening tag was parsed.
	fn stream_start(&self, element: Element) -> Result<()>;

	/// The stream closing tag was parsed.
	fn stream_end(&self);

	/// The connection reached end-of-file without a closing tag.
	fn stream_eof(&self);

	/// A complete first-level child element was parsed.
	fn stream_element(&self, element: Element) -> Result<()>;

	/// The parser hit not-well-formed input.
	fn stream_parse_error(&self, description: &str) -> Result<()>;
}

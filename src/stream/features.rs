//! Stream feature handler seams: negotiation verdicts and element-handler
//! registration.
//!
//! Handlers for StartTLS, SASL, resource binding and similar extensions
//! implement [`StreamFeatureHandler`] and register the stream-level elements
//! they consume through [`StreamFeatureHandler::element_handlers`]. The
//! stream installs the first registration per qualified name that matches
//! its side of the connection.

// self
use crate::{
	Result,
	stream::base::StreamBase,
	xml::{Element, QName},
};

/// Which side of the stream opened it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamRole {
	/// The side that opens the stream.
	Initiator,
	/// The side that answers it.
	Receiver,
}

/// Verdict returned by [`StreamFeatureHandler::handle_stream_features`] for
/// a feature the handler recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureVerdict {
	/// The feature was recognized and negotiation was started or completed.
	Handled {
		/// Feature name, for diagnostics.
		name: String,
		/// Whether the feature was advertised as mandatory-to-negotiate.
		mandatory: bool,
	},
	/// The feature was recognized but cannot be negotiated.
	NotHandled {
		/// Feature name, for diagnostics.
		name: String,
		/// Whether the feature was advertised as mandatory-to-negotiate.
		mandatory: bool,
	},
}
impl FeatureVerdict {
	/// Feature name carried by the verdict.
	pub fn name(&self) -> &str {
		match self {
			Self::Handled { name, .. } | Self::NotHandled { name, .. } => name,
		}
	}

	/// Whether the feature was advertised as mandatory-to-negotiate.
	pub fn is_mandatory(&self) -> bool {
		match self {
			Self::Handled { mandatory, .. } | Self::NotHandled { mandatory, .. } => *mandatory,
		}
	}
}

/// Registration of one stream-level element a feature handler consumes.
#[derive(Clone, Debug)]
pub struct ElementHandlerEntry {
	/// Qualified name of the handled element.
	pub qname: QName,
	/// Restrict the registration to one stream role; `None` serves both.
	pub restriction: Option<StreamRole>,
}
impl ElementHandlerEntry {
	/// Register a handler valid for both stream roles.
	pub fn new(qname: QName) -> Self {
		Self { qname, restriction: None }
	}

	/// Register a handler valid for a single stream role.
	pub fn restricted(qname: QName, role: StreamRole) -> Self {
		Self { qname, restriction: Some(role) }
	}
}

/// A pluggable processor of stream-level features and elements.
pub trait StreamFeatureHandler: Send + Sync {
	/// Handle features announced by the peer. [initiator only]
	///
	/// Return `Ok(None)` when no advertised feature was recognized; the
	/// stream then consults the next handler.
	fn handle_stream_features(
		&self,
		stream: &StreamBase,
		features: &Element,
	) -> Result<Option<FeatureVerdict>> {
		let _ = (stream, features);

		Ok(None)
	}

	/// Contribute to the outgoing features element. [receiver only]
	fn make_stream_features(&self, stream: &StreamBase, features: &mut Element) {
		let _ = (stream, features);
	}

	/// Stream-level elements this handler wants dispatched to
	/// [`Self::handle_element`].
	fn element_handlers(&self) -> Vec<ElementHandlerEntry> {
		Vec::new()
	}

	/// Process a stream-level element previously registered via
	/// [`Self::element_handlers`]; return `Ok(true)` when consumed.
	fn handle_element(&self, stream: &StreamBase, element: &Element) -> Result<bool> {
		let _ = (stream, element);

		Ok(false)
	}
}

//! XMPP stream handling: protocol vocabulary, lifecycle events, feature
//! handler seams, and the stream state machine itself.

pub mod base;
pub mod events;
pub mod features;

// std
use std::fmt;
// self
use crate::xml::{Element, QName};

/// XMPP streams namespace (RFC 6120 §4.1).
pub const STREAMS_NS: &str = "http://etherx.jabber.org/streams";
/// Namespace of stream error defined conditions (RFC 6120 §4.9.3).
pub const STREAM_ERROR_NS: &str = "urn:ietf:params:xml:ns:xmpp-streams";
/// Attribute carrying the stream or stanza language.
pub const XML_LANG_ATTR: &str = "xml:lang";

/// Qualified name of the stream root element.
pub fn stream_root_qname() -> QName {
	QName::new(STREAMS_NS, "stream")
}

/// Qualified name of the stream features element.
pub fn features_qname() -> QName {
	QName::new(STREAMS_NS, "features")
}

/// Qualified name of the stream error element.
pub fn error_qname() -> QName {
	QName::new(STREAMS_NS, "error")
}

/// Stream-level error conditions emitted by this engine (RFC 6120 §4.9.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCondition {
	/// The stream XML was not well-formed against the stream schema.
	BadFormat,
	/// The `to` address names a host not served here.
	HostUnknown,
	/// The stream root is in the wrong namespace.
	InvalidNamespace,
	/// The received XML was not well-formed.
	NotWellFormed,
	/// A mandatory-to-negotiate feature could not be negotiated.
	UnsupportedFeature,
	/// The peer requested an unsupported stream version.
	UnsupportedVersion,
}
impl ErrorCondition {
	/// Defined-condition element name, e.g. `host-unknown`.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::BadFormat => "bad-format",
			Self::HostUnknown => "host-unknown",
			Self::InvalidNamespace => "invalid-namespace",
			Self::NotWellFormed => "not-well-formed",
			Self::UnsupportedFeature => "unsupported-feature",
			Self::UnsupportedVersion => "unsupported-version",
		}
	}

	/// Look up a condition by its defined-condition element name.
	pub fn from_name(name: &str) -> Option<Self> {
		Some(match name {
			"bad-format" => Self::BadFormat,
			"host-unknown" => Self::HostUnknown,
			"invalid-namespace" => Self::InvalidNamespace,
			"not-well-formed" => Self::NotWellFormed,
			"unsupported-feature" => Self::UnsupportedFeature,
			"unsupported-version" => Self::UnsupportedVersion,
			_ => return None,
		})
	}

	/// Build the `<stream:error/>` element announcing this condition.
	pub fn to_element(self) -> Element {
		Element::new(error_qname()).with_child(Element::new(QName::new(STREAM_ERROR_NS, self.as_str())))
	}
}
impl fmt::Display for ErrorCondition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A `<stream:error/>` element received from the peer, decoded.
///
/// The condition is kept as the raw element name so unknown conditions
/// survive decoding.
#[derive(Clone, Debug)]
pub struct StreamErrorFrame {
	/// Defined-condition element name, e.g. `conflict`.
	pub condition: String,
	/// Optional human-readable text supplied by the peer.
	pub text: Option<String>,
}
impl StreamErrorFrame {
	/// Decode a received stream error element.
	pub fn from_element(element: &Element) -> Self {
		let mut condition = None;
		let mut text = None;

		for child in element.children() {
			if child.name().namespace() != STREAM_ERROR_NS {
				continue;
			}
			if child.name().local() == "text" {
				text.get_or_insert_with(|| child.text().to_string());
			} else {
				condition.get_or_insert_with(|| child.name().local().to_string());
			}
		}

		Self { condition: condition.unwrap_or_else(|| "undefined-condition".to_string()), text }
	}

	/// The condition as a typed [`ErrorCondition`], when it is one this
	/// engine knows about.
	pub fn condition(&self) -> Option<ErrorCondition> {
		ErrorCondition::from_name(&self.condition)
	}
}

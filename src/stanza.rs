//! Stanza plumbing: kinds, routing phases, and IQ response tracking.

// std
use std::{collections::HashMap, fmt};
// self
use crate::{
	_prelude::*,
	cache::item::deadline,
	jid::Jid,
	stream::{XML_LANG_ATTR, base::StreamBase},
	xml::{Element, QName},
};

/// Top-level stanza kinds (RFC 6120 §8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StanzaKind {
	/// Request/response exchange.
	Iq,
	/// One-directional message.
	Message,
	/// Broadcast of availability.
	Presence,
}
impl StanzaKind {
	/// Look up a kind by its element local name.
	pub fn from_local(local: &str) -> Option<Self> {
		Some(match local {
			"iq" => Self::Iq,
			"message" => Self::Message,
			"presence" => Self::Presence,
			_ => return None,
		})
	}

	/// Element local name of the kind.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Iq => "iq",
			Self::Message => "message",
			Self::Presence => "presence",
		}
	}
}
impl fmt::Display for StanzaKind {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A stanza wrapping its XML element.
#[derive(Clone, Debug)]
pub struct Stanza {
	kind: StanzaKind,
	element: Element,
}
impl Stanza {
	/// Build an empty stanza of the given kind in the stream's stanza
	/// namespace.
	pub fn new(kind: StanzaKind, stanza_namespace: &str) -> Self {
		Self { kind, element: Element::new(QName::new(stanza_namespace, kind.as_str())) }
	}

	/// Wrap a received element; `None` when the local name is not a stanza
	/// kind.
	pub fn from_element(element: Element) -> Option<Self> {
		let kind = StanzaKind::from_local(element.name().local())?;

		Some(Self { kind, element })
	}

	/// Stanza kind.
	pub fn kind(&self) -> StanzaKind {
		self.kind
	}

	/// The underlying element.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// Unwrap into the underlying element.
	pub fn into_element(self) -> Element {
		self.element
	}

	/// The `id` attribute.
	pub fn id(&self) -> Option<&str> {
		self.element.attr("id")
	}

	/// Set the `id` attribute.
	pub fn set_id(&mut self, id: impl Into<String>) {
		self.element.set_attr("id", id);
	}

	/// The raw `from` attribute.
	pub fn from_attr(&self) -> Option<&str> {
		self.element.attr("from")
	}

	/// The raw `to` attribute.
	pub fn to_attr(&self) -> Option<&str> {
		self.element.attr("to")
	}

	/// Set the `from` attribute.
	pub fn set_from(&mut self, jid: &Jid) {
		self.element.set_attr("from", jid.to_string());
	}

	/// Set the `to` attribute.
	pub fn set_to(&mut self, jid: &Jid) {
		self.element.set_attr("to", jid.to_string());
	}

	/// The `type` attribute, e.g. `get` or `result`.
	pub fn stanza_type(&self) -> Option<&str> {
		self.element.attr("type")
	}

	/// Set the `type` attribute.
	pub fn set_stanza_type(&mut self, stanza_type: impl Into<String>) {
		self.element.set_attr("type", stanza_type);
	}

	/// The `xml:lang` attribute.
	pub fn lang(&self) -> Option<&str> {
		self.element.attr(XML_LANG_ATTR)
	}

	/// Set the `xml:lang` attribute.
	pub fn set_lang(&mut self, lang: impl Into<String>) {
		self.element.set_attr(XML_LANG_ATTR, lang);
	}

	/// Append a payload child element.
	pub fn push_payload(&mut self, payload: Element) {
		self.element.push_child(payload);
	}
}

/// Stanza handler installation phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerPhase {
	/// Before authentication completes.
	PreAuth,
	/// After authentication completes.
	PostAuth,
}

/// Application-level stanza processor.
pub trait StanzaHandler: Send + Sync {
	/// Whether the handler is installed in the given phase; by default only
	/// after authentication.
	fn active_in(&self, phase: HandlerPhase) -> bool {
		matches!(phase, HandlerPhase::PostAuth)
	}

	/// Process a stanza; return `true` when consumed.
	fn handle_stanza(&self, stream: &StreamBase, stanza: &Stanza) -> bool;
}

type IqCallback = Box<dyn FnOnce(&Stanza) + Send>;

struct PendingIq {
	deadline: DateTime<Utc>,
	callback: IqCallback,
}

/// Tracks outstanding IQ requests awaiting a `result` or `error` response.
struct IqResponseTracker {
	pending: HashMap<String, PendingIq>,
}
impl IqResponseTracker {
	fn new() -> Self {
		Self { pending: HashMap::new() }
	}

	fn expect(&mut self, id: String, timeout: Duration, callback: IqCallback) {
		let deadline = deadline(Utc::now(), timeout);

		if self.pending.insert(id, PendingIq { deadline, callback }).is_some() {
			tracing::debug!("replacing response handler for a reused IQ id");
		}
	}

	fn match_response(&mut self, stanza: &Stanza) -> Option<IqCallback> {
		if stanza.kind() != StanzaKind::Iq {
			return None;
		}
		if !matches!(stanza.stanza_type(), Some("result") | Some("error")) {
			return None;
		}

		self.pending.remove(stanza.id()?).map(|pending| pending.callback)
	}

	fn expire(&mut self) -> usize {
		let now = Utc::now();
		let before = self.pending.len();

		self.pending.retain(|_, pending| pending.deadline > now);

		before - self.pending.len()
	}
}

/// Stanza dispatch state owned by a stream: the handlers installed for the
/// current phase plus the IQ response tracker.
pub(crate) struct StanzaRouter {
	handlers: Vec<Arc<dyn StanzaHandler>>,
	responses: IqResponseTracker,
}
impl StanzaRouter {
	pub(crate) fn new() -> Self {
		Self { handlers: Vec::new(), responses: IqResponseTracker::new() }
	}

	pub(crate) fn setup(&mut self, all: &[Arc<dyn StanzaHandler>], phase: HandlerPhase) {
		self.handlers = all.iter().filter(|handler| handler.active_in(phase)).cloned().collect();
	}

	pub(crate) fn handlers(&self) -> Vec<Arc<dyn StanzaHandler>> {
		self.handlers.clone()
	}

	pub(crate) fn expect_response(&mut self, id: String, timeout: Duration, callback: IqCallback) {
		self.responses.expect(id, timeout, callback);
	}

	pub(crate) fn match_response(&mut self, stanza: &Stanza) -> Option<IqCallback> {
		self.responses.match_response(stanza)
	}

	pub(crate) fn expire_responses(&mut self) -> usize {
		self.responses.expire()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::thread;
	// self
	use super::*;

	fn iq_response(id: &str) -> Stanza {
		let mut stanza = Stanza::new(StanzaKind::Iq, "jabber:client");

		stanza.set_id(id);
		stanza.set_stanza_type("result");

		stanza
	}

	#[test]
	fn detects_stanza_kinds_by_local_name() {
		let message = Element::new(QName::new("jabber:client", "message"));
		let unknown = Element::new(QName::new("jabber:client", "handshake"));

		assert_eq!(Stanza::from_element(message).map(|s| s.kind()), Some(StanzaKind::Message));
		assert!(Stanza::from_element(unknown).is_none());
	}

	#[test]
	fn matches_iq_responses_by_id_exactly_once() {
		let mut tracker = IqResponseTracker::new();

		tracker.expect("q1".to_string(), Duration::from_secs(300), Box::new(|_| {}));

		assert!(tracker.match_response(&iq_response("q1")).is_some());
		assert!(tracker.match_response(&iq_response("q1")).is_none());
	}

	#[test]
	fn ignores_non_responses() {
		let mut tracker = IqResponseTracker::new();

		tracker.expect("q1".to_string(), Duration::from_secs(300), Box::new(|_| {}));

		let mut get = iq_response("q1");

		get.set_stanza_type("get");

		assert!(tracker.match_response(&get).is_none());

		let mut message = Stanza::new(StanzaKind::Message, "jabber:client");

		message.set_id("q1");

		assert!(tracker.match_response(&message).is_none());
	}

	#[test]
	fn expires_overdue_handlers() {
		let mut tracker = IqResponseTracker::new();

		tracker.expect("soon".to_string(), Duration::from_millis(1), Box::new(|_| {}));
		tracker.expect("later".to_string(), Duration::from_secs(300), Box::new(|_| {}));
		thread::sleep(Duration::from_millis(5));

		assert_eq!(tracker.expire(), 1);
		assert!(tracker.match_response(&iq_response("later")).is_some());
		assert!(tracker.match_response(&iq_response("soon")).is_none());
	}
}

//! Core XMPP stream state machine (RFC 6120).
//!
//! [`StreamBase`] drives header exchange, version and language negotiation,
//! feature advertisement, stanza dispatch, and restart after SASL/StartTLS.
//! It consumes a [`Transport`] for I/O and implements [`StreamHandler`] to
//! receive that transport's parser events. Mutable state lives under one
//! non-reentrant lock; feature handlers, stanza handlers and events always
//! run with the lock released, so they may call back into the stream.

// std
use std::{cell::RefCell, collections::HashMap};
// crates.io
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::SmallRng};
// self
use crate::{
	_prelude::*,
	jid::Jid,
	settings::XmppSettings,
	stanza::{HandlerPhase, Stanza, StanzaHandler, StanzaRouter},
	stream::{
		ErrorCondition, STREAMS_NS, StreamErrorFrame, XML_LANG_ATTR, error_qname, features_qname,
		events::StreamEvent,
		features::{FeatureVerdict, StreamFeatureHandler, StreamRole},
		stream_root_qname,
	},
	transport::{StreamHandler, StreamHead, Transport},
	xml::{Element, QName},
};

thread_local! {
	static STREAM_ID_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_rng(&mut rand::rng()));
}

const STREAM_ID_LEN: usize = 16;

/// Directional stream states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamState {
	/// No stream header has been exchanged in this direction yet.
	#[default]
	Pending,
	/// The header was exchanged; the direction is usable.
	Open,
	/// A restart is underway after SASL or StartTLS negotiation.
	Restart,
	/// The direction was closed.
	Closed,
}

struct StreamInner {
	role: Option<StreamRole>,
	me: Option<Jid>,
	peer: Option<Jid>,
	stream_id: Option<String>,
	version: Option<(u8, u8)>,
	language: Option<String>,
	peer_language: Option<String>,
	features: Option<Element>,
	authenticated: bool,
	peer_authenticated: bool,
	tls_established: bool,
	auth_method_used: Option<String>,
	input_state: StreamState,
	output_state: StreamState,
	transport: Option<Box<dyn Transport>>,
	element_handlers: HashMap<QName, usize>,
	router: StanzaRouter,
}

struct StreamShared {
	stanza_namespace: String,
	settings: XmppSettings,
	feature_handlers: Vec<Arc<dyn StreamFeatureHandler>>,
	stanza_handlers: Vec<Arc<dyn StanzaHandler>>,
	inner: Mutex<StreamInner>,
}

/// A generic XMPP stream: one connection's incoming and outgoing XML
/// streams plus the negotiation state shared between them.
///
/// Handles are cheap clones referring to the same stream. This type
/// provides neither authentication nor encryption by itself; those are
/// negotiated by the registered [`StreamFeatureHandler`]s.
#[derive(Clone)]
pub struct StreamBase {
	shared: Arc<StreamShared>,
}
impl StreamBase {
	/// Create a stream for the given stanza namespace (`jabber:client`,
	/// `jabber:server`, …) with its feature and stanza handlers.
	pub fn new(
		stanza_namespace: impl Into<String>,
		feature_handlers: Vec<Arc<dyn StreamFeatureHandler>>,
		stanza_handlers: Vec<Arc<dyn StanzaHandler>>,
		settings: XmppSettings,
	) -> Self {
		Self {
			shared: Arc::new(StreamShared {
				stanza_namespace: stanza_namespace.into(),
				settings,
				feature_handlers,
				stanza_handlers,
				inner: Mutex::new(StreamInner {
					role: None,
					me: None,
					peer: None,
					stream_id: None,
					version: None,
					language: None,
					peer_language: None,
					features: None,
					authenticated: false,
					peer_authenticated: false,
					tls_established: false,
					auth_method_used: None,
					input_state: StreamState::Pending,
					output_state: StreamState::Pending,
					transport: None,
					element_handlers: HashMap::new(),
					router: StanzaRouter::new(),
				}),
			}),
		}
	}

	/// Initiate an XMPP connection over the transport, optionally naming
	/// the peer.
	pub fn initiate(&self, mut transport: Box<dyn Transport>, to: Option<&str>) -> Result<()> {
		let peer = to.map(str::parse).transpose()?;
		let mut inner = self.shared.inner.lock();

		inner.role = Some(StreamRole::Initiator);
		inner.peer = peer;
		transport.set_target(Arc::new(self.clone()));

		let connected = transport.is_connected();

		inner.transport = Some(transport);

		if connected {
			self.initiate_locked(&mut inner)?;
		}

		Ok(())
	}

	/// Receive an XMPP connection over the transport as `me`.
	pub fn receive(&self, mut transport: Box<dyn Transport>, me: &str) -> Result<()> {
		let me: Jid = me.parse()?;
		let mut inner = self.shared.inner.lock();

		inner.role = Some(StreamRole::Receiver);
		transport.set_target(Arc::new(self.clone()));
		inner.transport = Some(transport);
		inner.me = Some(me);
		self.setup_element_handlers_locked(&mut inner);
		inner.router.setup(&self.shared.stanza_handlers, HandlerPhase::PreAuth);

		Ok(())
	}

	/// Notification that the transport finished connecting; an initiator
	/// that was waiting sends its stream head now.
	pub fn transport_connected(&self) -> Result<()> {
		let mut inner = self.shared.inner.lock();

		if inner.role == Some(StreamRole::Initiator) && inner.output_state == StreamState::Pending {
			self.initiate_locked(&mut inner)?;
		}

		Ok(())
	}

	/// Gracefully close the outgoing stream.
	pub fn disconnect(&self) {
		let mut inner = self.shared.inner.lock();

		if let Some(transport) = inner.transport.as_mut() {
			transport.disconnect();
		}

		inner.output_state = StreamState::Closed;
	}

	/// Forcibly close the connection and clear the stream state.
	pub fn close(&self) {
		let mut inner = self.shared.inner.lock();

		if let Some(transport) = inner.transport.as_mut() {
			transport.close();
		}

		inner.input_state = StreamState::Closed;
		inner.output_state = StreamState::Closed;
	}

	/// Whether the connection is up and the outgoing stream is open.
	pub fn is_connected(&self) -> bool {
		let inner = self.shared.inner.lock();

		inner.transport.as_ref().is_some_and(|transport| transport.is_connected())
			&& inner.output_state == StreamState::Open
	}

	/// Send a stanza, applying [`Self::fix_out_stanza`] first.
	pub fn send(&self, mut stanza: Stanza) -> Result<()> {
		self.fix_out_stanza(&mut stanza);

		let mut inner = self.shared.inner.lock();

		match inner.output_state {
			StreamState::Closed =>
				Err(Error::StreamState("Stream output already closed.".into())),
			StreamState::Pending | StreamState::Restart =>
				Err(Error::StreamState("Stream head has not been sent yet.".into())),
			StreamState::Open => self.transport_mut(&mut inner)?.send_element(stanza.element()),
		}
	}

	/// Send an IQ stanza and register a callback for its response.
	///
	/// The callback expires after the configured stanza timeout; expiry is
	/// driven by [`Self::regular_tasks`].
	pub fn send_iq(&self, stanza: Stanza, handler: impl FnOnce(&Stanza) + Send + 'static) -> Result<()> {
		if stanza.kind() != crate::stanza::StanzaKind::Iq {
			return Err(Error::Validation {
				field: "kind",
				reason: "Response tracking is only defined for IQ stanzas.".into(),
			});
		}

		let id = stanza
			.id()
			.ok_or_else(|| Error::Validation {
				field: "id",
				reason: "An id is required to track the response.".into(),
			})?
			.to_string();

		{
			let mut inner = self.shared.inner.lock();
			let timeout = self.shared.settings.config.default_stanza_timeout;

			inner.router.expect_response(id, timeout, Box::new(handler));
		}

		self.send(stanza)
	}

	/// Write a raw element to the open outgoing stream.
	pub fn write_element(&self, element: &Element) -> Result<()> {
		let mut inner = self.shared.inner.lock();

		if inner.output_state != StreamState::Open {
			return Err(Error::StreamState("Stream output is not open.".into()));
		}

		self.transport_mut(&mut inner)?.send_element(element)
	}

	/// Outbound stanza hook: fill in a missing `xml:lang` from the stream
	/// language.
	pub fn fix_out_stanza(&self, stanza: &mut Stanza) {
		if stanza.lang().is_none()
			&& let Some(language) = self.shared.inner.lock().language.clone()
		{
			stanza.set_lang(language);
		}
	}

	/// Send a stream error element and close the outgoing stream.
	pub fn send_stream_error(&self, condition: ErrorCondition) -> Result<()> {
		let mut inner = self.shared.inner.lock();

		self.send_stream_error_locked(&mut inner, condition)
	}

	/// Handle a decoded stream error received from the peer.
	///
	/// The default reaction is to log it; applications watch the stream
	/// lifecycle through the event queue and the transport.
	pub fn process_stream_error(&self, error: StreamErrorFrame) {
		tracing::debug!(condition = %error.condition, text = ?error.text, "unhandled stream error");
	}

	/// Mark the local side authenticated as `me`, optionally restarting the
	/// stream as SASL requires, and install post-auth stanza handlers.
	pub fn set_authenticated(&self, me: Jid, restart: bool) -> Result<()> {
		{
			let mut inner = self.shared.inner.lock();

			inner.authenticated = true;
			inner.me = Some(me.clone());

			if restart {
				self.restart_stream_locked(&mut inner)?;
			}

			inner.router.setup(&self.shared.stanza_handlers, HandlerPhase::PostAuth);
		}

		self.event(StreamEvent::Authenticated { jid: Some(me) });

		Ok(())
	}

	/// Mark the peer authenticated, optionally restarting the stream, and
	/// install post-auth stanza handlers.
	pub fn set_peer_authenticated(&self, peer: Jid, restart: bool) -> Result<()> {
		{
			let mut inner = self.shared.inner.lock();

			inner.peer_authenticated = true;
			inner.peer = Some(peer.clone());

			if restart {
				self.restart_stream_locked(&mut inner)?;
			}

			inner.router.setup(&self.shared.stanza_handlers, HandlerPhase::PostAuth);
		}

		self.event(StreamEvent::Authenticated { jid: Some(peer) });

		Ok(())
	}

	/// Record that TLS was established on the transport.
	pub fn set_tls_established(&self, established: bool) {
		self.shared.inner.lock().tls_established = established;
	}

	/// Record the authentication mechanism that succeeded.
	pub fn set_auth_method_used(&self, method: impl Into<String>) {
		self.shared.inner.lock().auth_method_used = Some(method.into());
	}

	/// Periodic housekeeping: expire pending IQ response handlers.
	/// Returns the suggested delay before the next call.
	pub fn regular_tasks(&self) -> Duration {
		let expired = self.shared.inner.lock().router.expire_responses();

		if expired > 0 {
			tracing::debug!(expired, "expired IQ response handlers");
		}

		Duration::from_secs(60)
	}

	/// Whether this side initiated the stream.
	pub fn is_initiator(&self) -> bool {
		self.shared.inner.lock().role == Some(StreamRole::Initiator)
	}

	/// Negotiated protocol version; `(0, 9)` marks the legacy pre-XMPP
	/// protocol.
	pub fn version(&self) -> Option<(u8, u8)> {
		self.shared.inner.lock().version
	}

	/// Stream language after negotiation.
	pub fn language(&self) -> Option<String> {
		self.shared.inner.lock().language.clone()
	}

	/// Language announced by the peer.
	pub fn peer_language(&self) -> Option<String> {
		self.shared.inner.lock().peer_language.clone()
	}

	/// Stream id: generated locally on the receiver side, learned from the
	/// peer on the initiator side.
	pub fn stream_id(&self) -> Option<String> {
		self.shared.inner.lock().stream_id.clone()
	}

	/// The last features element seen on this stream.
	pub fn features(&self) -> Option<Element> {
		self.shared.inner.lock().features.clone()
	}

	/// Local stream endpoint JID.
	pub fn me(&self) -> Option<Jid> {
		self.shared.inner.lock().me.clone()
	}

	/// Remote stream endpoint JID.
	pub fn peer(&self) -> Option<Jid> {
		self.shared.inner.lock().peer.clone()
	}

	/// Whether the local side has authenticated.
	pub fn authenticated(&self) -> bool {
		self.shared.inner.lock().authenticated
	}

	/// Whether the peer has authenticated.
	pub fn peer_authenticated(&self) -> bool {
		self.shared.inner.lock().peer_authenticated
	}

	/// Whether TLS is established on the transport.
	pub fn tls_established(&self) -> bool {
		self.shared.inner.lock().tls_established
	}

	/// The authentication mechanism that succeeded, if any.
	pub fn auth_method_used(&self) -> Option<String> {
		self.shared.inner.lock().auth_method_used.clone()
	}

	/// State of the incoming stream direction.
	pub fn input_state(&self) -> StreamState {
		self.shared.inner.lock().input_state
	}

	/// State of the outgoing stream direction.
	pub fn output_state(&self) -> StreamState {
		self.shared.inner.lock().output_state
	}

	/// Process a stanza through the response tracker and the installed
	/// stanza handlers.
	pub fn process_stanza(&self, stanza: Stanza) {
		let (callback, handlers) = {
			let mut inner = self.shared.inner.lock();

			(inner.router.match_response(&stanza), inner.router.handlers())
		};

		if let Some(callback) = callback {
			callback(&stanza);

			return;
		}

		for handler in handlers {
			if handler.handle_stanza(self, &stanza) {
				return;
			}
		}

		tracing::debug!(kind = %stanza.kind(), "unhandled stanza");
	}

	fn initiate_locked(&self, inner: &mut StreamInner) -> Result<()> {
		self.setup_element_handlers_locked(inner);
		inner.router.setup(&self.shared.stanza_handlers, HandlerPhase::PreAuth);
		self.send_stream_start_locked(inner, None, None)
	}

	fn setup_element_handlers_locked(&self, inner: &mut StreamInner) {
		let Some(role) = inner.role else { return };

		inner.element_handlers.clear();

		for (index, handler) in self.shared.feature_handlers.iter().enumerate() {
			for entry in handler.element_handlers() {
				// The first matching registration wins.
				if inner.element_handlers.contains_key(&entry.qname) {
					continue;
				}
				if entry.restriction.is_none() || entry.restriction == Some(role) {
					inner.element_handlers.insert(entry.qname, index);
				}
			}
		}
	}

	fn send_stream_start_locked(
		&self,
		inner: &mut StreamInner,
		stream_id: Option<String>,
		stream_to: Option<Jid>,
	) -> Result<()> {
		if matches!(inner.output_state, StreamState::Open | StreamState::Closed) {
			return Err(Error::StreamState("Stream start already sent.".into()));
		}
		if inner.language.is_none() {
			inner.language = Some(self.shared.settings.config.language.clone());
		}

		let to = stream_to.or_else(|| {
			(inner.role == Some(StreamRole::Initiator)).then(|| inner.peer.clone()).flatten()
		});
		// The local name goes out only once it cannot leak to an
		// unverified peer: after TLS, or towards us as the receiver.
		let from = if inner.me.is_some() && (inner.tls_established || inner.role == Some(StreamRole::Receiver))
		{
			inner.me.clone()
		} else {
			None
		};

		inner.stream_id = stream_id;

		let head = StreamHead {
			stanza_namespace: self.shared.stanza_namespace.clone(),
			from,
			to,
			id: inner.stream_id.clone(),
			language: inner.language.clone().unwrap_or_default(),
		};

		self.transport_mut(inner)?.send_stream_head(head)?;
		inner.output_state = StreamState::Open;

		Ok(())
	}

	fn send_stream_error_locked(
		&self,
		inner: &mut StreamInner,
		condition: ErrorCondition,
	) -> Result<()> {
		if inner.output_state == StreamState::Closed {
			return Ok(());
		}
		if matches!(inner.output_state, StreamState::Pending | StreamState::Restart) {
			self.send_stream_start_locked(inner, None, None)?;
		}

		let element = condition.to_element();
		let transport = self.transport_mut(inner)?;

		transport.send_element(&element)?;
		transport.disconnect();
		inner.output_state = StreamState::Closed;

		Ok(())
	}

	fn restart_stream_locked(&self, inner: &mut StreamInner) -> Result<()> {
		inner.input_state = StreamState::Restart;
		inner.output_state = StreamState::Restart;
		inner.features = None;

		if inner.role == Some(StreamRole::Initiator) {
			let stream_id = inner.stream_id.clone();

			self.send_stream_start_locked(inner, stream_id, None)?;
		}

		Ok(())
	}

	fn process_stream_start(&self, element: Element) -> Result<()> {
		let mut receiver_peer = None;
		let was_restart = {
			let mut inner = self.shared.inner.lock();

			tracing::debug!(root = %element.name(), "processing stream start");

			if element.name().namespace() != STREAMS_NS {
				return self.header_failure_locked(
					&mut inner,
					ErrorCondition::InvalidNamespace,
					"bad stream namespace",
				);
			}
			if *element.name() != stream_root_qname() {
				return self.header_failure_locked(
					&mut inner,
					ErrorCondition::BadFormat,
					"bad stream root element",
				);
			}

			let was_restart = inner.input_state == StreamState::Restart;

			inner.input_state = StreamState::Open;

			let version = match element.attr("version") {
				Some(raw) => match parse_version(raw) {
					Some(version) => version,
					None =>
						return self.header_failure_locked(
							&mut inner,
							ErrorCondition::UnsupportedVersion,
							"unparseable stream version",
						),
				},
				None => (0, 9),
			};

			if version.0 != 1 && version != (0, 9) {
				return self.header_failure_locked(
					&mut inner,
					ErrorCondition::UnsupportedVersion,
					"unsupported protocol version",
				);
			}

			inner.version = Some(version);
			inner.peer_language = element.attr(XML_LANG_ATTR).map(ToOwned::to_owned);

			if inner.role == Some(StreamRole::Receiver)
				&& let Some(peer_lang) = element.attr(XML_LANG_ATTR)
				&& let Some(language) =
					negotiate_language(&self.shared.settings.config.languages, peer_lang)
			{
				inner.language = Some(language);
			}

			match inner.role {
				Some(StreamRole::Initiator) => {
					inner.stream_id = element.attr("id").map(ToOwned::to_owned);

					let presented = element.attr("from").map(str::parse::<Jid>).transpose()?;

					if let (Some(expected), Some(presented)) = (&inner.peer, &presented)
						&& expected != presented
					{
						tracing::debug!(
							expected = %expected,
							presented = %presented,
							"peer hostname mismatch; accepting the presented value"
						);
					}

					inner.peer = presented;
				},
				Some(StreamRole::Receiver) => {
					if let Some(to) = element.attr("to") {
						match check_to(inner.me.as_ref(), to) {
							Some(me) => inner.me = Some(me),
							None =>
								return self.header_failure_locked(
									&mut inner,
									ErrorCondition::HostUnknown,
									"bad 'to' address",
								),
						}
					}

					receiver_peer =
						Some(element.attr("from").map(str::parse::<Jid>).transpose()?);
				},
				None => return Err(Error::StreamState("Stream has not been set up.".into())),
			}

			was_restart
		};

		// Receiver: answer with our stream head and advertised features.
		// Handlers contribute to the features element with the lock
		// released, so they may inspect the stream.
		if let Some(stream_to) = receiver_peer {
			let features = self.make_stream_features();
			let mut inner = self.shared.inner.lock();

			self.send_stream_start_locked(&mut inner, Some(generate_id()), stream_to)?;
			self.transport_mut(&mut inner)?.send_element(&features)?;
			inner.features = Some(features);
		}

		let peer = self.shared.inner.lock().peer.clone();

		self.event(if was_restart {
			StreamEvent::StreamRestarted { peer }
		} else {
			StreamEvent::StreamConnected { peer }
		});

		Ok(())
	}

	fn header_failure_locked(
		&self,
		inner: &mut StreamInner,
		condition: ErrorCondition,
		message: &str,
	) -> Result<()> {
		if let Err(err) = self.send_stream_error_locked(inner, condition) {
			tracing::debug!(error = %err, "failed to send stream error");
		}

		Err(Error::fatal(condition, message))
	}

	fn process_element(&self, element: Element) -> Result<()> {
		let handler = {
			let inner = self.shared.inner.lock();

			inner
				.element_handlers
				.get(element.name())
				.map(|&index| self.shared.feature_handlers[index].clone())
		};

		if let Some(handler) = handler {
			tracing::debug!(element = %element.name(), "dispatching to feature handler");

			if handler.handle_element(self, &element)? {
				return Ok(());
			}
		}
		if element.name().namespace() == self.shared.stanza_namespace {
			match Stanza::from_element(element) {
				Some(stanza) => self.process_stanza(stanza),
				None => tracing::debug!("dropping element with unknown stanza kind"),
			}

			return Ok(());
		}
		if *element.name() == error_qname() {
			self.process_stream_error(StreamErrorFrame::from_element(&element));

			return Ok(());
		}
		if *element.name() == features_qname() {
			return self.got_features(element);
		}

		tracing::debug!(element = %element.name(), "unhandled stream element");

		Ok(())
	}

	// Initiator path: record the advertised features and let the feature
	// handlers negotiate, in registration order.
	fn got_features(&self, features: Element) -> Result<()> {
		self.shared.inner.lock().features = Some(features.clone());
		self.event(StreamEvent::GotFeatures { features: features.clone() });

		let mut mandatory_handled: Vec<String> = Vec::new();
		let mut mandatory_not_handled: Vec<String> = Vec::new();

		for handler in &self.shared.feature_handlers {
			match handler.handle_stream_features(self, &features)? {
				None => continue,
				Some(FeatureVerdict::Handled { name, mandatory }) => {
					if mandatory {
						mandatory_handled.push(name);
					}

					break;
				},
				Some(FeatureVerdict::NotHandled { name, mandatory }) =>
					if mandatory {
						mandatory_not_handled.push(name);

						break;
					},
			}
		}

		if !mandatory_not_handled.is_empty() && mandatory_handled.is_empty() {
			if let Err(err) = self.send_stream_error(ErrorCondition::UnsupportedFeature) {
				tracing::debug!(error = %err, "failed to send stream error");
			}

			return Err(Error::fatal(
				ErrorCondition::UnsupportedFeature,
				format!("unsupported mandatory features: {}", mandatory_not_handled.join(" ")),
			));
		}

		Ok(())
	}

	// Receiver path: fold every handler's contribution into one features
	// element. Called with the stream lock released.
	fn make_stream_features(&self) -> Element {
		let mut features = Element::new(features_qname());

		for handler in &self.shared.feature_handlers {
			handler.make_stream_features(self, &mut features);
		}

		features
	}

	fn handle_stream_end(&self) {
		let mut inner = self.shared.inner.lock();

		inner.input_state = StreamState::Closed;

		if let Some(transport) = inner.transport.as_mut() {
			transport.disconnect();
		}

		inner.output_state = StreamState::Closed;
	}

	fn event(&self, event: StreamEvent) {
		tracing::debug!(?event, "stream event");
		self.shared.settings.event_queue.put(event);
	}

	fn transport_mut<'a>(&self, inner: &'a mut StreamInner) -> Result<&'a mut (dyn Transport + 'static)> {
		inner
			.transport
			.as_deref_mut()
			.ok_or_else(move || Error::StreamState("No transport attached.".into()))
	}
}
impl StreamHandler for StreamBase {
	fn stream_start(&self, element: Element) -> Result<()> {
		self.process_stream_start(element)
	}

	fn stream_end(&self) {
		tracing::debug!("stream ended");
		self.handle_stream_end();
	}

	fn stream_eof(&self) {
		self.handle_stream_end();
	}

	fn stream_element(&self, element: Element) -> Result<()> {
		self.process_element(element)
	}

	fn stream_parse_error(&self, description: &str) -> Result<()> {
		if let Err(err) = self.send_stream_error(ErrorCondition::NotWellFormed) {
			tracing::debug!(error = %err, "failed to send stream error");
		}

		Err(Error::StreamParse(description.to_string()))
	}
}

fn parse_version(raw: &str) -> Option<(u8, u8)> {
	let (major, minor) = raw.split_once('.')?;

	Some((major.parse().ok()?, minor.parse().ok()?))
}

// Best-match language negotiation: strip the final subtag until a
// supported language matches. The candidate strictly shrinks each round.
fn negotiate_language(supported: &[String], peer_language: &str) -> Option<String> {
	let mut tag = peer_language;

	loop {
		if supported.iter().any(|language| language == tag) {
			return Some(tag.to_string());
		}

		match tag.rsplit_once('-') {
			Some((head, subtag))
				if !head.is_empty() && subtag.chars().all(char::is_alphanumeric) =>
				tag = head,
			_ => return None,
		}
	}
}

fn check_to(me: Option<&Jid>, to: &str) -> Option<Jid> {
	let to: Jid = to.parse().ok()?;

	(me == Some(&to)).then_some(to)
}

fn generate_id() -> String {
	STREAM_ID_RNG.with(|rng| {
		let mut rng = rng.borrow_mut();

		(0..STREAM_ID_LEN).map(|_| rng.sample(rand::distr::Alphanumeric) as char).collect()
	})
}

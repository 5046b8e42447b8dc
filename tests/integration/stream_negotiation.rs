//! Integration tests for stream negotiation, dispatch, and restart.

// std
use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use xmpp_engine::{
	ErrorCondition, EventQueue, FeatureVerdict, Result, StreamBase, StreamEvent,
	StreamFeatureHandler, XmppSettings,
	stanza::{HandlerPhase, Stanza, StanzaHandler, StanzaKind},
	stream::{STREAM_ERROR_NS, features_qname, stream_root_qname},
	transport::{StreamHandler, StreamHead, Transport},
	xml::{Element, QName},
};

#[derive(Clone, Debug)]
enum Sent {
	Head { from: Option<String>, to: Option<String>, id: Option<String> },
	Element(Element),
	Disconnected,
}

#[derive(Clone)]
struct RecordingTransport {
	sent: Arc<Mutex<Vec<Sent>>>,
}
impl RecordingTransport {
	fn new() -> Self {
		Self { sent: Arc::new(Mutex::new(Vec::new())) }
	}

	fn sent(&self) -> Vec<Sent> {
		self.sent.lock().expect("lock").clone()
	}

	fn head_ids(&self) -> Vec<Option<String>> {
		self.sent()
			.into_iter()
			.filter_map(|sent| match sent {
				Sent::Head { id, .. } => Some(id),
				_ => None,
			})
			.collect()
	}

	fn sent_error_condition(&self) -> Option<String> {
		self.sent().into_iter().find_map(|sent| match sent {
			Sent::Element(element) if element.name().local() == "error" =>
				element.find_child_in(STREAM_ERROR_NS).map(|child| child.name().local().to_string()),
			_ => None,
		})
	}
}
impl Transport for RecordingTransport {
	fn is_connected(&self) -> bool {
		true
	}

	fn send_stream_head(&mut self, head: StreamHead) -> Result<()> {
		self.sent.lock().expect("lock").push(Sent::Head {
			from: head.from.map(|jid| jid.to_string()),
			to: head.to.map(|jid| jid.to_string()),
			id: head.id,
		});

		Ok(())
	}

	fn send_element(&mut self, element: &Element) -> Result<()> {
		self.sent.lock().expect("lock").push(Sent::Element(element.clone()));

		Ok(())
	}

	fn disconnect(&mut self) {
		self.sent.lock().expect("lock").push(Sent::Disconnected);
	}

	fn close(&mut self) {}

	fn set_target(&mut self, _: Arc<dyn StreamHandler>) {}
}

struct SaslLikeHandler {
	verdict: FeatureVerdict,
	advertised: Element,
}
impl StreamFeatureHandler for SaslLikeHandler {
	fn handle_stream_features(&self, _: &StreamBase, _: &Element) -> Result<Option<FeatureVerdict>> {
		Ok(Some(self.verdict.clone()))
	}

	fn make_stream_features(&self, _: &StreamBase, features: &mut Element) {
		features.push_child(self.advertised.clone());
	}
}

fn response_header() -> Element {
	Element::new(stream_root_qname())
		.with_attr("version", "1.0")
		.with_attr("from", "example.com")
		.with_attr("id", "sid-7")
}

#[tokio::test]
async fn initiator_negotiates_features_and_restarts_after_auth() {
	let _ = tracing_subscriber::fmt::try_init();

	let (queue, mut events) = EventQueue::channel();
	let handler = Arc::new(SaslLikeHandler {
		verdict: FeatureVerdict::Handled { name: "sasl".into(), mandatory: true },
		advertised: Element::new(QName::new("urn:ietf:params:xml:ns:xmpp-sasl", "mechanisms")),
	});
	let stream =
		StreamBase::new("jabber:client", vec![handler], Vec::new(), XmppSettings::new(queue));
	let transport = RecordingTransport::new();

	stream.initiate(Box::new(transport.clone()), Some("example.com")).expect("initiate");
	stream.stream_start(response_header()).expect("stream start");
	stream.stream_element(Element::new(features_qname())).expect("features");

	// A SASL handler would now run its exchange; success restarts the
	// stream with the id learned from the receiver.
	stream
		.set_authenticated("juliet@example.com".parse().expect("jid"), true)
		.expect("set authenticated");

	assert!(matches!(events.recv().await, Some(StreamEvent::StreamConnected { .. })));
	assert!(matches!(events.recv().await, Some(StreamEvent::GotFeatures { .. })));
	assert!(matches!(events.recv().await, Some(StreamEvent::Authenticated { .. })));

	assert_eq!(stream.version(), Some((1, 0)));
	assert_eq!(transport.head_ids(), vec![None, Some("sid-7".to_string())]);
	assert!(stream.authenticated());
}

#[test]
fn receiver_advertises_handler_contributed_features() {
	let _ = tracing_subscriber::fmt::try_init();

	let (queue, _events) = EventQueue::channel();
	let handler = Arc::new(SaslLikeHandler {
		verdict: FeatureVerdict::Handled { name: "sasl".into(), mandatory: false },
		advertised: Element::new(QName::new("urn:ietf:params:xml:ns:xmpp-sasl", "mechanisms")),
	});
	let stream =
		StreamBase::new("jabber:client", vec![handler], Vec::new(), XmppSettings::new(queue));
	let transport = RecordingTransport::new();

	stream.receive(Box::new(transport.clone()), "example.com").expect("receive");
	stream
		.stream_start(
			Element::new(stream_root_qname())
				.with_attr("version", "1.0")
				.with_attr("to", "example.com")
				.with_attr("from", "juliet@example.com"),
		)
		.expect("stream start");

	let sent = transport.sent();
	let Sent::Head { from, to, id } = &sent[0] else { panic!("expected a stream head first") };

	assert_eq!(from.as_deref(), Some("example.com"));
	assert_eq!(to.as_deref(), Some("juliet@example.com"));
	assert!(id.is_some());

	let Sent::Element(features) = &sent[1] else { panic!("expected features after the head") };

	assert_eq!(*features.name(), features_qname());
	assert!(
		features.find_child(&QName::new("urn:ietf:params:xml:ns:xmpp-sasl", "mechanisms")).is_some(),
		"handler contribution missing from features"
	);
}

#[test]
fn mandatory_feature_nobody_handles_kills_the_stream() {
	let _ = tracing_subscriber::fmt::try_init();

	let (queue, _events) = EventQueue::channel();
	let handler = Arc::new(SaslLikeHandler {
		verdict: FeatureVerdict::NotHandled { name: "bind".into(), mandatory: true },
		advertised: Element::new(QName::new("urn:test", "unused")),
	});
	let stream =
		StreamBase::new("jabber:client", vec![handler], Vec::new(), XmppSettings::new(queue));
	let transport = RecordingTransport::new();

	stream.initiate(Box::new(transport.clone()), Some("example.com")).expect("initiate");
	stream.stream_start(response_header()).expect("stream start");

	let err = stream.stream_element(Element::new(features_qname())).expect_err("fatal");

	assert_eq!(err.condition(), Some(ErrorCondition::UnsupportedFeature));
	assert!(err.is_fatal());
	assert_eq!(transport.sent_error_condition().as_deref(), Some("unsupported-feature"));
	assert!(matches!(transport.sent().last(), Some(Sent::Disconnected)));
}

struct CountingStanzaHandler {
	seen: AtomicUsize,
}
impl StanzaHandler for CountingStanzaHandler {
	fn active_in(&self, _: HandlerPhase) -> bool {
		true
	}

	fn handle_stanza(&self, _: &StreamBase, stanza: &Stanza) -> bool {
		if stanza.kind() == StanzaKind::Message {
			self.seen.fetch_add(1, Ordering::SeqCst);

			true
		} else {
			false
		}
	}
}

#[test]
fn stanzas_are_dispatched_and_iq_responses_tracked() {
	let _ = tracing_subscriber::fmt::try_init();

	let (queue, _events) = EventQueue::channel();
	let handler = Arc::new(CountingStanzaHandler { seen: AtomicUsize::new(0) });
	let stream = StreamBase::new(
		"jabber:client",
		Vec::new(),
		vec![handler.clone()],
		XmppSettings::new(queue),
	);
	let transport = RecordingTransport::new();

	stream.initiate(Box::new(transport.clone()), Some("example.com")).expect("initiate");
	stream.stream_start(response_header()).expect("stream start");

	// A plain message goes to the stanza handlers.
	stream
		.stream_element(Element::new(QName::new("jabber:client", "message")))
		.expect("dispatch message");

	assert_eq!(handler.seen.load(Ordering::SeqCst), 1);

	// An IQ response is routed to its registered callback instead.
	let responses = Arc::new(Mutex::new(Vec::new()));
	let responses_in = responses.clone();
	let mut request = Stanza::new(StanzaKind::Iq, "jabber:client");

	request.set_id("q1");
	request.set_stanza_type("get");
	stream
		.send_iq(request, move |response| {
			responses_in.lock().expect("lock").push(response.id().map(ToOwned::to_owned));
		})
		.expect("send iq");
	stream
		.stream_element(
			Element::new(QName::new("jabber:client", "iq"))
				.with_attr("id", "q1")
				.with_attr("type", "result"),
		)
		.expect("dispatch response");

	assert_eq!(responses.lock().expect("lock").as_slice(), &[Some("q1".to_string())]);
	assert_eq!(handler.seen.load(Ordering::SeqCst), 1, "the response bypassed the handlers");

	// The request stanza went out with the stream language applied.
	let sent = transport.sent();
	let Some(Sent::Element(iq)) = sent.last() else { panic!("expected the iq on the wire") };

	assert_eq!(iq.attr("xml:lang"), Some("en"));
	assert_eq!(iq.attr("id"), Some("q1"));
}

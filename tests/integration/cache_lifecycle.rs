//! Integration tests for cache lifecycle and fetch-on-miss behaviour.

// std
use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};
// crates.io
use xmpp_engine::{
	Cache, CacheConfig, CacheItem, CacheSuite, Error, FetchHandle, Fetcher, FetcherFactory,
	ItemPeriods, ItemState, ObjectRequest,
};

type Address = String;
type Payload = String;
type Delivery = (Address, Payload, ItemState);

#[derive(Default)]
struct FetchLog {
	handles: Mutex<Vec<FetchHandle<Address, Payload>>>,
	spawned: AtomicUsize,
}
impl FetchLog {
	fn handle(&self, index: usize) -> FetchHandle<Address, Payload> {
		self.handles.lock().expect("lock")[index].clone()
	}
}

struct RecordingFetcher {
	log: Arc<FetchLog>,
}
impl Fetcher<Address, Payload> for RecordingFetcher {
	fn fetch(&mut self, handle: FetchHandle<Address, Payload>) {
		self.log.handles.lock().expect("lock").push(handle);
	}
}

struct RecordingFactory {
	log: Arc<FetchLog>,
}
impl FetcherFactory<Address, Payload> for RecordingFactory {
	fn new_fetcher(&self, _: &Address) -> Box<dyn Fetcher<Address, Payload>> {
		self.log.spawned.fetch_add(1, Ordering::SeqCst);

		Box::new(RecordingFetcher { log: self.log.clone() })
	}
}

fn cache_with_log() -> (Cache<Address, Payload>, Arc<FetchLog>) {
	let _ = tracing_subscriber::fmt::try_init();

	let log = Arc::new(FetchLog::default());
	let cache = Cache::new(CacheConfig::new(16)).expect("cache");

	cache.set_fetcher(Some(Arc::new(RecordingFactory { log: log.clone() })));

	(cache, log)
}

fn recorder() -> (Arc<Mutex<Vec<Delivery>>>, impl FnOnce(&Address, &Payload, ItemState) + Send) {
	let deliveries = Arc::new(Mutex::new(Vec::new()));
	let sink = deliveries.clone();
	let handler = move |address: &Address, value: &Payload, state: ItemState| {
		sink.lock().expect("lock").push((address.clone(), value.clone(), state));
	};

	(deliveries, handler)
}

fn fresh_periods() -> ItemPeriods {
	ItemPeriods::new(
		Duration::from_secs(60 * 60),
		Duration::from_secs(12 * 60 * 60),
		Duration::from_secs(24 * 60 * 60),
	)
	.expect("periods")
}

fn already_stale() -> ItemPeriods {
	ItemPeriods::new(Duration::ZERO, Duration::ZERO, Duration::from_secs(60 * 60))
		.expect("periods")
}

#[test]
fn cache_hit_is_served_synchronously_without_a_fetch() {
	let _ = tracing_subscriber::fmt::try_init();

	let log = Arc::new(FetchLog::default());
	let suite: CacheSuite<Address, Payload> =
		CacheSuite::new(CacheConfig::new(16)).expect("suite");

	suite.register_fetcher("disco-info", Arc::new(RecordingFactory { log: log.clone() })).expect("register");

	let cache = suite.cache("disco-info").expect("cache");

	cache.add_item(
		CacheItem::new("juliet@example.com".to_string(), "identity=client".to_string(), fresh_periods())
			.expect("item"),
	);

	let (deliveries, handler) = recorder();

	suite
		.request_object("disco-info", ObjectRequest::new("juliet@example.com".to_string(), handler))
		.expect("request");

	assert_eq!(
		deliveries.lock().expect("lock").as_slice(),
		&[("juliet@example.com".to_string(), "identity=client".to_string(), ItemState::Fresh)]
	);
	assert_eq!(log.spawned.load(Ordering::SeqCst), 0, "a hit spawns no fetcher");
	assert_eq!(cache.num_active_fetchers(), 0);
}

#[test]
fn cache_miss_fetches_and_memoizes() {
	let (cache, log) = cache_with_log();
	let (deliveries, handler) = recorder();

	cache
		.request_object(ObjectRequest::new("juliet@example.com".to_string(), handler))
		.expect("request");

	assert_eq!(log.spawned.load(Ordering::SeqCst), 1);
	assert!(deliveries.lock().expect("lock").is_empty(), "nothing delivered before completion");

	let handle = log.handle(0);

	handle.got_it("identity=client".to_string(), ItemState::New);

	assert_eq!(
		deliveries.lock().expect("lock").as_slice(),
		&[("juliet@example.com".to_string(), "identity=client".to_string(), ItemState::New)]
	);
	assert!(!handle.is_active());
	assert_eq!(cache.num_active_fetchers(), 0);

	// The second request is answered from the cache.
	let (second, handler) = recorder();

	cache
		.request_object(ObjectRequest::new("juliet@example.com".to_string(), handler))
		.expect("request");

	assert_eq!(
		second.lock().expect("lock").as_slice(),
		&[("juliet@example.com".to_string(), "identity=client".to_string(), ItemState::Fresh)]
	);
	assert_eq!(log.spawned.load(Ordering::SeqCst), 1, "no second fetch");
}

#[test]
fn timeout_falls_back_to_a_stale_backup_item() {
	let (cache, log) = cache_with_log();

	cache.add_item(
		CacheItem::with_state(
			"juliet@example.com".to_string(),
			"cached copy".to_string(),
			already_stale(),
			ItemState::Stale,
		)
		.expect("item"),
	);

	let (deliveries, handler) = recorder();
	let errors = Arc::new(AtomicUsize::new(0));
	let timeouts = Arc::new(AtomicUsize::new(0));
	let errors_in = errors.clone();
	let timeouts_in = timeouts.clone();

	cache
		.request_object(
			ObjectRequest::new("juliet@example.com".to_string(), handler)
				.with_backup_state(ItemState::Stale)
				.with_timeout(Duration::from_millis(5))
				.on_error(move |_, _| {
					errors_in.fetch_add(1, Ordering::SeqCst);
				})
				.on_timeout(move |_| {
					timeouts_in.fetch_add(1, Ordering::SeqCst);
				}),
		)
		.expect("request");

	// The stale item cannot satisfy a `fresh` request, so a fetch started.
	assert_eq!(log.spawned.load(Ordering::SeqCst), 1);
	assert!(deliveries.lock().expect("lock").is_empty());

	thread::sleep(Duration::from_millis(15));
	cache.tick();

	assert_eq!(
		deliveries.lock().expect("lock").as_slice(),
		&[("juliet@example.com".to_string(), "cached copy".to_string(), ItemState::Stale)]
	);
	assert_eq!(errors.load(Ordering::SeqCst), 0, "backup delivery suppresses the error handler");
	assert_eq!(timeouts.load(Ordering::SeqCst), 0, "backup delivery suppresses the timeout handler");
	assert!(!log.handle(0).is_active());
	assert_eq!(cache.num_active_fetchers(), 0);
}

#[test]
fn timeout_without_backup_reports_through_the_timeout_handler() {
	let (cache, log) = cache_with_log();
	let (deliveries, handler) = recorder();
	let errors = Arc::new(AtomicUsize::new(0));
	let timeouts = Arc::new(AtomicUsize::new(0));
	let errors_in = errors.clone();
	let timeouts_in = timeouts.clone();

	cache
		.request_object(
			ObjectRequest::new("juliet@example.com".to_string(), handler)
				.with_timeout(Duration::from_millis(5))
				.on_error(move |_, _| {
					errors_in.fetch_add(1, Ordering::SeqCst);
				})
				.on_timeout(move |_| {
					timeouts_in.fetch_add(1, Ordering::SeqCst);
				}),
		)
		.expect("request");

	thread::sleep(Duration::from_millis(15));
	cache.tick();

	assert!(deliveries.lock().expect("lock").is_empty());
	assert_eq!(timeouts.load(Ordering::SeqCst), 1);
	assert_eq!(errors.load(Ordering::SeqCst), 0);
	assert_eq!(log.spawned.load(Ordering::SeqCst), 1);
	assert_eq!(cache.num_active_fetchers(), 0);
}

#[test]
fn tick_only_expires_overdue_fetchers() {
	let (cache, log) = cache_with_log();
	let (_, quick_handler) = recorder();
	let (_, slow_handler) = recorder();

	cache
		.request_object(
			ObjectRequest::new("quick@example.com".to_string(), quick_handler)
				.with_timeout(Duration::from_millis(5)),
		)
		.expect("request");
	cache
		.request_object(
			ObjectRequest::new("slow@example.com".to_string(), slow_handler)
				.with_timeout(Duration::from_secs(60 * 60)),
		)
		.expect("request");

	thread::sleep(Duration::from_millis(15));
	cache.tick();

	assert_eq!(cache.num_active_fetchers(), 1, "only the overdue fetcher expired");
	assert!(!log.handle(0).is_active());
	assert!(log.handle(1).is_active());
}

#[test]
fn suite_tick_fans_out_to_every_cache() {
	let _ = tracing_subscriber::fmt::try_init();

	let suite: CacheSuite<Address, Payload> =
		CacheSuite::new(CacheConfig::new(16)).expect("suite");
	let logs: Vec<Arc<FetchLog>> = (0..2).map(|_| Arc::new(FetchLog::default())).collect();

	for (class, log) in ["disco-info", "disco-items"].iter().zip(&logs) {
		suite.register_fetcher(class, Arc::new(RecordingFactory { log: log.clone() })).expect("register");

		let (_, handler) = recorder();

		suite
			.request_object(
				class,
				ObjectRequest::new("juliet@example.com".to_string(), handler)
					.with_timeout(Duration::from_millis(5)),
			)
			.expect("request");
	}

	thread::sleep(Duration::from_millis(15));
	suite.tick();

	for log in &logs {
		assert!(!log.handle(0).is_active(), "fetcher expired by the suite sweep");
	}
}

#[test]
fn invalid_period_overrides_are_rejected() {
	let (cache, log) = cache_with_log();
	let (_, handler) = recorder();
	let result = cache.request_object(
		ObjectRequest::new("juliet@example.com".to_string(), handler)
			.with_expiration_period(Duration::from_secs(1)),
	);

	assert!(matches!(result, Err(Error::Validation { .. })));
	assert_eq!(log.spawned.load(Ordering::SeqCst), 0);
}

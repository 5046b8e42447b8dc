//! Fetcher seams and in-flight retrieval bookkeeping.
//!
//! A [`FetcherFactory`] builds one [`Fetcher`] per cache miss; the fetcher
//! starts asynchronous retrieval and reports the outcome through the
//! [`FetchHandle`] it was given. Exactly one terminal path runs per handle:
//! [`FetchHandle::got_it`], [`FetchHandle::error`] or the cache-driven timeout.

// std
use std::{fmt, sync::Weak};
// crates.io
use parking_lot::Mutex;
// self
use crate::{
	_prelude::*,
	cache::{
		item::{CacheItem, ItemPeriods, ItemState},
		store::{Cache, CacheShared, DEFAULT_REQUEST_TIMEOUT},
	},
};

/// Callback receiving a delivered object.
pub type ObjectHandler<K, V> = Box<dyn FnOnce(&K, &V, ItemState) + Send>;
/// Callback receiving a fetch failure; `None` marks a timeout routed here
/// for lack of a dedicated timeout handler.
pub type ErrorHandler<K> = Box<dyn FnOnce(&K, Option<Error>) + Send>;
/// Callback receiving a fetch timeout.
pub type TimeoutHandler<K> = Box<dyn FnOnce(&K) + Send>;

/// One-shot asynchronous retriever for a single cache address.
///
/// `fetch` must start the retrieval and eventually cause exactly one of
/// `handle.got_it(..)`, `handle.error(..)` to run, or neither, in which
/// case the cache's tick loop times the fetch out. Implementations should
/// watch [`FetchHandle::is_active`] to best-effort cancel abandoned work.
pub trait Fetcher<K, V>: Send {
	/// Start the retrieval process.
	fn fetch(&mut self, handle: FetchHandle<K, V>);
}

/// Builds fetchers for one object class.
pub trait FetcherFactory<K, V>: Send + Sync {
	/// Construct a fetcher for the given address.
	fn new_fetcher(&self, address: &K) -> Box<dyn Fetcher<K, V>>;
}

/// Parameters of one cache request.
pub struct ObjectRequest<K, V> {
	pub(crate) address: K,
	pub(crate) state: ItemState,
	pub(crate) object_handler: ObjectHandler<K, V>,
	pub(crate) error_handler: Option<ErrorHandler<K>>,
	pub(crate) timeout_handler: Option<TimeoutHandler<K>>,
	pub(crate) backup_state: Option<ItemState>,
	pub(crate) timeout: Duration,
	pub(crate) freshness_period: Option<Duration>,
	pub(crate) expiration_period: Option<Duration>,
	pub(crate) purge_period: Option<Duration>,
}
impl<K, V> ObjectRequest<K, V> {
	/// Request the object at `address`, accepting at worst a `Fresh` item.
	pub fn new(address: K, object_handler: impl FnOnce(&K, &V, ItemState) + Send + 'static) -> Self {
		Self {
			address,
			state: ItemState::Fresh,
			object_handler: Box::new(object_handler),
			error_handler: None,
			timeout_handler: None,
			backup_state: None,
			timeout: DEFAULT_REQUEST_TIMEOUT,
			freshness_period: None,
			expiration_period: None,
			purge_period: None,
		}
	}

	/// Set the worst acceptable item state for a cache hit.
	pub fn with_state(mut self, state: ItemState) -> Self {
		self.state = state;

		self
	}

	/// Install a failure callback.
	pub fn on_error(mut self, handler: impl FnOnce(&K, Option<Error>) + Send + 'static) -> Self {
		self.error_handler = Some(Box::new(handler));

		self
	}

	/// Install a timeout callback.
	pub fn on_timeout(mut self, handler: impl FnOnce(&K) + Send + 'static) -> Self {
		self.timeout_handler = Some(Box::new(handler));

		self
	}

	/// Accept a cached item of at worst this state when the fetch fails.
	pub fn with_backup_state(mut self, state: ItemState) -> Self {
		self.backup_state = Some(state);

		self
	}

	/// Override the fetch timeout; zero disables the deadline.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Override the freshness period of the fetched item.
	pub fn with_freshness_period(mut self, period: Duration) -> Self {
		self.freshness_period = Some(period);

		self
	}

	/// Override the expiration period of the fetched item.
	pub fn with_expiration_period(mut self, period: Duration) -> Self {
		self.expiration_period = Some(period);

		self
	}

	/// Override the purge period of the fetched item.
	pub fn with_purge_period(mut self, period: Duration) -> Self {
		self.purge_period = Some(period);

		self
	}
}
impl<K: fmt::Debug, V> fmt::Debug for ObjectRequest<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("ObjectRequest")
			.field("address", &self.address)
			.field("state", &self.state)
			.field("backup_state", &self.backup_state)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

struct FetchState<K, V> {
	object_handler: Option<ObjectHandler<K, V>>,
	error_handler: Option<ErrorHandler<K>>,
	timeout_handler: Option<TimeoutHandler<K>>,
	backup_state: Option<ItemState>,
	// Set by the first terminal path to claim the handle; `active` stays up
	// until the deactivation sequence completes.
	claimed: bool,
	active: bool,
}

struct FetchShared<K, V> {
	cache: Weak<CacheShared<K, V>>,
	address: K,
	periods: ItemPeriods,
	timeout_time: DateTime<Utc>,
	seq: u64,
	state: Mutex<FetchState<K, V>>,
}

/// Handle to one in-flight retrieval; clones refer to the same fetch.
pub struct FetchHandle<K, V> {
	shared: Arc<FetchShared<K, V>>,
}
impl<K, V> Clone for FetchHandle<K, V> {
	fn clone(&self) -> Self {
		Self { shared: self.shared.clone() }
	}
}
impl<K, V> FetchHandle<K, V>
where
	K: Clone + Eq + std::hash::Hash + Send + 'static,
	V: Clone + Send + 'static,
{
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		cache: Weak<CacheShared<K, V>>,
		address: K,
		periods: ItemPeriods,
		timeout_time: DateTime<Utc>,
		seq: u64,
		object_handler: ObjectHandler<K, V>,
		error_handler: Option<ErrorHandler<K>>,
		timeout_handler: Option<TimeoutHandler<K>>,
		backup_state: Option<ItemState>,
	) -> Self {
		Self {
			shared: Arc::new(FetchShared {
				cache,
				address,
				periods,
				timeout_time,
				seq,
				state: Mutex::new(FetchState {
					object_handler: Some(object_handler),
					error_handler,
					timeout_handler,
					backup_state,
					claimed: false,
					active: true,
				}),
			}),
		}
	}

	/// Address this fetch covers.
	pub fn address(&self) -> &K {
		&self.shared.address
	}

	/// Deadline after which the cache's tick loop times the fetch out.
	pub fn timeout_time(&self) -> DateTime<Utc> {
		self.shared.timeout_time
	}

	/// Whether a terminal callback may still fire.
	pub fn is_active(&self) -> bool {
		self.shared.state.lock().active
	}

	/// Report a successful retrieval.
	///
	/// Builds a cache item with the fetch's configured periods, delivers it
	/// to the object handler, stores it, and deactivates the fetch. A no-op
	/// once any terminal path has run.
	pub fn got_it(&self, value: V, state: ItemState) {
		let Some(cache) = self.cache() else { return };
		let Some(handler) = ({
			let mut fetch = self.shared.state.lock();

			if !fetch.active || fetch.claimed {
				return;
			}

			fetch.claimed = true;
			fetch.object_handler.take()
		}) else {
			return;
		};
		let item =
			match CacheItem::with_state(self.shared.address.clone(), value, self.shared.periods, state) {
				Ok(item) => item,
				Err(err) => {
					tracing::warn!(error = %err, "dropping fetched object with invalid periods");
					self.deactivate(&cache);

					return;
				},
			};

		handler(item.address(), item.value(), item.state());
		cache.add_item(item);
		self.deactivate(&cache);
	}

	/// Report a failed retrieval.
	///
	/// Falls back to a cached backup item when one was requested and is
	/// acceptable; otherwise delivers the error. Either way the cached
	/// object is invalidated and the fetch deactivated. A no-op once any
	/// terminal path has run.
	pub fn error(&self, error: Error) {
		let Some(cache) = self.cache() else { return };

		{
			let mut fetch = self.shared.state.lock();

			if !fetch.active || fetch.claimed {
				return;
			}

			fetch.claimed = true;
		}

		if !self.try_backup_item(&cache) {
			let handler = self.shared.state.lock().error_handler.take();

			match handler {
				Some(handler) => handler(&self.shared.address, Some(error)),
				None => tracing::debug!(error = %error, "fetch failed with no error handler installed"),
			}
		}

		cache.invalidate_object(&self.shared.address, ItemState::Stale);
		self.deactivate(&cache);
	}

	/// Time the fetch out; only the cache's tick loop calls this.
	pub(crate) fn timeout(&self) {
		let Some(cache) = self.cache() else { return };

		{
			let mut fetch = self.shared.state.lock();

			if !fetch.active || fetch.claimed {
				return;
			}

			fetch.claimed = true;
		}

		if !self.try_backup_item(&cache) {
			let (timeout_handler, error_handler) = {
				let mut fetch = self.shared.state.lock();

				(fetch.timeout_handler.take(), fetch.error_handler.take())
			};

			if let Some(handler) = timeout_handler {
				handler(&self.shared.address);
			} else if let Some(handler) = error_handler {
				handler(&self.shared.address, None);
			} else {
				tracing::debug!("fetch timed out with no handler installed");
			}
		}

		cache.invalidate_object(&self.shared.address, ItemState::Stale);
		self.deactivate(&cache);
	}

	fn try_backup_item(&self, cache: &Cache<K, V>) -> bool {
		let Some(backup_state) = self.shared.state.lock().backup_state else {
			return false;
		};

		match cache.get_item(&self.shared.address, backup_state) {
			Some(item) => {
				let handler = self.shared.state.lock().object_handler.take();

				if let Some(handler) = handler {
					handler(item.address(), item.value(), item.state());
				}

				true
			},
			None => false,
		}
	}

	// Unlink from the cache, then drop the active flag. Both steps are
	// idempotent: the cache may have unlinked this fetch already.
	fn deactivate(&self, cache: &Cache<K, V>) {
		cache.remove_fetcher(self);
		self.deactivated();
	}

	pub(crate) fn deactivated(&self) {
		self.shared.state.lock().active = false;
	}

	pub(crate) fn fetch_key(&self) -> (DateTime<Utc>, u64) {
		(self.shared.timeout_time, self.shared.seq)
	}

	fn cache(&self) -> Option<Cache<K, V>> {
		self.shared.cache.upgrade().map(Cache::from_shared)
	}
}
impl<K, V> fmt::Debug for FetchHandle<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("FetchHandle")
			.field("timeout_time", &self.shared.timeout_time)
			.field("seq", &self.shared.seq)
			.finish_non_exhaustive()
	}
}

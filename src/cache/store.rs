//! Bounded object store with eviction and in-flight fetcher tracking.

// std
use std::{
	cmp::Reverse,
	collections::{BTreeMap, HashMap},
	fmt,
	hash::Hash,
};
// crates.io
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
// self
use crate::{
	_prelude::*,
	cache::{
		fetcher::{FetchHandle, FetcherFactory, ObjectRequest},
		item::{CacheItem, ItemPeriods, ItemState, deadline},
	},
};

/// Default freshness period for cached items.
pub const DEFAULT_FRESHNESS_PERIOD: Duration = Duration::from_secs(60 * 60);
/// Default expiration period for cached items.
pub const DEFAULT_EXPIRATION_PERIOD: Duration = Duration::from_secs(12 * 60 * 60);
/// Default purge period for cached items.
pub const DEFAULT_PURGE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// Default fetch deadline for requests that do not override it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Default item bound for caches built from [`CacheConfig::default`].
pub const DEFAULT_MAX_ITEMS: usize = 128;

/// Cache sizing and lifecycle defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
	/// Maximum number of items the cache stores.
	pub max_items: usize,
	/// Freshness period applied when a request does not override it.
	#[serde(default = "default_freshness_period")]
	pub default_freshness_period: Duration,
	/// Expiration period applied when a request does not override it.
	#[serde(default = "default_expiration_period")]
	pub default_expiration_period: Duration,
	/// Purge period applied when a request does not override it; zero
	/// disables automatic purging by age.
	#[serde(default = "default_purge_period")]
	pub default_purge_period: Duration,
}
impl CacheConfig {
	/// Create a configuration with the default periods.
	pub fn new(max_items: usize) -> Self {
		Self {
			max_items,
			default_freshness_period: DEFAULT_FRESHNESS_PERIOD,
			default_expiration_period: DEFAULT_EXPIRATION_PERIOD,
			default_purge_period: DEFAULT_PURGE_PERIOD,
		}
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.max_items == 0 {
			return Err(Error::Validation {
				field: "max_items",
				reason: "Must be greater than zero.".into(),
			});
		}

		ItemPeriods {
			freshness: self.default_freshness_period,
			expiration: self.default_expiration_period,
			purge: self.default_purge_period,
		}
		.validate()
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_ITEMS)
	}
}

// Ordering key of the eviction list: the first entry is the stalest, oldest
// item. `seq` is a stable insertion counter breaking timestamp ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct EvictionKey {
	rank: Reverse<u8>,
	timestamp: DateTime<Utc>,
	seq: u64,
}

struct StoredEntry<K, V> {
	item: CacheItem<K, V>,
	key: EvictionKey,
}

struct CacheInner<K, V> {
	items: HashMap<K, StoredEntry<K, V>>,
	eviction: BTreeMap<EvictionKey, K>,
	active: BTreeMap<(DateTime<Utc>, u64), FetchHandle<K, V>>,
	factory: Option<Arc<dyn FetcherFactory<K, V>>>,
	// Items seen transitioning to purged since the last compaction.
	purged: usize,
	next_item_seq: u64,
	next_fetch_seq: u64,
}

pub(crate) struct CacheShared<K, V> {
	config: CacheConfig,
	inner: Mutex<CacheInner<K, V>>,
}

/// Thread-safe, bounded, fetch-on-miss object cache.
///
/// Handles are cheap clones sharing one store. All callbacks (hit
/// delivery, fetcher terminal paths) run with the cache lock released, so
/// they may freely re-enter the cache.
pub struct Cache<K, V> {
	shared: Arc<CacheShared<K, V>>,
}
impl<K, V> Clone for Cache<K, V> {
	fn clone(&self) -> Self {
		Self { shared: self.shared.clone() }
	}
}
impl<K, V> Cache<K, V>
where
	K: Clone + Eq + Hash + Send + 'static,
	V: Clone + Send + 'static,
{
	/// Create a cache from a validated configuration.
	pub fn new(config: CacheConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self {
			shared: Arc::new(CacheShared {
				config,
				inner: Mutex::new(CacheInner {
					items: HashMap::new(),
					eviction: BTreeMap::new(),
					active: BTreeMap::new(),
					factory: None,
					purged: 0,
					next_item_seq: 0,
					next_fetch_seq: 0,
				}),
			}),
		})
	}

	pub(crate) fn from_shared(shared: Arc<CacheShared<K, V>>) -> Self {
		Self { shared }
	}

	/// Request an object, serving a cache hit synchronously and fetching
	/// otherwise.
	///
	/// On a hit the object handler runs at once and no fetcher is
	/// constructed. On a miss a registered fetcher factory is required;
	/// without one the request fails with a configuration error.
	pub fn request_object(&self, request: ObjectRequest<K, V>) -> Result<()> {
		let ObjectRequest {
			address,
			state,
			object_handler,
			error_handler,
			timeout_handler,
			backup_state,
			timeout,
			freshness_period,
			expiration_period,
			purge_period,
		} = request;
		let hit = {
			let mut inner = self.shared.inner.lock();

			self.get_item_locked(&mut inner, &address, state)
		};

		if let Some(item) = hit {
			object_handler(item.address(), item.value(), item.state());

			return Ok(());
		}

		let factory = self
			.shared
			.inner
			.lock()
			.factory
			.clone()
			.ok_or_else(|| Error::Configuration("No fetcher factory installed.".into()))?;
		let periods = ItemPeriods::new(
			freshness_period.unwrap_or(self.shared.config.default_freshness_period),
			expiration_period.unwrap_or(self.shared.config.default_expiration_period),
			purge_period.unwrap_or(self.shared.config.default_purge_period),
		)?;
		let timeout_time =
			if timeout.is_zero() { DateTime::<Utc>::MAX_UTC } else { deadline(Utc::now(), timeout) };
		let handle = {
			let mut inner = self.shared.inner.lock();
			let seq = inner.next_fetch_seq;

			inner.next_fetch_seq += 1;

			let handle = FetchHandle::new(
				Arc::downgrade(&self.shared),
				address.clone(),
				periods,
				timeout_time,
				seq,
				object_handler,
				error_handler,
				timeout_handler,
				backup_state,
			);

			inner.active.insert((timeout_time, seq), handle.clone());

			handle
		};
		let mut fetcher = factory.new_fetcher(&address);

		fetcher.fetch(handle);

		Ok(())
	}

	/// Look up an item, advancing its state first.
	///
	/// Returns the item only when the requested state is at least as
	/// tolerant as the item's current state.
	pub fn get_item(&self, address: &K, state: ItemState) -> Option<CacheItem<K, V>> {
		let mut inner = self.shared.inner.lock();

		self.get_item_locked(&mut inner, address, state)
	}

	/// Store an item, updating its state first; a `Purged` item is not
	/// stored. Returns the post-update state.
	pub fn add_item(&self, mut item: CacheItem<K, V>) -> ItemState {
		let mut inner = self.shared.inner.lock();
		let state = item.update_state();

		if state == ItemState::Purged {
			return state;
		}
		if inner.items.len() >= self.shared.config.max_items {
			self.purge_items_locked(&mut inner);
		}

		let seq = inner.next_item_seq;

		inner.next_item_seq += 1;

		let key = EvictionKey { rank: Reverse(item.rank()), timestamp: item.timestamp(), seq };
		let address = item.address().clone();

		if let Some(previous) = inner.items.insert(address.clone(), StoredEntry { item, key }) {
			inner.eviction.remove(&previous.key);
		}

		inner.eviction.insert(key, address);

		state
	}

	/// Advance an item's state, returning the new state when present.
	pub fn update_item(&self, address: &K) -> Option<ItemState> {
		let mut inner = self.shared.inner.lock();

		self.update_item_locked(&mut inner, address).map(|item| item.state())
	}

	/// Raise an item's state to at least `state`; never lowers it.
	pub fn invalidate_object(&self, address: &K, state: ItemState) {
		let mut inner = self.shared.inner.lock();
		let (old_key, new_key) = {
			let Some(entry) = inner.items.get_mut(address) else { return };

			if entry.item.state().rank() >= state.rank() {
				return;
			}

			entry.item.raise_state(state);
			entry.item.update_state();

			let old_key = entry.key;
			let new_key = EvictionKey { rank: Reverse(entry.item.rank()), ..old_key };

			entry.key = new_key;

			(old_key, new_key)
		};

		if new_key != old_key {
			inner.eviction.remove(&old_key);
			inner.eviction.insert(new_key, address.clone());
		}
	}

	/// Compact to at most 75% of `max_items`, then keep dropping the
	/// eviction head while it updates to purged.
	pub fn purge_items(&self) {
		let mut inner = self.shared.inner.lock();

		self.purge_items_locked(&mut inner);
	}

	/// Time out overdue fetchers and compact the store.
	pub fn tick(&self) {
		let now = Utc::now();
		let expired: Vec<FetchHandle<K, V>> = {
			let inner = self.shared.inner.lock();

			inner
				.active
				.iter()
				.take_while(|(key, _)| key.0 <= now)
				.map(|(_, handle)| handle.clone())
				.collect()
		};

		// Each timeout re-enters the cache to unlink itself.
		for handle in expired {
			handle.timeout();
		}

		self.purge_items();
	}

	/// Unlink a fetcher from the active list and mark it deactivated.
	pub fn remove_fetcher(&self, fetcher: &FetchHandle<K, V>) {
		let removed = {
			let mut inner = self.shared.inner.lock();

			inner.active.remove(&fetcher.fetch_key()).is_some()
		};

		if removed {
			fetcher.deactivated();
		}
	}

	/// Install or clear the fetcher factory.
	pub fn set_fetcher(&self, factory: Option<Arc<dyn FetcherFactory<K, V>>>) {
		self.shared.inner.lock().factory = factory;
	}

	/// Number of stored items.
	pub fn num_items(&self) -> usize {
		self.shared.inner.lock().items.len()
	}

	/// Number of in-flight fetchers.
	pub fn num_active_fetchers(&self) -> usize {
		self.shared.inner.lock().active.len()
	}

	fn get_item_locked(
		&self,
		inner: &mut CacheInner<K, V>,
		address: &K,
		state: ItemState,
	) -> Option<CacheItem<K, V>> {
		let item = self.update_item_locked(inner, address)?;

		(state.rank() >= item.rank()).then_some(item)
	}

	fn update_item_locked(
		&self,
		inner: &mut CacheInner<K, V>,
		address: &K,
	) -> Option<CacheItem<K, V>> {
		let (old_state, new_state, old_key, new_key, snapshot) = {
			let entry = inner.items.get_mut(address)?;
			let old_state = entry.item.state();
			let new_state = entry.item.update_state();
			let old_key = entry.key;
			let new_key = EvictionKey { rank: Reverse(entry.item.rank()), ..old_key };

			entry.key = new_key;

			(old_state, new_state, old_key, new_key, entry.item.clone())
		};

		if new_key != old_key {
			inner.eviction.remove(&old_key);
			inner.eviction.insert(new_key, address.clone());
		}
		if old_state != ItemState::Purged && new_state == ItemState::Purged {
			inner.purged += 1;

			if inner.purged * 4 > self.shared.config.max_items {
				self.purge_items_locked(inner);
			}
		}

		Some(snapshot)
	}

	fn purge_items_locked(&self, inner: &mut CacheInner<K, V>) {
		let target = self.shared.config.max_items * 3 / 4;

		while inner.eviction.len() > target {
			let Some((_, address)) = inner.eviction.pop_first() else { break };

			inner.items.remove(&address);
		}

		loop {
			let Some((key, address)) = inner.eviction.first_key_value().map(|(k, a)| (*k, a.clone()))
			else {
				break;
			};
			let new_state = match inner.items.get_mut(&address) {
				Some(entry) => entry.item.update_state(),
				None => {
					inner.eviction.remove(&key);

					continue;
				},
			};

			if new_state == ItemState::Purged {
				inner.eviction.remove(&key);
				inner.items.remove(&address);
			} else {
				// Promotion only moves entries toward the head, so a
				// re-keyed head stays the head and the sweep can stop.
				let new_key = EvictionKey { rank: Reverse(new_state.rank()), ..key };

				if new_key != key {
					if let Some(entry) = inner.items.get_mut(&address) {
						entry.key = new_key;
					}

					inner.eviction.remove(&key);
					inner.eviction.insert(new_key, address);
				}

				break;
			}
		}

		inner.purged = 0;
	}
}
impl<K, V> fmt::Debug for Cache<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Cache").field("config", &self.shared.config).finish_non_exhaustive()
	}
}

fn default_freshness_period() -> Duration {
	DEFAULT_FRESHNESS_PERIOD
}

fn default_expiration_period() -> Duration {
	DEFAULT_EXPIRATION_PERIOD
}

fn default_purge_period() -> Duration {
	DEFAULT_PURGE_PERIOD
}

//! Routing of cache requests across per-class caches.

// std
use std::{collections::HashMap, fmt, hash::Hash};
// crates.io
use parking_lot::RwLock;
// self
use crate::{
	_prelude::*,
	cache::{
		fetcher::{FetcherFactory, ObjectRequest},
		store::{Cache, CacheConfig},
	},
};

/// A set of caches indexed by an explicit object-class tag.
///
/// Classes share one payload type; callers model heterogeneous payloads as
/// an enum. The suite exclusively owns its caches: registering a fetcher
/// for a new class creates the class's cache, and unregistering only clears
/// the factory, keeping the cached items available.
pub struct CacheSuite<K, V> {
	config: CacheConfig,
	caches: RwLock<HashMap<Arc<str>, Cache<K, V>>>,
}
impl<K, V> CacheSuite<K, V>
where
	K: Clone + Eq + Hash + Send + 'static,
	V: Clone + Send + 'static,
{
	/// Create a suite; the configuration seeds every per-class cache.
	pub fn new(config: CacheConfig) -> Result<Self> {
		config.validate()?;

		Ok(Self { config, caches: RwLock::new(HashMap::new()) })
	}

	/// Register a fetcher factory for an object class, creating the class's
	/// cache on first registration.
	pub fn register_fetcher(
		&self,
		class: &str,
		factory: Arc<dyn FetcherFactory<K, V>>,
	) -> Result<()> {
		let cache = {
			let mut caches = self.caches.write();

			match caches.get(class) {
				Some(cache) => cache.clone(),
				None => {
					let cache = Cache::new(self.config.clone())?;

					caches.insert(Arc::from(class), cache.clone());

					cache
				},
			}
		};

		cache.set_fetcher(Some(factory));

		Ok(())
	}

	/// Clear the fetcher factory for an object class; cached items stay.
	pub fn unregister_fetcher(&self, class: &str) {
		let cache = self.caches.read().get(class).cloned();

		if let Some(cache) = cache {
			cache.set_fetcher(None);
		}
	}

	/// Route a request to the cache registered for `class`.
	pub fn request_object(&self, class: &str, request: ObjectRequest<K, V>) -> Result<()> {
		let cache = self
			.caches
			.read()
			.get(class)
			.cloned()
			.ok_or_else(|| Error::NotRegistered { class: class.to_string() })?;

		cache.request_object(request)
	}

	/// The cache serving `class`, when one exists.
	pub fn cache(&self, class: &str) -> Option<Cache<K, V>> {
		self.caches.read().get(class).cloned()
	}

	/// Sweep fetcher timeouts and compact every cache.
	pub fn tick(&self) {
		let caches: Vec<Cache<K, V>> = self.caches.read().values().cloned().collect();

		for cache in caches {
			cache.tick();
		}
	}
}
impl<K, V> fmt::Debug for CacheSuite<K, V> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("CacheSuite").field("config", &self.config).finish_non_exhaustive()
	}
}

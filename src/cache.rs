//! Fetch-on-miss object caching with a per-item freshness lifecycle.
//!
//! A [`Cache`](store::Cache) memoizes protocol responses (Service Discovery
//! results, client version replies and the like) under opaque addresses.
//! Items age through the New → Fresh → Old → Stale → Purged lifecycle; a
//! request names the worst state it accepts and a registered
//! [`FetcherFactory`](fetcher::FetcherFactory) covers misses by retrieving
//! the object asynchronously. A [`CacheSuite`](suite::CacheSuite) routes
//! requests across per-class caches by an explicit class tag.

pub mod fetcher;
pub mod item;
pub mod store;
pub mod suite;

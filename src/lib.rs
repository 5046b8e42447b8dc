//! Thread-safe XMPP (RFC 6120) stream engine with a freshness-lifecycle object cache:
//! stream negotiation, pluggable feature handlers, and fetch-on-miss memoization.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod stanza;
pub mod stream;
pub mod transport;
pub mod xml;

mod error;
mod jid;
mod settings;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};

	pub use crate::{Error, Result};
}
pub use crate::{
	cache::{
		fetcher::{FetchHandle, Fetcher, FetcherFactory, ObjectRequest},
		item::{CacheItem, ItemPeriods, ItemState},
		store::{Cache, CacheConfig},
		suite::CacheSuite,
	},
	error::{Error, Result},
	jid::Jid,
	settings::{StreamConfig, XmppSettings},
	stream::{
		ErrorCondition,
		base::{StreamBase, StreamState},
		events::{EventQueue, StreamEvent},
		features::{ElementHandlerEntry, FeatureVerdict, StreamFeatureHandler, StreamRole},
	},
};

#[cfg(test)]
mod _test {
	use serde_json as _;
	use tracing_subscriber as _;
}

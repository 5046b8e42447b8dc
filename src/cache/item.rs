//! Cached item with a freshness lifecycle.

// std
use std::fmt;
// crates.io
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Freshness lifecycle stages of a cached item.
///
/// The `Ord` derive gives the promotion order New < Fresh < Old < Stale <
/// Purged; acceptance comparisons use [`ItemState::rank`] instead, where
/// `Stale` and `Purged` deliberately tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
	/// Just retrieved, not yet stored.
	New,
	/// Within the freshness window.
	Fresh,
	/// Past freshness but most probably still valid.
	Old,
	/// Known to be expired.
	Stale,
	/// Due for removal from the cache.
	Purged,
}
impl ItemState {
	/// Acceptance rank of the state; lower means fresher.
	pub fn rank(self) -> u8 {
		match self {
			Self::New => 0,
			Self::Fresh => 1,
			Self::Old => 2,
			Self::Stale | Self::Purged => 3,
		}
	}

	/// Lowercase state name.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::New => "new",
			Self::Fresh => "fresh",
			Self::Old => "old",
			Self::Stale => "stale",
			Self::Purged => "purged",
		}
	}
}
impl fmt::Display for ItemState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Periods controlling an item's lifecycle deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPeriods {
	/// Interval after which the item stops being fresh.
	pub freshness: Duration,
	/// Interval after which the item expires.
	pub expiration: Duration,
	/// Interval after which the item is purged; zero disables auto-purge.
	pub purge: Duration,
}
impl ItemPeriods {
	/// Create a period set; fails when the windows are out of order.
	pub fn new(freshness: Duration, expiration: Duration, purge: Duration) -> Result<Self> {
		let periods = Self { freshness, expiration, purge };

		periods.validate()?;

		Ok(periods)
	}

	/// Validate `freshness ≤ expiration ≤ purge` (a zero purge means never).
	pub fn validate(&self) -> Result<()> {
		if self.freshness > self.expiration {
			return Err(Error::Validation {
				field: "freshness_period",
				reason: "Must not exceed the expiration period.".into(),
			});
		}
		if !self.purge.is_zero() && self.expiration > self.purge {
			return Err(Error::Validation {
				field: "expiration_period",
				reason: "Must not exceed the purge period.".into(),
			});
		}

		Ok(())
	}
}

/// A single cached value with its lifecycle deadlines.
///
/// Items are mutated only by the owning cache, under that cache's lock.
#[derive(Clone, Debug)]
pub struct CacheItem<K, V> {
	address: K,
	value: V,
	timestamp: DateTime<Utc>,
	freshness_time: DateTime<Utc>,
	expire_time: DateTime<Utc>,
	purge_time: DateTime<Utc>,
	state: ItemState,
}
impl<K, V> CacheItem<K, V> {
	/// Create an item in the `New` state.
	pub fn new(address: K, value: V, periods: ItemPeriods) -> Result<Self> {
		Self::with_state(address, value, periods, ItemState::New)
	}

	/// Create an item with an explicit initial state.
	pub fn with_state(address: K, value: V, periods: ItemPeriods, state: ItemState) -> Result<Self> {
		periods.validate()?;

		let now = Utc::now();
		let purge_time =
			if periods.purge.is_zero() { DateTime::<Utc>::MAX_UTC } else { deadline(now, periods.purge) };

		Ok(Self {
			address,
			value,
			timestamp: now,
			freshness_time: deadline(now, periods.freshness),
			expire_time: deadline(now, periods.expiration),
			purge_time,
			state,
		})
	}

	/// Address the item is stored under.
	pub fn address(&self) -> &K {
		&self.address
	}

	/// The cached value.
	pub fn value(&self) -> &V {
		&self.value
	}

	/// Current lifecycle state.
	pub fn state(&self) -> ItemState {
		self.state
	}

	/// Acceptance rank of the current state.
	pub fn rank(&self) -> u8 {
		self.state.rank()
	}

	/// Creation time.
	pub fn timestamp(&self) -> DateTime<Utc> {
		self.timestamp
	}

	/// When the item stops being fresh.
	pub fn freshness_time(&self) -> DateTime<Utc> {
		self.freshness_time
	}

	/// When the item expires.
	pub fn expire_time(&self) -> DateTime<Utc> {
		self.expire_time
	}

	/// When the item is due for purging.
	pub fn purge_time(&self) -> DateTime<Utc> {
		self.purge_time
	}

	/// Advance the state through every deadline that has passed.
	///
	/// Promotion is strictly monotonic and cascades within a single call:
	/// a `New` item whose purge deadline already passed comes out `Purged`.
	pub fn update_state(&mut self) -> ItemState {
		let now = Utc::now();

		if self.state == ItemState::New {
			self.state = ItemState::Fresh;
		}
		if self.state == ItemState::Fresh && now > self.freshness_time {
			self.state = ItemState::Old;
		}
		if self.state == ItemState::Old && now > self.expire_time {
			self.state = ItemState::Stale;
		}
		if self.state == ItemState::Stale && now > self.purge_time {
			self.state = ItemState::Purged;
		}

		self.state
	}

	/// Raise the state to at least `state`; never rolls it backwards.
	pub(crate) fn raise_state(&mut self, state: ItemState) {
		if self.state < state {
			self.state = state;
		}
	}
}

pub(crate) fn deadline(now: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
	TimeDelta::from_std(period)
		.ok()
		.and_then(|delta| now.checked_add_signed(delta))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

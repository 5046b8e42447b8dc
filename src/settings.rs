//! Stream settings: plain-data configuration plus the event queue handle.

// std
use std::time::Duration;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::{Error, Result, stream::events::EventQueue};

/// Default stream language.
pub const DEFAULT_LANGUAGE: &str = "en";
/// Default deadline for IQ responses.
pub const DEFAULT_STANZA_TIMEOUT: Duration = Duration::from_secs(300);

/// Plain-data stream configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
	/// Language announced on outgoing stream heads.
	#[serde(default = "default_language")]
	pub language: String,
	/// Languages a receiver accepts during negotiation.
	#[serde(default = "default_languages")]
	pub languages: Vec<String>,
	/// Deadline applied to tracked IQ requests.
	#[serde(default = "default_stanza_timeout")]
	pub default_stanza_timeout: Duration,
}
impl StreamConfig {
	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.language.is_empty() {
			return Err(Error::Validation { field: "language", reason: "Must not be empty.".into() });
		}
		if self.languages.is_empty() {
			return Err(Error::Validation {
				field: "languages",
				reason: "At least one supported language is required.".into(),
			});
		}
		if self.default_stanza_timeout < Duration::from_secs(1) {
			return Err(Error::Validation {
				field: "default_stanza_timeout",
				reason: "Must be at least 1 second.".into(),
			});
		}

		Ok(())
	}
}
impl Default for StreamConfig {
	fn default() -> Self {
		Self {
			language: default_language(),
			languages: default_languages(),
			default_stanza_timeout: default_stanza_timeout(),
		}
	}
}

/// Settings bundle handed to a stream.
#[derive(Clone, Debug)]
pub struct XmppSettings {
	/// Stream configuration.
	pub config: StreamConfig,
	/// Queue receiving stream lifecycle events.
	pub event_queue: EventQueue,
}
impl XmppSettings {
	/// Create settings with default configuration.
	pub fn new(event_queue: EventQueue) -> Self {
		Self { config: StreamConfig::default(), event_queue }
	}

	/// Replace the configuration.
	pub fn with_config(mut self, config: StreamConfig) -> Self {
		self.config = config;

		self
	}
}

fn default_language() -> String {
	DEFAULT_LANGUAGE.to_string()
}

fn default_languages() -> Vec<String> {
	vec![DEFAULT_LANGUAGE.to_string()]
}

fn default_stanza_timeout() -> Duration {
	DEFAULT_STANZA_TIMEOUT
}

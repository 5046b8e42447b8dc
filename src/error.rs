//! Crate-wide error types and `Result` alias.

// self
use crate::stream::ErrorCondition;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the stream engine and cache.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Stream error <{condition}>: {message}")]
	Stream { condition: ErrorCondition, message: String },
	#[error("Fatal stream error <{condition}>: {message}")]
	FatalStream { condition: ErrorCondition, message: String },
	#[error("Stream parse error: {0}")]
	StreamParse(String),
	#[error("Stream state error: {0}")]
	StreamState(String),

	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },

	#[error("Invalid JID '{jid}': {reason}")]
	Jid { jid: String, reason: &'static str },

	#[error("Fetch failed: {0}")]
	Fetch(String),
	#[error("Fetch timed out")]
	FetchTimeout,
	#[error("No fetcher registered for class '{class}'")]
	NotRegistered { class: String },
}
impl Error {
	/// Stream error condition carried by protocol-level errors, if any.
	pub fn condition(&self) -> Option<ErrorCondition> {
		match self {
			Self::Stream { condition, .. } | Self::FatalStream { condition, .. } => Some(*condition),
			_ => None,
		}
	}

	/// Whether the error terminates the stream.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::FatalStream { .. } | Self::StreamParse(_))
	}

	pub(crate) fn fatal(condition: ErrorCondition, message: impl Into<String>) -> Self {
		Self::FatalStream { condition, message: message.into() }
	}
}

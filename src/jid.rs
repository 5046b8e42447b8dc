//! JID addressing in the `local@domain/resource` shape of RFC 6122.
//!
//! Only the structural rules needed by the stream engine are enforced here;
//! full stringprep profiles belong to a dedicated addressing crate.

// std
use std::{fmt, str::FromStr};
// self
use crate::{Error, Result};

const MAX_PART_BYTES: usize = 1023;

/// An XMPP address; the local part and resource are optional.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Jid {
	local: Option<String>,
	domain: String,
	resource: Option<String>,
}
impl Jid {
	/// Local part, e.g. `alice` in `alice@example.com`.
	pub fn local(&self) -> Option<&str> {
		self.local.as_deref()
	}

	/// Domain part; always present, stored lowercase.
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Resource part, e.g. `desk` in `alice@example.com/desk`.
	pub fn resource(&self) -> Option<&str> {
		self.resource.as_deref()
	}

	/// The bare JID (resource stripped).
	pub fn bare(&self) -> Jid {
		Jid { local: self.local.clone(), domain: self.domain.clone(), resource: None }
	}
}
impl FromStr for Jid {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		let invalid = |reason| Error::Jid { jid: raw.to_string(), reason };
		let (bare, resource) = match raw.split_once('/') {
			Some((bare, resource)) => {
				if resource.is_empty() {
					return Err(invalid("empty resource part"));
				}

				(bare, Some(resource))
			},
			None => (raw, None),
		};
		let (local, domain) = match bare.split_once('@') {
			Some((local, domain)) => {
				if local.is_empty() {
					return Err(invalid("empty local part"));
				}

				(Some(local), domain)
			},
			None => (None, bare),
		};

		if domain.is_empty() {
			return Err(invalid("empty domain"));
		}
		if domain.contains('@') {
			return Err(invalid("'@' in domain"));
		}
		for part in [local, Some(domain), resource].into_iter().flatten() {
			if part.len() > MAX_PART_BYTES {
				return Err(invalid("part longer than 1023 bytes"));
			}
		}

		Ok(Self {
			local: local.map(ToOwned::to_owned),
			domain: domain.to_lowercase(),
			resource: resource.map(ToOwned::to_owned),
		})
	}
}
impl fmt::Display for Jid {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if let Some(local) = &self.local {
			write!(f, "{local}@")?;
		}

		write!(f, "{}", self.domain)?;

		if let Some(resource) = &self.resource {
			write!(f, "/{resource}")?;
		}

		Ok(())
	}
}

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_NAMESPACE_LEN: usize = 64;

/// Name of one vector-index partition. Searches never cross namespaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
	"Namespace {name:?} is invalid; use 1-64 characters from a-z, 0-9, underscore, or hyphen."
)]
pub struct InvalidNamespace {
	pub name: String,
}

impl Namespace {
	pub fn parse(raw: &str) -> Result<Self, InvalidNamespace> {
		let name = raw.trim();
		let valid = !name.is_empty()
			&& name.len() <= MAX_NAMESPACE_LEN
			&& name.chars().all(is_namespace_char);

		if !valid {
			return Err(InvalidNamespace { name: raw.to_string() });
		}

		Ok(Self(name.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

fn is_namespace_char(c: char) -> bool {
	c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Namespace {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl TryFrom<String> for Namespace {
	type Error = InvalidNamespace;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<Namespace> for String {
	fn from(value: Namespace) -> Self {
		value.0
	}
}

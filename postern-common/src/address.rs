use core::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// An email address, kept as the opaque string the peer supplied.
///
/// Envelope senders are stored exactly as given. Envelope recipients go
/// through [`Address::canonicalise`] first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Canonicalise an inbound recipient address.
    ///
    /// Strips a single leading `prefix:` source route and lowercases the
    /// domain of a `local@domain` address. Anything that does not reduce to
    /// `local@domain` (with non-empty parts, a single `@`, and no stray
    /// colons) fails canonicalisation.
    #[must_use]
    pub fn canonicalise(raw: &str) -> Option<Self> {
        let rest = match raw.split_once(':') {
            Some(("", _)) => return None,
            Some((_, rest)) => rest,
            None => raw,
        };

        if rest.contains(':') {
            return None;
        }

        let (local, domain) = rest.split_once('@')?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }

        Some(Self(format!("{local}@{}", domain.to_lowercase())))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

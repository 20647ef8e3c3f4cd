use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Upstream push service a device token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Apple,
    Firebase,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Firebase => "firebase",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownProvider;

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    /// Matching is case-sensitive: only `apple` and `firebase` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apple" => Ok(Self::Apple),
            "firebase" => Ok(Self::Firebase),
            _ => Err(UnknownProvider),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    pub topic: String,
    pub token: String,
    pub provider: ProviderKind,
    pub expires_at: OffsetDateTime,
}

impl RegistrationEntry {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Result of resolving a topic against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Live(RegistrationEntry),
    /// An entry exists but is past its expiration. Callers treat this as absent.
    Expired { expired_at: OffsetDateTime },
    NotFound,
}

impl Lookup {
    #[must_use]
    pub fn into_live(self) -> Option<RegistrationEntry> {
        match self {
            Self::Live(entry) => Some(entry),
            Self::Expired { .. } | Self::NotFound => None,
        }
    }
}

/// Live registrations per provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCounts {
    pub apple: u64,
    pub firebase: u64,
}

impl ProviderCounts {
    pub const fn add(&mut self, provider: ProviderKind) {
        match provider {
            ProviderKind::Apple => self.apple += 1,
            ProviderKind::Firebase => self.firebase += 1,
        }
    }
}

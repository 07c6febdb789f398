//! Scoped alias vocabulary: learned mappings from household slang to
//! canonical activity names, merged with built-in seeds.

mod resolver;
mod seed;
mod store;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use resolver::{AliasResolution, AliasResolver, AliasTable, AppliedAlias};
pub use seed::SEED_ALIASES;
pub use store::{normalize_alias_key, AliasEntry, AliasSource, AliasStore, ConfirmationUpdate};

/// Which term a confirmed clarification learns as the alias key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AliasKeySource {
    /// The user's original wording, falling back to the canonical term.
    #[default]
    OriginalToken,
    /// Always the canonical term.
    CanonicalTerm,
}

impl AliasKeySource {
    /// Pick the raw alias key from an optional original term and the canonical activity.
    pub fn alias_key_for<'a>(&self, original: Option<&'a str>, canonical: &'a str) -> &'a str {
        match self {
            Self::OriginalToken => original
                .filter(|o| !normalize_alias_key(o).is_empty())
                .unwrap_or(canonical),
            Self::CanonicalTerm => canonical,
        }
    }
}

/// Alias subsystem configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    /// Seconds a scope's merged table is served from cache.
    pub cache_ttl_secs: u64,
    /// Upper bound on learned entries read per scope.
    pub max_scope_entries: usize,
    pub key_source: AliasKeySource,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            max_scope_entries: 500,
            key_source: AliasKeySource::OriginalToken,
        }
    }
}

impl AliasConfig {
    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_secs)
    }
}

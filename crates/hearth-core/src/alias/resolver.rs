//! Cached, precedence-merged alias resolution.
//!
//! Each scope's table is the built-in seeds overlaid with that scope's
//! learned entries (learned wins on key collision). Tables are cached per
//! scope for a fixed TTL; there is no cross-process invalidation, so another
//! process's writes become visible within one TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::alias::seed::SEED_ALIASES;
use crate::alias::store::{normalize_alias_key, AliasEntry, AliasSource, AliasStore};
use crate::error::{HearthError, HearthResult};

/// An alias that was applied during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAlias {
    pub alias_key: String,
    pub canonical_activity: String,
    pub source: AliasSource,
}

/// Result of resolving a text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasResolution {
    pub resolved_text: String,
    pub applied_aliases: Vec<AppliedAlias>,
}

/// Merged alias table for one scope.
#[derive(Debug)]
pub struct AliasTable {
    entries: HashMap<String, AliasEntry>,
    /// Keys ordered longest first so the longest alias wins at a position.
    ordered_keys: Vec<String>,
    /// Locates candidate positions; exact key selection happens per position.
    locator: Option<Regex>,
}

impl AliasTable {
    /// Merge seeds and learned entries; learned overrides seed.
    pub fn merge(scope_id: &str, seeds: &[(String, String)], learned: Vec<AliasEntry>) -> HearthResult<Self> {
        let mut entries: HashMap<String, AliasEntry> = seeds
            .iter()
            .map(|(key, canonical)| {
                let entry = AliasEntry::seed(scope_id, key, canonical);
                (entry.alias_key.clone(), entry)
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();

        for entry in learned {
            entries.insert(entry.alias_key.clone(), entry);
        }

        let mut ordered_keys: Vec<String> = entries.keys().cloned().collect();
        ordered_keys.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let locator = if ordered_keys.is_empty() {
            None
        } else {
            let pattern = ordered_keys
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| HearthError::Internal(format!("alias matcher: {}", e)))?,
            )
        };

        Ok(Self {
            entries,
            ordered_keys,
            locator,
        })
    }

    /// Look up an entry by normalized key.
    pub fn get(&self, key: &str) -> Option<&AliasEntry> {
        self.entries.get(key)
    }

    /// Number of merged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every whole-word alias occurrence with its canonical activity.
    ///
    /// When two matches overlap, the one reaching furthest into the text wins.
    pub fn resolve(&self, text: &str) -> AliasResolution {
        let Some(locator) = &self.locator else {
            return AliasResolution {
                resolved_text: text.to_string(),
                applied_aliases: Vec::new(),
            };
        };

        let mut resolved = String::with_capacity(text.len());
        let mut applied: Vec<AppliedAlias> = Vec::new();
        let mut copied_to = 0;
        let mut pos = 0;

        while let Some(candidate) = locator.find_at(text, pos) {
            let start = candidate.start();
            match self.match_at(text, start) {
                Some((end, entry)) => {
                    if let Some(inner) = self.overreaching_start(text, start, end) {
                        pos = inner;
                        continue;
                    }
                    resolved.push_str(&text[copied_to..start]);
                    resolved.push_str(&entry.canonical_activity);
                    copied_to = end;
                    pos = end;
                    if !applied.iter().any(|a| a.alias_key == entry.alias_key) {
                        applied.push(AppliedAlias {
                            alias_key: entry.alias_key.clone(),
                            canonical_activity: entry.canonical_activity.clone(),
                            source: entry.source,
                        });
                    }
                }
                None => {
                    pos = start + text[start..].chars().next().map_or(1, char::len_utf8);
                }
            }
            if pos >= text.len() {
                break;
            }
        }
        resolved.push_str(&text[copied_to..]);

        AliasResolution {
            resolved_text: resolved,
            applied_aliases: applied,
        }
    }

    /// First position inside `start..end` whose own match ends past `end`.
    fn overreaching_start(&self, text: &str, start: usize, end: usize) -> Option<usize> {
        text[start..end]
            .char_indices()
            .skip(1)
            .map(|(offset, _)| start + offset)
            .find(|&inner| {
                self.match_at(text, inner)
                    .is_some_and(|(inner_end, _)| inner_end > end)
            })
    }

    /// Longest key matching at `start` on word boundaries.
    fn match_at(&self, text: &str, start: usize) -> Option<(usize, &AliasEntry)> {
        if !boundary_before(text, start) {
            return None;
        }
        let rest = &text[start..];
        self.ordered_keys.iter().find_map(|key| {
            let len = prefix_len_ignore_case(rest, key)?;
            let end = start + len;
            if boundary_after(text, end) {
                self.entries.get(key).map(|entry| (end, entry))
            } else {
                None
            }
        })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn boundary_before(text: &str, index: usize) -> bool {
    text[..index].chars().next_back().map_or(true, |c| !is_word_char(c))
}

fn boundary_after(text: &str, index: usize) -> bool {
    text[index..].chars().next().map_or(true, |c| !is_word_char(c))
}

/// Byte length of the prefix of `haystack` equal to lowercase `needle`, ignoring case.
fn prefix_len_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let mut consumed = 0;
    let mut hay = haystack.chars();
    for expected in needle.chars() {
        let actual = hay.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        consumed += actual.len_utf8();
    }
    Some(consumed)
}

struct CachedTable {
    table: Arc<AliasTable>,
    fetched_at: Instant,
}

/// Resolves alias keys in text using a per-scope cache.
pub struct AliasResolver {
    store: Arc<AliasStore>,
    seeds: Vec<(String, String)>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedTable>>,
}

impl AliasResolver {
    /// Create a resolver with the built-in seed table.
    pub fn new(store: Arc<AliasStore>, ttl: Duration) -> Self {
        let seeds = SEED_ALIASES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::with_seeds(store, ttl, seeds)
    }

    /// Create a resolver with a custom seed table.
    pub fn with_seeds(store: Arc<AliasStore>, ttl: Duration, seeds: Vec<(String, String)>) -> Self {
        Self {
            store,
            seeds,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The merged table for a scope, refetched on miss or expiry.
    pub async fn table(&self, scope_id: &str) -> HearthResult<Arc<AliasTable>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(scope_id) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(cached.table.clone());
                }
            }
        }

        let learned = self.store.get_aliases_for_scope(scope_id).await?;
        let learned_count = learned.len();
        let table = Arc::new(AliasTable::merge(scope_id, &self.seeds, learned)?);
        debug!(
            scope_id,
            learned = learned_count,
            merged = table.len(),
            "Alias table refreshed"
        );

        self.cache.write().await.insert(
            scope_id.to_string(),
            CachedTable {
                table: table.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(table)
    }

    /// Resolve aliases in `text` for a scope.
    pub async fn resolve_aliases(&self, scope_id: &str, text: &str) -> HearthResult<AliasResolution> {
        Ok(self.table(scope_id).await?.resolve(text))
    }

    /// Look up the effective mapping of a single key.
    pub async fn lookup(&self, scope_id: &str, raw_key: &str) -> HearthResult<Option<AliasEntry>> {
        let key = normalize_alias_key(raw_key);
        Ok(self.table(scope_id).await?.get(&key).cloned())
    }

    /// Drop a scope's cached table so the next resolve refetches it.
    pub async fn invalidate(&self, scope_id: &str) {
        self.cache.write().await.remove(scope_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn seeds(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn table(pairs: &[(&str, &str)]) -> AliasTable {
        AliasTable::merge("kitchen", &seeds(pairs), Vec::new()).unwrap()
    }

    #[test]
    fn test_whole_word_only() {
        let table = table(&[("disk", "storage")]);
        let result = table.resolve("the diskette and the disks, not the disk.");
        assert_eq!(result.resolved_text, "the diskette and the disks, not the storage.");
        assert_eq!(result.applied_aliases.len(), 1);

        let untouched = table.resolve("a discussion about diskless boots");
        assert_eq!(untouched.resolved_text, "a discussion about diskless boots");
        assert!(untouched.applied_aliases.is_empty());
    }

    #[test]
    fn test_case_insensitive_and_multiple_keys() {
        let table = table(&[("dishes", "washing-up"), ("hoover", "vacuuming")]);
        let result = table.resolve("Did the DISHES then the Hoover, then more dishes");
        assert_eq!(
            result.resolved_text,
            "Did the washing-up then the vacuuming, then more washing-up"
        );
        let keys: Vec<_> = result.applied_aliases.iter().map(|a| a.alias_key.as_str()).collect();
        assert_eq!(keys, vec!["dishes", "hoover"]);
    }

    #[test]
    fn test_longest_key_wins() {
        let table = table(&[("washing", "laundry"), ("washing up", "washing-up")]);
        assert_eq!(table.resolve("done the washing up").resolved_text, "done the washing-up");
        assert_eq!(table.resolve("done the washing").resolved_text, "done the laundry");
    }

    #[test]
    fn test_overlapping_match_reaching_further_wins() {
        let table = table(&[("the washing", "laundry"), ("washing up", "washing-up")]);
        let result = table.resolve("did the washing up today");
        assert_eq!(result.resolved_text, "did the washing-up today");
        assert_eq!(result.applied_aliases.len(), 1);
        assert_eq!(result.applied_aliases[0].alias_key, "washing up");

        assert_eq!(table.resolve("did the washing today").resolved_text, "did laundry today");
    }

    #[test]
    fn test_builtin_seeds_read_washing_up_as_dishes() {
        let table = AliasTable::merge(
            "kitchen",
            &SEED_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(table.resolve("I did the washing up").resolved_text, "I did washing-up");
        assert_eq!(table.resolve("I did the washing").resolved_text, "I did laundry");
    }

    #[test]
    fn test_falls_back_to_shorter_key_at_same_position() {
        let table = table(&[("the bins", "bin-duty"), ("the", "THE")]);
        assert_eq!(table.resolve("the binsx").resolved_text, "THE binsx");
    }

    #[test]
    fn test_builtin_seeds_idempotent_on_canonical_text() {
        let table = AliasTable::merge(
            "kitchen",
            &SEED_ALIASES
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
            Vec::new(),
        )
        .unwrap();
        for text in [
            "I did the dishes and the washing",
            "hoovered the lounge, then the school run",
            "washing-up and laundry and bathroom-cleaning",
        ] {
            let once = table.resolve(text).resolved_text;
            let twice = table.resolve(&once).resolved_text;
            assert_eq!(once, twice, "not idempotent for {:?}", text);
        }
        assert!(table
            .resolve("washing-up and laundry")
            .applied_aliases
            .is_empty());
    }

    #[tokio::test]
    async fn test_learned_overrides_seed() {
        let store = Arc::new(AliasStore::new(Arc::new(MemoryStore::new()), 500));
        store.put_alias("kitchen", "pots", "cooking").await.unwrap();
        let resolver = AliasResolver::with_seeds(
            store.clone(),
            Duration::from_secs(300),
            seeds(&[("pots", "washing-up")]),
        );

        let result = resolver.resolve_aliases("kitchen", "pots").await.unwrap();
        assert_eq!(result.resolved_text, "cooking");
        assert_eq!(result.applied_aliases[0].source, AliasSource::Learned);

        let other = resolver.resolve_aliases("garden", "pots").await.unwrap();
        assert_eq!(other.resolved_text, "washing-up");
        assert_eq!(other.applied_aliases[0].source, AliasSource::Seed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_after_ttl() {
        let store = Arc::new(AliasStore::new(Arc::new(MemoryStore::new()), 500));
        let resolver = AliasResolver::with_seeds(store.clone(), Duration::from_secs(300), Vec::new());

        assert_eq!(
            resolver.resolve_aliases("kitchen", "pots").await.unwrap().resolved_text,
            "pots"
        );

        store.put_alias("kitchen", "pots", "washing-up").await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(
            resolver.resolve_aliases("kitchen", "pots").await.unwrap().resolved_text,
            "pots",
            "stale table served within TTL"
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            resolver.resolve_aliases("kitchen", "pots").await.unwrap().resolved_text,
            "washing-up"
        );
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(AliasStore::new(Arc::new(MemoryStore::new()), 500));
        let resolver = AliasResolver::with_seeds(store.clone(), Duration::from_secs(300), Vec::new());
        resolver.resolve_aliases("kitchen", "pots").await.unwrap();

        store.put_alias("kitchen", "pots", "washing-up").await.unwrap();
        resolver.invalidate("kitchen").await;
        let entry = resolver.lookup("kitchen", "Pots").await.unwrap().unwrap();
        assert_eq!(entry.canonical_activity, "washing-up");
    }
}

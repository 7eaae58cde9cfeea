//! Id-Set Fetcher
//!
//! Loads the full id set of a source in one listing call. The key spaces are
//! in the order of 10^5-10^6 ids (a few tens of MB once materialized), which
//! fits comfortably in memory, and a single listing followed by in-memory set
//! operations is an order of magnitude faster than paging through the remote
//! store (~20s vs ~3min for the registry). Sources must therefore support
//! returning their whole key space, optionally restricted to a key range, in
//! one call.

use crate::error::SourceError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Ids starting with this prefix are CouchDB design documents, never packages
pub const DESIGN_DOC_PREFIX: &str = "_design/";

/// Kind token of analysis records in the analysis store (`module!<id>`)
pub const ANALYSIS_KEY_KIND: &str = "module";

/// Separator of composite analysis store keys
pub const KEY_DELIMITER: char = '!';

/// Collation upper bound used to express "every key with this prefix"
const RANGE_END_SENTINEL: char = '\u{fff0}';

/// Unique package ids of one source
pub type IdSet = HashSet<String>;

/// Inclusive key range restriction for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start_key: String,
    pub end_key: String,
}

impl KeyRange {
    /// Every key starting with `prefix`
    pub fn prefix(prefix: &str) -> Self {
        Self {
            start_key: prefix.to_string(),
            end_key: format!("{}{}", prefix, RANGE_END_SENTINEL),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        key >= self.start_key.as_str() && key <= self.end_key.as_str()
    }
}

/// A store able to list its whole key space in one call
#[async_trait]
pub trait KeyListing: Send + Sync {
    /// All keys present at call time, restricted to `range` when given
    async fn list_keys(&self, range: Option<&KeyRange>) -> Result<Vec<String>, SourceError>;
}

/// Package ids that must never be enqueued, with the reason they are excluded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist(BTreeMap<String, String>);

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn reason(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for Denylist {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Denylist {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Fetch the ids of every package in the registry mirror
pub async fn fetch_registry_ids<S>(source: &S, denylist: &Denylist) -> Result<IdSet, SourceError>
where
    S: KeyListing + ?Sized,
{
    let keys = source.list_keys(None).await?;
    debug!(keys = keys.len(), "Listed registry keys");
    Ok(registry_ids(keys, denylist))
}

/// Fetch the ids of every package that has an analysis record
pub async fn fetch_analyzed_ids<S>(source: &S) -> Result<IdSet, SourceError>
where
    S: KeyListing + ?Sized,
{
    let range = KeyRange::prefix(&format!("{}{}", ANALYSIS_KEY_KIND, KEY_DELIMITER));
    let keys = source.list_keys(Some(&range)).await?;
    debug!(keys = keys.len(), "Listed analysis keys");
    Ok(analyzed_ids(keys))
}

/// Drop design documents and denylisted ids from raw registry keys
pub fn registry_ids(keys: Vec<String>, denylist: &Denylist) -> IdSet {
    keys.into_iter()
        .filter(|id| !id.starts_with(DESIGN_DOC_PREFIX) && !denylist.contains(id))
        .collect()
}

/// Extract package ids from composite `<kind>!<id>` analysis keys
pub fn analyzed_ids(keys: Vec<String>) -> IdSet {
    keys.iter()
        .filter_map(|key| {
            let id = key.split(KEY_DELIMITER).nth(1).filter(|id| !id.is_empty());
            if id.is_none() {
                debug!(key = %key, "Skipping analysis key without a package id");
            }
            id.map(str::to_string)
        })
        .collect()
}

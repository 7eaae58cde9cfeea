//! Set Reconciler
//!
//! Pure set difference between the registry and the analysis store.

use crate::fetcher::IdSet;
use std::collections::hash_set;
use std::collections::HashSet;

/// Ids present in the registry but absent from the analysis store
///
/// Read-only once computed; consumed by value by the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingSet {
    ids: HashSet<String>,
}

impl MissingSet {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, String> {
        self.ids.iter()
    }

    /// Ids in lexical order, for stable listings
    pub fn to_sorted_vec(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<String> for MissingSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MissingSet {
    type Item = String;
    type IntoIter = hash_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a MissingSet {
    type Item = &'a String;
    type IntoIter = hash_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// `registry \ analyzed`
///
/// Takes the registry set by value so the missing ids are moved rather than
/// cloned; the registry set is not needed after reconciliation.
pub fn reconcile(registry: IdSet, analyzed: &IdSet) -> MissingSet {
    registry
        .into_iter()
        .filter(|id| !analyzed.contains(id))
        .collect()
}

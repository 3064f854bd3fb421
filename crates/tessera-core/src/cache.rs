// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-module artifact cache

use crate::artifact::Artifact;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// Cached lookup outcome: the artifact, or a definitive absence
pub type CachedLookup = Option<Arc<Artifact>>;

/// Thread-safe publish-once cache keyed by artifact name
#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: DashMap<String, CachedLookup>,
}

/// Outcome of publishing into the cache
#[derive(Debug)]
pub(crate) struct Published {
    /// Value now held by the cache
    pub value: CachedLookup,
    /// Whether another writer got there first
    pub raced: bool,
}

impl ArtifactCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Cached outcome for `name`, if resolved before
    pub fn get(&self, name: &str) -> Option<CachedLookup> {
        self.entries.get(name).map(|entry| entry.clone())
    }

    /// Check if `name` has a cached outcome
    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Publish an outcome; the first writer wins and later values are dropped
    pub(crate) fn publish(&self, name: &str, value: CachedLookup) -> Published {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(existing) => Published {
                value: existing.get().clone(),
                raced: true,
            },
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                Published { value, raced: false }
            }
        }
    }

    /// Drop every cached outcome
    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    /// Get all cached names
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of cached names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ModuleIdentifier;
    use bytes::Bytes;

    fn artifact(root: &str) -> Arc<Artifact> {
        Arc::new(Artifact::new(
            "a.Foo",
            ModuleIdentifier::named("m"),
            root,
            Bytes::from_static(b"x"),
            None,
        ))
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = ArtifactCache::new();
        let first = cache.publish("a.Foo", Some(artifact("one")));
        assert!(!first.raced);

        let second = cache.publish("a.Foo", Some(artifact("two")));
        assert!(second.raced);
        assert_eq!(second.value.unwrap().root(), "one");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_absence_is_cached() {
        let cache = ArtifactCache::new();
        assert!(cache.get("missing").is_none());
        cache.publish("missing", None);
        assert!(cache.has("missing"));
        assert!(matches!(cache.get("missing"), Some(None)));
        cache.clear();
        assert!(cache.is_empty());
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module finders map identifiers to specifications

use crate::error::Result;
use crate::identifier::ModuleIdentifier;
use crate::spec::ModuleSpec;
use dashmap::DashMap;
use std::sync::Arc;

/// Source of module specifications.
///
/// `Ok(None)` means the finder does not know the module. Errors are reserved
/// for finders that could not look (I/O failure, malformed descriptor).
pub trait ModuleFinder: Send + Sync {
    /// Find the spec for `identifier`
    fn find_module(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>>;
}

impl<F: ModuleFinder + ?Sized> ModuleFinder for Arc<F> {
    fn find_module(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        (**self).find_module(identifier)
    }
}

/// Finder over specs registered in memory
#[derive(Debug, Default)]
pub struct MemoryFinder {
    specs: DashMap<ModuleIdentifier, ModuleSpec>,
}

impl MemoryFinder {
    /// Create an empty finder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec, replacing any previous one for the same identifier
    pub fn insert(&self, spec: ModuleSpec) {
        self.specs.insert(spec.identifier().clone(), spec);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(self, spec: ModuleSpec) -> Self {
        self.insert(spec);
        self
    }

    /// Forget a spec
    pub fn remove(&self, identifier: &ModuleIdentifier) -> Option<ModuleSpec> {
        self.specs.remove(identifier).map(|(_, spec)| spec)
    }

    /// Number of registered specs
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if no spec is registered
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl ModuleFinder for MemoryFinder {
    fn find_module(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        Ok(self.specs.get(identifier).map(|spec| spec.clone()))
    }
}

/// Finders consulted in order; the first one that knows a module wins
#[derive(Default)]
pub struct FinderChain {
    finders: Vec<Arc<dyn ModuleFinder>>,
}

impl FinderChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finder
    pub fn push(&mut self, finder: Arc<dyn ModuleFinder>) {
        self.finders.push(finder);
    }

    /// Builder-style [`push`](Self::push)
    pub fn with(mut self, finder: Arc<dyn ModuleFinder>) -> Self {
        self.push(finder);
        self
    }
}

impl ModuleFinder for FinderChain {
    fn find_module(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        for finder in &self.finders {
            if let Some(spec) = finder.find_module(identifier)? {
                return Ok(Some(spec));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for FinderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderChain")
            .field("finders", &self.finders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ModuleSpec {
        ModuleSpec::builder(ModuleIdentifier::named(name))
            .main_entry(format!("{name}.Main"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_memory_finder() {
        let finder = MemoryFinder::new().with(spec("a"));
        assert_eq!(finder.len(), 1);
        assert!(finder.find_module(&ModuleIdentifier::named("a")).unwrap().is_some());
        assert!(finder.find_module(&ModuleIdentifier::named("b")).unwrap().is_none());
    }

    #[test]
    fn test_chain_first_hit_wins() {
        let first = MemoryFinder::new().with(spec("a"));
        let second = MemoryFinder::new().with(
            ModuleSpec::builder(ModuleIdentifier::named("a"))
                .main_entry("other.Main")
                .build()
                .unwrap(),
        );
        let chain = FinderChain::new()
            .with(Arc::new(first))
            .with(Arc::new(second));

        let found = chain
            .find_module(&ModuleIdentifier::named("a"))
            .unwrap()
            .unwrap();
        assert_eq!(found.main_entry(), Some("a.Main"));
        assert!(chain.find_module(&ModuleIdentifier::named("z")).unwrap().is_none());
    }
}

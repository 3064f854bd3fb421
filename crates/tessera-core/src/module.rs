// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Live modules
//!
//! A [`Module`] is a wired node of the module graph. It answers artifact
//! lookups for itself (following its [`Precedence`]) and on behalf of its
//! importers (its exports plus any re-exported imports).
//!
//! Two caches back each module:
//!
//! - `definitions` holds artifacts defined from the module's own roots. An
//!   artifact is defined at most once per module.
//! - `lookups` holds the outcome of every `load_artifact` call, absence
//!   included, so repeated loads never touch a backend again.
//!
//! Backend failures are never cached; a later call retries the backend.

use crate::artifact::Artifact;
use crate::cache::{ArtifactCache, CachedLookup};
use crate::config::RegistryConfig;
use crate::diagnostics::{Diagnostics, ModuleEvent};
use crate::error::{ModuleError, Result};
use crate::identifier::ModuleIdentifier;
use crate::linkage::{Export, ImportStatus, Linkage, Wire, package_of};
use crate::loader::{ArtifactLoader, LoaderStats, Lookup};
use crate::resource::{PackageInfo, Resource, ResourceLoader};
use crate::spec::{Import, ModuleSpec, Precedence};
use crossbeam::channel::Sender;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Root a package was first defined from
#[derive(Debug, Clone)]
struct PackageOrigin {
    root: String,
    sealed: bool,
}

/// A defined, wired module
pub struct Module {
    identifier: ModuleIdentifier,
    imports: Vec<Import>,
    exports: Vec<Export>,
    roots: Vec<Arc<dyn ResourceLoader>>,
    main_entry: Option<String>,
    precedence: Precedence,
    default_timeout: Option<Duration>,
    linkage: RwLock<Linkage>,
    definitions: ArtifactCache,
    lookups: ArtifactCache,
    packages: DashMap<String, PackageOrigin>,
    loader: ArtifactLoader,
    diagnostics: Arc<Diagnostics>,
    evictions: Sender<ModuleIdentifier>,
}

impl Module {
    /// Build an unwired module from its spec
    pub(crate) fn new(
        spec: ModuleSpec,
        config: &RegistryConfig,
        diagnostics: Arc<Diagnostics>,
        evictions: Sender<ModuleIdentifier>,
    ) -> Arc<Self> {
        let ModuleSpec {
            identifier,
            imports,
            exports,
            roots,
            main_entry,
            precedence,
        } = spec;

        Arc::new_cyclic(|weak| Self {
            loader: ArtifactLoader::new(weak.clone(), identifier.clone(), config),
            identifier,
            imports,
            exports,
            roots,
            main_entry,
            precedence,
            default_timeout: config.default_timeout(),
            linkage: RwLock::new(Linkage::default()),
            definitions: ArtifactCache::new(),
            lookups: ArtifactCache::new(),
            packages: DashMap::new(),
            diagnostics,
            evictions,
        })
    }

    /// Module identifier
    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    /// Declared exports
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Declared imports with their resolution outcome
    pub fn imports(&self) -> Arc<[ImportStatus]> {
        Arc::clone(&self.linkage.read().imports)
    }

    /// Wires created for this module's imports, in declaration order
    pub fn wires(&self) -> Arc<[Wire]> {
        Arc::clone(&self.linkage.read().wires)
    }

    /// Local/imported search order
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Main entry point artifact name
    pub fn main_entry(&self) -> Option<&str> {
        self.main_entry.as_deref()
    }

    /// Names of the resource roots, in search order
    pub fn root_names(&self) -> Vec<&str> {
        self.roots.iter().map(|root| root.name()).collect()
    }

    /// Loader request counters
    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    /// Names with a cached `load_artifact` outcome
    pub fn cached_names(&self) -> Vec<String> {
        let mut names = self.lookups.keys();
        names.sort();
        names
    }

    /// Names defined from this module's own roots
    pub fn defined_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .definitions
            .keys()
            .into_iter()
            .filter(|name| matches!(self.definitions.get(name), Some(Some(_))))
            .collect();
        names.sort();
        names
    }

    /// Load an artifact visible to this module.
    ///
    /// Returns `Ok(None)` when no import and no local root has it. Both the
    /// artifact and its absence are cached.
    pub fn load_artifact(&self, name: &str) -> Result<Option<Arc<Artifact>>> {
        self.load_with(name, self.default_timeout)
    }

    /// Load an artifact, waiting at most `timeout` for a queued request
    pub fn load_artifact_timeout(&self, name: &str, timeout: Duration) -> Result<Option<Arc<Artifact>>> {
        self.load_with(name, Some(timeout))
    }

    /// Load an artifact that must exist
    pub fn require_artifact(&self, name: &str) -> Result<Arc<Artifact>> {
        self.load_artifact(name)?.ok_or_else(|| ModuleError::ArtifactNotFound {
            module: self.identifier.clone(),
            name: name.to_string(),
        })
    }

    /// Load the declared main entry artifact
    pub fn main_artifact(&self) -> Result<Arc<Artifact>> {
        let name = self
            .main_entry
            .as_deref()
            .ok_or_else(|| ModuleError::NoMainEntry(self.identifier.clone()))?;
        self.require_artifact(name)
    }

    /// Look up an artifact as an importer sees it: local definitions under
    /// the exports, then re-exported imports
    pub fn exported_artifact(&self, name: &str) -> Result<Option<Arc<Artifact>>> {
        self.exported_from(name, Vec::new())
    }

    /// Find a resource visible to this module, searched like artifacts
    pub fn resource(&self, path: &str) -> Result<Option<Resource>> {
        let path = path.trim_start_matches('/');
        match self.precedence {
            Precedence::ChildFirst => match self.local_resources(path, true)?.pop() {
                Some(resource) => Ok(Some(resource)),
                None => Ok(self.imported_resources(path, true)?.pop()),
            },
            Precedence::ParentFirst => match self.imported_resources(path, true)?.pop() {
                Some(resource) => Ok(Some(resource)),
                None => Ok(self.local_resources(path, true)?.pop()),
            },
        }
    }

    /// Every resource with this path visible to this module, in search order
    pub fn resources(&self, path: &str) -> Result<Vec<Resource>> {
        let path = path.trim_start_matches('/');
        let local = self.local_resources(path, false)?;
        let imported = self.imported_resources(path, false)?;
        Ok(match self.precedence {
            Precedence::ChildFirst => local.into_iter().chain(imported).collect(),
            Precedence::ParentFirst => imported.into_iter().chain(local).collect(),
        })
    }

    /// Look up a resource as an importer sees it
    pub fn exported_resource(&self, path: &str) -> Result<Option<Resource>> {
        self.exported_resource_from(path.trim_start_matches('/'), &mut Vec::new())
    }

    /// Package metadata from the first root that has it
    pub fn package_info(&self, package: &str) -> Result<Option<PackageInfo>> {
        for root in &self.roots {
            let info = root
                .package_info(package)
                .map_err(|source| self.backend_error(root.as_ref(), package, source))?;
            if info.is_some() {
                return Ok(info);
            }
        }
        Ok(None)
    }

    pub(crate) fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }

    pub(crate) fn declared_imports(&self) -> &[Import] {
        &self.imports
    }

    /// Replace wires and import status, dropping cached lookups made through
    /// the old wires
    pub(crate) fn install_linkage(&self, mut linkage: Linkage) {
        let mut current = self.linkage.write();
        linkage.generation = current.generation + 1;
        *current = linkage;
        self.lookups.clear();
    }

    fn load_with(&self, name: &str, timeout: Option<Duration>) -> Result<CachedLookup> {
        if let Some(hit) = self.lookups.get(name) {
            return Ok(hit);
        }
        self.loader.load(self, name, Lookup::Artifact, timeout)
    }

    pub(crate) fn exported_from(&self, name: &str, trail: Vec<ModuleIdentifier>) -> Result<CachedLookup> {
        if trail.contains(&self.identifier) {
            return Ok(None);
        }
        self.loader.load(self, name, Lookup::Exported(trail), None)
    }

    /// Run a lookup; called by the loader on whichever thread serves it
    pub(crate) fn resolve(&self, name: &str, lookup: Lookup) -> Result<CachedLookup> {
        match lookup {
            Lookup::Artifact => self.resolve_artifact(name),
            Lookup::Exported(trail) => self.resolve_exported(name, trail),
        }
    }

    fn resolve_artifact(&self, name: &str) -> Result<CachedLookup> {
        if let Some(hit) = self.lookups.get(name) {
            return Ok(hit);
        }

        loop {
            let generation = self.linkage.read().generation;
            let found = match self.precedence {
                Precedence::ChildFirst => match self.define_local(name)? {
                    Some(artifact) => Some(artifact),
                    None => self.find_imported(name)?,
                },
                Precedence::ParentFirst => match self.find_imported(name)? {
                    Some(artifact) => Some(artifact),
                    None => self.define_local(name)?,
                },
            };

            // Holding the read side keeps a relink from clearing the cache
            // between the check and the publish
            let linkage = self.linkage.read();
            if linkage.generation == generation {
                return Ok(self.publish(&self.lookups, name, found).0);
            }
            drop(linkage);
            trace!(module = %self.identifier, %name, "wires replaced during lookup, retrying");
        }
    }

    fn resolve_exported(&self, name: &str, mut trail: Vec<ModuleIdentifier>) -> Result<CachedLookup> {
        trail.push(self.identifier.clone());

        if self.exports.iter().any(|export| export.covers_artifact(name)) {
            if let Some(artifact) = self.define_local(name)? {
                return Ok(Some(artifact));
            }
        }

        let wires = self.wires();
        for wire in wires.iter().filter(|w| w.is_reexported() && w.supports_artifact(name)) {
            if let Some(artifact) = wire.exporter().exported_from(name, trail.clone())? {
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }

    fn find_imported(&self, name: &str) -> Result<CachedLookup> {
        let wires = self.wires();
        for wire in wires.iter().filter(|w| w.supports_artifact(name)) {
            if let Some(artifact) = wire.exporter().exported_from(name, Vec::new())? {
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }

    /// Define `name` from the first local root that has it
    fn define_local(&self, name: &str) -> Result<CachedLookup> {
        if let Some(hit) = self.definitions.get(name) {
            return Ok(hit);
        }

        for root in &self.roots {
            let bytes = root
                .artifact_bytes(name)
                .map_err(|source| self.backend_error(root.as_ref(), name, source))?;
            let Some(bytes) = bytes else {
                continue;
            };

            let package = self.package_for(root.as_ref(), name)?;
            let artifact = Arc::new(Artifact::new(
                name,
                self.identifier.clone(),
                root.name(),
                bytes,
                package,
            ));
            let (value, raced) = self.publish(&self.definitions, name, Some(artifact));
            if !raced {
                self.diagnostics.emit(ModuleEvent::ArtifactDefined {
                    module: self.identifier.clone(),
                    name: name.to_string(),
                    root: root.name().to_string(),
                });
            }
            return Ok(value);
        }

        trace!(module = %self.identifier, %name, "not in any local root");
        Ok(self.publish(&self.definitions, name, None).0)
    }

    /// Package metadata for a new definition, enforcing sealing
    fn package_for(&self, root: &dyn ResourceLoader, name: &str) -> Result<Option<Arc<PackageInfo>>> {
        let Some(package) = package_of(name) else {
            return Ok(None);
        };

        let info = root
            .package_info(package)
            .map_err(|source| self.backend_error(root, package, source))?;
        let sealed = info.as_ref().is_some_and(|info| info.sealed);

        let origin = self
            .packages
            .entry(package.to_string())
            .or_insert_with(|| PackageOrigin {
                root: root.name().to_string(),
                sealed,
            })
            .clone();

        if origin.root != root.name() && (origin.sealed || sealed) {
            return Err(ModuleError::SealingViolation {
                module: self.identifier.clone(),
                package: package.to_string(),
                sealed_root: origin.root,
                root: root.name().to_string(),
                name: name.to_string(),
            });
        }

        Ok(info.map(Arc::new))
    }

    fn publish(&self, cache: &ArtifactCache, name: &str, value: CachedLookup) -> (CachedLookup, bool) {
        let published = cache.publish(name, value);
        if published.raced {
            self.diagnostics.emit(ModuleEvent::ResolutionRace {
                module: self.identifier.clone(),
                name: name.to_string(),
            });
        }
        (published.value, published.raced)
    }

    fn local_resources(&self, path: &str, first_only: bool) -> Result<Vec<Resource>> {
        let mut found = Vec::new();
        for root in &self.roots {
            let resource = root
                .resource(path)
                .map_err(|source| self.backend_error(root.as_ref(), path, source))?;
            if let Some(resource) = resource {
                found.push(resource);
                if first_only {
                    break;
                }
            }
        }
        Ok(found)
    }

    fn imported_resources(&self, path: &str, first_only: bool) -> Result<Vec<Resource>> {
        let mut found = Vec::new();
        let mut searched = HashSet::new();
        let wires = self.wires();
        for wire in wires.iter().filter(|w| w.supports_resource(path)) {
            let exporter = wire.exporter();
            if !searched.insert(exporter.identifier().clone()) {
                continue;
            }
            if let Some(resource) = exporter.exported_resource_from(path, &mut Vec::new())? {
                found.push(resource);
                if first_only {
                    break;
                }
            }
        }
        Ok(found)
    }

    fn exported_resource_from(&self, path: &str, trail: &mut Vec<ModuleIdentifier>) -> Result<Option<Resource>> {
        if trail.contains(&self.identifier) {
            return Ok(None);
        }
        trail.push(self.identifier.clone());

        if self.exports.iter().any(|export| export.covers_resource(path)) {
            if let Some(resource) = self.local_resources(path, true)?.pop() {
                return Ok(Some(resource));
            }
        }

        let wires = self.wires();
        for wire in wires.iter().filter(|w| w.is_reexported() && w.supports_resource(path)) {
            if let Some(resource) = wire.exporter().exported_resource_from(path, trail)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }

    fn backend_error(&self, root: &dyn ResourceLoader, name: &str, source: std::io::Error) -> ModuleError {
        ModuleError::BackendIo {
            module: self.identifier.clone(),
            root: root.name().to_string(),
            name: name.to_string(),
            source,
        }
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        // The registry may already be gone
        let _ = self.evictions.send(self.identifier.clone());
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("identifier", &self.identifier)
            .field("precedence", &self.precedence)
            .field("mode", &self.loader.mode())
            .field("wires", &self.linkage.read().wires.len())
            .field("roots", &self.root_names())
            .finish()
    }
}

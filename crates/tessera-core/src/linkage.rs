// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Exports, wires and the per-module link state produced by resolution

use crate::error::{ModuleError, Result};
use crate::identifier::ModuleIdentifier;
use crate::module::Module;
use crate::spec::Import;
use glob::Pattern;
use std::fmt;
use std::sync::Arc;

/// Visibility surface a module offers to importers.
///
/// Patterns use glob syntax over dotted paths; `/` separators are treated as
/// `.`, so `org/example/*` and `org.example.*` are the same pattern.
#[derive(Clone, PartialEq, Eq)]
pub struct Export {
    pattern: String,
    matcher: Pattern,
}

impl Export {
    /// Compile an export pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let canonical = canonical_path(pattern);
        let matcher = Pattern::new(&canonical).map_err(|e| ModuleError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// Export matching every path
    pub fn all() -> Self {
        Self {
            pattern: "*".to_string(),
            matcher: Pattern::new("*").unwrap_or_default(),
        }
    }

    /// The pattern as written
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `path` falls under this export
    pub fn satisfies(&self, path: &str) -> bool {
        self.matcher.matches(&canonical_path(path))
    }

    /// Whether an artifact is covered, by its full name or its package
    pub fn covers_artifact(&self, name: &str) -> bool {
        self.satisfies(name) || package_of(name).is_some_and(|p| self.satisfies(p))
    }

    /// Whether a resource is covered, by its full path or its directory
    pub fn covers_resource(&self, path: &str) -> bool {
        self.satisfies(path) || directory_of(path).is_some_and(|d| self.satisfies(d))
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Export").field(&self.pattern).finish()
    }
}

/// Link between one module's import and an exporting module's export
#[derive(Clone)]
pub struct Wire {
    exporter: Arc<Module>,
    importer: ModuleIdentifier,
    export: Export,
    filter: Option<Export>,
    reexported: bool,
}

impl Wire {
    pub(crate) fn new(exporter: Arc<Module>, importer: ModuleIdentifier, export: Export, import: &Import) -> Self {
        Self {
            exporter,
            importer,
            export,
            filter: import.pattern().cloned(),
            reexported: import.is_reexported(),
        }
    }

    /// Module on the exporting end
    pub fn exporter(&self) -> &Arc<Module> {
        &self.exporter
    }

    /// Module on the importing end
    pub fn importer(&self) -> &ModuleIdentifier {
        &self.importer
    }

    /// Export this wire was created for
    pub fn export(&self) -> &Export {
        &self.export
    }

    /// Whether the importer re-exports what arrives over this wire
    pub fn is_reexported(&self) -> bool {
        self.reexported
    }

    /// Whether a package or path is visible through this wire
    pub fn supports_package(&self, path: &str) -> bool {
        self.export.satisfies(path) && self.filter.as_ref().is_none_or(|f| f.satisfies(path))
    }

    /// Whether an artifact name is visible through this wire
    pub fn supports_artifact(&self, name: &str) -> bool {
        self.export.covers_artifact(name) && self.filter.as_ref().is_none_or(|f| f.covers_artifact(name))
    }

    /// Whether a resource path is visible through this wire
    pub fn supports_resource(&self, path: &str) -> bool {
        self.export.covers_resource(path) && self.filter.as_ref().is_none_or(|f| f.covers_resource(path))
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wire")
            .field("exporter", self.exporter.identifier())
            .field("importer", &self.importer)
            .field("export", &self.export)
            .field("filter", &self.filter)
            .field("reexported", &self.reexported)
            .finish()
    }
}

/// Resolution outcome of one declared import
#[derive(Debug, Clone)]
pub struct ImportStatus {
    /// The declared import
    pub import: Import,
    /// Whether at least one wire satisfies it
    pub resolved: bool,
}

/// Wire list and import status of a module, swapped as a unit
#[derive(Debug, Clone, Default)]
pub(crate) struct Linkage {
    pub(crate) wires: Arc<[Wire]>,
    pub(crate) imports: Arc<[ImportStatus]>,
    /// Bumped by every install; lookups started under an older generation
    /// are not cached
    pub(crate) generation: u64,
}

impl Linkage {
    pub(crate) fn new(wires: Vec<Wire>, imports: Vec<ImportStatus>) -> Self {
        Self {
            wires: wires.into(),
            imports: imports.into(),
            generation: 0,
        }
    }
}

/// Package of a dotted artifact name (`a.b.Foo` -> `a.b`)
pub fn package_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(package, _)| package)
}

/// Directory of a resource path (`a/b/c.txt` -> `a/b`)
pub fn directory_of(path: &str) -> Option<&str> {
    path.trim_start_matches('/').rsplit_once('/').map(|(dir, _)| dir)
}

fn canonical_path(path: &str) -> String {
    path.trim_start_matches('/').replace('/', ".")
}

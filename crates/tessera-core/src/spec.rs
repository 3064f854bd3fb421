// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module specifications
//!
//! A [`ModuleSpec`] is the blueprint the registry turns into a live
//! [`Module`](crate::Module). Specs are produced by a
//! [`ModuleFinder`](crate::ModuleFinder) and consumed exactly once.

use crate::error::{ModuleError, Result};
use crate::identifier::ModuleIdentifier;
use crate::linkage::Export;
use crate::resource::ResourceLoader;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Search order used when a module loads a name for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precedence {
    /// Imports first, then local roots
    #[default]
    ParentFirst,
    /// Local roots first, then imports
    ChildFirst,
}

/// Declared dependency of a module on another module
#[derive(Debug, Clone)]
pub struct Import {
    target: ModuleIdentifier,
    pattern: Option<Export>,
    optional: bool,
    reexport: bool,
}

impl Import {
    /// Import the whole of `target`
    pub fn module(target: ModuleIdentifier) -> Self {
        Self {
            target,
            pattern: None,
            optional: false,
            reexport: false,
        }
    }

    /// Import the part of `target` matching `pattern`
    pub fn package(target: ModuleIdentifier, pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Some(Export::new(pattern)?),
            ..Self::module(target)
        })
    }

    /// Tolerate the target module being absent
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Re-export everything received through this import
    pub fn reexported(mut self) -> Self {
        self.reexport = true;
        self
    }

    /// Imported module
    pub fn target(&self) -> &ModuleIdentifier {
        &self.target
    }

    /// Package pattern, `None` for a whole-module import
    pub fn pattern(&self) -> Option<&Export> {
        self.pattern.as_ref()
    }

    /// Whether a missing target is tolerated
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether the importer re-exports this import
    pub fn is_reexported(&self) -> bool {
        self.reexport
    }
}

/// Blueprint of a module
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub(crate) identifier: ModuleIdentifier,
    pub(crate) imports: Vec<Import>,
    pub(crate) exports: Vec<Export>,
    pub(crate) roots: Vec<Arc<dyn ResourceLoader>>,
    pub(crate) main_entry: Option<String>,
    pub(crate) precedence: Precedence,
}

impl ModuleSpec {
    /// Start building a spec for `identifier`
    pub fn builder(identifier: ModuleIdentifier) -> ModuleSpecBuilder {
        ModuleSpecBuilder {
            identifier,
            imports: Vec::new(),
            exports: None,
            roots: Vec::new(),
            main_entry: None,
            precedence: Precedence::default(),
        }
    }

    /// Module identifier
    pub fn identifier(&self) -> &ModuleIdentifier {
        &self.identifier
    }

    /// Declared imports, in declaration order
    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Declared exports
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Resource roots, in search order
    pub fn roots(&self) -> &[Arc<dyn ResourceLoader>] {
        &self.roots
    }

    /// Main entry point artifact name
    pub fn main_entry(&self) -> Option<&str> {
        self.main_entry.as_deref()
    }

    /// Local/imported search order
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }
}

/// Builder for [`ModuleSpec`]
pub struct ModuleSpecBuilder {
    identifier: ModuleIdentifier,
    imports: Vec<Import>,
    exports: Option<Vec<String>>,
    roots: Vec<Arc<dyn ResourceLoader>>,
    main_entry: Option<String>,
    precedence: Precedence,
}

impl ModuleSpecBuilder {
    /// Add an import
    pub fn import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    /// Add an export pattern
    pub fn export(mut self, pattern: impl Into<String>) -> Self {
        self.exports.get_or_insert_with(Vec::new).push(pattern.into());
        self
    }

    /// Declare an empty export surface
    pub fn no_exports(mut self) -> Self {
        self.exports = Some(Vec::new());
        self
    }

    /// Add a resource root
    pub fn root(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.roots.push(loader);
        self
    }

    /// Set the main entry point
    pub fn main_entry(mut self, name: impl Into<String>) -> Self {
        self.main_entry = Some(name.into());
        self
    }

    /// Set the search order
    pub fn precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Search local roots before imports
    pub fn child_first(self) -> Self {
        self.precedence(Precedence::ChildFirst)
    }

    /// Validate and build the spec.
    ///
    /// Without any declared export the module exports everything.
    pub fn build(self) -> Result<ModuleSpec> {
        let exports = match self.exports {
            None => vec![Export::all()],
            Some(patterns) => patterns
                .iter()
                .map(|p| Export::new(p))
                .collect::<Result<Vec<_>>>()?,
        };

        let mut seen = HashSet::new();
        for root in &self.roots {
            if !seen.insert(root.name()) {
                return Err(ModuleError::invalid_spec(
                    &self.identifier,
                    format!("duplicate resource root '{}'", root.name()),
                ));
            }
        }

        Ok(ModuleSpec {
            identifier: self.identifier,
            imports: self.imports,
            exports,
            roots: self.roots,
            main_entry: self.main_entry,
            precedence: self.precedence,
        })
    }
}

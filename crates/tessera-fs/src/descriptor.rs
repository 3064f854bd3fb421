// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `module.toml` descriptors
//!
//! ```toml
//! [module]
//! group = "org.example"
//! artifact = "app"
//! version = "1.0"
//! main = "org.example.app.Main"
//! precedence = "child-first"
//! exports = ["org.example.app.*"]
//!
//! [[resources]]
//! name = "classes"
//! path = "classes"
//!
//! [[imports]]
//! module = "org.example:lib"
//! pattern = "org.example.lib.*"
//! optional = false
//! reexport = false
//! ```

use crate::directory::DirectoryResourceLoader;
use crate::error::{DescriptorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::{Import, ModuleIdentifier, ModuleSpec, Precedence};

/// Parsed `module.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Identity and surface of the module
    pub module: ModuleSection,
    /// Resource roots, in search order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceSection>,
    /// Imports, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportSection>,
}

/// `[module]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSection {
    /// Group, empty for a bare module name
    #[serde(default)]
    pub group: String,
    /// Artifact name
    pub artifact: String,
    /// Version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Main entry artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    /// Local/imported search order
    #[serde(default)]
    pub precedence: Precedence,
    /// Export patterns; absent means everything is exported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
}

/// `[[resources]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSection {
    /// Root name, unique within the module
    pub name: String,
    /// Directory, relative to the descriptor
    pub path: PathBuf,
    /// Artifact file extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// `[[imports]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSection {
    /// Imported module
    pub module: ModuleIdentifier,
    /// Package pattern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Whether the module may be missing
    #[serde(default)]
    pub optional: bool,
    /// Whether the import is re-exported
    #[serde(default)]
    pub reexport: bool,
}

impl ModuleDescriptor {
    /// Empty descriptor for `identifier`
    pub fn new(identifier: &ModuleIdentifier) -> Self {
        Self {
            module: ModuleSection {
                group: identifier.group().to_string(),
                artifact: identifier.artifact().to_string(),
                version: identifier.version().map(str::to_string),
                main: None,
                precedence: Precedence::default(),
                exports: None,
            },
            resources: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Read a descriptor from a file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse a descriptor; `path` is used for error messages only
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let descriptor: Self = toml::from_str(content).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if descriptor.module.artifact.trim().is_empty() {
            return Err(DescriptorError::Invalid {
                path: path.to_path_buf(),
                reason: "module artifact is empty".to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Write the descriptor to a file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Identifier the descriptor declares
    pub fn identifier(&self) -> ModuleIdentifier {
        ModuleIdentifier::new(
            &self.module.group,
            &self.module.artifact,
            self.module.version.as_deref(),
        )
    }

    /// Build the module spec; resource paths resolve against `base`
    pub fn to_spec(&self, base: &Path) -> Result<ModuleSpec> {
        let mut builder = ModuleSpec::builder(self.identifier()).precedence(self.module.precedence);

        if let Some(main) = &self.module.main {
            builder = builder.main_entry(main.clone());
        }

        match &self.module.exports {
            Some(exports) if exports.is_empty() => builder = builder.no_exports(),
            Some(exports) => {
                for export in exports {
                    builder = builder.export(export.clone());
                }
            }
            None => {}
        }

        for resource in &self.resources {
            let mut root = DirectoryResourceLoader::new(resource.name.clone(), base.join(&resource.path));
            if let Some(extension) = &resource.extension {
                root = root.with_extension(extension.clone());
            }
            builder = builder.root(Arc::new(root));
        }

        for section in &self.imports {
            let mut import = match &section.pattern {
                Some(pattern) => Import::package(section.module.clone(), pattern)?,
                None => Import::module(section.module.clone()),
            };
            if section.optional {
                import = import.optional();
            }
            if section.reexport {
                import = import.reexported();
            }
            builder = builder.import(import);
        }

        Ok(builder.build()?)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module repository on disk
//!
//! Descriptors live at
//! `<root>/<group with '.' as '/'>/<artifact>/<version or "main">/module.toml`.

use crate::descriptor::ModuleDescriptor;
use std::path::{Path, PathBuf};
use tessera_core::{ModuleError, ModuleFinder, ModuleIdentifier, ModuleSpec, Result};
use tracing::{debug, trace};

/// Descriptor file name
pub const DESCRIPTOR_FILE: &str = "module.toml";

/// Directory used for identifiers without a version
pub const UNVERSIONED_DIR: &str = "main";

/// [`ModuleFinder`] over a repository directory
#[derive(Debug, Clone)]
pub struct DirectoryFinder {
    root: PathBuf,
}

impl DirectoryFinder {
    /// Create a finder over `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the descriptor of `identifier`
    pub fn module_dir(&self, identifier: &ModuleIdentifier) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in identifier.group().split('.').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir.push(identifier.artifact());
        dir.push(identifier.version().unwrap_or(UNVERSIONED_DIR));
        dir
    }

    /// Descriptor path of `identifier`
    pub fn descriptor_path(&self, identifier: &ModuleIdentifier) -> PathBuf {
        self.module_dir(identifier).join(DESCRIPTOR_FILE)
    }

    /// Write `descriptor` into the repository, creating directories as needed
    pub fn install(&self, descriptor: &ModuleDescriptor) -> crate::Result<PathBuf> {
        let identifier = descriptor.identifier();
        let dir = self.module_dir(&identifier);
        std::fs::create_dir_all(&dir).map_err(|source| crate::DescriptorError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(DESCRIPTOR_FILE);
        descriptor.write(&path)?;
        debug!(module = %identifier, path = %path.display(), "descriptor installed");
        Ok(path)
    }
}

impl ModuleFinder for DirectoryFinder {
    fn find_module(&self, identifier: &ModuleIdentifier) -> Result<Option<ModuleSpec>> {
        let path = self.descriptor_path(identifier);
        if !path.is_file() {
            trace!(module = %identifier, path = %path.display(), "no descriptor");
            return Ok(None);
        }

        let descriptor = ModuleDescriptor::read(&path).map_err(|e| e.into_module_error(identifier))?;
        if descriptor.identifier() != *identifier {
            return Err(ModuleError::invalid_spec(
                identifier,
                format!(
                    "descriptor {} declares module '{}'",
                    path.display(),
                    descriptor.identifier()
                ),
            ));
        }

        let base = path.parent().unwrap_or(&self.root);
        let spec = descriptor
            .to_spec(base)
            .map_err(|e| e.into_module_error(identifier))?;
        debug!(module = %identifier, path = %path.display(), "descriptor loaded");
        Ok(Some(spec))
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loaded code artifacts

use crate::identifier::ModuleIdentifier;
use crate::resource::PackageInfo;
use bytes::Bytes;
use std::sync::Arc;

/// Code artifact defined by a module from one of its roots.
///
/// Each artifact is defined once by the module owning it; importers receive
/// the same `Arc`.
#[derive(Debug, Clone)]
pub struct Artifact {
    name: String,
    module: ModuleIdentifier,
    root: String,
    bytes: Bytes,
    package: Option<Arc<PackageInfo>>,
}

impl Artifact {
    pub(crate) fn new(
        name: &str,
        module: ModuleIdentifier,
        root: &str,
        bytes: Bytes,
        package: Option<Arc<PackageInfo>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            module,
            root: root.to_string(),
            bytes,
            package,
        }
    }

    /// Dotted artifact name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module that defined the artifact
    pub fn module(&self) -> &ModuleIdentifier {
        &self.module
    }

    /// Root the bytes came from
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Artifact contents
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Metadata of the artifact's package, when the root declares any
    pub fn package_info(&self) -> Option<&PackageInfo> {
        self.package.as_deref()
    }
}

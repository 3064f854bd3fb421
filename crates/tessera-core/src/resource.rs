// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resource roots
//!
//! A module's code and data live behind one or more [`ResourceLoader`]s, each
//! a named root. Every lookup is tri-state: `Ok(Some(_))` when found,
//! `Ok(None)` when definitively absent, `Err(_)` when the backend failed.
//! Only the first two outcomes may ever be cached by callers.

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::io;
use std::sync::Arc;

/// Backend for one named resource root of a module
pub trait ResourceLoader: Send + Sync + Debug {
    /// Root name, unique within a module
    fn name(&self) -> &str;

    /// Bytes of the code artifact `name` (dotted form, e.g. `a.b.Foo`)
    fn artifact_bytes(&self, name: &str) -> io::Result<Option<Bytes>>;

    /// Resource at `path` (slash form, e.g. `a/b/data.txt`)
    fn resource(&self, path: &str) -> io::Result<Option<Resource>>;

    /// Metadata for `package` (dotted form)
    fn package_info(&self, package: &str) -> io::Result<Option<PackageInfo>>;
}

/// Resource read from a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Path within the root
    pub path: String,
    /// Name of the root that supplied it
    pub root: String,
    /// Contents
    pub bytes: Bytes,
}

/// Package metadata supplied by a root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PackageInfo {
    /// Specification title
    pub spec_title: Option<String>,
    /// Specification version
    pub spec_version: Option<String>,
    /// Implementation title
    pub impl_title: Option<String>,
    /// Implementation version
    pub impl_version: Option<String>,
    /// Implementation vendor
    pub impl_vendor: Option<String>,
    /// Whether all of the package must come from one root
    pub sealed: bool,
}

/// In-memory resource root
#[derive(Debug)]
pub struct MemoryResourceLoader {
    name: String,
    artifacts: DashMap<String, Bytes>,
    resources: DashMap<String, Bytes>,
    packages: DashMap<String, PackageInfo>,
}

impl MemoryResourceLoader {
    /// Create an empty root
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifacts: DashMap::new(),
            resources: DashMap::new(),
            packages: DashMap::new(),
        }
    }

    /// Add a code artifact
    pub fn with_artifact(self, name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.artifacts.insert(name.into(), bytes.into());
        self
    }

    /// Add a resource
    pub fn with_resource(self, path: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let path = path.into();
        self.resources
            .insert(path.trim_start_matches('/').to_string(), bytes.into());
        self
    }

    /// Add package metadata
    pub fn with_package(self, package: impl Into<String>, info: PackageInfo) -> Self {
        self.packages.insert(package.into(), info);
        self
    }

    /// Wrap in an `Arc` for use as a spec root
    pub fn shared(self) -> Arc<dyn ResourceLoader> {
        Arc::new(self)
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_bytes(&self, name: &str) -> io::Result<Option<Bytes>> {
        Ok(self.artifacts.get(name).map(|entry| entry.clone()))
    }

    fn resource(&self, path: &str) -> io::Result<Option<Resource>> {
        let path = path.trim_start_matches('/');
        Ok(self.resources.get(path).map(|entry| Resource {
            path: path.to_string(),
            root: self.name.clone(),
            bytes: entry.clone(),
        }))
    }

    fn package_info(&self, package: &str) -> io::Result<Option<PackageInfo>> {
        Ok(self.packages.get(package).map(|entry| entry.clone()))
    }
}

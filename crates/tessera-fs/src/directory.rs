// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Directory-backed resource roots
//!
//! Artifact `a.b.Foo` is the file `a/b/Foo.<extension>` under the root,
//! resource `a/b/data.txt` is the file of that path, and the metadata of
//! package `a.b` lives in `a/b/package.toml`.

use bytes::Bytes;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tessera_core::{PackageInfo, Resource, ResourceLoader};
use tracing::trace;

/// Extension of artifact files when none is configured
pub const DEFAULT_EXTENSION: &str = "bin";

/// Name of the per-package metadata file
pub const PACKAGE_FILE: &str = "package.toml";

/// Resource root over a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryResourceLoader {
    name: String,
    base: PathBuf,
    extension: String,
}

impl DirectoryResourceLoader {
    /// Create a root named `name` over `base`
    pub fn new(name: impl Into<String>, base: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Set the artifact file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Directory this root reads from
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Artifact file extension
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File holding artifact `name`; `None` for names that cannot map to a
    /// file under the root
    pub fn artifact_path(&self, name: &str) -> Option<PathBuf> {
        let (package, simple) = match name.rsplit_once('.') {
            Some((package, simple)) => (Some(package), simple),
            None => (None, name),
        };
        if !is_plain_segment(simple) {
            return None;
        }

        let mut path = match package {
            Some(package) => self.join_segments(package.split('.'))?,
            None => self.base.clone(),
        };
        path.push(format!("{simple}.{}", self.extension));
        Some(path)
    }

    /// File holding resource `path`
    pub fn resource_path(&self, path: &str) -> Option<PathBuf> {
        self.join_segments(path.trim_start_matches('/').split('/'))
    }

    /// Metadata file of `package`
    pub fn package_path(&self, package: &str) -> Option<PathBuf> {
        let mut path = self.join_segments(package.split('.'))?;
        path.push(PACKAGE_FILE);
        Some(path)
    }

    fn join_segments<'a>(&self, segments: impl Iterator<Item = &'a str>) -> Option<PathBuf> {
        let mut path = self.base.clone();
        for segment in segments {
            if !is_plain_segment(segment) {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\'])
}

/// Read a file, mapping "not there" to `None`
fn read_optional(path: &Path) -> io::Result<Option<Bytes>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(Bytes::from(bytes))),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl ResourceLoader for DirectoryResourceLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_bytes(&self, name: &str) -> io::Result<Option<Bytes>> {
        let Some(path) = self.artifact_path(name) else {
            return Ok(None);
        };
        trace!(root = %self.name, path = %path.display(), "reading artifact");
        read_optional(&path)
    }

    fn resource(&self, path: &str) -> io::Result<Option<Resource>> {
        let Some(file) = self.resource_path(path) else {
            return Ok(None);
        };
        Ok(read_optional(&file)?.map(|bytes| Resource {
            path: path.trim_start_matches('/').to_string(),
            root: self.name.clone(),
            bytes,
        }))
    }

    fn package_info(&self, package: &str) -> io::Result<Option<PackageInfo>> {
        let Some(path) = self.package_path(package) else {
            return Ok(None);
        };
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };

        let text = std::str::from_utf8(&bytes).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        toml::from_str(text)
            .map(Some)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }
}

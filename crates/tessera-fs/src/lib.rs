// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tessera-fs
//!
//! Filesystem backends for `tessera-core`:
//!
//! - [`DirectoryResourceLoader`] serves artifacts, resources and package
//!   metadata from a directory tree
//! - [`DirectoryFinder`] finds module specs in a repository of
//!   `module.toml` descriptors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod descriptor;
pub mod directory;
pub mod error;
pub mod finder;

// Re-exports
pub use descriptor::{ImportSection, ModuleDescriptor, ModuleSection, ResourceSection};
pub use directory::{DEFAULT_EXTENSION, DirectoryResourceLoader, PACKAGE_FILE};
pub use error::{DescriptorError, Result};
pub use finder::{DESCRIPTOR_FILE, DirectoryFinder, UNVERSIONED_DIR};

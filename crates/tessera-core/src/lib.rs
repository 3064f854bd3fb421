// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tessera-core
//!
//! A thread-safe module runtime: named modules with declared imports and
//! exports, wired into a graph and loading artifacts (named byte blobs)
//! through per-module loaders.
//!
//! - [`ModuleRegistry`] defines each module once, on demand, from a
//!   [`ModuleFinder`], and evicts it when the last handle is dropped
//! - [`Module`] answers artifact and resource lookups through its wires and
//!   its own [`ResourceLoader`] roots, caching every outcome
//! - Loaders serialize lookups per module on a dedicated worker thread
//!   without deadlocking on self-imports or mutually importing modules
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_core::{
//!     Import, MemoryFinder, MemoryResourceLoader, ModuleIdentifier, ModuleRegistry, ModuleSpec,
//! };
//!
//! # fn main() -> tessera_core::Result<()> {
//! let lib = ModuleIdentifier::named("lib");
//! let app = ModuleIdentifier::named("app");
//!
//! let finder = MemoryFinder::new()
//!     .with(
//!         ModuleSpec::builder(lib.clone())
//!             .export("lib.api")
//!             .root(MemoryResourceLoader::new("lib-classes").with_artifact("lib.api.Greeter", "hi").shared())
//!             .build()?,
//!     )
//!     .with(ModuleSpec::builder(app.clone()).import(Import::module(lib)).build()?);
//!
//! let registry = ModuleRegistry::new(Arc::new(finder));
//! let module = registry.load_module(&app)?;
//! let greeter = module.require_artifact("lib.api.Greeter")?;
//! assert_eq!(greeter.root(), "lib-classes");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod finder;
pub mod identifier;
pub mod linkage;
mod loader;
pub mod module;
pub mod registry;
pub mod resource;
pub mod spec;

// Re-exports
pub use artifact::Artifact;
pub use cache::{ArtifactCache, CachedLookup};
pub use config::{CyclePolicy, LoaderMode, RegistryConfig};
pub use diagnostics::{ChannelSink, Diagnostics, DiagnosticsSink, DiagnosticsSnapshot, ModuleEvent};
pub use error::{ModuleError, Result};
pub use finder::{FinderChain, MemoryFinder, ModuleFinder};
pub use identifier::ModuleIdentifier;
pub use linkage::{Export, ImportStatus, Wire, directory_of, package_of};
pub use loader::LoaderStats;
pub use module::Module;
pub use registry::ModuleRegistry;
pub use resource::{MemoryResourceLoader, PackageInfo, Resource, ResourceLoader};
pub use spec::{Import, ModuleSpec, ModuleSpecBuilder, Precedence};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Diagnostic events
//!
//! The runtime reports definitions, races and failures as [`ModuleEvent`]s.
//! Every event is counted and logged through `tracing`; attached
//! [`DiagnosticsSink`]s receive it as well. Running without sinks is normal.

use crate::identifier::ModuleIdentifier;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Discrete event emitted by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    /// A module was defined and wired
    ModuleDefined {
        /// Module identifier
        module: ModuleIdentifier,
        /// Number of wires created
        wires: usize,
    },
    /// A module defined an artifact from one of its roots
    ArtifactDefined {
        /// Defining module
        module: ModuleIdentifier,
        /// Artifact name
        name: String,
        /// Root the bytes came from
        root: String,
    },
    /// Two loads of the same name raced; the later result was discarded
    ResolutionRace {
        /// Module whose cache was contended
        module: ModuleIdentifier,
        /// Artifact name
        name: String,
    },
    /// A module definition failed
    ResolutionFailed {
        /// Module being defined
        module: ModuleIdentifier,
        /// Error message
        reason: String,
    },
    /// A module was dropped and removed from the registry table
    ModuleEvicted {
        /// Module identifier
        module: ModuleIdentifier,
    },
}

/// Receiver of diagnostic events.
///
/// Called synchronously on the emitting thread, so implementations must not
/// block.
pub trait DiagnosticsSink: Send + Sync {
    /// Handle one event
    fn record(&self, event: &ModuleEvent);
}

/// Sink forwarding events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<ModuleEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, Receiver<ModuleEvent>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }
}

impl DiagnosticsSink for ChannelSink {
    fn record(&self, event: &ModuleEvent) {
        // A dropped receiver just means nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}

/// Point-in-time event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Modules defined
    pub modules_defined: u64,
    /// Artifacts defined
    pub artifacts_defined: u64,
    /// Resolution races observed
    pub resolution_races: u64,
    /// Failed module definitions
    pub resolution_failures: u64,
    /// Modules evicted from the registry
    pub modules_evicted: u64,
}

/// Event hub shared by a registry and its modules
#[derive(Default)]
pub struct Diagnostics {
    sinks: RwLock<Vec<Arc<dyn DiagnosticsSink>>>,
    modules_defined: AtomicU64,
    artifacts_defined: AtomicU64,
    resolution_races: AtomicU64,
    resolution_failures: AtomicU64,
    modules_evicted: AtomicU64,
}

impl Diagnostics {
    /// Create a hub with no sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink
    pub fn attach(&self, sink: Arc<dyn DiagnosticsSink>) {
        self.sinks.write().push(sink);
    }

    /// Attach a [`ChannelSink`] and return its receiver
    pub fn subscribe(&self) -> Receiver<ModuleEvent> {
        let (sink, rx) = ChannelSink::new();
        self.attach(Arc::new(sink));
        rx
    }

    /// Count, log and dispatch an event
    pub fn emit(&self, event: ModuleEvent) {
        match &event {
            ModuleEvent::ModuleDefined { module, wires } => {
                self.modules_defined.fetch_add(1, Ordering::Relaxed);
                debug!(%module, wires, "module defined");
            }
            ModuleEvent::ArtifactDefined { module, name, root } => {
                self.artifacts_defined.fetch_add(1, Ordering::Relaxed);
                trace!(%module, %name, %root, "artifact defined");
            }
            ModuleEvent::ResolutionRace { module, name } => {
                self.resolution_races.fetch_add(1, Ordering::Relaxed);
                debug!(%module, %name, "duplicate first load discarded");
            }
            ModuleEvent::ResolutionFailed { module, reason } => {
                self.resolution_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%module, %reason, "module resolution failed");
            }
            ModuleEvent::ModuleEvicted { module } => {
                self.modules_evicted.fetch_add(1, Ordering::Relaxed);
                debug!(%module, "module evicted");
            }
        }

        for sink in self.sinks.read().iter() {
            sink.record(&event);
        }
    }

    /// Current event counts
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            modules_defined: self.modules_defined.load(Ordering::Relaxed),
            artifacts_defined: self.artifacts_defined.load(Ordering::Relaxed),
            resolution_races: self.resolution_races.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
            modules_evicted: self.modules_evicted.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sinks", &self.sinks.read().len())
            .field("counts", &self.snapshot())
            .finish()
    }
}

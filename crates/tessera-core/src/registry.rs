// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry
//!
//! The registry owns the identifier -> module table and defines modules on
//! demand from its [`ModuleFinder`]. The table holds weak references only: a
//! module lives as long as someone holds an `Arc<Module>` to it (a caller or
//! an importer's wire) and is evicted once the last one is dropped.
//!
//! Definitions run inside a single re-entrant definition section. Loading a
//! module defines its imports recursively on the same thread; everything
//! defined during the outermost load is published to the table together once
//! that load returns. A failed definition is never published, and neither is
//! any module wired to it through an import cycle; dependencies that resolved
//! on their own are published regardless.

use crate::config::{CyclePolicy, RegistryConfig};
use crate::diagnostics::{Diagnostics, ModuleEvent};
use crate::error::{ModuleError, Result};
use crate::finder::ModuleFinder;
use crate::identifier::ModuleIdentifier;
use crate::linkage::{ImportStatus, Linkage, Wire};
use crate::module::Module;
use crate::spec::ModuleSpec;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Modules being defined by the thread inside the definition section
#[derive(Default)]
struct DefinitionSession {
    /// Definitions underway, outermost first
    in_progress: Vec<Arc<Module>>,
    /// Finished definitions awaiting publication
    completed: Vec<Arc<Module>>,
}

impl DefinitionSession {
    fn find(&self, identifier: &ModuleIdentifier) -> Option<&Arc<Module>> {
        self.completed
            .iter()
            .chain(self.in_progress.iter())
            .find(|module| module.identifier() == identifier)
    }
}

/// Registry of live modules.
///
/// Wires hold their exporter strongly, so modules that import each other
/// keep each other alive after every outside handle is gone. Such cycles are
/// only released by [`unload`](Self::unload)ing one of their members.
pub struct ModuleRegistry {
    finder: Arc<dyn ModuleFinder>,
    config: RegistryConfig,
    diagnostics: Arc<Diagnostics>,
    table: Mutex<HashMap<ModuleIdentifier, Weak<Module>>>,
    session: ReentrantMutex<RefCell<DefinitionSession>>,
    evictions: Sender<ModuleIdentifier>,
    evicted: Receiver<ModuleIdentifier>,
}

impl ModuleRegistry {
    /// Create a registry with the default configuration
    pub fn new(finder: Arc<dyn ModuleFinder>) -> Self {
        Self::with_config(finder, RegistryConfig::default())
    }

    /// Create a registry
    pub fn with_config(finder: Arc<dyn ModuleFinder>, config: RegistryConfig) -> Self {
        let (evictions, evicted) = channel::unbounded();
        Self {
            finder,
            config,
            diagnostics: Arc::new(Diagnostics::new()),
            table: Mutex::new(HashMap::new()),
            session: ReentrantMutex::new(RefCell::new(DefinitionSession::default())),
            evictions,
            evicted,
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Event hub shared with every module of this registry
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Get the live module for `identifier`, defining it and its imports if
    /// needed.
    ///
    /// Concurrent callers asking for the same identifier all receive the same
    /// module; it is defined once.
    pub fn load_module(&self, identifier: &ModuleIdentifier) -> Result<Arc<Module>> {
        self.reap();
        if let Some(module) = self.live(identifier) {
            return Ok(module);
        }

        let session = self.session.lock();
        if let Some(module) = self.in_session(&session, identifier)? {
            return Ok(module);
        }
        // Another thread may have published it while we waited
        if let Some(module) = self.live(identifier) {
            return Ok(module);
        }

        trace!(module = %identifier, "finding module");
        let spec = self
            .finder
            .find_module(identifier)?
            .ok_or_else(|| ModuleError::ModuleNotFound(identifier.clone()))?;
        if spec.identifier() != identifier {
            return Err(ModuleError::invalid_spec(
                identifier,
                format!("finder returned the spec of '{}'", spec.identifier()),
            ));
        }

        self.define_in(&session, spec)
    }

    /// Define a module directly from a spec, bypassing the finder.
    ///
    /// Its imports are still loaded through the finder.
    pub fn define_module(&self, spec: ModuleSpec) -> Result<Arc<Module>> {
        self.reap();
        let session = self.session.lock();
        self.define_in(&session, spec)
    }

    /// Get the live module for `identifier` without defining anything
    pub fn get_if_loaded(&self, identifier: &ModuleIdentifier) -> Option<Arc<Module>> {
        self.reap();
        self.live(identifier)
    }

    /// Identifiers of every live module, sorted
    pub fn loaded_modules(&self) -> Vec<ModuleIdentifier> {
        self.reap();
        let mut loaded: Vec<_> = self
            .table
            .lock()
            .iter()
            .filter(|(_, module)| module.strong_count() > 0)
            .map(|(identifier, _)| identifier.clone())
            .collect();
        loaded.sort();
        loaded
    }

    /// Rebuild a module's wires against the modules live now.
    ///
    /// Cached lookups of the module are dropped; artifacts it already defined
    /// are kept. On failure the old wires stay in place.
    pub fn relink(&self, module: &Arc<Module>) -> Result<()> {
        self.reap();
        let session = self.session.lock();

        let linked = self.link(module);
        if let Ok(linkage) = &linked {
            debug!(module = %module.identifier(), wires = linkage.wires.len(), "module relinked");
        }
        // Modules defined along the way are sound even when relinking fails
        let result = linked.map(|linkage| module.install_linkage(linkage));
        self.finish(&session);
        result
    }

    /// Remove a module from the table and cut its wires.
    ///
    /// Holders of the module keep a usable handle; the next `load_module`
    /// for the identifier defines a fresh module. Returns whether a live
    /// module was removed.
    pub fn unload(&self, identifier: &ModuleIdentifier) -> bool {
        self.reap();
        let removed = self
            .table
            .lock()
            .remove(identifier)
            .and_then(|module| module.upgrade());

        match removed {
            Some(module) => {
                module.install_linkage(Linkage::default());
                debug!(module = %identifier, "module unloaded");
                true
            }
            None => false,
        }
    }

    fn live(&self, identifier: &ModuleIdentifier) -> Option<Arc<Module>> {
        self.table.lock().get(identifier).and_then(Weak::upgrade)
    }

    /// Module already being defined in this session, subject to the cycle
    /// policy for unfinished ones
    fn in_session(
        &self,
        session: &RefCell<DefinitionSession>,
        identifier: &ModuleIdentifier,
    ) -> Result<Option<Arc<Module>>> {
        let session = session.borrow();
        if let Some(module) = session.completed.iter().find(|m| m.identifier() == identifier) {
            return Ok(Some(Arc::clone(module)));
        }

        let Some(position) = session
            .in_progress
            .iter()
            .position(|m| m.identifier() == identifier)
        else {
            return Ok(None);
        };

        match self.config.cycle_policy {
            CyclePolicy::Tolerate => {
                debug!(module = %identifier, "import cycle, handing out module under definition");
                Ok(Some(Arc::clone(&session.in_progress[position])))
            }
            CyclePolicy::FailFast => {
                let mut path: Vec<_> = session.in_progress[position..]
                    .iter()
                    .map(|m| m.identifier().clone())
                    .collect();
                path.push(identifier.clone());
                Err(ModuleError::CircularDependency(path))
            }
        }
    }

    fn define_in(&self, session: &RefCell<DefinitionSession>, spec: ModuleSpec) -> Result<Arc<Module>> {
        let identifier = spec.identifier().clone();
        if self.live(&identifier).is_some() || session.borrow().find(&identifier).is_some() {
            return Err(ModuleError::ModuleAlreadyExists(identifier));
        }

        let module = Module::new(
            spec,
            &self.config,
            Arc::clone(&self.diagnostics),
            self.evictions.clone(),
        );
        let mark = {
            let mut session = session.borrow_mut();
            session.in_progress.push(Arc::clone(&module));
            session.completed.len()
        };

        let linked = self.link(&module);

        let mut state = session.borrow_mut();
        state.in_progress.retain(|m| !Arc::ptr_eq(m, &module));
        match linked {
            Ok(linkage) => {
                let wires = linkage.wires.len();
                module.install_linkage(linkage);
                state.completed.push(Arc::clone(&module));
                drop(state);

                self.diagnostics.emit(ModuleEvent::ModuleDefined {
                    module: identifier,
                    wires,
                });
                self.finish(session);
                Ok(module)
            }
            Err(err) => {
                // Dependencies that finished cleanly stay; only those wired
                // back into the failed module go down with it
                let completed = state.completed.split_off(mark);
                let (survivors, dependents) = split_dependents(&module, completed);
                state.completed.extend(survivors);
                drop(state);

                module.install_linkage(Linkage::default());
                for stale in &dependents {
                    stale.install_linkage(Linkage::default());
                }

                self.diagnostics.emit(ModuleEvent::ResolutionFailed {
                    module: identifier.clone(),
                    reason: err.to_string(),
                });
                for stale in &dependents {
                    self.diagnostics.emit(ModuleEvent::ResolutionFailed {
                        module: stale.identifier().clone(),
                        reason: format!("imports '{identifier}', which failed to resolve"),
                    });
                }

                self.finish(session);
                Err(err)
            }
        }
    }

    /// Resolve every declared import of `module` into wires
    fn link(&self, module: &Arc<Module>) -> Result<Linkage> {
        let mut wires = Vec::new();
        let mut statuses = Vec::new();

        for import in module.declared_imports() {
            let target = import.target();
            let exporter = match self.load_module(target) {
                Ok(exporter) => Some(exporter),
                Err(ModuleError::ModuleNotFound(missing)) if import.is_optional() => {
                    debug!(module = %module.identifier(), %missing, "skipping missing optional import");
                    None
                }
                Err(ModuleError::ModuleNotFound(missing)) => {
                    return Err(ModuleError::resolution_failed(
                        module.identifier(),
                        format!("required module '{missing}' not found"),
                    ));
                }
                Err(err) => return Err(err),
            };

            let before = wires.len();
            if let Some(exporter) = exporter {
                for export in exporter.exports() {
                    if import.pattern().is_none_or(|p| export.satisfies(p.pattern())) {
                        wires.push(Wire::new(
                            Arc::clone(&exporter),
                            module.identifier().clone(),
                            export.clone(),
                            import,
                        ));
                    }
                }
            }

            let resolved = wires.len() > before;
            if !resolved && !import.is_optional() {
                let pattern = import.pattern().map_or("*", |p| p.pattern());
                return Err(ModuleError::resolution_failed(
                    module.identifier(),
                    format!("no export of '{target}' satisfies import '{pattern}'"),
                ));
            }
            statuses.push(ImportStatus {
                import: import.clone(),
                resolved,
            });
        }

        Ok(Linkage::new(wires, statuses))
    }

    /// Publish the session's definitions once the outermost one is done
    fn finish(&self, session: &RefCell<DefinitionSession>) {
        let completed = {
            let mut session = session.borrow_mut();
            if !session.in_progress.is_empty() {
                return;
            }
            std::mem::take(&mut session.completed)
        };

        let mut table = self.table.lock();
        for module in &completed {
            table.insert(module.identifier().clone(), Arc::downgrade(module));
        }
    }

    /// Drop table entries of modules that no longer exist
    fn reap(&self) {
        let dropped: Vec<_> = self.evicted.try_iter().collect();
        if dropped.is_empty() {
            return;
        }

        let evicted: Vec<_> = {
            let mut table = self.table.lock();
            dropped
                .into_iter()
                .filter(|identifier| {
                    let dead = table
                        .get(identifier)
                        .is_some_and(|module| module.strong_count() == 0);
                    if dead {
                        table.remove(identifier);
                    }
                    dead
                })
                .collect()
        };

        for module in evicted {
            self.diagnostics.emit(ModuleEvent::ModuleEvicted { module });
        }
    }
}

/// Split `completed` into modules independent of `failed` and modules whose
/// wires lead to it, directly or through other such modules
fn split_dependents(failed: &Arc<Module>, completed: Vec<Arc<Module>>) -> (Vec<Arc<Module>>, Vec<Arc<Module>>) {
    let mut tainted = vec![Arc::clone(failed)];
    let mut survivors = completed;

    loop {
        let (reaching, rest): (Vec<_>, Vec<_>) = survivors.into_iter().partition(|module| {
            module
                .wires()
                .iter()
                .any(|wire| tainted.iter().any(|t| Arc::ptr_eq(wire.exporter(), t)))
        });
        survivors = rest;
        if reaching.is_empty() {
            break;
        }
        tainted.extend(reaching);
    }

    tainted.remove(0);
    (survivors, tainted)
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("config", &self.config)
            .field("modules", &self.table.lock().len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

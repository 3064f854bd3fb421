// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Artifact loader protocol
//!
//! In [`LoaderMode::Serialized`] every module owns a dedicated worker thread
//! that serves lookups one at a time, in the order they were queued. Callers
//! enqueue a [`LoadRequest`] and block on a one-shot reply channel.
//!
//! Two situations would deadlock a naive queue and are handled here:
//!
//! - A worker asking its own loader (a module importing itself, or a lookup
//!   coming back around an import cycle) resolves directly on the worker.
//! - A worker waiting on another module's worker keeps serving its own queue
//!   while it waits, so two workers asking each other always make progress.
//!
//! In [`LoaderMode::Parallel`] lookups run on the calling thread and only the
//! publish-once caches order concurrent loads.

use crate::cache::CachedLookup;
use crate::config::{LoaderMode, RegistryConfig};
use crate::error::{ModuleError, Result};
use crate::identifier::ModuleIdentifier;
use crate::module::Module;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Set on loader worker threads only
    static WORKER: RefCell<Option<Rc<WorkerContext>>> = const { RefCell::new(None) };
}

/// What a queued request asks the module for
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    /// A name the module needs for itself, searched by its precedence
    Artifact,
    /// A name an importer needs; carries the modules already searched
    Exported(Vec<ModuleIdentifier>),
}

/// One queued lookup
pub(crate) struct LoadRequest {
    name: String,
    lookup: Lookup,
    reply: Sender<Result<CachedLookup>>,
}

/// Counters describing how a loader's requests were served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Requests queued for the worker
    pub queued: u64,
    /// Requests the worker served
    pub served: u64,
    /// Requests resolved directly because the worker asked itself
    pub reentrant: u64,
    /// Requests served while the worker was waiting on another loader
    pub helped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    served: AtomicU64,
    reentrant: AtomicU64,
    helped: AtomicU64,
}

/// State a worker thread keeps about the loader it serves
struct WorkerContext {
    loader_id: u64,
    module: Weak<Module>,
    requests: Receiver<LoadRequest>,
}

impl WorkerContext {
    fn serve(&self, request: LoadRequest, nested: bool) {
        let LoadRequest {
            name,
            lookup,
            reply,
        } = request;

        // The requester holds the module alive until it has its reply, so a
        // dead module means nobody is waiting any more
        let Some(module) = self.module.upgrade() else {
            return;
        };

        let loader = module.loader();
        loader.counters.served.fetch_add(1, Ordering::Relaxed);
        if nested {
            loader.counters.helped.fetch_add(1, Ordering::Relaxed);
        }

        let outcome = {
            let _serving = loader.lock.lock();
            trace!(module = %module.identifier(), %name, nested, "serving load request");
            panic::catch_unwind(AssertUnwindSafe(|| module.resolve(&name, lookup))).unwrap_or_else(
                |_| {
                    error!(module = %module.identifier(), %name, "loader worker panicked");
                    Err(ModuleError::WorkerPanicked {
                        module: module.identifier().clone(),
                        name: name.clone(),
                    })
                },
            )
        };

        // Release our handle before replying so the requester may hold the last one
        drop(module);
        // The requester may have timed out and gone away
        let _ = reply.send(outcome);
    }
}

fn run_worker(context: WorkerContext) {
    let context = Rc::new(context);
    WORKER.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&context)));
    debug!(loader = context.loader_id, "loader worker started");

    while let Ok(request) = context.requests.recv() {
        context.serve(request, false);
    }

    WORKER.with(|slot| slot.borrow_mut().take());
    debug!(loader = context.loader_id, "loader worker stopped");
}

fn current_worker() -> Option<Rc<WorkerContext>> {
    WORKER.with(|slot| slot.borrow().clone())
}

/// Per-module loader
pub(crate) struct ArtifactLoader {
    id: u64,
    mode: LoaderMode,
    module: Weak<Module>,
    module_id: ModuleIdentifier,
    worker_name: String,
    lock: ReentrantMutex<()>,
    queue: Mutex<Option<Sender<LoadRequest>>>,
    counters: Counters,
}

impl ArtifactLoader {
    pub(crate) fn new(module: Weak<Module>, module_id: ModuleIdentifier, config: &RegistryConfig) -> Self {
        Self {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            mode: config.loader_mode,
            module,
            worker_name: format!("{}-{}", config.worker_name_prefix, module_id),
            module_id,
            lock: ReentrantMutex::new(()),
            queue: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    /// Resolve `name` through this loader's protocol
    pub(crate) fn load(
        &self,
        module: &Module,
        name: &str,
        lookup: Lookup,
        timeout: Option<Duration>,
    ) -> Result<CachedLookup> {
        if self.mode == LoaderMode::Parallel {
            return module.resolve(name, lookup);
        }

        if current_worker().is_some_and(|worker| worker.loader_id == self.id) {
            self.counters.reentrant.fetch_add(1, Ordering::Relaxed);
            return module.resolve(name, lookup);
        }

        let requests = self.requests()?;
        let (reply, outcome) = channel::bounded(1);
        requests
            .send(LoadRequest {
                name: name.to_string(),
                lookup,
                reply,
            })
            .map_err(|_| ModuleError::LoaderClosed(self.module_id.clone()))?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);

        self.await_reply(name, &outcome, timeout)
    }

    /// Block until the reply arrives, serving our own queue meanwhile if the
    /// caller is itself a loader worker
    fn await_reply(
        &self,
        name: &str,
        outcome: &Receiver<Result<CachedLookup>>,
        timeout: Option<Duration>,
    ) -> Result<CachedLookup> {
        let timer = match timeout {
            Some(timeout) => channel::after(timeout),
            None => channel::never(),
        };
        let helper = current_worker();
        let idle = channel::never::<LoadRequest>();
        let mut helping = helper.is_some();

        loop {
            let own_requests = match helper.as_ref() {
                Some(worker) if helping => &worker.requests,
                _ => &idle,
            };
            crossbeam::channel::select! {
                recv(outcome) -> reply => {
                    return reply.unwrap_or_else(|_| Err(ModuleError::LoaderClosed(self.module_id.clone())));
                }
                recv(own_requests) -> request => match (request, helper.as_ref()) {
                    (Ok(request), Some(worker)) => worker.serve(request, true),
                    _ => helping = false,
                },
                recv(timer) -> _ => {
                    return Err(ModuleError::Timeout {
                        module: self.module_id.clone(),
                        name: name.to_string(),
                        timeout: timeout.unwrap_or_default(),
                    });
                }
            }
        }
    }

    /// Sender for the worker queue, spawning the worker on first use
    fn requests(&self) -> Result<Sender<LoadRequest>> {
        let mut queue = self.queue.lock();
        if let Some(sender) = queue.as_ref() {
            return Ok(sender.clone());
        }

        let (sender, receiver) = channel::unbounded();
        let context = WorkerContext {
            loader_id: self.id,
            module: self.module.clone(),
            requests: receiver,
        };
        thread::Builder::new()
            .name(self.worker_name.clone())
            .spawn(move || run_worker(context))
            .map_err(|source| ModuleError::WorkerSpawn {
                module: self.module_id.clone(),
                source,
            })?;

        *queue = Some(sender.clone());
        Ok(sender)
    }

    pub(crate) fn stats(&self) -> LoaderStats {
        LoaderStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            served: self.counters.served.load(Ordering::Relaxed),
            reentrant: self.counters.reentrant.load(Ordering::Relaxed),
            helped: self.counters.helped.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn mode(&self) -> LoaderMode {
        self.mode
    }
}

impl std::fmt::Debug for ArtifactLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactLoader")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("worker", &self.queue.lock().is_some())
            .field("stats", &self.stats())
            .finish()
    }
}

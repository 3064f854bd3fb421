//! Shared fixtures for tessera-core integration tests

#![allow(dead_code)]

use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tessera_core::{
    MemoryFinder, ModuleIdentifier, ModuleRegistry, PackageInfo, RegistryConfig, Resource, ResourceLoader,
};

/// Identifier with an empty group
pub fn id(name: &str) -> ModuleIdentifier {
    ModuleIdentifier::named(name)
}

/// Registry over a memory finder with the default configuration
pub fn registry(finder: MemoryFinder) -> ModuleRegistry {
    ModuleRegistry::new(Arc::new(finder))
}

/// Registry over a memory finder
pub fn registry_with(finder: MemoryFinder, config: RegistryConfig) -> ModuleRegistry {
    ModuleRegistry::with_config(Arc::new(finder), config)
}

/// Resource root that counts backend reads and can misbehave on demand
#[derive(Debug, Default)]
pub struct ScriptedLoader {
    name: String,
    artifacts: HashMap<String, Bytes>,
    reads: AtomicUsize,
    failures: AtomicUsize,
    delay: Option<Duration>,
    panic_on: Option<String>,
}

impl ScriptedLoader {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, name: &str, bytes: &'static [u8]) -> Self {
        self.artifacts.insert(name.to_string(), Bytes::from_static(bytes));
        self
    }

    /// Fail the next `count` artifact reads with an I/O error
    pub fn failing(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep before every artifact read
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic when `name` is read
    pub fn panicking_on(mut self, name: &str) -> Self {
        self.panic_on = Some(name.to_string());
        self
    }

    /// Wrap for use as a spec root
    pub fn into_shared(self) -> Arc<dyn ResourceLoader> {
        Arc::new(self)
    }

    /// Artifact reads so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ResourceLoader for ScriptedLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_bytes(&self, name: &str) -> io::Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        if self.panic_on.as_deref() == Some(name) {
            panic!("scripted panic reading {name}");
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::other("scripted failure"));
        }
        Ok(self.artifacts.get(name).cloned())
    }

    fn resource(&self, _path: &str) -> io::Result<Option<Resource>> {
        Ok(None)
    }

    fn package_info(&self, _package: &str) -> io::Result<Option<PackageInfo>> {
        Ok(None)
    }
}

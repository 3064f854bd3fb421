//! Artifact lookup and loader protocol integration tests

mod common;

use common::{ScriptedLoader, id, registry, registry_with};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tessera_core::{
    Import, LoaderMode, MemoryFinder, MemoryResourceLoader, ModuleError, ModuleEvent, ModuleFinder,
    ModuleRegistry, ModuleSpec, PackageInfo, Precedence, RegistryConfig, ResourceLoader,
};

#[test]
fn test_lookup_cached_without_backend_reread() {
    let root = Arc::new(ScriptedLoader::new("classes").with_artifact("app.Main", b"main"));
    let spec = ModuleSpec::builder(id("app"))
        .root(Arc::clone(&root) as Arc<dyn ResourceLoader>)
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    let first = app.load_artifact("app.Main").unwrap().unwrap();
    let second = app.load_artifact("app.Main").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.bytes().as_ref(), b"main");
    assert_eq!(first.module(), &id("app"));

    assert!(app.load_artifact("app.Missing").unwrap().is_none());
    assert!(app.load_artifact("app.Missing").unwrap().is_none());
    assert_eq!(root.reads(), 2);
    assert_eq!(app.cached_names(), vec!["app.Main".to_string(), "app.Missing".to_string()]);
    assert_eq!(app.defined_names(), vec!["app.Main".to_string()]);
}

fn shadowing_pair(precedence: Precedence) -> MemoryFinder {
    let lib = ModuleSpec::builder(id("lib"))
        .root(MemoryResourceLoader::new("lib-root").with_artifact("shared.Thing", "lib").shared())
        .build()
        .unwrap();
    let app = ModuleSpec::builder(id("app"))
        .import(Import::module(id("lib")))
        .root(MemoryResourceLoader::new("app-root").with_artifact("shared.Thing", "app").shared())
        .precedence(precedence)
        .build()
        .unwrap();
    MemoryFinder::new().with(lib).with(app)
}

#[test]
fn test_parent_first_prefers_imports() {
    let registry = registry(shadowing_pair(Precedence::ParentFirst));
    let app = registry.load_module(&id("app")).unwrap();
    let thing = app.require_artifact("shared.Thing").unwrap();
    assert_eq!(thing.root(), "lib-root");
    assert_eq!(thing.module(), &id("lib"));
}

#[test]
fn test_child_first_prefers_local_roots() {
    let registry = registry(shadowing_pair(Precedence::ChildFirst));
    let app = registry.load_module(&id("app")).unwrap();
    let thing = app.require_artifact("shared.Thing").unwrap();
    assert_eq!(thing.root(), "app-root");
    assert_eq!(thing.module(), &id("app"));
}

#[test]
fn test_exports_hide_internal_packages() {
    let lib = ModuleSpec::builder(id("lib"))
        .export("lib.api")
        .root(
            MemoryResourceLoader::new("lib-root")
                .with_artifact("lib.api.Service", "api")
                .with_artifact("lib.internal.Helper", "internal")
                .shared(),
        )
        .build()
        .unwrap();
    let app = ModuleSpec::builder(id("app"))
        .import(Import::module(id("lib")))
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(lib).with(app));

    let app = registry.load_module(&id("app")).unwrap();
    assert!(app.load_artifact("lib.api.Service").unwrap().is_some());
    assert!(app.load_artifact("lib.internal.Helper").unwrap().is_none());

    let lib = registry.load_module(&id("lib")).unwrap();
    assert!(lib.load_artifact("lib.internal.Helper").unwrap().is_some());
    assert!(lib.exported_artifact("lib.internal.Helper").unwrap().is_none());
}

#[test]
fn test_reexported_imports_are_visible_downstream() {
    let base = ModuleSpec::builder(id("base"))
        .root(MemoryResourceLoader::new("base-root").with_artifact("base.Thing", "base").shared())
        .build()
        .unwrap();
    let open = ModuleSpec::builder(id("open"))
        .import(Import::module(id("base")).reexported())
        .build()
        .unwrap();
    let closed = ModuleSpec::builder(id("closed"))
        .import(Import::module(id("base")))
        .build()
        .unwrap();
    let via_open = ModuleSpec::builder(id("via-open"))
        .import(Import::module(id("open")))
        .build()
        .unwrap();
    let via_closed = ModuleSpec::builder(id("via-closed"))
        .import(Import::module(id("closed")))
        .build()
        .unwrap();
    let registry = registry(
        MemoryFinder::new()
            .with(base)
            .with(open)
            .with(closed)
            .with(via_open)
            .with(via_closed),
    );

    let via_open = registry.load_module(&id("via-open")).unwrap();
    assert_eq!(via_open.require_artifact("base.Thing").unwrap().module(), &id("base"));

    let via_closed = registry.load_module(&id("via-closed")).unwrap();
    assert!(via_closed.load_artifact("base.Thing").unwrap().is_none());
}

#[test]
fn test_backend_failure_not_cached() {
    let spec = ModuleSpec::builder(id("app"))
        .root(
            ScriptedLoader::new("flaky")
                .with_artifact("app.Main", b"main")
                .failing(1)
                .into_shared(),
        )
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    let err = app.load_artifact("app.Main").unwrap_err();
    assert!(matches!(err, ModuleError::BackendIo { ref root, .. } if root == "flaky"));
    assert!(err.is_retryable());
    assert!(app.cached_names().is_empty());

    assert!(app.load_artifact("app.Main").unwrap().is_some());
}

#[test]
fn test_bounded_wait_times_out() {
    let spec = ModuleSpec::builder(id("app"))
        .root(
            ScriptedLoader::new("slow")
                .with_artifact("app.Main", b"main")
                .slow(Duration::from_millis(300))
                .into_shared(),
        )
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    let err = app
        .load_artifact_timeout("app.Main", Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, ModuleError::Timeout { .. }));

    // The abandoned request still completes and is cached for later callers
    assert!(app.load_artifact("app.Main").unwrap().is_some());
}

#[test]
fn test_concurrent_first_loads_share_one_artifact() {
    let root = Arc::new(
        ScriptedLoader::new("classes")
            .with_artifact("app.Main", b"main")
            .slow(Duration::from_millis(10)),
    );
    let spec = ModuleSpec::builder(id("app"))
        .root(Arc::clone(&root) as Arc<dyn ResourceLoader>)
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = Arc::clone(&app);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                app.require_artifact("app.Main").unwrap()
            })
        })
        .collect();
    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for artifact in &artifacts[1..] {
        assert!(Arc::ptr_eq(&artifacts[0], artifact));
    }
    assert_eq!(root.reads(), 1);
    assert_eq!(registry.diagnostics().snapshot().resolution_races, 0);
}

#[test]
fn test_parallel_mode_publishes_first_definition() {
    let config = RegistryConfig {
        loader_mode: LoaderMode::Parallel,
        ..RegistryConfig::default()
    };
    let spec = ModuleSpec::builder(id("app"))
        .root(
            ScriptedLoader::new("classes")
                .with_artifact("app.Main", b"main")
                .slow(Duration::from_millis(20))
                .into_shared(),
        )
        .build()
        .unwrap();
    let registry = registry_with(MemoryFinder::new().with(spec), config);
    let app = registry.load_module(&id("app")).unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let app = Arc::clone(&app);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                app.require_artifact("app.Main").unwrap()
            })
        })
        .collect();
    let artifacts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for artifact in &artifacts[1..] {
        assert!(Arc::ptr_eq(&artifacts[0], artifact));
    }
    assert_eq!(registry.diagnostics().snapshot().artifacts_defined, 1);
    assert_eq!(app.loader_stats().queued, 0);
}

#[test]
fn test_self_import_resolves_on_own_worker() {
    let spec = ModuleSpec::builder(id("solo"))
        .import(Import::module(id("solo")))
        .root(MemoryResourceLoader::new("classes").with_artifact("solo.Main", "main").shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let solo = registry.load_module(&id("solo")).unwrap();

    assert!(solo.load_artifact("solo.Main").unwrap().is_some());
    let stats = solo.loader_stats();
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.served, 1);
    assert_eq!(stats.reentrant, 1);
}

#[test]
fn test_symmetric_cross_module_loads_do_not_deadlock() {
    const ROUNDS: usize = 50;
    let names: Vec<(String, String)> = (0..ROUNDS)
        .map(|i| (format!("x.A{i}"), format!("y.B{i}")))
        .collect();

    let x_root = names
        .iter()
        .fold(MemoryResourceLoader::new("x-root"), |root, (x, _)| root.with_artifact(x.clone(), "x"));
    let y_root = names
        .iter()
        .fold(MemoryResourceLoader::new("y-root"), |root, (_, y)| root.with_artifact(y.clone(), "y"));
    let x = ModuleSpec::builder(id("x"))
        .import(Import::module(id("y")))
        .root(x_root.shared())
        .build()
        .unwrap();
    let y = ModuleSpec::builder(id("y"))
        .import(Import::module(id("x")))
        .root(y_root.shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(x).with(y));
    let x = registry.load_module(&id("x")).unwrap();
    let y = registry.load_module(&id("y")).unwrap();

    for (x_name, y_name) in names {
        let barrier = Arc::new(Barrier::new(2));
        let from_x = {
            let (x, barrier) = (Arc::clone(&x), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                x.load_artifact_timeout(&y_name, Duration::from_secs(5))
            })
        };
        let from_y = {
            let (y, barrier) = (Arc::clone(&y), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                y.load_artifact_timeout(&x_name, Duration::from_secs(5))
            })
        };

        assert_eq!(from_x.join().unwrap().unwrap().unwrap().root(), "y-root");
        assert_eq!(from_y.join().unwrap().unwrap().unwrap().root(), "x-root");
    }
}

#[test]
fn test_sealed_package_refuses_second_root() {
    let sealed = PackageInfo {
        sealed: true,
        impl_title: Some("core".into()),
        ..PackageInfo::default()
    };
    let spec = ModuleSpec::builder(id("app"))
        .root(
            MemoryResourceLoader::new("first")
                .with_artifact("p.A", "a")
                .with_package("p", sealed)
                .shared(),
        )
        .root(MemoryResourceLoader::new("second").with_artifact("p.B", "b").shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    let a = app.require_artifact("p.A").unwrap();
    assert_eq!(a.package_info().and_then(|p| p.impl_title.as_deref()), Some("core"));
    assert!(matches!(
        app.load_artifact("p.B"),
        Err(ModuleError::SealingViolation { ref sealed_root, ref root, .. })
            if sealed_root == "first" && root == "second"
    ));
}

#[test]
fn test_unsealed_package_spans_roots() {
    let spec = ModuleSpec::builder(id("app"))
        .root(MemoryResourceLoader::new("first").with_artifact("p.A", "a").shared())
        .root(MemoryResourceLoader::new("second").with_artifact("p.B", "b").shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    assert_eq!(app.require_artifact("p.A").unwrap().root(), "first");
    assert_eq!(app.require_artifact("p.B").unwrap().root(), "second");
}

#[test]
fn test_main_entry() {
    let with_main = ModuleSpec::builder(id("app"))
        .main_entry("app.Main")
        .root(MemoryResourceLoader::new("classes").with_artifact("app.Main", "main").shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(with_main).with(ModuleSpec::builder(id("lib")).build().unwrap()));

    let app = registry.load_module(&id("app")).unwrap();
    assert_eq!(app.main_artifact().unwrap().name(), "app.Main");
    assert!(matches!(
        app.require_artifact("app.Other"),
        Err(ModuleError::ArtifactNotFound { .. })
    ));

    let lib = registry.load_module(&id("lib")).unwrap();
    assert!(matches!(lib.main_artifact(), Err(ModuleError::NoMainEntry(_))));
}

#[test]
fn test_resources_follow_precedence() {
    let lib = ModuleSpec::builder(id("lib"))
        .export("lib")
        .root(MemoryResourceLoader::new("lib-root").with_resource("lib/data.txt", "lib").shared())
        .build()
        .unwrap();
    let app = ModuleSpec::builder(id("app"))
        .import(Import::module(id("lib")))
        .root(MemoryResourceLoader::new("app-root").with_resource("/lib/data.txt", "app").shared())
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(lib).with(app));
    let app = registry.load_module(&id("app")).unwrap();

    assert_eq!(app.resource("lib/data.txt").unwrap().unwrap().root, "lib-root");
    let all: Vec<_> = app
        .resources("/lib/data.txt")
        .unwrap()
        .into_iter()
        .map(|r| r.root)
        .collect();
    assert_eq!(all, vec!["lib-root".to_string(), "app-root".to_string()]);
    assert!(app.resource("other/data.txt").unwrap().is_none());
}

#[test]
fn test_worker_survives_panicking_backend() {
    let spec = ModuleSpec::builder(id("app"))
        .root(
            ScriptedLoader::new("classes")
                .with_artifact("app.Main", b"main")
                .panicking_on("app.Boom")
                .into_shared(),
        )
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(spec));
    let app = registry.load_module(&id("app")).unwrap();

    assert!(matches!(
        app.load_artifact("app.Boom"),
        Err(ModuleError::WorkerPanicked { .. })
    ));
    assert!(app.load_artifact("app.Main").unwrap().is_some());
}

#[test]
fn test_parallel_race_is_reported() {
    let config = RegistryConfig {
        loader_mode: LoaderMode::Parallel,
        ..RegistryConfig::default()
    };
    let spec = ModuleSpec::builder(id("app"))
        .root(
            ScriptedLoader::new("classes")
                .with_artifact("app.Main", b"main")
                .slow(Duration::from_millis(50))
                .into_shared(),
        )
        .build()
        .unwrap();
    let registry = registry_with(MemoryFinder::new().with(spec), config);
    let events = registry.diagnostics().subscribe();
    let app = registry.load_module(&id("app")).unwrap();
    let barrier = Barrier::new(4);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                barrier.wait();
                app.require_artifact("app.Main").unwrap()
            });
        }
    });

    assert!(registry.diagnostics().snapshot().resolution_races >= 1);
    assert!(events.try_iter().any(|event| event
        == ModuleEvent::ResolutionRace {
            module: id("app"),
            name: "app.Main".to_string(),
        }));
}

#[test]
fn test_relink_during_lookup_does_not_cache_stale_absence() {
    let finder = Arc::new(
        MemoryFinder::new().with(
            ModuleSpec::builder(id("app"))
                .import(Import::module(id("plugin")).optional())
                .root(ScriptedLoader::new("app-root").slow(Duration::from_millis(300)).into_shared())
                .build()
                .unwrap(),
        ),
    );
    let registry = ModuleRegistry::new(Arc::clone(&finder) as Arc<dyn ModuleFinder>);
    let app = registry.load_module(&id("app")).unwrap();

    thread::scope(|scope| {
        let lookup = scope.spawn(|| app.load_artifact("plugin.Hook"));

        thread::sleep(Duration::from_millis(100));
        finder.insert(
            ModuleSpec::builder(id("plugin"))
                .root(MemoryResourceLoader::new("plugin-root").with_artifact("plugin.Hook", "hook").shared())
                .build()
                .unwrap(),
        );
        registry.relink(&app).unwrap();

        assert!(lookup.join().unwrap().is_ok());
    });

    assert!(app.imports()[0].resolved);
    let hook = app.load_artifact("plugin.Hook").unwrap().unwrap();
    assert_eq!(hook.root(), "plugin-root");
}

#[test]
fn test_reexport_cycle_terminates() {
    let a = ModuleSpec::builder(id("a"))
        .import(Import::module(id("b")).reexported())
        .build()
        .unwrap();
    let b = ModuleSpec::builder(id("b"))
        .import(Import::module(id("a")).reexported())
        .root(MemoryResourceLoader::new("b-root").with_artifact("b.Thing", "b").shared())
        .build()
        .unwrap();
    let c = ModuleSpec::builder(id("c"))
        .import(Import::module(id("a")))
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(a).with(b).with(c));
    let c = registry.load_module(&id("c")).unwrap();

    let missing = c.load_artifact_timeout("nowhere.Thing", Duration::from_secs(5));
    assert!(matches!(missing, Ok(None)));
    assert_eq!(c.require_artifact("b.Thing").unwrap().root(), "b-root");

    registry.unload(&id("a"));
}

#[test]
fn test_reexported_resources_respect_exports() {
    let lib = ModuleSpec::builder(id("lib"))
        .export("lib")
        .root(
            MemoryResourceLoader::new("lib-root")
                .with_resource("lib/data.txt", "data")
                .with_resource("hidden/secret.txt", "secret")
                .shared(),
        )
        .build()
        .unwrap();
    let mid = ModuleSpec::builder(id("mid"))
        .import(Import::module(id("lib")).reexported())
        .build()
        .unwrap();
    let app = ModuleSpec::builder(id("app"))
        .import(Import::module(id("mid")))
        .build()
        .unwrap();
    let registry = registry(MemoryFinder::new().with(lib).with(mid).with(app));
    let app = registry.load_module(&id("app")).unwrap();
    let mid = registry.load_module(&id("mid")).unwrap();

    assert_eq!(mid.exported_resource("lib/data.txt").unwrap().unwrap().root, "lib-root");
    assert_eq!(app.resource("/lib/data.txt").unwrap().unwrap().bytes.as_ref(), b"data");

    assert!(mid.exported_resource("hidden/secret.txt").unwrap().is_none());
    assert!(app.resource("hidden/secret.txt").unwrap().is_none());
    let lib = registry.load_module(&id("lib")).unwrap();
    assert!(lib.resource("hidden/secret.txt").unwrap().is_some());
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Terminal rendering of modules, artifacts and resources

use owo_colors::OwoColorize;
use std::fmt;
use std::sync::Arc;
use tessera_core::{Artifact, Module, Resource, Result};

/// Imports, their status and the resulting wires of a module
pub struct ModuleSummary<'a>(pub &'a Module);

impl fmt::Display for ModuleSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.0;
        writeln!(f, "{} {}", "module".bold(), module.identifier().cyan())?;
        writeln!(f, "  precedence: {:?}", module.precedence())?;
        if let Some(main) = module.main_entry() {
            writeln!(f, "  main: {main}")?;
        }

        let exports: Vec<_> = module.exports().iter().map(|e| e.pattern()).collect();
        if exports.is_empty() {
            writeln!(f, "  exports: (none)")?;
        } else {
            writeln!(f, "  exports: {}", exports.join(", "))?;
        }
        writeln!(f, "  roots: {}", module.root_names().join(", "))?;

        let imports = module.imports();
        if !imports.is_empty() {
            writeln!(f, "  {}", "imports".bold())?;
        }
        for status in imports.iter() {
            let import = &status.import;
            write!(f, "    {} {} ", import.target(), import.pattern().map_or("*", |p| p.pattern()))?;
            if status.resolved {
                write!(f, "[{}]", "resolved".green())?;
            } else {
                write!(f, "[{}]", "unresolved".yellow())?;
            }
            let mut flags = Vec::new();
            if import.is_optional() {
                flags.push("optional");
            }
            if import.is_reexported() {
                flags.push("reexport");
            }
            if flags.is_empty() {
                writeln!(f)?;
            } else {
                writeln!(f, " ({})", flags.join(", "))?;
            }
        }

        let wires = module.wires();
        if !wires.is_empty() {
            writeln!(f, "  {}", "wires".bold())?;
        }
        for wire in wires.iter() {
            writeln!(
                f,
                "    -> {} via export {}",
                wire.exporter().identifier(),
                wire.export().pattern()
            )?;
        }
        Ok(())
    }
}

/// One line per artifact lookup
pub fn artifact_line(name: &str, result: &Result<Option<Arc<Artifact>>>) -> String {
    match result {
        Ok(Some(artifact)) => format!(
            "{} {} from {} ({}, {} bytes)",
            "found".green().bold(),
            name,
            artifact.module().cyan(),
            artifact.root(),
            artifact.bytes().len()
        ),
        Ok(None) => format!("{} {}", "missing".yellow().bold(), name),
        Err(e) => format!("{} {}: {}", "error".red().bold(), name, e),
    }
}

/// One line per resource
pub fn resource_line(resource: &Resource) -> String {
    format!(
        "{} {} ({}, {} bytes)",
        "found".green().bold(),
        resource.path,
        resource.root,
        resource.bytes.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{
        Import, MemoryFinder, MemoryResourceLoader, ModuleError, ModuleIdentifier, ModuleRegistry, ModuleSpec,
    };

    #[test]
    fn test_module_summary_lists_imports_and_wires() {
        let lib = ModuleIdentifier::named("lib");
        let finder = MemoryFinder::new()
            .with(ModuleSpec::builder(lib.clone()).export("lib.api").build().unwrap())
            .with(
                ModuleSpec::builder(ModuleIdentifier::named("app"))
                    .import(Import::module(lib))
                    .import(Import::module(ModuleIdentifier::named("ghost")).optional())
                    .build()
                    .unwrap(),
            );
        let registry = ModuleRegistry::new(Arc::new(finder));
        let app = registry.load_module(&ModuleIdentifier::named("app")).unwrap();

        let summary = ModuleSummary(&app).to_string();
        assert!(summary.contains("ghost *"));
        assert!(summary.contains("lib * ["));
        assert!(summary.contains("(optional)"));
        assert!(summary.contains("-> lib via export lib.api"));
    }

    #[test]
    fn test_artifact_lines() {
        let registry = ModuleRegistry::new(Arc::new(MemoryFinder::new().with(
            ModuleSpec::builder(ModuleIdentifier::named("app"))
                .root(MemoryResourceLoader::new("classes").with_artifact("app.Main", "main").shared())
                .build()
                .unwrap(),
        )));
        let app = registry.load_module(&ModuleIdentifier::named("app")).unwrap();

        let found = artifact_line("app.Main", &app.load_artifact("app.Main"));
        assert!(found.contains("classes, 4 bytes"));
        let missing = artifact_line("app.Nope", &app.load_artifact("app.Nope"));
        assert!(missing.contains("app.Nope"));
        let failed = artifact_line(
            "app.Main",
            &Err(ModuleError::LoaderClosed(ModuleIdentifier::named("app"))),
        );
        assert!(failed.contains("is closed"));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tessera CLI - inspect and load modules from on-disk repositories

mod config;
mod report;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use config::CliConfig;
use owo_colors::OwoColorize;
use rayon::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tessera_core::{FinderChain, ModuleIdentifier, ModuleRegistry};
use tessera_fs::DirectoryFinder;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Resolve and load modules from tessera repositories",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Module repository; may be repeated, searched in order
    #[arg(short, long = "repository", global = true)]
    repositories: Vec<PathBuf>,

    /// Extra configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a module and print its linkage
    Resolve {
        /// Module identifier, `group:artifact[:version]` or a bare name
        module: ModuleIdentifier,
    },

    /// Load artifacts through a module
    Load {
        /// Module identifier
        module: ModuleIdentifier,

        /// Artifact names
        #[arg(required = true)]
        artifacts: Vec<String>,
    },

    /// Look up every visible copy of a resource
    Resource {
        /// Module identifier
        module: ModuleIdentifier,

        /// Resource path, `/`-separated
        path: String,
    },

    /// Load the module's main entry
    Main {
        /// Module identifier
        module: ModuleIdentifier,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("tessera=debug,tessera_core=debug,tessera_fs=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = CliConfig::load(cli.config.as_deref())?;
    if !cli.repositories.is_empty() {
        config.repositories = cli.repositories;
    }
    if config.repositories.is_empty() {
        bail!("no module repository configured; pass --repository or set TESSERA_REPOSITORY");
    }

    let mut chain = FinderChain::new();
    for root in &config.repositories {
        tracing::debug!(root = %root.display(), "adding repository");
        chain.push(Arc::new(DirectoryFinder::new(root.clone())));
    }
    let registry = ModuleRegistry::with_config(Arc::new(chain), config.registry);

    match cli.command {
        Command::Resolve { module } => {
            let module = registry
                .load_module(&module)
                .with_context(|| format!("failed to resolve {module}"))?;
            print!("{}", report::ModuleSummary(&module));
            Ok(ExitCode::SUCCESS)
        }

        Command::Load { module, artifacts } => {
            let module = registry.load_module(&module)?;
            let results: Vec<_> = artifacts
                .par_iter()
                .map(|name| (name, module.load_artifact(name)))
                .collect();

            let mut complete = true;
            for (name, result) in &results {
                println!("{}", report::artifact_line(name, result));
                complete &= matches!(result, Ok(Some(_)));
            }

            let stats = module.loader_stats();
            tracing::debug!(
                queued = stats.queued,
                served = stats.served,
                reentrant = stats.reentrant,
                helped = stats.helped,
                "loader stats"
            );
            Ok(if complete { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }

        Command::Resource { module, path } => {
            let module = registry.load_module(&module)?;
            let found = module.resources(&path)?;
            if found.is_empty() {
                println!("{} {}", "missing".yellow().bold(), path);
                return Ok(ExitCode::FAILURE);
            }
            for resource in &found {
                println!("{}", report::resource_line(resource));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Main { module } => {
            let module = registry.load_module(&module)?;
            let artifact = module.main_artifact()?;
            println!(
                "{}",
                report::artifact_line(artifact.name(), &Ok(Some(Arc::clone(&artifact))))
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

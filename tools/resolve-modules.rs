//! Resolve a module manifest and print the load order
//!
//! Reads a TOML manifest of `[[module]]` declarations, validates each
//! descriptor and resolves the dependency graph. Prints the load order, or the
//! missing dependencies / cycle that prevented one. Exits with status 1 when
//! resolution fails.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use modhost::module::registry::{DependencyResolver, ModuleManifest, ResolutionResult};
use modhost::module::validation::{DescriptorValidator, ValidationResult};
use modhost::utils::init_logging;

#[derive(Debug, Parser)]
#[command(name = "resolve-modules", version, about = "Resolve a module manifest into a load order")]
struct Args {
    /// Path to the TOML manifest
    manifest: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    resolution: ResolutionResult,
    /// Descriptor validation problems, by module
    invalid: Vec<String>,
}

impl Report {
    fn is_success(&self) -> bool {
        self.invalid.is_empty() && self.resolution.is_success()
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(Some(if args.verbose { "debug" } else { "warn" }));

    let manifest = ModuleManifest::from_file(&args.manifest)
        .with_context(|| format!("failed to read manifest {}", args.manifest.display()))?;

    let validator = DescriptorValidator::new();
    let mut resolver = DependencyResolver::new();
    let mut invalid = Vec::new();

    for descriptor in manifest.descriptors() {
        if let ValidationResult::Invalid(errors) = validator.validate(&descriptor) {
            invalid.extend(errors);
            continue;
        }
        if let Err(e) = resolver.add_module(descriptor) {
            invalid.push(e.to_string());
        }
    }

    let report = Report {
        resolution: resolver.resolve(),
        invalid,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report, &resolver);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_text(report: &Report, resolver: &DependencyResolver) {
    for message in &report.invalid {
        eprintln!("invalid: {}", message);
    }
    for message in &report.resolution.errors {
        eprintln!("error: {}", message);
    }
    if let Some(cycle) = &report.resolution.cycle {
        eprintln!("error: circular dependency: {}", cycle.join(" -> "));
    }
    for message in &report.resolution.warnings {
        eprintln!("warning: {}", message);
    }

    if !report.is_success() {
        return;
    }

    println!("Load order:");
    for (i, name) in report.resolution.load_order.iter().enumerate() {
        let priority = resolver
            .descriptor(name)
            .map(|d| d.priority.to_string())
            .unwrap_or_default();
        println!("  {:>3}. {} ({})", i + 1, name, priority);
    }
}

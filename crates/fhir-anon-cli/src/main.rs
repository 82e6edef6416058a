//! Thin command-line front end for `fhir-anon-core`. Owns every bit of
//! I/O and process wiring the engine itself stays free of: JSON parsing,
//! file access, CLI argument parsing, and printing the process report.

mod report_format;

use clap::{Parser, Subcommand};
use fhir_anon_core::config::AnonymizerConfig;
use fhir_anon_core::equivalence::EquivalenceClassBuilder;
use fhir_anon_core::model::Resource;
use fhir_anon_core::validators::kanon::validate_k_anonymity;
use fhir_anon_core::Engine;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Parser)]
#[command(name = "fhir-anon", about = "Rule-driven FHIR resource anonymizer")]
struct Cli {
    /// Increase log verbosity (-v, -vv); overridden by RUST_LOG if set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Anonymize a single resource document.
    Anonymize {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Anonymize every resource document in a folder, one OS thread per
    /// resource, each with its own `Engine` instance.
    Batch {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        input_dir: PathBuf,
        #[arg(long)]
        output_dir: PathBuf,
    },
    /// Check a folder of (already anonymized) resource documents against
    /// the configuration's `kAnonymitySettings`: groups documents into
    /// equivalence classes by their quasi-identifier paths, then reports
    /// any class smaller than `requiredK`.
    ValidateKAnonymity {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        input_dir: PathBuf,
    },
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &Path) -> Result<AnonymizerConfig, Box<dyn std::error::Error>> {
    // Layer the JSON config document over process-level defaults and
    // environment overrides, the same way the `config` crate's builder
    // pattern is used elsewhere in this codebase's ambient configuration.
    let settings = config::Config::builder()
        .add_source(config::File::new(
            path.to_string_lossy().as_ref(),
            config::FileFormat::Json,
        ))
        .add_source(config::Environment::with_prefix("FHIR_ANON").separator("__"))
        .build()?;
    Ok(settings.try_deserialize()?)
}

fn anonymize_one(
    engine: &Engine,
    input: &Path,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(input)?;
    let root = serde_json::from_str(&raw)?;
    let (resource, result) = engine.anonymize_resource(Resource::new(root))?;
    fs::write(output, serde_json::to_string_pretty(&resource.root)?)?;
    let resource_id = resource.id().unwrap_or("<unknown>").to_string();
    print!("{}", report_format::render_summary(&resource_id, &result.summary()));
    tracing::info!(
        target: "fhir_anon_cli::anonymize",
        input = %input.display(),
        output = %output.display(),
        "resource anonymized"
    );
    Ok(())
}

fn run_anonymize(config_path: PathBuf, input: PathBuf, output: PathBuf) -> ExitCode {
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let engine = match Engine::new(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to build engine");
            return ExitCode::FAILURE;
        }
    };
    match anonymize_one(&engine, &input, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "anonymization failed");
            ExitCode::FAILURE
        }
    }
}

fn run_batch(config_path: PathBuf, input_dir: PathBuf, output_dir: PathBuf) -> ExitCode {
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let engine = match Engine::new(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to build engine");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::create_dir_all(&output_dir) {
        tracing::error!(target: "fhir_anon_cli", error = %e, "failed to create output directory");
        return ExitCode::FAILURE;
    }

    let folder_name = input_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let entries: Vec<PathBuf> = match fs::read_dir(&input_dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect(),
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to read input directory");
            return ExitCode::FAILURE;
        }
    };

    let failures = AtomicUsize::new(0);

    // Each resource gets its own `Engine` instance scoped to this file and
    // folder, run on its own thread: the engine itself is synchronous and
    // shares no mutable state across resources except the (thread-safe)
    // privacy-budget accountant each scoped engine creates fresh.
    entries.par_iter().for_each(|input_path| {
        let file_name = input_path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let resource_engine = engine.with_file_context(file_name.clone(), folder_name.clone());
        let output_path = output_dir.join(input_path.file_name().unwrap());
        if let Err(e) = anonymize_one(&resource_engine, input_path, &output_path) {
            tracing::error!(
                target: "fhir_anon_cli::batch",
                file = %input_path.display(),
                error = %e,
                "failed to anonymize resource"
            );
            failures.fetch_add(1, Ordering::Relaxed);
        }
    });

    if failures.load(Ordering::Relaxed) > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Runs the validation and returns whether every equivalence class met
/// `requiredK`, or `None` if the run couldn't even produce a verdict
/// (bad config, unreadable directory). Kept separate from the `ExitCode`
/// wrapper below so the decision itself is easy to test directly.
fn validate_k_anonymity_is_valid(config_path: PathBuf, input_dir: PathBuf) -> Option<bool> {
    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to load configuration");
            return None;
        }
    };
    let Some(settings) = config.parameters.k_anonymity_settings else {
        tracing::error!(
            target: "fhir_anon_cli",
            "configuration has no kAnonymitySettings; nothing to validate"
        );
        return None;
    };

    let entries: Vec<PathBuf> = match fs::read_dir(&input_dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect(),
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "failed to read input directory");
            return None;
        }
    };

    let raw_documents: Vec<String> = entries
        .iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                tracing::error!(target: "fhir_anon_cli", file = %path.display(), error = %e, "failed to read document");
                None
            }
        })
        .collect();

    let builder = EquivalenceClassBuilder::new(settings.quasi_identifier_paths);
    let build_report = builder.build_from_raw(&raw_documents);
    if build_report.parse_failures > 0 {
        tracing::warn!(
            target: "fhir_anon_cli",
            parse_failures = build_report.parse_failures,
            "some documents could not be parsed for equivalence-class extraction"
        );
    }

    let report = match validate_k_anonymity(&build_report.classes, settings.required_k) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(target: "fhir_anon_cli", error = %e, "k-anonymity validation failed");
            return None;
        }
    };

    println!(
        "{} classes, min size {}, {} violation(s) of k={}",
        build_report.classes.len(),
        report.min_class_size,
        report.violations.len(),
        settings.required_k
    );
    for violation in &report.violations {
        println!("  violation: {} (size {})", violation.signature, violation.size);
    }

    Some(report.is_valid)
}

fn run_validate_k_anonymity(config_path: PathBuf, input_dir: PathBuf) -> ExitCode {
    match validate_k_anonymity_is_valid(config_path, input_dir) {
        Some(true) => ExitCode::SUCCESS,
        Some(false) | None => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Anonymize { config, input, output } => run_anonymize(config, input, output),
        Command::Batch {
            config,
            input_dir,
            output_dir,
        } => run_batch(config, input_dir, output_dir),
        Command::ValidateKAnonymity { config, input_dir } => {
            run_validate_k_anonymity(config, input_dir)
        }
    }
}

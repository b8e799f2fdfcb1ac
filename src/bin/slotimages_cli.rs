//! Slot Images CLI - Stand-in for the upload form
//!
//! Commands: slots, validate, process
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on advisory non-conformance or an incomplete submission

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use slotimages_core::{
    PipelineError, SlotRegistry, Submission, SubmissionPipeline, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "slotimages-cli")]
#[command(about = "Slot Images CLI - validate and package named image slots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Built-in slot table name, or path to a JSON slot table
    #[arg(short, long, default_value = "restaurant-v1")]
    table: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the slots of the active table
    Slots,

    /// Check one image against a slot
    Validate {
        /// Slot id
        #[arg(short, long)]
        slot: String,

        /// Image file
        file: PathBuf,
    },

    /// Resize every upload and write the ZIP archive
    Process {
        /// Name prefix for every output file
        #[arg(short, long)]
        name: String,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Uploads as SLOT=FILE
        #[arg(required = true, value_parser = parse_upload)]
        uploads: Vec<(String, PathBuf)>,
    },
}

fn parse_upload(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((slot, path)) if !slot.is_empty() && !path.is_empty() => {
            Ok((slot.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected SLOT=FILE, got {}", arg)),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let registry = match SlotRegistry::resolve(&cli.table) {
        Ok(r) => r,
        Err(e) => {
            print_json(&serde_json::json!({ "error": format!("Failed to load slot table: {}", e) }));
            return ExitCode::FAILURE;
        }
    };

    let pipeline = SubmissionPipeline::new(registry);

    match cli.command {
        Commands::Slots => {
            let slots: Vec<_> = pipeline.registry().specs()
                .iter()
                .map(|s| serde_json::json!({
                    "id": s.id,
                    "label": s.label,
                    "size": [s.target_width, s.target_height],
                    "ratio": s.target_ratio(),
                    "grayscale_required": s.grayscale_required,
                    "required": s.required,
                }))
                .collect();

            print_json(&serde_json::json!({
                "table": pipeline.registry().name(),
                "aspect_tolerance": pipeline.registry().aspect_tolerance(),
                "rules": pipeline.registry().requirement_rules(),
                "slots": slots,
            }));
            ExitCode::SUCCESS
        }

        Commands::Validate { slot, file } => {
            let bytes = match fs::read(&file) {
                Ok(b) => b,
                Err(e) => return fail(&format!("Failed to read {}: {}", file.display(), e)),
            };

            match pipeline.validate_bytes(&slot, &bytes, &display_name(&file)) {
                Ok(outcome) => {
                    print_json(&outcome);
                    if outcome.overall_ok {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)  // Advisory non-conformance
                    }
                }
                Err(e) => fail(&e.to_string()),
            }
        }

        Commands::Process { name, out, uploads } => {
            let mut submission = Submission::new(&name);
            let mut outcomes = vec![];

            for (slot, path) in uploads {
                let bytes = match fs::read(&path) {
                    Ok(b) => b,
                    Err(e) => return fail(&format!("Failed to read {}: {}", path.display(), e)),
                };
                // Rejected uploads are reported and left out, like a form field
                // that refused the file.
                let outcome = pipeline.upload(&mut submission, &slot, bytes, &display_name(&path));
                outcomes.push(match outcome {
                    Ok(o) => outcome_json(&slot, &o),
                    Err(e @ PipelineError::UnknownSlot(_)) => return fail(&e.to_string()),
                    Err(e) => serde_json::json!({ "slot_id": slot, "error": e.to_string() }),
                });
            }

            let archive = match pipeline.process(&mut submission) {
                Ok(a) => a,
                Err(e @ PipelineError::IncompleteSubmission { .. }) => {
                    print_json(&serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                        "outcomes": outcomes,
                    }));
                    return ExitCode::from(2);
                }
                Err(e) => return fail(&e.to_string()),
            };

            let target = out.join(&archive.filename);
            if let Err(e) = fs::write(&target, &archive.data) {
                return fail(&format!("Failed to write {}: {}", target.display(), e));
            }

            print_json(&serde_json::json!({
                "success": true,
                "engine_version": ENGINE_VERSION,
                "archive": target,
                "mime_type": archive.mime_type,
                "sha256": archive.sha256(),
                "manifest": archive.manifest,
                "outcomes": outcomes,
            }));
            ExitCode::SUCCESS
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// JSON for one accepted upload; a serialization failure is reported in place.
fn outcome_json(slot: &str, outcome: &impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(outcome).unwrap_or_else(|e| {
        serde_json::json!({ "slot_id": slot, "error": format!("Failed to serialize outcome: {}", e) })
    })
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn fail(message: &str) -> ExitCode {
    print_json(&serde_json::json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

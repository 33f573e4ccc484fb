//! Screen Draft command-line tool.
//!
//! Reads a screen document (JSON) from stdin and runs one engine operation
//! over it. Used by CI to gate screen publishing and by scripts that apply
//! copilot patches offline.
//!
//! ```text
//! sd-cli validate              findings on stdout, exit 1 on errors
//! sd-cli apply <patch.json>    patched document on stdout
//! sd-cli format                canonical pretty JSON
//! sd-cli paths                 state binding paths as a tree
//! ```

use sd_core::binding::{PathTreeNode, build_path_tree, schema_paths};
use sd_core::error::PatchError;
use sd_core::model::ScreenDocument;
use sd_core::patch::{PatchEnvelope, apply_patch, apply_patch_value};
use sd_core::validate::{ValidationContext, validate_document};
use serde_json::Value;
use std::io::Read;
use std::process::ExitCode;

const USAGE: &str = "usage: sd-cli <validate | apply <patch.json> | format | paths> < screen.json";

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("sd-cli: {message}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &[String]) -> Result<ExitCode, String> {
    let command = args.first().map(String::as_str).ok_or(USAGE)?;
    let doc = read_document()?;
    log::debug!("loaded {} ({} components)", doc.screen_id, doc.component_count());

    match command {
        "validate" => Ok(validate(&doc)),
        "apply" => {
            let path = args.get(1).ok_or(USAGE)?;
            apply(&doc, path)
        }
        "format" => {
            print_json(&doc)?;
            Ok(ExitCode::SUCCESS)
        }
        "paths" => {
            let paths = schema_paths(&doc.state.schema);
            print_tree(&build_path_tree(&paths), 0);
            Ok(ExitCode::SUCCESS)
        }
        other => Err(format!("unknown command `{other}`\n{USAGE}")),
    }
}

fn read_document() -> Result<ScreenDocument, String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    ScreenDocument::from_json(&text).map_err(|e| format!("invalid screen document: {e}"))
}

fn print_json(doc: &ScreenDocument) -> Result<(), String> {
    let text = doc.to_json_pretty().map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

fn validate(doc: &ScreenDocument) -> ExitCode {
    let report = validate_document(doc, &ValidationContext::default());
    for issue in &report.issues {
        println!("{issue}");
    }
    let errors = report.error_count();
    let warnings = report.warnings().count();
    println!("{errors} error(s), {warnings} warning(s)");
    if report.is_publishable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Accepts either a bare operation array or a `screen_patch` envelope.
fn apply(doc: &ScreenDocument, patch_path: &str) -> Result<ExitCode, String> {
    let text = std::fs::read_to_string(patch_path).map_err(|e| format!("{patch_path}: {e}"))?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| format!("{patch_path}: {e}"))?;

    let result = if raw.is_object() {
        PatchEnvelope::from_value(&raw).and_then(|envelope| {
            if let Some(notes) = &envelope.notes {
                log::info!("patch notes: {notes}");
            }
            apply_patch(doc, &envelope.patch)
        })
    } else {
        apply_patch_value(doc, &raw)
    };

    match result {
        Ok(patched) => {
            print_json(&patched)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(PatchError::Invalid(issues)) => {
            for issue in issues {
                eprintln!("error: {issue}");
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_tree(nodes: &[PathTreeNode], depth: usize) {
    for node in nodes {
        println!("{:indent$}{}", "", node.key, indent = depth * 2);
        print_tree(&node.children, depth + 1);
    }
}

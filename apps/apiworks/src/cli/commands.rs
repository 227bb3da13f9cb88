//! # CLI Command Implementations
//!
//! Every command opens the store named by the configuration, does its work
//! through [`Services`] and prints either a human summary or, with
//! `--json-mode`, one JSON document on stdout. Diagnostics go to stderr
//! through `tracing`.

use super::{ExportArgs, FilterArgs, ImportArgs};
use crate::api;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::{BundleImport, Services, WorkspaceInput};
use apiworks_core::{
    EngineError, ExportFormat, ExportOptions, Id, ImportOptions, decode, encode,
    filter_by_examples, filter_by_flows, primitives::MAX_PAYLOAD_SIZE,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Validate file size before reading.
///
/// Bundles larger than the API's payload limit are refused here too, so a
/// file the CLI accepts could also travel over HTTP.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AppError> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() > max_size {
        return Err(AppError::Config(format!(
            "file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input path.
///
/// Canonicalizes the path (resolving symlinks and `..`) and requires an
/// existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| {
        AppError::Config(format!("invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(AppError::Config(format!(
            "path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Canonicalize the parent of an output path, which must be a directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let canonical_parent = parent.canonicalize().map_err(|e| {
        AppError::Config(format!(
            "invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(AppError::Config(format!(
            "output directory '{}' is not a directory",
            parent.display()
        )));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| AppError::Config("output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

/// Read a bundle file after path and size validation.
fn read_bundle_file(path: &Path) -> Result<Vec<u8>, AppError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_PAYLOAD_SIZE as u64)?;
    Ok(std::fs::read(&validated)?)
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn open_services(config: &AppConfig) -> Result<Arc<Services>, AppError> {
    Ok(Arc::new(Services::from_config(config)?))
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn cmd_server(config: &AppConfig) -> Result<(), AppError> {
    let services = Services::from_config(config)?;

    println!("apiworks server starting");
    println!();
    println!("  Address:  {}", config.bind_addr());
    println!("  Store:    {}", config.storage.path.display());
    println!("  Tokens:   {}", config.auth.tokens.len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config, services).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create a workspace, its global environment and the owner membership.
pub fn cmd_init(config: &AppConfig, json_mode: bool, name: String, user: Id) -> Result<(), AppError> {
    let services = Services::from_config(config)?;
    let created = services.insert_workspaces(
        user,
        vec![WorkspaceInput {
            id: Id::new_now(),
            name,
        }],
    )?;

    for workspace in created {
        if json_mode {
            print_json(&serde_json::json!({
                "workspace_id": workspace.id.to_string(),
                "name": workspace.name,
                "global_env": workspace.global_env.map(|id| id.to_string()),
                "owner": user.to_string(),
            }));
        } else {
            println!("Created workspace {:?} ({})", workspace.name, workspace.id);
            if let Some(global) = workspace.global_env {
                println!("  Global environment: {global}");
            }
            println!("  Owner:              {user}");
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show entity counts of a workspace.
///
/// Counts come straight from the store; no membership check applies to a
/// local operator.
pub fn cmd_status(config: &AppConfig, json_mode: bool, workspace: Id) -> Result<(), AppError> {
    let services = Services::from_config(config)?;
    let counts = services.workspace_counts(workspace)?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "workspace_id": workspace.to_string(),
            "counts": counts,
        }));
        return Ok(());
    }

    println!("Workspace {workspace}");
    println!("=========");
    println!("Store: {}", config.storage.path.display());
    println!();
    for (kind, n) in &counts {
        println!("  {kind:<20} {n}");
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export a workspace bundle to a file.
///
/// # Arguments
/// * `args.format` - Encoding; defaults to the one implied by the output extension
/// * `args.credentials` - Include credentials and their sealed secrets
///
/// # Errors
/// Fails before exporting when the output directory does not exist.
pub async fn cmd_export(config: &AppConfig, json_mode: bool, args: ExportArgs) -> Result<(), AppError> {
    let output = validate_output_path(&args.output)?;
    let format = args
        .format
        .unwrap_or_else(|| ExportFormat::from_path(&args.output));
    let options = ExportOptions {
        include_http: !args.no_http,
        include_flows: !args.no_flows,
        include_environments: !args.no_environments,
        include_files: !args.no_files,
        include_collections: !args.no_collections,
        include_credentials: args.credentials,
        filter_by_folder_id: args.folder,
        filter_by_flow_ids: args.flows,
        filter_by_http_ids: args.http,
    };

    let services = open_services(config)?;
    let exported = services
        .export_workspace_data(args.workspace, format, options)
        .await?;
    std::fs::write(&output, &exported.data)?;
    tracing::info!(
        workspace_id = %args.workspace,
        %format,
        bytes = exported.data.len(),
        "bundle exported"
    );

    if json_mode {
        print_json(&serde_json::json!({
            "output": output.to_string_lossy(),
            "format": format.to_string(),
            "bytes": exported.data.len(),
            "counts": exported.counts,
        }));
    } else {
        println!("Exported {} bytes to {}", exported.data.len(), output.display());
        for (kind, n) in &exported.counts {
            println!("  {kind:<20} {n}");
        }
    }
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a bundle file into a workspace in one transaction.
///
/// # Arguments
/// * `args.preserve_ids` - Keep bundle IDs; collisions follow `args.merge_mode`
/// * `args.examples` / `args.flows` - Optional filter applied before import
///
/// # Returns
/// Nothing; rows written per table are printed. On any failure nothing is
/// written at all.
pub async fn cmd_import(config: &AppConfig, json_mode: bool, args: ImportArgs) -> Result<(), AppError> {
    let data = read_bundle_file(&args.input)?;
    let format = args
        .format
        .unwrap_or_else(|| ExportFormat::from_path(&args.input));
    let options = ImportOptions {
        workspace_id: args.workspace,
        create_files: !args.no_files,
        synthesize_files: args.synthesize_files,
        merge_mode: args.merge_mode,
        preserve_ids: args.preserve_ids,
        ..ImportOptions::default()
    };

    let services = open_services(config)?;
    let result = services
        .import_workspace_data(BundleImport {
            workspace_id: args.workspace,
            format,
            data,
            options,
            filter_examples: args.examples,
            filter_flows: args.flows,
        })
        .await?;

    if json_mode {
        print_json(&serde_json::json!({
            "workspace_id": args.workspace.to_string(),
            "written": result.total_written(),
            "skipped": result.skipped,
            "counts": result.counts,
        }));
    } else {
        println!(
            "Imported {} rows into {} ({} skipped)",
            result.total_written(),
            args.workspace,
            result.skipped
        );
        for (table, n) in &result.counts {
            println!("  {table:<20} {n}");
        }
    }
    Ok(())
}

// =============================================================================
// FILTER COMMAND
// =============================================================================

/// Decode, filter and re-encode a bundle file without touching the store.
pub fn cmd_filter(json_mode: bool, args: &FilterArgs) -> Result<(), AppError> {
    let data = read_bundle_file(&args.input)?;
    let output = validate_output_path(&args.output)?;
    let input_format = ExportFormat::from_path(&args.input);
    let output_format = ExportFormat::from_path(&args.output);

    let mut bundle = decode(&data, input_format).map_err(EngineError::from)?;
    match (&args.examples, &args.flows) {
        (Some(examples), None) => {
            let requested: BTreeSet<Id> = examples.iter().copied().collect();
            filter_by_examples(&mut bundle, &requested).map_err(EngineError::from)?;
        }
        (None, Some(flows)) => {
            let requested: BTreeSet<Id> = flows.iter().copied().collect();
            filter_by_flows(&mut bundle, &requested).map_err(EngineError::from)?;
        }
        _ => {
            return Err(AppError::Config(
                "exactly one of --examples or --flows is required".to_string(),
            ));
        }
    }

    let encoded = encode(&bundle, output_format).map_err(EngineError::from)?;
    std::fs::write(&output, &encoded)?;

    let counts = bundle.count_entities();
    if json_mode {
        print_json(&serde_json::json!({
            "output": output.to_string_lossy(),
            "format": output_format.to_string(),
            "counts": counts,
        }));
    } else {
        println!("Wrote filtered bundle to {}", output.display());
        for (kind, n) in &counts {
            println!("  {kind:<20} {n}");
        }
    }
    Ok(())
}

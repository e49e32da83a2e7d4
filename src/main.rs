mod cli;
mod config;
mod coordinator;
mod error;
mod invoker;
mod metrics;
mod shipment;
mod store;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::AppConfig;
use coordinator::{ShipmentCoordinator, Submission};
use invoker::ScriptInvoker;
use store::{FsBlobStore, JsonRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    let records = JsonRecordStore::open(config.records_path())
        .await
        .context("failed to open record store")?;
    let blobs = FsBlobStore::open(&config.inputs_dir, &config.outputs_dir)
        .await
        .context("failed to set up file storage")?;
    let invoker = ScriptInvoker::new(
        config.python.clone(),
        &config.regression_script,
        &config.classification_script,
    );
    let coordinator = ShipmentCoordinator::new(
        Arc::new(records),
        Arc::new(blobs),
        Arc::new(invoker),
        config.deadlines(),
    );

    match cli.command {
        Command::Submit {
            owner,
            project,
            task,
            algorithm,
            target,
            file,
        } => {
            let input = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("failed to open {}", file.display()))?;
            let submission = Submission {
                owner_id: owner,
                project_name: project.clone(),
                task_kind: task,
                algorithm,
                target_column: target,
                input,
                extension: cli::file_extension(&file),
            };

            let progress = ui::SubmitProgress::start(&project);
            let outcome = coordinator.submit(submission).await;
            progress.complete(&outcome);
            outcome?;
        }
        Command::Result { id, json, export } => {
            let result = coordinator.result(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result.metrics)?);
            } else {
                ui::print_result(&result);
            }
            if let Some(dest) = export {
                let bytes = coordinator.export(id, &dest).await?;
                info!(dest = %dest.display(), bytes, "output exported");
            }
        }
        Command::Status { id } => {
            let shipment = coordinator.status(id).await?;
            ui::print_shipment(&shipment);
        }
    }

    Ok(())
}

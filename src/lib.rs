mod commands;
pub mod core;

use std::path::Path;
use std::sync::atomic::Ordering;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::config::{ConfigOverrides, InstallerConfig, InstallerSettings};
use crate::core::downloader::RunResult;
use crate::core::error::{InstallerError, InstallerResult};

pub use commands::{execute, Workflow};

/// Entry point for the command-line binary.
pub fn run(
    workflow: Workflow,
    overrides: ConfigOverrides,
    settings_path: Option<&Path>,
) -> InstallerResult<RunResult> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,installer_lib=debug")),
        )
        .init();

    info!("Installer starting...");

    let settings = InstallerSettings::load(settings_path)?;
    let config = InstallerConfig::resolve(settings, overrides)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| InstallerError::Other(format!("Failed to start async runtime: {}", e)))?;

    let result = runtime.block_on(async {
        let cancel = config.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current step");
                cancel.store(true, Ordering::SeqCst);
            }
        });
        execute(&workflow, &config).await
    });

    match &result {
        Ok(summary) => info!(
            "Done: {} resolved, {} skipped, {} generated files",
            summary.succeeded.len(),
            summary.skipped.len(),
            summary.generated_files.len()
        ),
        Err(e) => error!("Installation failed: {}", e),
    }
    result
}

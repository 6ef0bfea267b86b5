//! CLI runner - executes commands

use crate::auth::BearerToken;
use crate::cli::commands::{Cli, Commands, ExportArgs, OutputFormat};
use crate::config::CollectorConfig;
use crate::database::Database;
use crate::engine::{CollectOutcome, Collector};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::{spawn_periodic_export, CloudDestination, SnapshotExporter};
use crate::pagination::PageFetcher;
use crate::records::RecordStore;
use crate::state::StateManager;
use crate::types::{CollectionTarget, ExportMode};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a `run` produced
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Collection outcome
    pub outcome: CollectOutcome,
    /// Location of the final snapshot, if one was written
    pub snapshot: Option<String>,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                bearer_token,
                api_base,
                export_mode,
                export_every_secs,
                max_pages,
                expected_total,
                export,
            } => {
                let mut config = self.load_config()?;
                if let Some(token) = bearer_token {
                    config.bearer_token = Some(token.clone());
                }
                if let Some(base) = api_base {
                    config.api.base_url.clone_from(base);
                }
                if let Some(mode) = export_mode {
                    config.export.mode = *mode;
                }
                if let Some(every) = export_every_secs {
                    config.export.every_seconds = *every;
                }
                if max_pages.is_some() {
                    config.collect.max_pages = *max_pages;
                }
                if expected_total.is_some() {
                    config.collect.expected_total = *expected_total;
                }
                apply_export_args(&mut config, export);

                let cancel = CancellationToken::new();
                let listener = tokio::spawn(cancel_on_signal(cancel.clone()));
                let report = run_collection(&config, cancel).await;
                listener.abort();

                let report = report?;
                self.output(&json!({
                    "target": report.outcome.checkpoint.target,
                    "halt": report.outcome.halt.to_string(),
                    "stats": report.outcome.stats,
                    "record_count": report.outcome.record_count(),
                    "snapshot": report.snapshot,
                }));
                Ok(())
            }
            Commands::Status => self.status(),
            Commands::Export { export } => self.export(export).await,
            Commands::Reset => self.reset(),
        }
    }

    /// Load the config file (if any) and apply global flags
    fn load_config(&self) -> Result<CollectorConfig> {
        let mut config = match &self.cli.config {
            Some(path) => CollectorConfig::from_file(path)?,
            None => CollectorConfig::default(),
        };
        if let Some(target) = &self.cli.target {
            config.target_id = Some(target.clone());
        }
        if let Some(path) = &self.cli.db_path {
            config.database_path.clone_from(path);
        }
        Ok(config)
    }

    /// Config, target and database for the administrative commands
    fn open_target(&self) -> Result<(CollectorConfig, CollectionTarget, Database)> {
        let config = self.load_config()?;
        config.validate_settings()?;
        let target = config.target()?;
        let db = Database::open(&config.database_path)?;
        Ok((config, target, db))
    }

    fn status(&self) -> Result<()> {
        let (_, target, db) = self.open_target()?;
        let checkpoint = StateManager::new(db.clone()).get(&target)?;
        let stored = RecordStore::new(db).count(&target)?;

        self.output(&json!({
            "checkpoint": checkpoint,
            "stored_records": stored,
        }));
        Ok(())
    }

    async fn export(&self, args: &ExportArgs) -> Result<()> {
        let (mut config, target, db) = self.open_target()?;
        apply_export_args(&mut config, args);

        let exporter = build_exporter(&config)?.with_mode(ExportMode::Final);
        let location = exporter.export(&db, &target).await?;
        self.output(&json!({ "target": target, "snapshot": location }));
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let (_, target, db) = self.open_target()?;
        let stored = RecordStore::new(db.clone()).count(&target)?;
        let checkpoint = StateManager::new(db).reset(&target, stored)?;
        info!("Reset checkpoint for target {}", target);
        self.output(&json!({ "checkpoint": checkpoint }));
        Ok(())
    }

    /// Output a report
    fn output<T: Serialize>(&self, report: &T) {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(report),
            OutputFormat::Pretty => serde_json::to_string_pretty(report),
        };
        println!("{}", text.unwrap_or_default());
    }
}

fn apply_export_args(config: &mut CollectorConfig, args: &ExportArgs) {
    if let Some(output) = &args.output {
        config.export.destination.clone_from(output);
    }
    if let Some(format) = args.snapshot_format {
        config.export.format = format;
    }
}

/// Snapshot exporter for the configured destination, format and mode
pub fn build_exporter(config: &CollectorConfig) -> Result<SnapshotExporter> {
    let destination = CloudDestination::parse(&config.export.destination)?;
    Ok(SnapshotExporter::new(Arc::new(destination))
        .with_format(config.export.format)
        .with_mode(config.export.mode)
        .with_resource(&config.export.resource))
}

/// Collect the configured target, then write the final snapshot
///
/// `cancel` is the stop signal; cancelling it ends waits promptly and leaves a
/// resumable checkpoint behind.
pub async fn run_collection(
    config: &CollectorConfig,
    cancel: CancellationToken,
) -> Result<RunReport> {
    config.validate()?;
    let target = config.target()?;
    let token = config
        .bearer_token
        .as_deref()
        .ok_or_else(|| Error::missing_field("bearer_token"))?;

    let db = Database::open(&config.database_path)?;
    info!(
        "Collecting target {} into {}",
        target,
        config.database_path.display()
    );

    let client = HttpClient::with_config(config.http_client_config())?
        .with_signer(Arc::new(BearerToken::new(token)?));
    let fetcher = PageFetcher::new(client, config.endpoint()?, cancel.clone())
        .with_policy(config.fetch_policy())
        .with_profile_base(&config.api.profile_base);

    let exporter = match config.export.mode {
        ExportMode::Off => None,
        ExportMode::Final | ExportMode::Periodic => Some(build_exporter(config)?),
    };

    let export_cancel = cancel.child_token();
    let periodic = match (&exporter, config.export.mode) {
        (Some(exporter), ExportMode::Periodic) => Some(spawn_periodic_export(
            exporter.clone(),
            &db,
            target.clone(),
            Duration::from_secs(config.export.every_seconds),
            export_cancel.clone(),
        )?),
        _ => None,
    };

    let mut collector = Collector::new(
        fetcher,
        StateManager::new(db.clone()),
        RecordStore::new(db.clone()),
    )
    .with_config(config.collect_config());
    let outcome = collector.collect(&target).await;

    export_cancel.cancel();
    if let Some(task) = periodic {
        match task.await {
            Ok(exports) => info!("Periodic exporter stopped after {} exports", exports),
            Err(e) => warn!("Periodic exporter ended abnormally: {}", e),
        }
    }
    let outcome = outcome?;

    let mut snapshot = None;
    if let Some(exporter) = &exporter {
        if RecordStore::new(db.clone()).count(&target)? > 0 {
            snapshot = Some(exporter.export(&db, &target).await?);
        } else {
            info!("No records collected; skipping snapshot");
        }
    }

    if let Err(e) = db.checkpoint_wal() {
        warn!("Could not fold write-ahead log: {}", e);
    }

    info!("Run finished: {}", outcome.halt);
    Ok(RunReport { outcome, snapshot })
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received stop signal, finishing current step...");
    token.cancel();
}

//! s3mirror Daemon - Notification-driven S3 mirroring service
//!
//! This binary runs as a long-lived service and:
//! - Long-polls an SQS queue fed by S3 bucket notifications
//! - Writes created objects into the mapped local directories
//! - Removes local files when their objects are deleted
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Startup wires the AWS adapters and the local filesystem adapter into a
//! [`MessageLoop`]. The loop is controlled by a `CancellationToken` that is
//! triggered on receipt of SIGTERM or SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use s3mirror_aws::{s3::S3ObjectFetcher, session::AwsSession, sqs::SqsMessageQueue};
use s3mirror_core::config::Config;
use s3mirror_core::domain::PathMapper;
use s3mirror_core::usecases::{ActionDispatcher, MessageProcessor};
use s3mirror_sync::filesystem::LocalFileSystemAdapter;
use s3mirror_sync::message_loop::{LoopSettings, LoopTotals, MessageLoop};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "s3mirrord",
    version,
    about = "Mirror S3 bucket prefixes into local directories from change notifications"
)]
struct Args {
    /// Configuration file (YAML, or legacy JSON with a .json extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level; overrides the config file, RUST_LOG overrides both
    #[arg(long)]
    log_level: Option<String>,

    /// Stop after this many receive cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Load and validate the configuration, print the mapping table, then exit
    #[arg(long)]
    check_config: bool,
}

impl Args {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Filter used when RUST_LOG is not set
    fn effective_level(&self, config: Option<&Config>) -> String {
        self.log_level
            .clone()
            .or_else(|| config.map(|c| c.logging.level.clone()))
            .unwrap_or_else(|| "info".to_string())
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

/// Mapping table in match order, one `prefix -> directory` per line
fn render_mapping_table(mapper: &PathMapper) -> String {
    mapper
        .rules()
        .iter()
        .map(|rule| format!("{:?} -> {}\n", rule.prefix, rule.local_root.display()))
        .collect()
}

/// Fails with every validation error logged
fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        error!(field = %e.field, "Invalid configuration: {}", e.message);
    }
    anyhow::bail!("configuration has {} invalid field(s)", errors.len())
}

// ============================================================================
// DaemonService
// ============================================================================

/// Wires adapters, processor and loop, then runs until shutdown
struct DaemonService {
    /// Application configuration loaded from disk
    config: Config,
    /// Token for signalling graceful shutdown
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }

    async fn build_loop(&self) -> Result<MessageLoop> {
        let session = AwsSession::load(&self.config.aws).await;
        session
            .verify_credentials()
            .await
            .context("AWS credentials unavailable")?;

        let queue = SqsMessageQueue::connect(&session, &self.config.queue)
            .await
            .context("Cannot open notification queue")?;
        let fetcher = S3ObjectFetcher::new(&session);

        let mapper = self.config.path_mapper();
        for rule in mapper.rules() {
            info!(prefix = %rule.prefix, local_root = %rule.local_root.display(), "Mirroring prefix");
        }

        let dispatcher =
            ActionDispatcher::new(Arc::new(fetcher), Arc::new(LocalFileSystemAdapter::new()));
        let processor =
            MessageProcessor::new(self.config.event_decoder(), Arc::new(mapper), dispatcher);

        Ok(MessageLoop::new(
            Arc::new(queue),
            processor,
            LoopSettings::from_config(&self.config),
        ))
    }

    async fn run(self, max_cycles: Option<u64>) -> Result<LoopTotals> {
        let mut message_loop = self.build_loop().await?;

        let totals = match max_cycles {
            Some(n) => message_loop.run_cycles(n, &self.shutdown).await,
            None => message_loop.run(&self.shutdown).await,
        };
        Ok(totals)
    }
}

// ============================================================================
// Signal handling
// ============================================================================

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path();

    // Loading does not log, so the subscriber can honour the file's settings
    let loaded = Config::load(&config_path);
    let json_logs = loaded
        .as_ref()
        .is_ok_and(|c| c.logging.format == "json");
    init_tracing(&args.effective_level(loaded.as_ref().ok()), json_logs);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %format!("{e:#}"), "Cannot load configuration");
            return Err(e);
        }
    };
    ensure_valid(&config)?;

    if args.check_config {
        print!("{}", render_mapping_table(&config.path_mapper()));
        return Ok(());
    }

    info!(config = %config_path.display(), "s3mirror daemon starting (s3mirrord)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run(args.max_cycles).await;

    match &result {
        Ok(totals) => info!(
            cycles = totals.cycles,
            acknowledged = totals.acknowledged,
            failed = totals.failed,
            "s3mirror daemon shut down gracefully"
        ),
        Err(e) => error!(error = %format!("{e:#}"), "s3mirror daemon exiting with error"),
    }

    result.map(|_| ())
}

// ============================================================================
// Tests
// ============================================================================

//! graduation-invite - submission relay for the graduation invitation page
//!
//! # Usage
//!
//! ```bash
//! # Serve the API (default)
//! graduation-invite --config invite_config.toml
//!
//! # Operator commands (stop the server first, the database is single-process)
//! graduation-invite stats
//! graduation-invite export --out submissions.csv
//! graduation-invite drain
//! graduation-invite purge-queue
//! ```
//!
//! # Environment Variables
//!
//! - `INVITE_CONFIG`: Path to the TOML config (default: `./invite_config.toml`)
//! - `INVITE_CORS_ORIGINS`: Comma-separated origins allowed to call the API
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use graduation_invite::api::{create_app, ApiState};
use graduation_invite::config::{self, defaults, InviteConfig};
use graduation_invite::delivery::{
    run_probe, run_reconciler, Connectivity, DeliveryPipeline, HttpTransport, PipelineSettings,
    RemoteTransport, TracingAnalytics,
};
use graduation_invite::invitation::Invitation;
use graduation_invite::report::export_file_name;
use graduation_invite::storage::SledStore;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "graduation-invite")]
#[command(about = "Graduation invitation submission relay")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides INVITE_CONFIG and ./invite_config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Override the data directory holding the submission database
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API, connectivity probe and reconciler (default)
    Serve,
    /// Print submission statistics as JSON
    Stats,
    /// Export the submission log as CSV
    Export {
        /// Output file; "-" prints to stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Run one reconciliation pass over the retry queue now
    Drain,
    /// Remove every queued submission without delivering it
    PurgeQueue,
}

// ============================================================================
// Task Names (for supervisor logging)
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ConnectivityProbe,
    Reconciler,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ConnectivityProbe => write!(f, "ConnectivityProbe"),
            TaskName::Reconciler => write!(f, "Reconciler"),
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn load_config(args: &CliArgs) -> Result<InviteConfig> {
    let mut config = match &args.config {
        Some(path) => InviteConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => InviteConfig::load(),
    };
    if let Some(addr) = &args.addr {
        config.server.addr.clone_from(addr);
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir.clone_from(dir);
    }
    Ok(config)
}

/// Remote transport, or `None` when the endpoint is switched off.
fn build_transport(config: &InviteConfig) -> Result<Option<Arc<dyn RemoteTransport>>> {
    if config.endpoint.active_url().is_none() {
        info!("Remote endpoint disabled — submissions are kept locally only");
        return Ok(None);
    }
    let transport = HttpTransport::new(&config.endpoint).context("Failed to build HTTP transport")?;
    Ok(Some(Arc::new(transport)))
}

fn build_pipeline(
    config: &InviteConfig,
    connectivity: Connectivity,
    cancel_token: CancellationToken,
) -> Result<(DeliveryPipeline, Option<Arc<dyn RemoteTransport>>)> {
    let db_path = config.storage.data_dir.join(defaults::DB_NAME);
    let store = SledStore::open(&db_path).with_context(|| {
        format!(
            "Failed to open submission database at {} (is another instance running?)",
            db_path.display()
        )
    })?;

    let mut pipeline = DeliveryPipeline::new(Arc::new(store), PipelineSettings::from_config(config))
        .context("Failed to load retry queue")?
        .with_connectivity(connectivity)
        .with_shutdown(cancel_token);

    let transport = build_transport(config)?;
    if let Some(transport) = &transport {
        pipeline = pipeline.with_transport(transport.clone());
    }
    if let Some(analytics) = TracingAnalytics::from_config(&config.analytics) {
        pipeline = pipeline.with_analytics(Arc::new(analytics));
    }
    Ok((pipeline, transport))
}

// ============================================================================
// Task Spawning
// ============================================================================

fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

fn spawn_probe(
    task_set: &mut JoinSet<Result<TaskName>>,
    connectivity: Connectivity,
    transport: Arc<dyn RemoteTransport>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!(interval_secs = interval.as_secs(), "[ConnectivityProbe] Task starting");
        run_probe(connectivity, transport, interval, cancel_token).await;
        Ok(TaskName::ConnectivityProbe)
    });
}

fn spawn_reconciler(
    task_set: &mut JoinSet<Result<TaskName>>,
    pipeline: Arc<DeliveryPipeline>,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[Reconciler] Task starting");
        run_reconciler(pipeline, cancel_token).await;
        Ok(TaskName::Reconciler)
    });
}

async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the remaining tasks observe the cancellation and finish
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn run_serve(config: &InviteConfig, cancel_token: CancellationToken) -> Result<()> {
    info!("Starting graduation-invite");

    // With a probe the link starts offline; its first success triggers a drain
    let probe_interval = config.endpoint.probe_interval_secs;
    let probing = config.endpoint.active_url().is_some() && probe_interval > 0;
    let connectivity = Connectivity::new(!probing);

    let (pipeline, transport) = build_pipeline(config, connectivity.clone(), cancel_token.clone())?;
    let pipeline = Arc::new(pipeline);

    let state = ApiState::new(
        pipeline.clone(),
        config.form.clone(),
        Invitation::from_config(&config.invitation),
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr))?;
    info!(addr = %config.server.addr, "HTTP API listening");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    spawn_reconciler(&mut task_set, pipeline, cancel_token.clone());
    if let (true, Some(transport)) = (probing, transport) {
        spawn_probe(
            &mut task_set,
            connectivity,
            transport,
            Duration::from_secs(probe_interval),
            cancel_token.clone(),
        );
    }

    run_supervisor(&mut task_set, cancel_token).await
}

async fn run_stats(config: &InviteConfig) -> Result<()> {
    let (pipeline, _) = build_pipeline(config, Connectivity::default(), CancellationToken::new())?;
    let stats = pipeline.statistics().await.context("Failed to read statistics")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_export(config: &InviteConfig, out: Option<PathBuf>) -> Result<()> {
    let (pipeline, _) = build_pipeline(config, Connectivity::default(), CancellationToken::new())?;
    let csv = pipeline.export_csv().context("Failed to export submissions")?;
    if csv.is_empty() {
        info!("Submission log is empty, nothing to export");
        return Ok(());
    }

    let out = out.unwrap_or_else(|| PathBuf::from(export_file_name(chrono::Local::now().date_naive())));
    if out.as_os_str() == "-" {
        println!("{csv}");
    } else {
        std::fs::write(&out, csv).with_context(|| format!("Failed to write {}", out.display()))?;
        info!(path = %out.display(), "Submissions exported");
    }
    Ok(())
}

async fn run_drain(config: &InviteConfig) -> Result<()> {
    let (pipeline, _) = build_pipeline(config, Connectivity::default(), CancellationToken::new())?;
    if !pipeline.remote_enabled() {
        anyhow::bail!("No remote endpoint configured (set [endpoint] enabled and url)");
    }
    let report = pipeline.on_reconnect().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_purge(config: &InviteConfig) -> Result<()> {
    let (pipeline, _) = build_pipeline(config, Connectivity::default(), CancellationToken::new())?;
    let removed = pipeline.purge_queue().await.context("Failed to purge retry queue")?;
    println!("Removed {removed} queued submission(s)");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    config::init(load_config(&args)?);
    let config = config::get();

    match args.command.unwrap_or(SubCommand::Serve) {
        SubCommand::Serve => {
            let cancel_token = CancellationToken::new();
            let shutdown_token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Received Ctrl+C, initiating shutdown...");
                shutdown_token.cancel();
            });
            run_serve(config, cancel_token).await
        }
        SubCommand::Stats => run_stats(config).await,
        SubCommand::Export { out } => run_export(config, out).await,
        SubCommand::Drain => run_drain(config).await,
        SubCommand::PurgeQueue => run_purge(config).await,
    }
}

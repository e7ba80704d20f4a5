//! Command-line entry point
//!
//! One invocation reconciles one lifecycle event: read the event JSON, run
//! the reconciliation pass against the configured domain, acknowledge the
//! deployment tool when the event carries stack coordinates, and exit 0 only
//! when every step succeeded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use osprey::client::{ClientConfig, HttpClusterClient};
use osprey::config::TargetConfiguration;
use osprey::event::LifecycleEvent;
use osprey::reconcile::{planned_steps, reconcile, Context};
use osprey::respond::LifecycleResponder;

#[derive(Parser)]
#[command(
    name = "osprey",
    about = "Lifecycle-driven configuration provisioner for managed OpenSearch domains",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile one lifecycle event against the target domain
    Reconcile {
        /// Path to the event JSON document, or `-` to read stdin
        #[arg(long, value_name = "PATH")]
        event: PathBuf,

        /// Print the planned steps without touching the cluster
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Reconcile { event, dry_run } => run_reconcile(&event, dry_run).await,
    }
}

async fn run_reconcile(path: &PathBuf, dry_run: bool) -> ExitCode {
    let raw = match read_event(path).await {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("failed to read event from {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    let event: LifecycleEvent = match serde_json::from_str(&raw) {
        Ok(event) => event,
        Err(e) => {
            eprintln!("event is not a valid lifecycle envelope: {e}");
            return ExitCode::FAILURE;
        }
    };

    // The configuration is pre-parsed here only to derive connection settings
    // and the log verbosity; a parse failure still flows through the pass so
    // the deployment tool receives a FAILED acknowledgment rather than a
    // hung rollout.
    let config = TargetConfiguration::from_event(&event).ok();

    init_tracing(config.as_ref().is_some_and(|c| c.tracing_enabled));
    info!(kind = %event.kind(), "processing lifecycle event");

    if dry_run {
        match &config {
            Some(config) => println!("configuration: {config:#?}"),
            None => println!("configuration: <parse failed>"),
        }
        println!("planned steps:");
        for step in planned_steps(event.kind(), config.as_ref()) {
            println!("  {step}");
        }
        return ExitCode::SUCCESS;
    }

    let client_config = config
        .as_ref()
        .map(ClientConfig::from_target)
        .unwrap_or_default();
    let client = match HttpClusterClient::new(client_config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not construct cluster client");
            return ExitCode::FAILURE;
        }
    };

    let ctx = Context::new(Arc::new(client));
    let ledger = reconcile(&event, &ctx).await;
    for record in ledger.records() {
        match &record.detail {
            Some(detail) => info!(step = %record.step, ok = record.ok, detail = %detail, "step outcome"),
            None => info!(step = %record.step, ok = record.ok, "step outcome"),
        }
    }

    match LifecycleResponder::new() {
        Ok(responder) => match responder.acknowledge(&event, &ledger).await {
            Ok(true) => info!("deployment tool acknowledged"),
            Ok(false) => info!("direct invocation, no callback to deliver"),
            // The pass outcome stands; a lost callback only means the
            // deployment tool will time the resource out on its own.
            Err(e) => warn!(error = %e, "acknowledgment delivery failed"),
        },
        Err(e) => warn!(error = %e, "could not construct responder"),
    }

    if ledger.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn read_event(path: &PathBuf) -> std::io::Result<String> {
    if path.to_str() == Some("-") {
        let mut raw = String::new();
        tokio::io::stdin().read_to_string(&mut raw).await?;
        Ok(raw)
    } else {
        tokio::fs::read_to_string(path).await
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "osprey=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();
}

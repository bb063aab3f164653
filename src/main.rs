// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use zinc::{
    config::{Cli, Command, ReconcileTarget, Settings},
    constants::{METRICS_SERVER_PATH, TOKIO_WORKER_THREADS},
    context::Context,
    lease::MemoryLeaseStore,
    metrics,
    reconcilers::{
        reconcile_all_health_checks, reconcile_all_zones, reconcile_dirty_policy_records,
        PassOutcome,
    },
    route53::{aws::AwsRoute53, Route53Client},
    state::{seed::Seed, MemoryStateStore},
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("zinc-reconciler")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();
    info!("Starting Zinc reconciler");

    let ctx = Arc::new(build_context(cli.settings).await?);

    match cli.command {
        Command::Run => run(ctx).await,
        Command::Reconcile { target } => reconcile_once(ctx, target).await,
    }
}

/// Wire the provider client, the state store and the lease store together.
async fn build_context(settings: Settings) -> Result<Context> {
    debug!("Loading AWS configuration");
    let client = Route53Client::new(
        Arc::new(AwsRoute53::from_env().await),
        settings.retry_policy(),
    );

    let state = Arc::new(MemoryStateStore::new());
    if let Some(path) = &settings.state_file {
        let seed = Seed::load(path).await?;
        let summary = seed.apply(state.as_ref()).await?;
        info!(path = %path.display(), ?summary, "Loaded desired state");
    }

    let holder = format!("zinc-{}-{:08x}", std::process::id(), rand::random::<u32>());
    debug!(holder = %holder, "Lease holder identity");
    let leases = Arc::new(MemoryLeaseStore::new(holder));

    Context::new(client, state, leases, settings)
}

/// Run one pass of `target` and exit.
async fn reconcile_once(ctx: Arc<Context>, target: ReconcileTarget) -> Result<()> {
    let failed = match target {
        ReconcileTarget::Zones => reconcile_all_zones(ctx).await?.failed,
        ReconcileTarget::HealthChecks => reconcile_all_health_checks(ctx).await?.failed,
        ReconcileTarget::PolicyRecords => match reconcile_dirty_policy_records(ctx).await? {
            PassOutcome::Completed(summary) => summary.failed,
            PassOutcome::Skipped => {
                info!("Policy record pass skipped, lease held elsewhere");
                0
            }
        },
    };
    if failed > 0 {
        anyhow::bail!("{failed} reconciliation(s) failed");
    }
    Ok(())
}

/// Run the periodic jobs and the metrics server until interrupted.
///
/// The jobs should never exit; if one does, the process exits with it.
async fn run(ctx: Arc<Context>) -> Result<()> {
    let settings = Arc::clone(&ctx.settings);

    tokio::select! {
        result = run_metrics_server(settings.metrics_bind_address) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        () = run_periodic(
            "zones",
            Duration::from_secs(settings.zone_interval_secs),
            Arc::clone(&ctx),
            |ctx| async move { reconcile_all_zones(ctx).await.map(|_| ()) },
        ) => {
            anyhow::bail!("Zone job exited unexpectedly")
        }
        () = run_periodic(
            "policy-records",
            Duration::from_secs(settings.policy_record_interval_secs),
            Arc::clone(&ctx),
            |ctx| async move { reconcile_dirty_policy_records(ctx).await.map(|_| ()) },
        ) => {
            anyhow::bail!("Policy record job exited unexpectedly")
        }
        () = run_periodic(
            "health-checks",
            Duration::from_secs(settings.health_check_job_interval_secs),
            Arc::clone(&ctx),
            |ctx| async move { reconcile_all_health_checks(ctx).await.map(|_| ()) },
        ) => {
            anyhow::bail!("Health check job exited unexpectedly")
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping");
            Ok(())
        }
    }
}

/// Run `pass` every `period`, logging failures and carrying on.
async fn run_periodic<F, Fut>(name: &'static str, period: Duration, ctx: Arc<Context>, pass: F)
where
    F: Fn(Arc<Context>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(job = name, period_secs = period.as_secs(), "Starting periodic job");
    let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        debug!(job = name, "Running pass");
        if let Err(e) = pass(Arc::clone(&ctx)).await {
            error!(job = name, error = ?e, "Pass failed");
        }
    }
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn run_metrics_server(addr: std::net::SocketAddr) -> Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;
    info!(%addr, path = METRICS_SERVER_PATH, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}

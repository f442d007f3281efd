//! `run` command implementation.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DispatcherBlueprint, EventLog, MessageSink};
use dispatcher::{
    create_sink, ChangeFeedRunner, Dispatcher, DispatcherConfig, RunSummary, RunnerOptions,
};
use event_store::memory::{MemoryEventLog, MemoryOffsetStore};
use event_store::EventStore;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::commands::load_config;
use crate::error::CliError;
use crate::seed::read_events;

/// Execute the `run` command
pub async fn run_dispatcher(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_config(&args.config)?.blueprint;

    info!(
        events_table = %blueprint.event_store.events_table,
        offsets_table = %blueprint.event_store.offsets_table,
        sink = %blueprint.sink.name,
        topic = %blueprint.sink.topic,
        commit_mode = ?blueprint.event_store.commit_mode,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    // Store handles live for the whole run
    let events = MemoryEventLog::new(
        blueprint.event_store.events_table.clone(),
        blueprint.event_store.page_size,
    );
    let offsets = MemoryOffsetStore::new(blueprint.event_store.offsets_table.clone());
    let mut feed = events.subscribe(blueprint.runner.max_batch_size).await;

    let sink = create_sink(&blueprint.sink)
        .await
        .context("Failed to create sink")?;
    let dispatcher = Dispatcher::new(
        EventStore::new(events.clone(), offsets),
        sink,
        DispatcherConfig::new(blueprint.sink.topic.clone())
            .with_commit_mode(blueprint.event_store.commit_mode),
    );

    if let Some(path) = &args.events {
        let seeded = read_events(path)?;
        events
            .append(&seeded)
            .await
            .with_context(|| format!("Failed to append events from {}", path.display()))?;
        info!(events = seeded.len(), path = %path.display(), "Events appended");
    }

    let options = RunnerOptions::from(&blueprint.runner)
        .with_idle_timeout(Duration::from_millis(args.idle_timeout_ms))
        .with_fail_fast(args.fail_fast);
    let runner = ChangeFeedRunner::new(dispatcher, options);

    let started = Instant::now();
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting dispatcher...");

    let outcome = tokio::select! {
        result = runner.run(&mut feed) => Some(result),
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping dispatcher...");
            None
        }
    };

    let dispatcher = runner.handler();
    if let Err(e) = dispatcher.sink().close().await {
        warn!(error = %e, "Failed to close sink");
    }

    if let Some(result) = outcome {
        let summary = result.context("Dispatcher run failed")?;
        info!(
            batches = summary.batches,
            failed = summary.failed,
            duration_secs = started.elapsed().as_secs_f64(),
            "Dispatcher finished"
        );
        print_run_summary(&summary, &dispatcher.metrics());

        if args.fail_fast && summary.failed > 0 {
            return Err(CliError::BatchesFailed {
                failed: summary.failed,
                batches: summary.batches,
            }
            .into());
        }
    }

    info!("CDC Dispatcher finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the corresponding branch never resolves.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_run_summary(summary: &RunSummary, counters: &dispatcher::MetricsSnapshot) {
    println!("\n{}", summary.metrics.summary());
    println!("Batches: {} ({} failed)", summary.batches, summary.failed);
    println!("Redeliveries: {}", summary.redeliveries);
    println!("Offsets committed: {}", counters.offsets_committed);
    println!("Stream failures: {}", counters.stream_failures);
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &DispatcherBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Event store:");
    println!("  Events table: {}", blueprint.event_store.events_table);
    println!("  Offsets table: {}", blueprint.event_store.offsets_table);
    println!("  Page size: {}", blueprint.event_store.page_size);
    println!("  Commit mode: {:?}", blueprint.event_store.commit_mode);
    println!("\nSink:");
    println!(
        "  {} ({:?}) -> {}",
        blueprint.sink.name, blueprint.sink.sink_type, blueprint.sink.topic
    );
    println!("\nRunner:");
    println!("  Max batch size: {}", blueprint.runner.max_batch_size);
    println!("  Max redeliveries: {}", blueprint.runner.max_redeliveries);
    println!();
}

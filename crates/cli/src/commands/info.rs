//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::DispatcherBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::commands::load_config;

/// 配置信息（用于 JSON 输出）
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    event_store: EventStoreInfo,
    sink: SinkInfo,
    runner: RunnerInfo,
}

#[derive(Serialize)]
struct EventStoreInfo {
    events_table: String,
    offsets_table: String,
    page_size: usize,
    commit_mode: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    topic: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bootstrap_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    sasl: bool,
}

#[derive(Serialize)]
struct RunnerInfo {
    max_batch_size: usize,
    max_redeliveries: u32,
    redelivery_backoff_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation_timeout_ms: Option<u64>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_config(&args.config)?.blueprint;
    let info = build_config_info(&blueprint);

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &DispatcherBlueprint) -> ConfigInfo {
    let store = &blueprint.event_store;
    let sink = &blueprint.sink;
    let runner = &blueprint.runner;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        event_store: EventStoreInfo {
            events_table: store.events_table.clone(),
            offsets_table: store.offsets_table.clone(),
            page_size: store.page_size,
            commit_mode: format!("{:?}", store.commit_mode),
        },
        sink: SinkInfo {
            name: sink.name.clone(),
            sink_type: format!("{:?}", sink.sink_type),
            topic: sink.topic.clone(),
            bootstrap_servers: sink.broker.bootstrap_servers.clone(),
            client_id: sink.broker.client_id.clone(),
            // 不输出 secret 名称本身
            sasl: sink.broker.sasl_secret_name.is_some(),
        },
        runner: RunnerInfo {
            max_batch_size: runner.max_batch_size,
            max_redeliveries: runner.max_redeliveries,
            redelivery_backoff_ms: runner.redelivery_backoff_ms,
            invocation_timeout_ms: (runner.invocation_timeout_ms > 0)
                .then_some(runner.invocation_timeout_ms),
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== CDC Dispatcher Configuration ===\n");
    println!("Version: {}", info.version);

    println!("\nEvent store:");
    println!("  Events table: {}", info.event_store.events_table);
    println!("  Offsets table: {}", info.event_store.offsets_table);
    println!("  Page size: {}", info.event_store.page_size);
    println!("  Commit mode: {}", info.event_store.commit_mode);

    println!("\nSink:");
    println!("  Name: {} ({})", info.sink.name, info.sink.sink_type);
    println!("  Topic: {}", info.sink.topic);
    if !info.sink.bootstrap_servers.is_empty() {
        println!("  Bootstrap servers: {}", info.sink.bootstrap_servers.join(","));
    }
    if let Some(ref client_id) = info.sink.client_id {
        println!("  Client id: {}", client_id);
    }
    println!("  SASL: {}", if info.sink.sasl { "enabled" } else { "disabled" });

    println!("\nRunner:");
    println!("  Max batch size: {}", info.runner.max_batch_size);
    println!("  Max redeliveries: {}", info.runner.max_redeliveries);
    println!("  Redelivery backoff: {}ms", info.runner.redelivery_backoff_ms);
    match info.runner.invocation_timeout_ms {
        Some(ms) => println!("  Invocation timeout: {}ms", ms),
        None => println!("  Invocation timeout: none"),
    }
}

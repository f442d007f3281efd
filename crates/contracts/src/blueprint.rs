//! DispatcherBlueprint - Config Loader output
//!
//! Describes the complete process configuration: event store tables,
//! downstream sink, and the change-feed runner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::CommitMode;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的 dispatcher 配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatcherBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Event log / offset store settings
    #[validate(nested)]
    pub event_store: EventStoreConfig,

    /// Downstream broker settings
    #[validate(nested)]
    pub sink: SinkConfig,

    /// Change-feed runner settings
    #[serde(default)]
    #[validate(nested)]
    pub runner: RunnerConfig,
}

/// Event log and offset store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventStoreConfig {
    /// 存放事件与 change marker 的表
    #[validate(length(min = 1, message = "events_table cannot be empty"))]
    pub events_table: String,

    /// 存放每个 stream offset 的表
    #[validate(length(min = 1, message = "offsets_table cannot be empty"))]
    pub offsets_table: String,

    /// 每页范围查询的条目数
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 10000, message = "page_size must be in 1..=10000"))]
    pub page_size: usize,

    /// Offset write-back mode
    #[serde(default)]
    pub commit_mode: CommitMode,
}

fn default_page_size() -> usize {
    100
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    pub sink_type: SinkType,

    /// Output topic every batch is addressed to
    #[validate(length(min = 1, message = "topic cannot be empty"))]
    pub topic: String,

    /// Broker connection settings
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Message broker connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub bootstrap_servers: Vec<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    /// SCRAM credentials reference; enables SASL/TLS when set
    #[serde(default)]
    pub sasl_secret_name: Option<String>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 通过 tracing 记录摘要
    Log,
    /// 以 JSON lines 追加到文件
    File,
    /// 在内存中保留批次
    Memory,
}

/// Change-feed runner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunnerConfig {
    /// Upper bound of notifications per invocation
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1, message = "max_batch_size must be >= 1"))]
    pub max_batch_size: usize,

    /// Redeliveries of a failed batch before it is given up
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,

    /// Pause between redeliveries
    #[serde(default = "default_redelivery_backoff_ms")]
    pub redelivery_backoff_ms: u64,

    /// 调用超时 (0 = 不限制)
    #[serde(default)]
    pub invocation_timeout_ms: u64,
}

fn default_max_batch_size() -> usize {
    100
}

fn default_max_redeliveries() -> u32 {
    3
}

fn default_redelivery_backoff_ms() -> u64 {
    200
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_redeliveries: default_max_redeliveries(),
            redelivery_backoff_ms: default_redelivery_backoff_ms(),
            invocation_timeout_ms: 0,
        }
    }
}

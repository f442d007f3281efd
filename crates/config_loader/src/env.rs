//! Environment overrides
//!
//! Deployment settings may come from environment variables instead of the
//! file; a set variable wins over the file value.

use std::collections::HashMap;

use contracts::DispatcherBlueprint;

pub const EVENTS_TABLE_NAME: &str = "EVENTS_TABLE_NAME";
pub const OFFSETS_TABLE_NAME: &str = "OFFSETS_TABLE_NAME";
pub const KAFKA_TOPIC_OUTPUT: &str = "KAFKA_TOPIC_OUTPUT";
pub const KAFKA_CLIENT_ID: &str = "KAFKA_CLIENT_ID";
pub const KAFKA_BOOTSTRAP_SERVERS: &str = "KAFKA_BOOTSTRAP_SERVERS";
pub const SASL_SECRET_NAME: &str = "SASL_SECRET_NAME";

/// Snapshot of environment variables
///
/// Captured once so loading is deterministic and tests never touch the
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`; empty values count as unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Apply every set override; returns the names of the variables applied.
pub fn apply_overrides(blueprint: &mut DispatcherBlueprint, env: &Environment) -> Vec<&'static str> {
    let mut applied = Vec::new();

    if let Some(value) = env.get(EVENTS_TABLE_NAME) {
        blueprint.event_store.events_table = value.to_string();
        applied.push(EVENTS_TABLE_NAME);
    }
    if let Some(value) = env.get(OFFSETS_TABLE_NAME) {
        blueprint.event_store.offsets_table = value.to_string();
        applied.push(OFFSETS_TABLE_NAME);
    }
    if let Some(value) = env.get(KAFKA_TOPIC_OUTPUT) {
        blueprint.sink.topic = value.to_string();
        applied.push(KAFKA_TOPIC_OUTPUT);
    }
    if let Some(value) = env.get(KAFKA_CLIENT_ID) {
        blueprint.sink.broker.client_id = Some(value.to_string());
        applied.push(KAFKA_CLIENT_ID);
    }
    if let Some(value) = env.get(KAFKA_BOOTSTRAP_SERVERS) {
        blueprint.sink.broker.bootstrap_servers = split_servers(value);
        applied.push(KAFKA_BOOTSTRAP_SERVERS);
    }
    if let Some(value) = env.get(SASL_SECRET_NAME) {
        blueprint.sink.broker.sasl_secret_name = Some(value.to_string());
        applied.push(SASL_SECRET_NAME);
    }

    applied
}

/// Split a comma-separated server list, dropping blanks
pub fn split_servers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|server| !server.is_empty())
        .map(String::from)
        .collect()
}

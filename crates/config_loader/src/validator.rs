//! 配置验证
//!
//! 规则：
//! - blueprint 上声明的字段约束（`validator` derive）
//! - event 表与 offset 表不能相同
//! - file sink 必须指定输出 `path`
//! - broker 地址格式为 `host:port`
//! - 配置 SASL 凭据时必须提供 bootstrap servers

use contracts::{ContractError, DispatcherBlueprint, SinkType};
use ::validator::Validate;

/// 验证 blueprint
///
/// 返回遇到的第一个错误。
pub fn validate(blueprint: &DispatcherBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))?;
    validate_tables(blueprint)?;
    validate_sink(blueprint)?;
    validate_broker(blueprint)?;
    Ok(())
}

fn validate_tables(blueprint: &DispatcherBlueprint) -> Result<(), ContractError> {
    let store = &blueprint.event_store;
    if store.events_table == store.offsets_table {
        return Err(ContractError::config_validation(
            "event_store.offsets_table",
            format!(
                "offsets must live in their own table, '{}' is the events table",
                store.offsets_table
            ),
        ));
    }
    Ok(())
}

fn validate_sink(blueprint: &DispatcherBlueprint) -> Result<(), ContractError> {
    let sink = &blueprint.sink;
    if sink.sink_type == SinkType::File {
        match sink.params.get("path") {
            Some(path) if !path.trim().is_empty() => {}
            _ => {
                return Err(ContractError::config_validation(
                    format!("sink[{}].params.path", sink.name),
                    "file sink requires a 'path' param",
                ))
            }
        }
    }
    Ok(())
}

fn validate_broker(blueprint: &DispatcherBlueprint) -> Result<(), ContractError> {
    let broker = &blueprint.sink.broker;

    for server in &broker.bootstrap_servers {
        let valid = server
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            return Err(ContractError::config_validation(
                "sink.broker.bootstrap_servers",
                format!("'{server}' is not host:port"),
            ));
        }
    }

    if broker.sasl_secret_name.is_some() && broker.bootstrap_servers.is_empty() {
        return Err(ContractError::config_validation(
            "sink.broker.sasl_secret_name",
            "SASL credentials set without bootstrap servers",
        ));
    }
    Ok(())
}

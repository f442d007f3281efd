//! Parameter references
//!
//! A setting may hold the ARN of an SSM parameter or a Secrets Manager
//! secret instead of a literal value. References are resolved once, at
//! load time, through a [`ParameterResolver`].

use contracts::{ContractError, DispatcherBlueprint};

use crate::env::{split_servers, Environment};

/// Prefix of the variables read by [`EnvParameterResolver`]
pub const PARAM_ENV_PREFIX: &str = "PARAM_";

/// A parsed parameter ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRef {
    /// `arn:aws:ssm:<region>:<account>:parameter/<name>`
    SsmParameter { name: String },
    /// `arn:aws:secretsmanager:<region>:<account>:secret:<name>`
    Secret { arn: String, name: String },
}

impl ParameterRef {
    /// Parse `value` as a parameter ARN; `None` for literal values.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(6, ':');
        let (arn, partition, service, region, account, resource) = (
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
            parts.next()?,
        );

        let region_ok = !region.is_empty()
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let account_ok = account.len() == 12 && account.chars().all(|c| c.is_ascii_digit());
        if arn != "arn" || partition != "aws" || !region_ok || !account_ok {
            return None;
        }

        match service {
            "ssm" => resource
                .strip_prefix("parameter/")
                .filter(|name| !name.is_empty())
                .map(|name| Self::SsmParameter {
                    name: name.to_string(),
                }),
            "secretsmanager" => resource
                .strip_prefix("secret:")
                .filter(|name| !name.is_empty())
                .map(|name| Self::Secret {
                    arn: value.to_string(),
                    name: name.to_string(),
                }),
            _ => None,
        }
    }

    /// Name of the parameter or secret
    pub fn name(&self) -> &str {
        match self {
            Self::SsmParameter { name } | Self::Secret { name, .. } => name,
        }
    }
}

/// Looks up the value behind a parameter reference
pub trait ParameterResolver {
    fn resolve(&self, reference: &ParameterRef) -> Result<String, ContractError>;
}

/// Resolves references from `PARAM_<NAME>` variables
///
/// `<NAME>` is the parameter or secret name upper-cased, with `/`, `-` and
/// `.` replaced by `_`; a leading separator is dropped.
#[derive(Debug, Clone, Default)]
pub struct EnvParameterResolver {
    env: Environment,
}

impl EnvParameterResolver {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Variable consulted for `name`
    pub fn variable_name(name: &str) -> String {
        let normalized: String = name
            .trim_start_matches('/')
            .chars()
            .map(|c| match c {
                '/' | '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{PARAM_ENV_PREFIX}{normalized}")
    }
}

impl ParameterResolver for EnvParameterResolver {
    fn resolve(&self, reference: &ParameterRef) -> Result<String, ContractError> {
        let variable = Self::variable_name(reference.name());
        self.env
            .get(&variable)
            .map(String::from)
            .ok_or_else(|| {
                ContractError::config_resolve(
                    reference.name(),
                    format!("no value found in {variable}"),
                )
            })
    }
}

/// Resolve `value` if it is a reference, otherwise return it unchanged
pub fn resolve_value(
    value: &str,
    resolver: &dyn ParameterResolver,
) -> Result<String, ContractError> {
    match ParameterRef::parse(value) {
        Some(reference) => resolver.resolve(&reference),
        None => Ok(value.to_string()),
    }
}

/// Resolve every reference-capable setting of `blueprint` in place
pub fn resolve_references(
    blueprint: &mut DispatcherBlueprint,
    resolver: &dyn ParameterResolver,
) -> Result<(), ContractError> {
    let store = &mut blueprint.event_store;
    store.events_table = resolve_value(&store.events_table, resolver)?;
    store.offsets_table = resolve_value(&store.offsets_table, resolver)?;

    let sink = &mut blueprint.sink;
    sink.topic = resolve_value(&sink.topic, resolver)?;

    let broker = &mut sink.broker;
    if let Some(client_id) = broker.client_id.take() {
        broker.client_id = Some(resolve_value(&client_id, resolver)?);
    }
    if let Some(secret) = broker.sasl_secret_name.take() {
        broker.sasl_secret_name = Some(resolve_value(&secret, resolver)?);
    }

    // A resolved server entry may itself be a comma-separated list
    let mut servers = Vec::with_capacity(broker.bootstrap_servers.len());
    for server in &broker.bootstrap_servers {
        servers.extend(split_servers(&resolve_value(server, resolver)?));
    }
    broker.bootstrap_servers = servers;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSM_ARN: &str = "arn:aws:ssm:eu-west-1:123456789012:parameter/dispatcher/topic";
    const SECRET_ARN: &str =
        "arn:aws:secretsmanager:eu-west-1:123456789012:secret:AmazonMSK_creds-AbCdEf";

    #[test]
    fn test_parse_ssm_parameter() {
        assert_eq!(
            ParameterRef::parse(SSM_ARN),
            Some(ParameterRef::SsmParameter {
                name: "dispatcher/topic".into()
            })
        );
    }

    #[test]
    fn test_parse_secret() {
        let reference = ParameterRef::parse(SECRET_ARN).unwrap();
        assert_eq!(reference.name(), "AmazonMSK_creds-AbCdEf");
        assert!(matches!(reference, ParameterRef::Secret { ref arn, .. } if arn == SECRET_ARN));
    }

    #[test]
    fn test_literals_are_not_references() {
        for value in [
            "events",
            "b-1.kafka:9096",
            "arn:aws:ssm:eu-west-1:1234:parameter/x",
            "arn:aws:ssm:EU:123456789012:parameter/x",
            "arn:aws:ssm:eu-west-1:123456789012:parameter/",
            "arn:aws:s3:eu-west-1:123456789012:bucket",
        ] {
            assert_eq!(ParameterRef::parse(value), None, "{value}");
        }
    }

    #[test]
    fn test_variable_name() {
        assert_eq!(
            EnvParameterResolver::variable_name("/dispatcher/kafka.topic-out"),
            "PARAM_DISPATCHER_KAFKA_TOPIC_OUT"
        );
    }

    #[test]
    fn test_env_resolver() {
        let resolver = EnvParameterResolver::new(Environment::from_pairs([(
            "PARAM_DISPATCHER_TOPIC",
            "resolved-topic",
        )]));
        assert_eq!(resolve_value(SSM_ARN, &resolver).unwrap(), "resolved-topic");
        assert_eq!(resolve_value("plain", &resolver).unwrap(), "plain");

        let err = resolve_value(SECRET_ARN, &resolver).unwrap_err();
        assert!(matches!(err, ContractError::ConfigResolve { .. }));
        assert!(err.to_string().contains("PARAM_AMAZONMSK_CREDS_ABCDEF"));
    }
}

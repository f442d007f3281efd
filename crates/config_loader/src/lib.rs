//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply environment overrides
//! - Resolve parameter references (SSM / Secrets Manager ARNs)
//! - Validate configuration legality
//! - Generate `DispatcherBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("dispatcher.toml")).unwrap();
//! println!("Topic: {}", blueprint.sink.topic);
//! ```

mod env;
mod parser;
mod resolver;
mod validator;

pub use contracts::DispatcherBlueprint;
pub use env::{
    apply_overrides, Environment, EVENTS_TABLE_NAME, KAFKA_BOOTSTRAP_SERVERS, KAFKA_CLIENT_ID,
    KAFKA_TOPIC_OUTPUT, OFFSETS_TABLE_NAME, SASL_SECRET_NAME,
};
pub use parser::ConfigFormat;
pub use resolver::{
    resolve_references, resolve_value, EnvParameterResolver, ParameterRef, ParameterResolver,
    PARAM_ENV_PREFIX,
};

use contracts::ContractError;
use std::path::Path;

/// A loaded blueprint plus the environment overrides that shaped it
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: DispatcherBlueprint,
    pub overrides: Vec<&'static str>,
}

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path with the process environment
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Environment overrides are applied and parameter references resolved
    /// from `PARAM_*` variables before validation.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Unresolvable parameter reference
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DispatcherBlueprint, ContractError> {
        let env = Environment::from_process();
        let resolver = EnvParameterResolver::new(env.clone());
        Self::load_from_path_with(path, &env, &resolver).map(|loaded| loaded.blueprint)
    }

    /// Load configuration from file path with explicit environment and resolver
    pub fn load_from_path_with(
        path: &Path,
        env: &Environment,
        resolver: &dyn ParameterResolver,
    ) -> Result<LoadedConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str_with(&content, format, env, resolver)
    }

    /// Load configuration from string, exactly as written
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<DispatcherBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load configuration from string: parse, override, resolve, validate
    pub fn load_from_str_with(
        content: &str,
        format: ConfigFormat,
        env: &Environment,
        resolver: &dyn ParameterResolver,
    ) -> Result<LoadedConfig, ContractError> {
        let mut blueprint = parser::parse(content, format)?;
        let overrides = apply_overrides(&mut blueprint, env);
        resolve_references(&mut blueprint, resolver)?;
        validator::validate(&blueprint)?;
        Ok(LoadedConfig {
            blueprint,
            overrides,
        })
    }

    /// Serialize DispatcherBlueprint to TOML string
    pub fn to_toml(blueprint: &DispatcherBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize DispatcherBlueprint to JSON string
    pub fn to_json(blueprint: &DispatcherBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

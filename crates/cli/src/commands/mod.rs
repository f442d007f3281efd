//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_dispatcher;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, EnvParameterResolver, Environment, LoadedConfig};
use tracing::info;

use crate::error::CliError;

/// Load a configuration file with the process environment applied
pub(crate) fn load_config(path: &Path) -> Result<LoadedConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }

    let env = Environment::from_process();
    let resolver = EnvParameterResolver::new(env.clone());
    let loaded = ConfigLoader::load_from_path_with(path, &env, &resolver)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    for name in &loaded.overrides {
        info!(variable = %name, "Configuration value overridden from environment");
    }
    Ok(loaded)
}

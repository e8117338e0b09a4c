use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::storage::{DatabaseUrl, DEFAULT_DATABASE_URL};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VisitorsConfig {
    pub database: Option<String>,
    pub echo: Option<bool>,
}

/// Settings after flags, file and defaults have been merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseUrl,
    pub echo: bool,
}

/// Log filter for the CLI; a plain run leaves stderr quiet
pub fn log_filter(verbose: bool, echo: bool) -> &'static str {
    if verbose || echo {
        "debug"
    } else {
        "warn"
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<VisitorsConfig> {
    if !path.exists() {
        anyhow::bail!("config file not found at {}", path.display());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: VisitorsConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Flags win over the config file, which wins over the defaults
pub fn resolve(
    database_flag: Option<&str>,
    echo_flag: bool,
    config: Option<&VisitorsConfig>,
) -> anyhow::Result<Settings> {
    let database = database_flag
        .or_else(|| config.and_then(|c| c.database.as_deref()))
        .unwrap_or(DEFAULT_DATABASE_URL);
    let echo = echo_flag || config.and_then(|c| c.echo).unwrap_or(false);

    Ok(Settings {
        database: DatabaseUrl::parse(database)?,
        echo,
    })
}

//! Configuration loading

use anyhow::{Context, Result};
use std::path::Path;

use crate::Config;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "RELAYCAST_CONFIG_PATH";

const CWD_CONFIG: &str = "config.yaml";

/// Load and validate configuration
///
/// Config file search order:
/// 1. `explicit` (the `--config` flag, which clap also fills from `RELAYCAST_CONFIG_PATH`)
/// 2. `RELAYCAST_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. Fall back to environment variables only
///
/// An explicitly named file must exist and parse.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let config = if let Some(path) = explicit {
        if !Path::new(path).exists() {
            anyhow::bail!("config file {path} does not exist");
        }
        eprintln!("Loading config from {path}");
        Config::from_file(path).with_context(|| format!("failed to load {path}"))?
    } else if let Some(path) = discover_config_path() {
        eprintln!("Loading config from {path}");
        match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env().context("failed to load config from environment")?
            }
        }
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env().context("failed to load config from environment")?
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        anyhow::bail!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        );
    }

    Ok(config)
}

fn discover_config_path() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| Path::new(CWD_CONFIG).exists().then(|| CWD_CONFIG.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some("/nonexistent/relaycast.yaml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_explicit_file_is_validated() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "engine:\n  timeout_seconds: 0").unwrap();

        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("engine.timeout_seconds"));
    }

    #[test]
    fn test_explicit_file_loads() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "server:\n  http_port: 9090").unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.http_port, 9090);
    }
}

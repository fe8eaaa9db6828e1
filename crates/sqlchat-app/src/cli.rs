//! CLI argument definitions for the sqlchat server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use sqlchat_core::config::SqlchatConfig;

/// sqlchat - ask questions about the e-commerce dataset in plain English.
#[derive(Parser, Debug)]
#[command(name = "sqlchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// SQLite file holding the dataset and conversation log.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SQLCHAT_CONFIG env var > ~/.sqlchat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SQLCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > SQLCHAT_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.resolve_port_from(config_port, std::env::var("SQLCHAT_PORT").ok())
    }

    fn resolve_port_from(&self, config_port: u16, env_port: Option<String>) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        env_port
            .and_then(|val| val.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// Overlay CLI flags onto a config that already has file and env values.
    pub fn apply_to(&self, config: &mut SqlchatConfig) {
        config.server.port = self.resolve_port(config.server.port);
        self.apply_flags(config);
    }

    fn apply_flags(&self, config: &mut SqlchatConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(ref db) = self.database {
            config.storage.database_path = db.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".sqlchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".sqlchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}

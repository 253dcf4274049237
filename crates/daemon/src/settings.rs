//! Daemon settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`TASKBOARD_CONFIG`, default `taskboard.toml`), then `TASKBOARD_*`
//! environment variables.

use serde::Deserialize;
use std::time::Duration;
use taskboard_api_rpc::RpcServerConfig;
use taskboard_core::application::SchedulerConfig;

const DEFAULT_CONFIG_FILE: &str = "taskboard.toml";
const DEFAULT_DB_PATH: &str = "~/.taskboard/taskboard.db";
const ENV_PREFIX: &str = "TASKBOARD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub tick_interval_secs: u64,
    pub pass_deadline_secs: u64,
    pub log_format: LogFormat,
    /// Daily-rolling log files are written here when set
    pub log_dir: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let rpc = RpcServerConfig::default();
        let scheduler = SchedulerConfig::default();
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            rpc_host: rpc.host,
            rpc_port: rpc.port,
            tick_interval_secs: scheduler.tick_interval.as_secs(),
            pass_deadline_secs: scheduler.pass_deadline.as_secs(),
            log_format: LogFormat::Pretty,
            log_dir: None,
        }
    }
}

impl DaemonConfig {
    /// Load file + environment layers
    pub fn load() -> anyhow::Result<Self> {
        let file = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
        let config: DaemonConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_secs == 0 {
            anyhow::bail!("tick_interval_secs must be at least 1");
        }
        if self.pass_deadline_secs == 0 {
            anyhow::bail!("pass_deadline_secs must be at least 1");
        }
        Ok(())
    }

    /// SQLite URL with `~` expanded
    pub fn database_url(&self) -> String {
        if self.db_path.starts_with("sqlite:") {
            return self.db_path.clone();
        }
        format!("sqlite://{}", shellexpand::tilde(&self.db_path))
    }

    pub fn rpc(&self) -> RpcServerConfig {
        RpcServerConfig {
            host: self.rpc_host.clone(),
            port: self.rpc_port,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            pass_deadline: Duration::from_secs(self.pass_deadline_secs),
        }
    }
}

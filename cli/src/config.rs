use std::path::Path;
use std::time::Duration;

use engine::Validatable;
use serde::Deserialize;
use tools::toml;

/// Top-level configuration for the bridge binary (§4.F/§9), loaded from a
/// TOML file the way the teacher's `Config` is.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub hub: HubConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub server_addr: String,
    pub metrics_addr: String,
    pub is_production: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub notification_dsn: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default)]
    pub local_events: Vec<String>,
    #[serde(default = "default_loop_pause_ms")]
    pub loop_pause_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    pub addr: String,
    #[serde(default = "default_hub_path")]
    pub path: String,
    #[serde(default = "default_max_method_call_seconds")]
    pub max_method_call_seconds: u64,
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_loop_pause_ms() -> u64 {
    100
}

fn default_hub_path() -> String {
    "/ws".to_owned()
}

fn default_max_method_call_seconds() -> u64 {
    60
}

fn default_cleanup_interval_seconds() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                server_addr: "127.0.0.1:9000".to_owned(),
                metrics_addr: "127.0.0.1:9007".to_owned(),
                is_production: false,
            },
            database: DatabaseConfig {
                dsn: String::new(),
                notification_dsn: String::new(),
            },
            broker: BrokerConfig {
                local_events: Vec::new(),
                loop_pause_ms: default_loop_pause_ms(),
            },
            hub: HubConfig {
                addr: "127.0.0.1:9001".to_owned(),
                path: default_hub_path(),
                max_method_call_seconds: default_max_method_call_seconds(),
                cleanup_interval_seconds: default_cleanup_interval_seconds(),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        toml::parse_file::<Self>(path)?.validate()
    }

    pub fn validate(mut self) -> anyhow::Result<Self> {
        let configs: Vec<&mut dyn Validatable> = vec![&mut self.database, &mut self.broker, &mut self.hub];
        for cfg in configs {
            cfg.validate()?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn max_method_call_duration(&self) -> Duration {
        Duration::from_secs(self.hub.max_method_call_seconds)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.hub.cleanup_interval_seconds)
    }

    #[must_use]
    pub fn broker_loop_pause(&self) -> Duration {
        Duration::from_millis(self.broker.loop_pause_ms)
    }
}

impl Validatable for DatabaseConfig {
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.dsn.trim().is_empty() {
            anyhow::bail!("database.dsn must not be empty");
        }
        if self.notification_dsn.trim().is_empty() {
            anyhow::bail!("database.notification_dsn must not be empty");
        }
        Ok(())
    }
}

impl Validatable for BrokerConfig {
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.loop_pause_ms == 0 {
            anyhow::bail!("broker.loop_pause_ms must be greater than zero");
        }
        Ok(())
    }
}

impl Validatable for HubConfig {
    fn validate(&mut self) -> anyhow::Result<()> {
        if self.addr.trim().is_empty() {
            anyhow::bail!("hub.addr must not be empty");
        }
        if !self.path.starts_with('/') {
            anyhow::bail!("hub.path must start with '/'");
        }
        Ok(())
    }
}

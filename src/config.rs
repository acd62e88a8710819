use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{logging::LogLevel, Error, InternalResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub ticker: TickerConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Pause between two cycles of an agent.
    #[serde(default = "default_cycle_interval", with = "duration_ms")]
    pub cycle_interval: Duration,

    #[serde(default = "default_shutdown_timeout", with = "duration_ms")]
    pub shutdown_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cycle_interval: default_cycle_interval(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_tick_interval", with = "duration_ms")]
    pub tick_interval: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tick_interval: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_server_address")]
    pub server_address: String,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// Local port to bind. Any free port when absent.
    #[serde(default)]
    pub client_port: Option<u16>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_address: default_server_address(),
            server_port: default_server_port(),
            client_port: None,
        }
    }
}

impl TransportConfig {
    pub fn server_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    pub fn bind_endpoint(&self) -> String {
        format!("0.0.0.0:{}", self.client_port.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

fn default_true() -> bool {
    true
}

fn default_cycle_interval() -> Duration {
    Duration::from_millis(1)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_server_address() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    9000
}

impl SystemConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to open {:?}: {}", path.as_ref(), e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| Error::Config(format!("failed to parse {:?}: {}", path.as_ref(), e)))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> InternalResult<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Reads one top-level object of a JSON configuration document.
pub fn section<T: DeserializeOwned>(json: &str, name: &str) -> InternalResult<Option<T>> {
    let document: serde_json::Value =
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
    match document.get(name) {
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| Error::Config(format!("section {}: {}", name, e))),
        None => Ok(None),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

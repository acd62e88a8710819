use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Severity threshold. `Fatal` maps onto tracing's ERROR level; fatal
/// records carry a `fatal = true` field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
    None,
}

impl LogLevel {
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
            LogLevel::None => LevelFilter::OFF,
        }
    }

    /// Whether a record of `severity` passes this threshold.
    pub fn enables(self, severity: LogLevel) -> bool {
        self != LogLevel::None && severity != LogLevel::None && severity >= self
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `level` when set.
/// Returns false if a subscriber was already installed.
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(level.as_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

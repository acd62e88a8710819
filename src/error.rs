use thiserror::Error;

use crate::agent::AgentError;
use crate::devices::DeviceError;
use crate::native_feature::types::FeatureError;
use crate::rule::RuleError;
use crate::transport::TransportError;
use crate::wire::WireError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),
    // remote side
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}

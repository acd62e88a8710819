use async_trait::async_trait;
use thiserror::Error;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, strum::EnumString, strum::Display, PartialOrd, Ord, Default,
)]
pub enum NativeFeatureType {
    #[default]
    Ticker,
}

#[derive(Debug, Clone, strum::Display, PartialEq)]
pub enum NativeFeatureStatus {
    Inactive,
    Active,
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Invalid configuration for {feature}: {message}")]
    InvalidConfig {
        feature: NativeFeatureType,
        message: String,
    },
}

pub type FeatureResult<T> = Result<T, FeatureError>;

/// A process-level service feeding events into agents.
#[async_trait]
pub trait NativeFeature: Send + Sync {
    fn feature_type(&self) -> NativeFeatureType;

    async fn status(&self) -> NativeFeatureStatus;

    /// Must return promptly; long-running work goes to a spawned task that
    /// watches for `stop`.
    async fn start(&self) -> FeatureResult<()>;

    async fn stop(&self) -> FeatureResult<()>;
}

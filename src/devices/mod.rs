//! Concrete devices built on the agent runtime.

pub mod distance;
pub mod hid;
pub mod relay;
pub mod sensor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use distance::{DistanceProbe, DistanceSensor};
pub use hid::{
    alphanumeric_display, press_button, release_button, tactile_button, AlphanumericDisplay,
    TactileButton,
};
pub use relay::{relay_actuator, Relay};
pub use sensor::{SensorMode, SensorSettings};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("digital mode {mode} is not allowed for {device}")]
    InvalidMode { device: String, mode: DigitalMode },
    #[error("invalid sensor setting: {message}")]
    InvalidSetting { message: String },
    #[error("device {device} failed: {message}")]
    Hardware { device: String, message: String },
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Electrical idle state of a digital pin.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DigitalMode {
    PullUp,
    PullDown,
    Floating,
}

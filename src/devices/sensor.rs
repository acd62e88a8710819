use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DeviceError, DeviceResult};

/// How a sensor produces readings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorMode {
    /// Reports whenever the reading changes.
    #[default]
    Auto,
    /// Reports every reading at a fixed rate.
    Periodic,
    /// Reads only when asked.
    OnRequest,
}

/// Mode and reading rate of a sensor. Setters validate their input and leave
/// the settings untouched when they reject it.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    mode: SensorMode,
    periodicity: f32,
    delay: Duration,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            mode: SensorMode::Auto,
            periodicity: 1.0,
            delay: Duration::from_millis(1000),
        }
    }
}

fn invalid(message: &str) -> DeviceError {
    DeviceError::InvalidSetting {
        message: message.to_string(),
    }
}

impl SensorSettings {
    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    /// Readings per second. Zero means no periodic readings.
    pub fn periodicity(&self) -> f32 {
        self.periodicity
    }

    /// Time between two readings, derived from the periodicity.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Switches to `Auto` or `OnRequest`, clearing the periodicity.
    /// `Periodic` needs a rate, see [`SensorSettings::set_mode_with_periodicity`].
    pub fn set_mode(&mut self, mode: SensorMode) -> DeviceResult<()> {
        if mode == SensorMode::Periodic {
            return Err(invalid("periodic mode requires a periodicity"));
        }
        self.mode = mode;
        self.periodicity = 0.0;
        Ok(())
    }

    pub fn set_mode_with_periodicity(&mut self, mode: SensorMode, periodicity: f32) -> DeviceResult<()> {
        if !periodicity.is_finite() || periodicity < 0.0 {
            return Err(invalid("periodicity must be a non-negative number"));
        }
        if periodicity == 0.0 {
            if mode == SensorMode::Periodic {
                return Err(invalid("periodic mode requires a periodicity above zero"));
            }
            self.mode = mode;
            self.periodicity = 0.0;
            return Ok(());
        }
        if mode == SensorMode::OnRequest {
            return Err(invalid("on-request mode only allows a zero periodicity"));
        }
        self.mode = mode;
        self.apply_periodicity(periodicity);
        Ok(())
    }

    /// Changes the rate within the current mode.
    pub fn set_periodicity(&mut self, periodicity: f32) -> DeviceResult<()> {
        self.set_mode_with_periodicity(self.mode, periodicity)
    }

    fn apply_periodicity(&mut self, periodicity: f32) {
        self.periodicity = periodicity;
        self.delay = Duration::from_millis((1000.0 / periodicity) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SensorSettings::default();
        assert_eq!(settings.mode(), SensorMode::Auto);
        assert_eq!(settings.periodicity(), 1.0);
        assert_eq!(settings.delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_periodic_mode_needs_rate() {
        let mut settings = SensorSettings::default();
        assert!(settings.set_mode(SensorMode::Periodic).is_err());
        assert!(settings
            .set_mode_with_periodicity(SensorMode::Periodic, 0.0)
            .is_err());
        assert_eq!(settings, SensorSettings::default());

        settings
            .set_mode_with_periodicity(SensorMode::Periodic, 4.0)
            .unwrap();
        assert_eq!(settings.mode(), SensorMode::Periodic);
        assert_eq!(settings.delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_sub_hertz_periodicity() {
        let mut settings = SensorSettings::default();
        settings.set_periodicity(0.5).unwrap();
        assert_eq!(settings.delay(), Duration::from_millis(2000));
    }

    #[test]
    fn test_negative_and_nan_rejected() {
        let mut settings = SensorSettings::default();
        assert!(settings.set_periodicity(-1.0).is_err());
        assert!(settings.set_periodicity(f32::NAN).is_err());
        assert_eq!(settings, SensorSettings::default());
    }

    #[test]
    fn test_on_request_rejects_rate() {
        let mut settings = SensorSettings::default();
        settings.set_mode(SensorMode::OnRequest).unwrap();
        assert_eq!(settings.periodicity(), 0.0);
        assert!(settings.set_periodicity(2.0).is_err());
        assert_eq!(settings.mode(), SensorMode::OnRequest);
    }

    #[test]
    fn test_periodic_rejects_zero_rate() {
        let mut settings = SensorSettings::default();
        settings
            .set_mode_with_periodicity(SensorMode::Periodic, 10.0)
            .unwrap();
        assert!(settings.set_periodicity(0.0).is_err());
        assert_eq!(settings.periodicity(), 10.0);
    }
}

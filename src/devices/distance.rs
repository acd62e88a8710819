use std::time::Instant;

use tracing::trace;

use crate::{
    agent::{AgentBehavior, AgentContext, AgentResult},
    event::{DistanceUnit, Event, EventPayload, EventType},
    rule::{RuleError, SimpleRule},
};

use super::{DeviceResult, SensorMode, SensorSettings};

/// Raw distance source, e.g. an ultrasonic module or a simulation.
pub trait DistanceProbe: Send + 'static {
    fn read(&mut self) -> DeviceResult<f64>;
}

impl<F> DistanceProbe for F
where
    F: FnMut() -> DeviceResult<f64> + Send + 'static,
{
    fn read(&mut self) -> DeviceResult<f64> {
        self()
    }
}

/// Name of the event that asks an on-request sensor for a reading.
pub const MEASURE_DISTANCE: &str = "MeasureDistance";

/// Distance sensor behavior. Readings outside `[low_limit, high_limit]`
/// are reported as `-1`.
pub struct DistanceSensor<P> {
    probe: P,
    settings: SensorSettings,
    unit: DistanceUnit,
    low_limit: f64,
    high_limit: f64,
    raw: f64,
    last_read: Option<Instant>,
    last_reported: Option<f64>,
}

impl<P: DistanceProbe> DistanceSensor<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            settings: SensorSettings::default(),
            unit: DistanceUnit::default(),
            low_limit: 0.0,
            high_limit: f64::MAX,
            raw: -1.0,
            last_read: None,
            last_reported: None,
        }
    }

    pub fn with_settings(mut self, settings: SensorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_unit(mut self, unit: DistanceUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_limits(mut self, low: f64, high: f64) -> Self {
        self.set_low_limit(low);
        self.set_high_limit(high);
        self
    }

    pub fn settings(&self) -> &SensorSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SensorSettings {
        &mut self.settings
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// Negative values clamp to zero.
    pub fn set_low_limit(&mut self, low: f64) {
        self.low_limit = low.max(0.0);
    }

    /// Non-positive values clamp to zero.
    pub fn set_high_limit(&mut self, high: f64) {
        self.high_limit = if high > 0.0 { high } else { 0.0 };
    }

    pub fn low_limit(&self) -> f64 {
        self.low_limit
    }

    pub fn high_limit(&self) -> f64 {
        self.high_limit
    }

    /// Latest reading, or `-1` if none was taken or it is out of range.
    pub fn distance(&self) -> f64 {
        if self.raw >= self.low_limit && self.raw <= self.high_limit {
            self.raw
        } else {
            -1.0
        }
    }

    /// Reads the probe now.
    pub fn measure(&mut self) -> DeviceResult<f64> {
        self.raw = self.probe.read()?;
        self.last_read = Some(Instant::now());
        Ok(self.distance())
    }

    fn reading_event(&self) -> Event {
        Event::new(EventPayload::Distance {
            distance: self.distance(),
            unit: self.unit,
        })
    }

    fn due(&self) -> bool {
        match self.last_read {
            None => true,
            Some(_) if self.settings.periodicity() == 0.0 => true,
            Some(at) => at.elapsed() >= self.settings.delay(),
        }
    }

    /// Rule answering `MeasureDistance` with a fresh `Distance` event.
    pub fn request_rule() -> SimpleRule<Self> {
        SimpleRule::<Self>::on(EventType::custom(MEASURE_DISTANCE))
            .named("measure_distance")
            .then(|cx| {
                cx.agent
                    .measure()
                    .map_err(|e| RuleError::execution("measure_distance", e.to_string()))?;
                Ok(vec![cx.agent.reading_event()])
            })
    }
}

impl<P: DistanceProbe> AgentBehavior for DistanceSensor<P> {
    fn kind(&self) -> &str {
        "DistanceSensor"
    }

    fn on_cycle_starts(&mut self, ctx: &AgentContext) -> AgentResult<()> {
        match self.settings.mode() {
            SensorMode::OnRequest => {}
            SensorMode::Auto => {
                if self.due() {
                    let distance = self.measure()?;
                    if self.last_reported != Some(distance) {
                        trace!(sensor = %ctx.name(), distance, "Distance changed");
                        self.last_reported = Some(distance);
                        ctx.trigger(self.reading_event());
                    }
                }
            }
            SensorMode::Periodic => {
                if self.due() {
                    let distance = self.measure()?;
                    self.last_reported = Some(distance);
                    ctx.trigger(self.reading_event());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::devices::DeviceError;

    fn fixed(value: f64) -> impl FnMut() -> DeviceResult<f64> + Send + 'static {
        move || Ok(value)
    }

    #[test]
    fn test_no_reading_yet() {
        let sensor = DistanceSensor::new(fixed(1.0));
        assert_eq!(sensor.distance(), -1.0);
    }

    #[test]
    fn test_limits() {
        let mut sensor = DistanceSensor::new(fixed(5.0)).with_limits(1.0, 4.0);
        assert_eq!(sensor.measure().unwrap(), -1.0);
        sensor.set_high_limit(10.0);
        assert_eq!(sensor.distance(), 5.0);
    }

    #[test]
    fn test_limit_clamping() {
        let sensor = DistanceSensor::new(fixed(0.0)).with_limits(-3.0, -1.0);
        assert_eq!(sensor.low_limit(), 0.0);
        assert_eq!(sensor.high_limit(), 0.0);
    }

    #[test]
    fn test_auto_reports_changes_only() {
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = reads.clone();
        let probe = move || -> DeviceResult<f64> {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(if n < 2 { 1.0 } else { 2.0 })
        };
        let mut settings = SensorSettings::default();
        settings.set_mode(SensorMode::Auto).unwrap();
        let mut sensor = DistanceSensor::new(probe).with_settings(settings);

        let ctx = AgentContext::detached("sonar");
        let recorder = crate::event::EventRecorder::new();
        ctx.add_listener(recorder.clone());

        for _ in 0..4 {
            sensor.on_cycle_starts(&ctx).unwrap();
        }

        assert_eq!(reads.load(Ordering::SeqCst), 4);
        let distances: Vec<f64> = recorder
            .events()
            .iter()
            .filter_map(|e| match e.payload() {
                EventPayload::Distance { distance, .. } => Some(*distance),
                _ => None,
            })
            .collect();
        assert_eq!(distances, vec![1.0, 2.0]);
    }

    #[test]
    fn test_on_request_does_not_poll() {
        let mut settings = SensorSettings::default();
        settings.set_mode(SensorMode::OnRequest).unwrap();
        let mut sensor = DistanceSensor::new(|| -> DeviceResult<f64> {
            Err(DeviceError::Hardware {
                device: "sonar".into(),
                message: "should not be read".into(),
            })
        })
        .with_settings(settings);

        let ctx = AgentContext::detached("sonar");
        sensor.on_cycle_starts(&ctx).unwrap();
    }

    #[test]
    fn test_probe_failure_is_an_error() {
        let mut sensor = DistanceSensor::new(|| -> DeviceResult<f64> {
            Err(DeviceError::Hardware {
                device: "sonar".into(),
                message: "timeout".into(),
            })
        });
        let ctx = AgentContext::detached("sonar");
        assert!(sensor.on_cycle_starts(&ctx).is_err());
    }
}

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock capture of when something happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Timestamp(SystemTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(SystemTime::now())
    }

    /// Milliseconds since the Unix epoch. Times before the epoch clamp to 0.
    pub fn as_millis(&self) -> u64 {
        self.0
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(UNIX_EPOCH + Duration::from_millis(millis))
    }

    pub fn into_inner(self) -> SystemTime {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(time)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let datetime: DateTime<Utc> = self.0.into();
        write!(f, "{}", datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl std::ops::Deref for Timestamp {
    type Target = SystemTime;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now() {
        let timestamp = Timestamp::now();
        assert!(timestamp.elapsed().unwrap().as_secs() < 1);
    }

    #[test]
    fn test_timestamp_millis() {
        let timestamp = Timestamp::from_millis(1_700_000_000_123);
        assert_eq!(timestamp.as_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_timestamp_before_epoch_clamps() {
        let timestamp = Timestamp::from(UNIX_EPOCH - Duration::from_secs(5));
        assert_eq!(timestamp.as_millis(), 0);
    }

    #[test]
    fn test_timestamp_display() {
        let timestamp = Timestamp::from_millis(0);
        assert_eq!(timestamp.to_string(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_millis(10);
        let later = Timestamp::from_millis(20);
        assert!(earlier < later);
    }

    #[test]
    fn test_timestamp_serde() {
        let timestamp = Timestamp::now();
        let serialized = serde_json::to_string(&timestamp).unwrap();
        assert!(serialized.contains("secs_since_epoch"));
        let deserialized: Timestamp = serde_json::from_str(&serialized).unwrap();
        assert_eq!(timestamp, deserialized);
    }
}

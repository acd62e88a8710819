use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::priority::EventPriority;

/// Discriminator used as the dispatch key for rules and listeners.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, strum::EnumString)]
pub enum EventType {
    Started,
    Stopped,
    PeriodicTime,
    EnableRelay,
    DisableRelay,
    RelayEnabled,
    RelayDisabled,
    Distance,
    Connected,
    Disconnected,
    ButtonPressed,
    ButtonReleased,
    DisplayText,
    ClearDisplay,
    #[strum(default)]
    Custom(String),
}

impl EventType {
    pub fn custom(name: impl Into<String>) -> Self {
        EventType::Custom(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            EventType::Started => "Started",
            EventType::Stopped => "Stopped",
            EventType::PeriodicTime => "PeriodicTime",
            EventType::EnableRelay => "EnableRelay",
            EventType::DisableRelay => "DisableRelay",
            EventType::RelayEnabled => "RelayEnabled",
            EventType::RelayDisabled => "RelayDisabled",
            EventType::Distance => "Distance",
            EventType::Connected => "Connected",
            EventType::Disconnected => "Disconnected",
            EventType::ButtonPressed => "ButtonPressed",
            EventType::ButtonReleased => "ButtonReleased",
            EventType::DisplayText => "DisplayText",
            EventType::ClearDisplay => "ClearDisplay",
            EventType::Custom(name) => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, EventType::Custom(_))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DistanceUnit {
    Mm,
    Cm,
    #[default]
    M,
    Km,
}

/// Event-specific content. The variant decides the [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    Started,
    Stopped,
    PeriodicTime {
        tick: u64,
    },
    /// Actuator command addressed to the relay named `relay`.
    EnableRelay {
        relay: String,
    },
    DisableRelay {
        relay: String,
    },
    RelayEnabled {
        relay: String,
    },
    RelayDisabled {
        relay: String,
    },
    Distance {
        distance: f64,
        #[serde(default)]
        unit: DistanceUnit,
    },
    Connected {
        peer: String,
    },
    Disconnected {
        peer: String,
    },
    ButtonPressed {
        button: String,
    },
    ButtonReleased {
        button: String,
    },
    /// Writes `text` on `row` of the display named `display`, starting at
    /// `column`. With `clear` the rest of the row is blanked.
    DisplayText {
        display: String,
        row: usize,
        column: i64,
        text: String,
        #[serde(default)]
        clear: bool,
    },
    /// Blanks one row, or the whole display when `row` is absent.
    ClearDisplay {
        display: String,
        #[serde(default)]
        row: Option<usize>,
    },
    /// Application-defined event. Encoded on the wire with `name` as its type
    /// and `fields` nested under a `fields` key.
    #[serde(skip)]
    Custom {
        name: String,
        fields: Map<String, Value>,
    },
}

impl EventPayload {
    /// Custom event. The name is never interpreted as a built-in kind:
    /// `custom("Started")` is not the lifecycle event.
    pub fn custom(name: impl Into<String>) -> Self {
        EventPayload::Custom {
            name: name.into(),
            fields: Map::new(),
        }
    }

    pub fn custom_with(name: impl Into<String>, fields: Map<String, Value>) -> Self {
        EventPayload::Custom {
            name: name.into(),
            fields,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Started => EventType::Started,
            EventPayload::Stopped => EventType::Stopped,
            EventPayload::PeriodicTime { .. } => EventType::PeriodicTime,
            EventPayload::EnableRelay { .. } => EventType::EnableRelay,
            EventPayload::DisableRelay { .. } => EventType::DisableRelay,
            EventPayload::RelayEnabled { .. } => EventType::RelayEnabled,
            EventPayload::RelayDisabled { .. } => EventType::RelayDisabled,
            EventPayload::Distance { .. } => EventType::Distance,
            EventPayload::Connected { .. } => EventType::Connected,
            EventPayload::Disconnected { .. } => EventType::Disconnected,
            EventPayload::ButtonPressed { .. } => EventType::ButtonPressed,
            EventPayload::ButtonReleased { .. } => EventType::ButtonReleased,
            EventPayload::DisplayText { .. } => EventType::DisplayText,
            EventPayload::ClearDisplay { .. } => EventType::ClearDisplay,
            EventPayload::Custom { name, .. } => EventType::Custom(name.clone()),
        }
    }

    /// Tier used when the producer does not pick one.
    pub fn default_priority(&self) -> EventPriority {
        match self {
            EventPayload::Started | EventPayload::Stopped | EventPayload::PeriodicTime { .. } => {
                EventPriority::VeryHigh
            }
            EventPayload::Connected { .. } | EventPayload::Disconnected { .. } => {
                EventPriority::VeryLow
            }
            _ => EventPriority::Medium,
        }
    }

    /// Name of the device an output command is addressed to.
    pub fn command_target(&self) -> Option<&str> {
        match self {
            EventPayload::EnableRelay { relay } | EventPayload::DisableRelay { relay } => {
                Some(relay)
            }
            EventPayload::DisplayText { display, .. } | EventPayload::ClearDisplay { display, .. } => {
                Some(display)
            }
            _ => None,
        }
    }

    pub fn custom_field(&self, key: &str) -> Option<&Value> {
        match self {
            EventPayload::Custom { fields, .. } => fields.get(key),
            _ => None,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Dispatch tier of an event. Variants are declared from most to least
/// urgent, and the derived `Ord` follows that order: `VeryHigh < VeryLow`.
/// Use [`EventPriority::ALL`] for the dispatch sequence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPriority {
    /// Lifecycle and control events.
    VeryHigh,
    High,
    /// Routine domain events.
    #[default]
    Medium,
    Low,
    /// Outbound communication events.
    VeryLow,
}

impl EventPriority {
    /// Tiers in the order every cycle drains them.
    pub const ALL: [EventPriority; 5] = [
        EventPriority::VeryHigh,
        EventPriority::High,
        EventPriority::Medium,
        EventPriority::Low,
        EventPriority::VeryLow,
    ];

    /// Position of the tier in [`EventPriority::ALL`].
    pub fn index(self) -> usize {
        match self {
            EventPriority::VeryHigh => 0,
            EventPriority::High => 1,
            EventPriority::Medium => 2,
            EventPriority::Low => 3,
            EventPriority::VeryLow => 4,
        }
    }

    pub fn is_more_urgent_than(self, other: EventPriority) -> bool {
        self.index() < other.index()
    }
}

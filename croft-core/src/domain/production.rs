//! Production event domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated production event, ready to be written by an import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub species_id: Uuid,
    pub event_type: EventType,
    pub date: chrono::DateTime<chrono::Utc>,
    pub quantity: Option<f64>,
    pub notes: Option<String>,
}

impl ProductionEvent {
    /// ISO-8601 rendering of `date` with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
    pub fn date_iso(&self) -> String {
        self.date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

/// Kind of production event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Birth,
    Death,
    MilkVolume,
    EggCount,
    Weight,
    Vaccination,
    Treatment,
    Breeding,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::Birth,
        EventType::Death,
        EventType::MilkVolume,
        EventType::EggCount,
        EventType::Weight,
        EventType::Vaccination,
        EventType::Treatment,
        EventType::Breeding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Birth => "birth",
            EventType::Death => "death",
            EventType::MilkVolume => "milk_volume",
            EventType::EggCount => "egg_count",
            EventType::Weight => "weight",
            EventType::Vaccination => "vaccination",
            EventType::Treatment => "treatment",
            EventType::Breeding => "breeding",
        }
    }

    /// Case-insensitive lookup
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lower)
    }

    /// Comma-separated list of accepted values, for error messages
    pub fn allowed_values() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate of stored events for one event type, used by investor reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_type: EventType,
    pub count: i64,
    pub quantity_total: f64,
    pub first_date: Option<chrono::DateTime<chrono::Utc>>,
    pub last_date: Option<chrono::DateTime<chrono::Utc>>,
}

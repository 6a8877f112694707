//! Station records as loaded from a game config.

use crate::event::{Action, Event, PlayAudio};
use serde::{Deserialize, Serialize};

/// Opaque station identifier, unique within one game config.
pub type StationId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    Story,
    Help,
    Choice,
}

/// A scannable content unit. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: StationId,
    #[serde(rename = "type")]
    pub kind: StationType,
    #[serde(default)]
    pub description: String,
    /// Replaces the open-station set once this station's events are dispatched.
    #[serde(default)]
    pub opens: Vec<StationId>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub help_cost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_audio_filenames: Option<Vec<String>>,
    /// Only set on the help station that doubles as the game's start trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_station_id: Option<StationId>,
}

impl Station {
    #[must_use]
    pub fn is_help(&self) -> bool {
        self.kind == StationType::Help
    }

    /// First top-level `playAudio` event, used for progressive reveal.
    #[must_use]
    pub fn first_play_audio(&self) -> Option<&PlayAudio> {
        self.events.iter().find_map(|event| match event.as_action() {
            Some(Action::PlayAudio(play)) => Some(play),
            _ => None,
        })
    }

    /// Help recordings for this station, empty when none are declared.
    #[must_use]
    pub fn help_tracks(&self) -> &[String] {
        self.help_audio_filenames.as_deref().unwrap_or_default()
    }
}

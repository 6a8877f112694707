//! Station event scripts.
//!
//! Content files describe events as JSON objects discriminated by an
//! `action` string. Parsing keeps two layers apart: [`Event`] is what a
//! content file contains (possibly an action this engine does not know yet),
//! [`Action`] is the closed set of behaviours the interpreter implements.

use crate::station::StationId;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single node of a station's event script as found in content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Known(Action),
    /// An `action` this engine has no handler for. Kept so that it can be
    /// reported and skipped at run time instead of rejecting the whole file.
    Unknown { action: String },
}

impl Event {
    /// Discriminant as it appears in content.
    #[must_use]
    pub fn action_name(&self) -> &str {
        match self {
            Self::Known(action) => action.name(),
            Self::Unknown { action } => action,
        }
    }

    #[must_use]
    pub const fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Known(action) => Some(action),
            Self::Unknown { .. } => None,
        }
    }
}

impl From<Action> for Event {
    fn from(action: Action) -> Self {
        Self::Known(action)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("action"))?;
        if Action::NAMES.contains(&action) {
            Action::deserialize(value)
                .map(Self::Known)
                .map_err(de::Error::custom)
        } else {
            Ok(Self::Unknown {
                action: action.to_owned(),
            })
        }
    }
}

/// Every behaviour the interpreter knows how to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Action {
    PlayAudio(PlayAudio),
    PlayAudioBasedOnAdHocValue(PlayAudioBasedOnAdHocValue),
    PlayBackgroundAudio(PlayBackgroundAudio),
    GoToStation {
        to_station: StationId,
    },
    OpenStation {
        to_station: StationId,
    },
    OpenStations {
        to_stations: Vec<StationId>,
    },
    ChoiceBasedOnTags(TagChoice),
    ChoiceBasedOnAbsenceOfTags(TagChoice),
    PickRandomSample {
        population: Vec<Value>,
        key: String,
    },
    PushToAdHocArray {
        key: String,
        value: Value,
    },
    SetAdHocData {
        key: String,
        value: Value,
    },
    StartTimer {
        name: String,
        time: f64,
        then: Box<Event>,
    },
    CancelTimer {
        name: String,
    },
    SwitchGotoStation {
        switch: Vec<SwitchCase>,
    },
    PowerNameChoice(PowerNameChoice),
    Noop,
}

impl Action {
    /// Content discriminants, in declaration order.
    pub const NAMES: [&'static str; 16] = [
        "playAudio",
        "playAudioBasedOnAdHocValue",
        "playBackgroundAudio",
        "goToStation",
        "openStation",
        "openStations",
        "choiceBasedOnTags",
        "choiceBasedOnAbsenceOfTags",
        "pickRandomSample",
        "pushToAdHocArray",
        "setAdHocData",
        "startTimer",
        "cancelTimer",
        "switchGotoStation",
        "powerNameChoice",
        "noop",
    ];

    #[must_use]
    pub const fn name(&self) -> &'static str {
        let index = match self {
            Self::PlayAudio(_) => 0,
            Self::PlayAudioBasedOnAdHocValue(_) => 1,
            Self::PlayBackgroundAudio(_) => 2,
            Self::GoToStation { .. } => 3,
            Self::OpenStation { .. } => 4,
            Self::OpenStations { .. } => 5,
            Self::ChoiceBasedOnTags(_) => 6,
            Self::ChoiceBasedOnAbsenceOfTags(_) => 7,
            Self::PickRandomSample { .. } => 8,
            Self::PushToAdHocArray { .. } => 9,
            Self::SetAdHocData { .. } => 10,
            Self::StartTimer { .. } => 11,
            Self::CancelTimer { .. } => 12,
            Self::SwitchGotoStation { .. } => 13,
            Self::PowerNameChoice(_) => 14,
            Self::Noop => 15,
        };
        Self::NAMES[index]
    }

    /// Events nested inside this one (`then` continuations and branches).
    #[must_use]
    pub fn children(&self) -> Vec<&Event> {
        match self {
            Self::PlayAudio(play) => play.then.as_deref().into_iter().collect(),
            Self::PlayAudioBasedOnAdHocValue(play) => play.then.as_deref().into_iter().collect(),
            Self::PlayBackgroundAudio(play) => play.then.as_deref().into_iter().collect(),
            Self::ChoiceBasedOnTags(choice) | Self::ChoiceBasedOnAbsenceOfTags(choice) => {
                vec![&*choice.event_if_present, &*choice.event_if_not_present]
            }
            Self::StartTimer { then, .. } => vec![&**then],
            _ => Vec::new(),
        }
    }

    /// Stations this event can open or jump to, not counting nested events.
    #[must_use]
    pub fn station_targets(&self) -> Vec<&str> {
        match self {
            Self::GoToStation { to_station } | Self::OpenStation { to_station } => {
                vec![to_station.as_str()]
            }
            Self::OpenStations { to_stations } => to_stations.iter().map(String::as_str).collect(),
            Self::SwitchGotoStation { switch } => switch.iter().map(SwitchCase::to_station).collect(),
            Self::PowerNameChoice(choice) => choice.station_targets(),
            _ => Vec::new(),
        }
    }
}

/// Foreground narration with an optional continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayAudio {
    /// Candidate tracks. Index 0 is the open-station ("A") narration; later
    /// entries are progressively revealed on closed scans.
    pub audio_filenames: Vec<String>,
    /// Pre-delay in seconds once the track is ready to play.
    #[serde(default)]
    pub wait: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<Event>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayAudioBasedOnAdHocValue {
    pub key: String,
    pub audio_filename_map: std::collections::BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<Event>>,
}

/// Ambient track scoped to the station that started it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayBackgroundAudio {
    pub audio_filename: String,
    #[serde(default)]
    pub wait: f64,
    #[serde(default)]
    pub cancel_on_leave: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<Event>>,
}

/// Branch on tag-set membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagChoice {
    pub tags: Vec<String>,
    pub event_if_present: Box<Event>,
    pub event_if_not_present: Box<Event>,
}

/// One row of a `switchGotoStation` routing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "condition",
    content = "parameters",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SwitchCase {
    AdHocKeysAreEqual {
        first_key: String,
        second_key: String,
        to_station: StationId,
    },
    AdHocKeysAreNotEqual {
        first_key: String,
        second_key: String,
        to_station: StationId,
    },
    /// Compares the stored value against the *key name*, not `value`.
    /// Authors are warned about this by content validation.
    AdHocKeyEquals {
        key: String,
        value: Value,
        to_station: StationId,
    },
}

impl SwitchCase {
    #[must_use]
    pub fn to_station(&self) -> &str {
        match self {
            Self::AdHocKeysAreEqual { to_station, .. }
            | Self::AdHocKeysAreNotEqual { to_station, .. }
            | Self::AdHocKeyEquals { to_station, .. } => to_station,
        }
    }
}

/// Who a power-name guess is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerNameOwner {
    User,
    Ghost,
}

/// The two-part power-name guessing puzzle.
///
/// `ghost*` fields drive the second round, where the player guesses the
/// helper ghost's name. Any ghost field left out falls back to its user
/// counterpart. A right guess always plays `onSuccessPlay`, in both rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerNameChoice {
    /// Which half of the name this station guesses (0 or 1).
    pub part: usize,
    /// The guess this station represents.
    pub value: String,
    pub on_success_open: Vec<StationId>,
    pub on_success_play: String,
    pub on_first_failure_play: String,
    pub on_second_failure_play: String,
    pub on_second_failure_go_to: StationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_on_success_open: Option<Vec<StationId>>,
    /// Accepted for content compatibility; never played.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_on_success_play: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_on_first_failure_play: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_on_second_failure_play: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_on_second_failure_go_to: Option<StationId>,
}

/// Tracks and destinations for one puzzle owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerNameScript<'a> {
    pub on_success_open: &'a [StationId],
    pub on_success_play: &'a str,
    pub on_first_failure_play: &'a str,
    pub on_second_failure_play: &'a str,
    pub on_second_failure_go_to: &'a str,
}

impl PowerNameChoice {
    #[must_use]
    pub fn script(&self, owner: PowerNameOwner) -> PowerNameScript<'_> {
        let user = PowerNameScript {
            on_success_open: &self.on_success_open,
            on_success_play: &self.on_success_play,
            on_first_failure_play: &self.on_first_failure_play,
            on_second_failure_play: &self.on_second_failure_play,
            on_second_failure_go_to: &self.on_second_failure_go_to,
        };
        match owner {
            PowerNameOwner::User => user,
            PowerNameOwner::Ghost => PowerNameScript {
                on_success_open: self
                    .ghost_on_success_open
                    .as_deref()
                    .unwrap_or(user.on_success_open),
                on_success_play: user.on_success_play,
                on_first_failure_play: self
                    .ghost_on_first_failure_play
                    .as_deref()
                    .unwrap_or(user.on_first_failure_play),
                on_second_failure_play: self
                    .ghost_on_second_failure_play
                    .as_deref()
                    .unwrap_or(user.on_second_failure_play),
                on_second_failure_go_to: self
                    .ghost_on_second_failure_go_to
                    .as_deref()
                    .unwrap_or(user.on_second_failure_go_to),
            },
        }
    }

    fn station_targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.on_success_open.iter().map(String::as_str).collect();
        targets.push(&self.on_second_failure_go_to);
        if let Some(open) = &self.ghost_on_success_open {
            targets.extend(open.iter().map(String::as_str));
        }
        if let Some(go_to) = &self.ghost_on_second_failure_go_to {
            targets.push(go_to);
        }
        targets
    }
}

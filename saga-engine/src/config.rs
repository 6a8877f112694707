//! Game configuration: the station graph plus global settings.

use crate::constants::HELP_REMAINING_MAX_TIER;
use crate::error::ConfigError;
use crate::station::{Station, StationId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Tracks that are not tied to a single station.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAudioFilenames {
    /// Played on a closed scan of a station with no further explanation.
    #[serde(default)]
    pub closed_station: String,
    /// The current station has no help recordings.
    #[serde(default)]
    pub no_help_available: String,
    /// The help budget is exhausted.
    #[serde(default)]
    pub no_help_left: String,
    /// "N uses of help remaining" announcements keyed by remaining budget.
    #[serde(default)]
    pub help_remaining: BTreeMap<u32, String>,
}

impl GlobalAudioFilenames {
    /// Announcement for a post-debit budget. Budgets above the table's top
    /// tier use the top tier.
    #[must_use]
    pub fn help_remaining_for(&self, remaining: u32) -> Option<&str> {
        let tier = remaining.min(HELP_REMAINING_MAX_TIER);
        self.help_remaining.get(&tier).map(String::as_str)
    }
}

/// A loaded game. Read-only for the lifetime of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub name: String,
    /// Every scannable code starts with this prefix.
    #[serde(default)]
    pub base_url: String,
    pub stations: HashMap<StationId, Station>,
    #[serde(default)]
    pub open_stations_at_start: Vec<StationId>,
    /// Separator between a station id and a choice suffix in scanned codes.
    #[serde(default)]
    pub choice_infix: String,
    #[serde(default)]
    pub audio_file_url_base: String,
    #[serde(default)]
    pub global_audio_filenames: GlobalAudioFilenames,
}

impl GameConfig {
    /// Parse a config from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Parse and validate a config, rejecting it when validation reports any
    /// issue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] when the station graph is inconsistent.
    pub fn from_json_validated(json: &str) -> Result<Self, ConfigError> {
        let config = Self::from_json(json)?;
        let issues = crate::validate::validate_config(&config);
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    #[must_use]
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    /// Resolve an audio filename to a fetchable URL.
    #[must_use]
    pub fn audio_url(&self, filename: &str) -> String {
        join_paths(&[&self.audio_file_url_base, filename])
    }
}

/// Join path fragments with single slashes. A leading slash on the first
/// fragment and a trailing slash on the last are kept.
#[must_use]
pub fn join_paths(parts: &[&str]) -> String {
    let parts: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    let last = parts.len().saturating_sub(1);
    let mut joined = String::new();
    for (index, part) in parts.iter().enumerate() {
        let mut piece = *part;
        if index > 0 {
            piece = piece.trim_start_matches('/');
        }
        if index < last {
            piece = piece.trim_end_matches('/');
        }
        if index > 0 {
            joined.push('/');
        }
        joined.push_str(piece);
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "Sample",
        "baseUrl": "https://saga.example/s/",
        "choiceInfix": "-choice-",
        "audioFileUrlBase": "/audio/",
        "openStationsAtStart": ["help"],
        "globalAudioFilenames": {
            "closedStation": "closed.mp3",
            "noHelpAvailable": "no-help.mp3",
            "noHelpLeft": "no-help-left.mp3",
            "helpRemaining": { "0": "left-0.mp3", "1": "left-1.mp3", "2": "left-2.mp3", "3": "left-3.mp3" }
        },
        "stations": {
            "help": { "id": "help", "type": "help", "helpCost": 1, "startStationId": "intro" },
            "intro": { "id": "intro", "type": "story", "opens": ["help"] }
        }
    }"#;

    #[test]
    fn parses_config_and_looks_up_stations() {
        let config = GameConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.name, "Sample");
        assert_eq!(config.stations.len(), 2);
        assert!(config.station("intro").is_some());
        assert!(config.station("missing").is_none());
        assert_eq!(config.open_stations_at_start, vec!["help"]);
    }

    #[test]
    fn validated_parse_accepts_consistent_config() {
        assert!(GameConfig::from_json_validated(SAMPLE).is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn help_remaining_clamps_to_top_tier() {
        let config = GameConfig::from_json(SAMPLE).unwrap();
        let globals = &config.global_audio_filenames;
        assert_eq!(globals.help_remaining_for(0), Some("left-0.mp3"));
        assert_eq!(globals.help_remaining_for(2), Some("left-2.mp3"));
        assert_eq!(globals.help_remaining_for(9), Some("left-3.mp3"));
    }

    #[test]
    fn audio_url_joins_base_and_filename() {
        let config = GameConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.audio_url("intro.mp3"), "/audio/intro.mp3");
        assert_eq!(config.audio_url("/intro.mp3"), "/audio/intro.mp3");
    }

    #[test]
    fn join_paths_collapses_duplicate_slashes() {
        assert_eq!(join_paths(&["https://cdn/", "/a/", "b.mp3"]), "https://cdn/a/b.mp3");
        assert_eq!(join_paths(&["", "b.mp3"]), "b.mp3");
        assert_eq!(join_paths(&["base"]), "base");
    }
}

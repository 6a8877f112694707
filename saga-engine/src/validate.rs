//! Static checks over a game config.
//!
//! The runner tolerates broken content by logging and skipping. These checks
//! find the same defects ahead of time, so authors can fix them before anyone
//! walks the route.

use crate::config::GameConfig;
use crate::event::{Action, Event, SwitchCase};
use crate::station::{Station, StationType};
use thiserror::Error;

/// One defect found in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("{origin} refers to unknown station {target}")]
    UnknownStation { origin: String, target: String },
    #[error("station stored under key {key} declares id {id}")]
    StationKeyMismatch { key: String, id: String },
    #[error("station {station} has a playAudio event without filenames")]
    EmptyPlayAudio { station: String },
    #[error("help station {station} costs nothing")]
    FreeHelpStation { station: String },
    #[error("station {station} uses unknown action {action:?}")]
    UnknownAction { station: String, action: String },
    #[error(
        "station {station}: adHocKeyEquals on {key} compares against the key name, not {value}"
    )]
    KeyEqualsIgnoresValue {
        station: String,
        key: String,
        value: String,
    },
}

/// Run every check. Issues come back in station id order.
#[must_use]
pub fn validate_config(config: &GameConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for target in &config.open_stations_at_start {
        check_target(config, "openStationsAtStart", target, &mut issues);
    }

    let mut keys: Vec<&String> = config.stations.keys().collect();
    keys.sort();
    for key in keys {
        let Some(station) = config.stations.get(key) else {
            continue;
        };
        if *key != station.id {
            issues.push(ValidationIssue::StationKeyMismatch {
                key: key.clone(),
                id: station.id.clone(),
            });
        }
        validate_station(config, station, &mut issues);
    }
    issues
}

fn validate_station(config: &GameConfig, station: &Station, issues: &mut Vec<ValidationIssue>) {
    let origin = format!("station {}", station.id);
    for target in &station.opens {
        check_target(config, &origin, target, issues);
    }
    if let Some(start) = &station.start_station_id {
        check_target(config, &origin, start, issues);
    }
    if station.kind == StationType::Help && station.help_cost == 0 {
        issues.push(ValidationIssue::FreeHelpStation {
            station: station.id.clone(),
        });
    }
    for event in &station.events {
        validate_event(config, station, event, issues);
    }
}

fn validate_event(
    config: &GameConfig,
    station: &Station,
    event: &Event,
    issues: &mut Vec<ValidationIssue>,
) {
    let action = match event {
        Event::Known(action) => action,
        Event::Unknown { action } => {
            issues.push(ValidationIssue::UnknownAction {
                station: station.id.clone(),
                action: action.clone(),
            });
            return;
        }
    };

    let origin = format!("{} in station {}", action.name(), station.id);
    for target in action.station_targets() {
        check_target(config, &origin, target, issues);
    }

    match action {
        Action::PlayAudio(play) if play.audio_filenames.is_empty() => {
            issues.push(ValidationIssue::EmptyPlayAudio {
                station: station.id.clone(),
            });
        }
        Action::SwitchGotoStation { switch } => {
            for case in switch {
                if let SwitchCase::AdHocKeyEquals { key, value, .. } = case
                    && value.as_str() != Some(key.as_str())
                {
                    issues.push(ValidationIssue::KeyEqualsIgnoresValue {
                        station: station.id.clone(),
                        key: key.clone(),
                        value: value.to_string(),
                    });
                }
            }
        }
        _ => {}
    }

    for child in action.children() {
        validate_event(config, station, child, issues);
    }
}

fn check_target(
    config: &GameConfig,
    origin: &str,
    target: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if config.station(target).is_none() {
        issues.push(ValidationIssue::UnknownStation {
            origin: origin.to_owned(),
            target: target.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(stations: serde_json::Value) -> GameConfig {
        serde_json::from_value(json!({ "stations": stations })).unwrap()
    }

    #[test]
    fn consistent_graph_has_no_issues() {
        let config = config(json!({
            "a": { "id": "a", "type": "story", "opens": ["b"],
                   "events": [{ "action": "playAudio", "audioFilenames": ["a.mp3"] }] },
            "b": { "id": "b", "type": "help", "helpCost": 1 }
        }));
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn nested_references_are_followed() {
        let config = config(json!({
            "a": { "id": "a", "type": "story", "events": [{
                "action": "playAudio",
                "audioFilenames": ["a.mp3"],
                "then": {
                    "action": "choiceBasedOnTags",
                    "tags": ["t"],
                    "eventIfPresent": { "action": "goToStation", "toStation": "ghost" },
                    "eventIfNotPresent": { "action": "noop" }
                }
            }] }
        }));
        assert_eq!(
            validate_config(&config),
            vec![ValidationIssue::UnknownStation {
                origin: String::from("goToStation in station a"),
                target: String::from("ghost"),
            }]
        );
    }

    #[test]
    fn reports_each_kind_of_defect() {
        let config = config(json!({
            "a": { "id": "a", "type": "story", "opens": ["zz"], "events": [
                { "action": "playAudio", "audioFilenames": [] },
                { "action": "dance" },
                { "action": "switchGotoStation", "switch": [{
                    "condition": "adHocKeyEquals",
                    "parameters": { "key": "door", "value": "open", "toStation": "a" }
                }] }
            ] },
            "h": { "id": "help", "type": "help" }
        }));
        let issues = validate_config(&config);
        assert_eq!(issues.len(), 6);
        assert!(issues.contains(&ValidationIssue::EmptyPlayAudio {
            station: String::from("a")
        }));
        assert!(issues.contains(&ValidationIssue::UnknownAction {
            station: String::from("a"),
            action: String::from("dance"),
        }));
        assert!(issues.contains(&ValidationIssue::StationKeyMismatch {
            key: String::from("h"),
            id: String::from("help"),
        }));
        assert!(issues.contains(&ValidationIssue::FreeHelpStation {
            station: String::from("help")
        }));
        assert!(issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::KeyEqualsIgnoresValue { key, .. } if key == "door"
        )));
        assert!(issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::UnknownStation { target, .. } if target == "zz"
        )));
    }

    #[test]
    fn start_list_is_checked() {
        let config: GameConfig = serde_json::from_value(json!({
            "openStationsAtStart": ["nowhere"],
            "stations": {}
        }))
        .unwrap();
        let issues = validate_config(&config);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].to_string().contains("nowhere"));
    }
}

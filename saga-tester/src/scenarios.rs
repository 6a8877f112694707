//! Scripted scan scenarios.
//!
//! A scenario is a list of player actions followed by expectations about the
//! resulting session. Scenarios are plain serde data, so content authors can
//! keep their own in a JSON file next to a game config. The built-in catalog
//! targets the bundled demo game.

use anyhow::{Context, Result};
use saga_engine::{AudioStatus, SessionOptions, TrackProfile, UserState};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;

/// Virtual seconds to let narration chains finish after a scan.
pub const DEFAULT_SETTLE: f64 = 6.0;

const fn default_settle() -> f64 {
    DEFAULT_SETTLE
}

/// How the simulated backend should treat one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behaviour", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TrackSpec {
    Plays { duration: f64 },
    StallsAfter { duration: f64, offset: f64 },
    NeverLoads,
    Fails { message: String },
}

impl TrackSpec {
    pub fn profile(&self) -> TrackProfile {
        match self {
            Self::Plays { duration } => TrackProfile::plays(*duration),
            Self::StallsAfter { duration, offset } => TrackProfile::stalls_after(*duration, *offset),
            Self::NeverLoads => TrackProfile::never_loads(),
            Self::Fails { message } => TrackProfile::fails(message),
        }
    }
}

/// One player or operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    /// Scan a code exactly as printed.
    Scan {
        code: String,
        #[serde(default = "default_settle")]
        settle: f64,
    },
    /// Run a station by id, skipping code resolution.
    Visit {
        station: String,
        #[serde(default = "default_settle")]
        settle: f64,
    },
    Wait { seconds: f64 },
    SetAdHoc { key: String, value: Value },
    /// Serialize the session and restore it, like a page reload.
    Reload,
    Wipe,
    RetryStalled,
    /// Change how the backend treats a file from its next load on.
    SetTrack { filename: String, track: TrackSpec },
}

/// A check against the finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Expectation {
    CurrentStation { station: Option<String> },
    OpenStations { stations: Vec<String> },
    HelpAvailable { count: u32 },
    PlayedForeground { filenames: Vec<String> },
    BackgroundPlayed { filename: String },
    VisitCounts { station: String, open: u32, closed: u32 },
    AdHoc { key: String, value: Value },
    HasTag { tag: String },
    AudioTimeout { filename: Option<String> },
}

/// What expectations are checked against.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub user: UserState,
    pub audio: AudioStatus,
    /// URLs started on background channels.
    pub background_plays: Vec<String>,
}

impl Expectation {
    /// # Errors
    ///
    /// Returns a description of the mismatch.
    pub fn check(&self, run: &RunOutcome) -> Result<(), String> {
        match self {
            Self::CurrentStation { station } => {
                compare("current station", station, &run.user.current_station)
            }
            Self::OpenStations { stations } => {
                compare("open stations", stations, &run.user.open_stations)
            }
            Self::HelpAvailable { count } => {
                compare("help available", count, &run.user.help_available)
            }
            Self::PlayedForeground { filenames } => compare(
                "played foreground audio",
                filenames,
                &run.audio.played_foreground_audio,
            ),
            Self::BackgroundPlayed { filename } => {
                if run.background_plays.iter().any(|url| url.ends_with(filename.as_str())) {
                    Ok(())
                } else {
                    Err(format!(
                        "background audio {filename} never played (played {:?})",
                        run.background_plays
                    ))
                }
            }
            Self::VisitCounts {
                station,
                open,
                closed,
            } => {
                let counts = run.user.visit_counts(station);
                compare(
                    &format!("visit counts for {station}"),
                    &(*open, *closed),
                    &(counts.open, counts.closed),
                )
            }
            Self::AdHoc { key, value } => {
                compare(&format!("adHocData.{key}"), &Some(value), &run.user.ad_hoc(key))
            }
            Self::HasTag { tag } => {
                if run.user.tags.contains(tag) {
                    Ok(())
                } else {
                    Err(format!("tag {tag} missing (have {:?})", run.user.tags))
                }
            }
            Self::AudioTimeout { filename } => {
                let actual = run
                    .audio
                    .audio_timeout
                    .as_ref()
                    .map(|timeout| timeout.audio_filename.clone());
                compare("audio timeout", filename, &actual)
            }
        }
    }
}

fn compare<T: PartialEq + std::fmt::Debug>(what: &str, expected: &T, actual: &T) -> Result<(), String> {
    if expected == actual {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: SessionOptions,
    #[serde(default)]
    pub tracks: BTreeMap<String, TrackSpec>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub expectations: Vec<Expectation>,
}

/// Read a JSON array of scenarios.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_scenario_file(path: &Path) -> Result<Vec<Scenario>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn visit(station: &str) -> Step {
    Step::Visit {
        station: station.to_string(),
        settle: DEFAULT_SETTLE,
    }
}

fn scan(code: &str) -> Step {
    Step::Scan {
        code: code.to_string(),
        settle: DEFAULT_SETTLE,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn played(filenames: &[&str]) -> Expectation {
    Expectation::PlayedForeground {
        filenames: strings(filenames),
    }
}

fn current(station: &str) -> Expectation {
    Expectation::CurrentStation {
        station: Some(station.to_string()),
    }
}

fn scenario(name: &str, description: &str, steps: Vec<Step>, expectations: Vec<Expectation>) -> Scenario {
    Scenario {
        name: name.to_string(),
        description: description.to_string(),
        options: SessionOptions::default(),
        tracks: BTreeMap::new(),
        steps,
        expectations,
    }
}

/// Steps that bring a demo game player to the raven's question.
fn to_riddle() -> Vec<Step> {
    vec![visit("start"), visit("gate"), visit("riddle")]
}

/// Built-in scenarios for the bundled demo game.
pub fn catalog() -> Vec<Scenario> {
    let mut stall = scenario(
        "stall-recovery",
        "Stalled narration is recorded and resumed from its offset",
        vec![visit("start"), Step::Wait { seconds: 15.0 }],
        vec![Expectation::AudioTimeout {
            filename: Some("intro-a.mp3".to_string()),
        }],
    );
    stall.tracks.insert(
        "intro-a.mp3".to_string(),
        TrackSpec::StallsAfter {
            duration: 4.0,
            offset: 1.5,
        },
    );

    let mut retried = stall.clone();
    retried.name = "stall-retry".to_string();
    retried.description = "Retrying a stall resumes the narration once the file loads".to_string();
    retried.steps.extend([
        Step::SetTrack {
            filename: "intro-a.mp3".to_string(),
            track: TrackSpec::Plays { duration: 4.0 },
        },
        Step::RetryStalled,
    ]);
    retried.expectations = vec![
        Expectation::AudioTimeout { filename: None },
        played(&["intro-a.mp3"]),
    ];

    let mut name_steps = to_riddle();
    name_steps.extend([
        scan("https://saga.example/s/-choice-yes"),
        Step::SetAdHoc {
            key: "powerName".to_string(),
            value: json!(["eld", "varg"]),
        },
        visit("name-first-sol"),
        visit("name-first-sol"),
        visit("name-first-eld"),
        visit("name-second-varg"),
    ]);

    vec![
        scenario(
            "smoke",
            "First scan of the start sign runs the intro",
            vec![visit("start")],
            vec![
                current("intro"),
                Expectation::OpenStations {
                    stations: strings(&["gate"]),
                },
                played(&["intro-a.mp3"]),
                Expectation::BackgroundPlayed {
                    filename: "wind.mp3".to_string(),
                },
                Expectation::HasTag {
                    tag: "arrived".to_string(),
                },
            ],
        ),
        scenario(
            "progressive-reveal",
            "Repeat scans step through the explanations, then repeat the last",
            vec![visit("start"), visit("intro"), visit("intro"), visit("intro")],
            vec![
                played(&["intro-a.mp3", "intro-b.mp3", "intro-c.mp3", "intro-c.mp3"]),
                Expectation::VisitCounts {
                    station: "intro".to_string(),
                    open: 1,
                    closed: 3,
                },
            ],
        ),
        scenario(
            "help-budget",
            "New help costs budget, heard help repeats for free",
            vec![visit("start"), visit("start"), visit("start"), visit("start")],
            vec![
                Expectation::HelpAvailable { count: 1 },
                played(&[
                    "intro-a.mp3",
                    "intro-help-1.mp3",
                    "help-left-2.mp3",
                    "intro-help-2.mp3",
                    "help-left-1.mp3",
                    "intro-help-2.mp3",
                    "help-left-1.mp3",
                ]),
            ],
        ),
        scenario(
            "choice-yes",
            "Answering yes routes through the crossroads to the well",
            {
                let mut steps = to_riddle();
                steps.push(scan("https://saga.example/s/-choice-yes"));
                steps
            },
            vec![
                current("well"),
                Expectation::OpenStations {
                    stations: strings(&["name-first-eld", "name-first-sol"]),
                },
                Expectation::AdHoc {
                    key: "answer".to_string(),
                    value: json!("yes"),
                },
            ],
        ),
        scenario(
            "choice-no",
            "Answering no routes to the cursed bridge",
            {
                let mut steps = to_riddle();
                steps.push(scan("https://saga.example/s/-choice-no"));
                steps
            },
            vec![
                current("bridge"),
                Expectation::OpenStations {
                    stations: strings(&["well"]),
                },
                Expectation::HasTag {
                    tag: "cursed".to_string(),
                },
            ],
        ),
        scenario(
            "power-name",
            "Two wrong guesses send the player back, the right name reaches the finale",
            name_steps,
            vec![
                current("finale"),
                Expectation::AdHoc {
                    key: "userHasSetPowerName".to_string(),
                    value: json!(true),
                },
                Expectation::AdHoc {
                    key: "attemptsAtPickingTheRightPowerName".to_string(),
                    value: json!(0),
                },
            ],
        ),
        scenario(
            "gate-timer",
            "Lingering at the gate triggers the reminder",
            vec![visit("start"), visit("gate"), Step::Wait { seconds: 130.0 }],
            vec![Expectation::BackgroundPlayed {
                filename: "reminder.mp3".to_string(),
            }],
        ),
        stall,
        retried,
        scenario(
            "reload",
            "Progress survives a save and restore",
            vec![visit("start"), visit("intro"), Step::Reload, visit("intro")],
            vec![played(&["intro-a.mp3", "intro-b.mp3", "intro-c.mp3"])],
        ),
        scenario(
            "wipe",
            "Wiping history starts the game over",
            vec![visit("start"), visit("gate"), Step::Wipe],
            vec![
                Expectation::CurrentStation { station: None },
                Expectation::OpenStations {
                    stations: strings(&["start"]),
                },
                Expectation::HelpAvailable { count: 3 },
            ],
        ),
    ]
}

pub fn list_scenarios() -> Vec<(String, String)> {
    catalog()
        .into_iter()
        .map(|scenario| (scenario.name, scenario.description))
        .collect()
}

pub fn get_scenario(name: &str) -> Option<Scenario> {
    catalog()
        .into_iter()
        .find(|scenario| scenario.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique() {
        let names: Vec<String> = list_scenarios().into_iter().map(|(name, _)| name).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert!(get_scenario("SMOKE").is_some());
        assert!(get_scenario("nope").is_none());
    }

    #[test]
    fn scenarios_parse_from_json() {
        let scenarios: Vec<Scenario> = serde_json::from_value(json!([{
            "name": "custom",
            "options": { "helpAvailable": 1 },
            "tracks": { "a.mp3": { "behaviour": "stallsAfter", "duration": 3.0, "offset": 1.0 } },
            "steps": [
                { "step": "scan", "code": "https://saga.example/s/start" },
                { "step": "visit", "station": "gate", "settle": 0.5 },
                { "step": "wait", "seconds": 2 },
                { "step": "reload" }
            ],
            "expectations": [
                { "expect": "currentStation", "station": "gate" },
                { "expect": "visitCounts", "station": "gate", "open": 1, "closed": 0 }
            ]
        }]))
        .unwrap();
        let custom = &scenarios[0];
        assert_eq!(custom.options.help_available, 1);
        assert_eq!(
            custom.steps[0],
            Step::Scan {
                code: "https://saga.example/s/start".to_string(),
                settle: DEFAULT_SETTLE
            }
        );
        assert_eq!(custom.tracks["a.mp3"].profile(), TrackProfile::stalls_after(3.0, 1.0));
        assert_eq!(custom.expectations.len(), 2);
    }

    #[test]
    fn expectations_describe_mismatches() {
        let mut user = UserState::new(2, vec!["gate".to_string()]);
        user.record_visit("gate", &["arrived".to_string()]);
        let run = RunOutcome {
            user,
            audio: AudioStatus::default(),
            background_plays: vec!["/audio/wind.mp3".to_string()],
        };

        assert!(Expectation::HelpAvailable { count: 2 }.check(&run).is_ok());
        assert!(
            Expectation::BackgroundPlayed {
                filename: "wind.mp3".to_string()
            }
            .check(&run)
            .is_ok()
        );
        let err = Expectation::HasTag {
            tag: "cursed".to_string(),
        }
        .check(&run)
        .unwrap_err();
        assert!(err.contains("cursed"));
        let err = Expectation::VisitCounts {
            station: "gate".to_string(),
            open: 2,
            closed: 0,
        }
        .check(&run)
        .unwrap_err();
        assert!(err.contains("expected (2, 0), got (1, 0)"));
    }
}

//! Per-player progress: the Visit & Progress Tracker.
//!
//! Every mutation the station runner and event interpreter perform on player
//! progress goes through a method here, so the invariants on visit counts and
//! the help budget are enforced in one place.

use crate::constants::DEFAULT_HELP_AVAILABLE;
use crate::station::StationId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Open and closed scan tallies for one station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitCounts {
    pub open: u32,
    pub closed: u32,
}

impl VisitCounts {
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.open + self.closed
    }
}

/// Whether a station was open when it was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    Open,
    Closed,
}

impl VisitStatus {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Identifier of a scheduled `startTimer` task.
pub type TimerId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    /// Open visits only, in scan order.
    #[serde(default)]
    pub stations_visited: Vec<StationId>,
    #[serde(default)]
    pub station_visit_counts: BTreeMap<StationId, VisitCounts>,
    #[serde(default)]
    pub current_station: Option<StationId>,
    #[serde(default)]
    pub last_station_visited_id: Option<StationId>,
    #[serde(default)]
    pub open_stations: Vec<StationId>,
    #[serde(default)]
    pub played_help_tracks: BTreeMap<StationId, Vec<String>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub ad_hoc_data: BTreeMap<String, Value>,
    #[serde(default = "default_help_available")]
    pub help_available: u32,
    /// Pending named timers. Timer tasks do not survive a snapshot.
    #[serde(skip)]
    pub timers: BTreeMap<String, TimerId>,
    #[serde(default)]
    pub has_played_tutorial: bool,
}

const fn default_help_available() -> u32 {
    DEFAULT_HELP_AVAILABLE
}

impl Default for UserState {
    fn default() -> Self {
        Self::new(DEFAULT_HELP_AVAILABLE, Vec::new())
    }
}

impl UserState {
    #[must_use]
    pub fn new(help_available: u32, open_stations: Vec<StationId>) -> Self {
        Self {
            stations_visited: Vec::new(),
            station_visit_counts: BTreeMap::new(),
            current_station: None,
            last_station_visited_id: None,
            open_stations,
            played_help_tracks: BTreeMap::new(),
            tags: BTreeSet::new(),
            ad_hoc_data: BTreeMap::new(),
            help_available,
            timers: BTreeMap::new(),
            has_played_tutorial: false,
        }
    }

    #[must_use]
    pub fn is_open(&self, id: &str) -> bool {
        self.open_stations.iter().any(|open| open == id)
    }

    /// Record one scan. Open/closed status is decided before anything is
    /// mutated and exactly one counter is bumped.
    pub fn record_visit(&mut self, id: &str, tags: &[String]) -> VisitStatus {
        let status = if self.is_open(id) {
            VisitStatus::Open
        } else {
            VisitStatus::Closed
        };

        if status.is_open() {
            self.stations_visited.push(id.to_owned());
        }
        let counts = self.station_visit_counts.entry(id.to_owned()).or_default();
        match status {
            VisitStatus::Open => counts.open += 1,
            VisitStatus::Closed => counts.closed += 1,
        }
        self.push_tags(tags);
        status
    }

    #[must_use]
    pub fn visit_counts(&self, id: &str) -> VisitCounts {
        self.station_visit_counts.get(id).copied().unwrap_or_default()
    }

    /// Move the player to a newly opened station, remembering where they were.
    pub fn enter_station(&mut self, id: &str) {
        if let Some(previous) = self.current_station.take() {
            self.last_station_visited_id = Some(previous);
        }
        self.current_station = Some(id.to_owned());
    }

    #[must_use]
    pub fn is_current(&self, id: &str) -> bool {
        self.current_station.as_deref() == Some(id)
    }

    /// Replace the open-station set wholesale.
    pub fn update_open_stations(&mut self, ids: Vec<StationId>) {
        self.open_stations = ids;
    }

    pub fn push_tags(&mut self, tags: &[String]) {
        self.tags.extend(tags.iter().cloned());
    }

    /// Every listed tag has been seen.
    #[must_use]
    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }

    /// None of the listed tags has been seen.
    #[must_use]
    pub fn has_none_of_tags(&self, tags: &[String]) -> bool {
        !tags.iter().any(|tag| self.tags.contains(tag))
    }

    /// Capped subtraction; the budget never goes below zero.
    pub fn decrease_help_available(&mut self, cost: u32) {
        self.help_available = self.help_available.saturating_sub(cost);
    }

    #[must_use]
    pub fn played_help_tracks_for(&self, id: &str) -> &[String] {
        self.played_help_tracks
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Remember a help track as heard. Duplicates are ignored.
    pub fn push_played_help_track(&mut self, id: &str, filename: &str) {
        let played = self.played_help_tracks.entry(id.to_owned()).or_default();
        if !played.iter().any(|track| track == filename) {
            played.push(filename.to_owned());
        }
    }

    #[must_use]
    pub fn ad_hoc(&self, key: &str) -> Option<&Value> {
        self.ad_hoc_data.get(key)
    }

    pub fn set_ad_hoc(&mut self, key: &str, value: Value) {
        self.ad_hoc_data.insert(key.to_owned(), value);
    }

    /// Append to an ad-hoc array, creating it when absent. A scalar already
    /// stored under `key` becomes the first element.
    pub fn push_ad_hoc(&mut self, key: &str, value: Value) {
        let slot = self
            .ad_hoc_data
            .entry(key.to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(items) => items.push(value),
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, value]);
            }
        }
    }

    /// String form of an ad-hoc value, as used by comparisons and lookups.
    #[must_use]
    pub fn ad_hoc_string(&self, key: &str) -> Option<String> {
        self.ad_hoc(key).and_then(value_to_string)
    }

    /// Ad-hoc numeric counter, treating anything non-numeric as zero.
    #[must_use]
    pub fn ad_hoc_counter(&self, key: &str) -> u64 {
        self.ad_hoc(key).and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn complete_tutorial(&mut self) {
        self.has_played_tutorial = true;
    }
}

/// Render a scratch value the way content authors see it: strings without
/// quotes, arrays comma-joined, `null` as absent.
#[must_use]
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| value_to_string(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(String::from("[object Object]")),
    }
}

/// Loose equality between a stored value and a literal key name: equal when
/// both render to the same string.
#[must_use]
pub fn loosely_equals(value: Option<&Value>, literal: &str) -> bool {
    value.and_then(value_to_string).as_deref() == Some(literal)
}

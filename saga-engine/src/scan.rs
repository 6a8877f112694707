//! Turning scanned payloads into station ids.
//!
//! A code is a URL under the game's `baseUrl` whose last path segment names
//! the station. Choice codes carry only the choice, joined to the station id
//! by the config's `choiceInfix`; they are completed with the station the
//! player is currently at, so one printed "yes" code serves every question.

use crate::config::GameConfig;
use crate::station::StationId;

/// Last non-empty path segment, ignoring any query or fragment.
fn last_path_segment(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].split('/').rev().find(|segment| !segment.is_empty())
}

/// Resolve a payload against the config. Returns `None` for codes that do
/// not belong to this game or name no known station.
#[must_use]
pub fn resolve_station_id(
    config: &GameConfig,
    current_station: Option<&str>,
    payload: &str,
) -> Option<StationId> {
    if config.base_url.is_empty() || !payload.starts_with(&config.base_url) {
        return None;
    }
    let segment = last_path_segment(&payload[config.base_url.len()..])?;

    let infix = config.choice_infix.as_str();
    let id = if !infix.is_empty() && segment.contains(infix) {
        let choice = segment.split(infix).find(|part| !part.is_empty())?;
        format!("{}{infix}{choice}", current_station.unwrap_or_default())
    } else {
        segment.to_owned()
    };

    config.stations.contains_key(&id).then_some(id)
}

/// Drops a payload identical to the one just accepted, since a camera
/// reports the same code many times per second.
#[derive(Debug, Clone, Default)]
pub struct DistinctScans {
    last: Option<String>,
}

impl DistinctScans {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when `payload` differs from the previous one.
    pub fn accept(&mut self, payload: &str) -> bool {
        if self.last.as_deref() == Some(payload) {
            return false;
        }
        self.last = Some(payload.to_owned());
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

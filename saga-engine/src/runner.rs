//! Station Runner: the only way a scan advances the game.

use crate::error::ContentError;
use crate::session::SagaSession;
use crate::state::VisitStatus;
use crate::station::{Station, StationType};
use log::{info, warn};
use std::rc::Rc;

/// Variant for a closed scan: the `closed`-th entry after the open ("A")
/// narration, clamped to the last one. `closed` already includes this scan.
#[must_use]
pub fn progressive_reveal_index(closed: u32, filename_count: usize) -> Option<usize> {
    if filename_count < 2 {
        return None;
    }
    let closed = usize::try_from(closed).unwrap_or(usize::MAX);
    Some(closed.clamp(1, filename_count - 1))
}

impl SagaSession {
    /// Run the station with this id. Unknown ids are logged and ignored.
    pub fn run_station_by_id(&self, id: &str) -> Option<VisitStatus> {
        let config = Rc::clone(&self.config);
        let Some(station) = config.station(id) else {
            warn!("{}", ContentError::MissingStation(id.to_owned()));
            return None;
        };
        Some(self.run_station(station))
    }

    /// Record the visit first, then act on whether the station was open.
    pub fn run_station(&self, station: &Station) -> VisitStatus {
        let status = self
            .state
            .borrow_mut()
            .record_visit(&station.id, &station.tags);
        info!("Scanned {} ({:?}, {status:?})", station.id, station.kind);

        match status {
            VisitStatus::Open => self.run_open_station(station),
            VisitStatus::Closed => self.run_closed_station(station),
        }
        status
    }

    fn run_open_station(&self, station: &Station) {
        self.state.borrow_mut().enter_station(&station.id);
        self.audio.enter_station(&station.id);

        match station.kind {
            StationType::Help => {
                let first_visit = self.state.borrow().visit_counts(&station.id).open == 1;
                if first_visit && let Some(start) = &station.start_station_id {
                    info!("Starting the game at {start}");
                    self.state
                        .borrow_mut()
                        .update_open_stations(vec![start.clone()]);
                    self.run_station_by_id(start);
                }
            }
            StationType::Story | StationType::Choice => {
                for event in &station.events {
                    self.interpret(event);
                }
                // An event may have jumped elsewhere; only the current station unlocks.
                let still_current = self.state.borrow().is_current(&station.id);
                if still_current && !station.opens.is_empty() {
                    self.state
                        .borrow_mut()
                        .update_open_stations(station.opens.clone());
                }
            }
        }
    }

    fn run_closed_station(&self, station: &Station) {
        match station.kind {
            StationType::Help => {
                let config = Rc::clone(&self.config);
                let current = self.state.borrow().current_station.clone();
                let context = current.as_deref().and_then(|id| config.station(id));
                self.provide_help(context);
            }
            StationType::Story | StationType::Choice => self.play_progressive_reveal(station),
        }
    }

    fn play_progressive_reveal(&self, station: &Station) {
        let closed = self.state.borrow().visit_counts(&station.id).closed;
        let filename = station
            .first_play_audio()
            .and_then(|play| {
                progressive_reveal_index(closed, play.audio_filenames.len())
                    .map(|index| play.audio_filenames[index].clone())
            })
            .unwrap_or_else(|| self.config.global_audio_filenames.closed_station.clone());

        if filename.is_empty() {
            warn!(
                "{}",
                ContentError::MissingAudioFilename {
                    station: station.id.clone()
                }
            );
            return;
        }
        let playback = self.audio.play_foreground_audio(&filename, 0.0, 0.0);
        self.after_foreground(playback, |_| {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_index_steps_then_sticks() {
        assert_eq!(progressive_reveal_index(1, 3), Some(1));
        assert_eq!(progressive_reveal_index(2, 3), Some(2));
        assert_eq!(progressive_reveal_index(3, 3), Some(2));
        assert_eq!(progressive_reveal_index(40, 3), Some(2));
    }

    #[test]
    fn reveal_index_needs_more_than_one_file() {
        assert_eq!(progressive_reveal_index(1, 1), None);
        assert_eq!(progressive_reveal_index(1, 0), None);
    }

    #[test]
    fn reveal_index_never_picks_open_variant() {
        assert_eq!(progressive_reveal_index(0, 2), Some(1));
    }
}

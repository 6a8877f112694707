//! Help Track Allocator.
//!
//! Selection is a pure function of the station, the player's progress and
//! the global announcement table, so the budget rules can be tested without
//! any audio. [`SagaSession::provide_help`] commits the plan and plays it.

use crate::config::GlobalAudioFilenames;
use crate::interpreter::log_audio_error;
use crate::session::SagaSession;
use crate::state::UserState;
use crate::station::{Station, StationId};
use log::{debug, info};
use tokio::task::spawn_local;

/// What a help request will play and what it costs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpPlan {
    /// Clips to play back to back.
    pub tracks: Vec<String>,
    /// Budget to subtract.
    pub debit: u32,
    /// Help track heard for the first time, to be remembered.
    pub newly_heard: Option<(StationId, String)>,
}

/// Decide the help response for the station the player is at.
#[must_use]
pub fn plan_help(
    station: Option<&Station>,
    state: &UserState,
    globals: &GlobalAudioFilenames,
    infinite_help: bool,
) -> HelpPlan {
    let Some(station) = station.filter(|station| !station.help_tracks().is_empty()) else {
        return HelpPlan {
            tracks: non_empty([globals.no_help_available.as_str()]),
            ..HelpPlan::default()
        };
    };
    if state.help_available == 0 && !infinite_help {
        return HelpPlan {
            tracks: non_empty([globals.no_help_left.as_str()]),
            ..HelpPlan::default()
        };
    }

    let tracks = station.help_tracks();
    let played = state.played_help_tracks_for(&station.id);
    let fresh = tracks.iter().find(|track| !played.contains(track));

    let (selected, debit, newly_heard) = match fresh {
        Some(track) => {
            let debit = if infinite_help { 0 } else { station.help_cost };
            (track, debit, Some((station.id.clone(), track.clone())))
        }
        // Everything heard: repeat the last clip free of charge.
        None => match tracks.last() {
            Some(track) => (track, 0, None),
            None => return HelpPlan::default(),
        },
    };

    let remaining = state.help_available.saturating_sub(debit);
    let announcement = globals.help_remaining_for(remaining).unwrap_or_default();
    let mut clips = non_empty([selected.as_str()]);
    if announcement != selected.as_str() {
        clips.extend(non_empty([announcement]));
    }

    HelpPlan {
        tracks: clips,
        debit,
        newly_heard,
    }
}

fn non_empty<const N: usize>(filenames: [&str; N]) -> Vec<String> {
    filenames
        .into_iter()
        .filter(|filename| !filename.is_empty())
        .map(str::to_owned)
        .collect()
}

impl SagaSession {
    /// Answer a help request for `station`, the station the player is at.
    ///
    /// The plan is committed to the player's progress before anything plays.
    /// Nothing happens while foreground audio is in flight, so a busy channel
    /// never costs budget.
    pub fn provide_help(&self, station: Option<&Station>) -> Option<HelpPlan> {
        if self.audio.status().foreground_playing {
            debug!("Foreground audio busy; ignoring help request");
            return None;
        }

        let plan = {
            let mut state = self.state.borrow_mut();
            let plan = plan_help(
                station,
                &state,
                &self.config.global_audio_filenames,
                self.options().infinite_help,
            );
            state.decrease_help_available(plan.debit);
            if let Some((id, track)) = &plan.newly_heard {
                state.push_played_help_track(id, track);
            }
            plan
        };
        info!(
            "Help: playing {:?}, debit {}, {} left",
            plan.tracks,
            plan.debit,
            self.state.borrow().help_available
        );

        let audio = self.audio.clone();
        let tracks = plan.tracks.clone();
        spawn_local(async move {
            if let Err(err) = audio.play_multiple_foreground_audio(&tracks).await {
                log_audio_error(&err);
            }
        });
        Some(plan)
    }
}

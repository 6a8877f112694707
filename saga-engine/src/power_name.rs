//! The two-part power-name guessing puzzle.
//!
//! Each scan of a puzzle station is one guess for one half of a name. The
//! player first guesses their own name, which was drawn earlier into
//! `adHocData.powerName`; once both halves are right, the same stations guess
//! the helper ghost's fixed name instead. Every owner keeps its own attempt
//! counter: the first wrong guess is free, the second sends the player to a
//! failure station.

use crate::constants::{
    ADHOC_GHOST_POWER_NAME_ATTEMPTS, ADHOC_POWER_NAME, ADHOC_USER_HAS_SET_POWER_NAME,
    ADHOC_USER_POWER_NAME_ATTEMPTS, GHOST_POWER_NAME,
};
use crate::error::ContentError;
use crate::event::{PowerNameChoice, PowerNameOwner};
use crate::session::SagaSession;
use crate::state::{UserState, value_to_string};
use log::{info, warn};
use serde_json::{Value, json};

/// How a guess was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Correct,
    FirstFailure,
    SecondFailure,
}

/// Whose name is being guessed.
#[must_use]
pub fn current_owner(state: &UserState) -> PowerNameOwner {
    if state.ad_hoc(ADHOC_USER_HAS_SET_POWER_NAME) == Some(&Value::Bool(true)) {
        PowerNameOwner::Ghost
    } else {
        PowerNameOwner::User
    }
}

const fn attempts_key(owner: PowerNameOwner) -> &'static str {
    match owner {
        PowerNameOwner::User => ADHOC_USER_POWER_NAME_ATTEMPTS,
        PowerNameOwner::Ghost => ADHOC_GHOST_POWER_NAME_ATTEMPTS,
    }
}

fn secret_part(state: &UserState, owner: PowerNameOwner, part: usize) -> Option<String> {
    match owner {
        PowerNameOwner::User => state
            .ad_hoc(ADHOC_POWER_NAME)
            .and_then(|name| name.get(part))
            .and_then(value_to_string),
        PowerNameOwner::Ghost => GHOST_POWER_NAME.get(part).map(|part| (*part).to_owned()),
    }
}

/// Judge a guess against the current attempt counter. Pure; the caller
/// applies the consequences.
///
/// # Errors
///
/// Returns [`ContentError::MissingPowerName`] when the secret half has not
/// been drawn.
pub fn judge_guess(
    state: &UserState,
    owner: PowerNameOwner,
    part: usize,
    guess: &str,
) -> Result<GuessOutcome, ContentError> {
    let secret = secret_part(state, owner, part).ok_or(ContentError::MissingPowerName { part })?;
    if secret == guess {
        Ok(GuessOutcome::Correct)
    } else if state.ad_hoc_counter(attempts_key(owner)) == 0 {
        Ok(GuessOutcome::FirstFailure)
    } else {
        Ok(GuessOutcome::SecondFailure)
    }
}

impl SagaSession {
    pub(crate) fn power_name_choice(&self, choice: &PowerNameChoice) {
        let (owner, outcome) = {
            let state = self.state.borrow();
            let owner = current_owner(&state);
            (owner, judge_guess(&state, owner, choice.part, &choice.value))
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("{err}");
                return;
            }
        };
        info!(
            "Power name guess {:?} for part {} ({owner:?}): {outcome:?}",
            choice.value, choice.part
        );

        let script = choice.script(owner);
        let key = attempts_key(owner);
        match outcome {
            GuessOutcome::Correct => {
                let playback = self
                    .audio
                    .play_foreground_audio(script.on_success_play, 0.0, 0.0);
                let open = script.on_success_open.to_vec();
                let part = choice.part;
                self.after_foreground(playback, move |session| {
                    {
                        let mut state = session.state.borrow_mut();
                        state.set_ad_hoc(key, json!(0));
                        state.update_open_stations(open.clone());
                        if part == 1 && owner == PowerNameOwner::User {
                            state.set_ad_hoc(ADHOC_USER_HAS_SET_POWER_NAME, json!(true));
                        }
                    }
                    if part == 1
                        && let Some(next) = open.first()
                    {
                        session.run_station_by_id(next);
                    }
                });
            }
            GuessOutcome::FirstFailure => {
                self.state.borrow_mut().set_ad_hoc(key, json!(1));
                let playback = self
                    .audio
                    .play_foreground_audio(script.on_first_failure_play, 0.0, 0.0);
                self.after_foreground(playback, |_| {});
            }
            GuessOutcome::SecondFailure => {
                let playback = self
                    .audio
                    .play_foreground_audio(script.on_second_failure_play, 0.0, 0.0);
                let go_to = script.on_second_failure_go_to.to_owned();
                self.after_foreground(playback, move |session| {
                    {
                        let mut state = session.state.borrow_mut();
                        state.set_ad_hoc(key, json!(0));
                        state.update_open_stations(vec![go_to.clone()]);
                    }
                    session.run_station_by_id(&go_to);
                });
            }
        }
    }
}

//! Event Interpreter.
//!
//! Dispatch is synchronous; anything that waits for audio or a timer is
//! spawned as a local task that resumes the chain once the wait is over, so
//! a `then` event never runs before its parent has finished.

use crate::audio::seconds;
use crate::error::{AudioError, ContentError};
use crate::event::{Action, Event, PlayAudio, PlayAudioBasedOnAdHocValue, SwitchCase, TagChoice};
use crate::session::SagaSession;
use crate::state::{UserState, loosely_equals};
use log::{debug, warn};
use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::task::spawn_local;
use tokio::time::sleep;

pub(crate) fn log_audio_error(err: &AudioError) {
    match err {
        AudioError::ConcurrentForegroundRequest { .. } => debug!("{err}"),
        AudioError::PlaybackStalled { .. } => warn!("{err}"),
    }
}

impl SagaSession {
    /// Run one event. Content errors are logged and the event is skipped.
    pub fn interpret(&self, event: &Event) {
        match event {
            Event::Known(action) => self.dispatch(action),
            Event::Unknown { action } => {
                warn!("{}", ContentError::UnknownAction(action.clone()));
            }
        }
    }

    fn dispatch(&self, action: &Action) {
        debug!("Interpreting {}", action.name());
        match action {
            Action::PlayAudio(play) => self.play_audio(play),
            Action::PlayAudioBasedOnAdHocValue(play) => self.play_audio_based_on_ad_hoc_value(play),
            Action::PlayBackgroundAudio(play) => {
                if let Err(err) = self.audio.handle_play_background_audio_event(play) {
                    warn!("{err}");
                }
                // Background audio never blocks its continuation.
                if let Some(then) = &play.then {
                    self.interpret(then);
                }
            }
            Action::GoToStation { to_station } => {
                self.state
                    .borrow_mut()
                    .update_open_stations(vec![to_station.clone()]);
                self.run_station_by_id(to_station);
            }
            Action::OpenStation { to_station } => {
                self.state
                    .borrow_mut()
                    .update_open_stations(vec![to_station.clone()]);
            }
            Action::OpenStations { to_stations } => {
                self.state
                    .borrow_mut()
                    .update_open_stations(to_stations.clone());
            }
            Action::ChoiceBasedOnTags(choice) => {
                let present = self.state.borrow().has_all_tags(&choice.tags);
                self.interpret(branch(choice, present));
            }
            Action::ChoiceBasedOnAbsenceOfTags(choice) => {
                let absent = self.state.borrow().has_none_of_tags(&choice.tags);
                self.interpret(branch(choice, !absent));
            }
            Action::PickRandomSample { population, key } => self.pick_random_sample(population, key),
            Action::PushToAdHocArray { key, value } => {
                self.state.borrow_mut().push_ad_hoc(key, value.clone());
            }
            Action::SetAdHocData { key, value } => {
                self.state.borrow_mut().set_ad_hoc(key, value.clone());
            }
            Action::StartTimer { name, time, then } => self.start_timer(name, *time, then),
            Action::CancelTimer { name } => self.cancel_timer(name),
            Action::SwitchGotoStation { switch } => self.switch_goto_station(switch),
            Action::PowerNameChoice(choice) => self.power_name_choice(choice),
            Action::Noop => {}
        }
    }

    fn play_audio(&self, play: &PlayAudio) {
        let Some(filename) = play.audio_filenames.first() else {
            let station = self.state.borrow().current_station.clone().unwrap_or_default();
            warn!("{}", ContentError::MissingAudioFilename { station });
            return;
        };
        let playback = self.audio.play_foreground_audio(filename, play.wait, 0.0);
        let then = play.then.clone();
        self.after_foreground(playback, move |session| {
            if let Some(then) = then {
                session.interpret(&then);
            }
        });
    }

    fn play_audio_based_on_ad_hoc_value(&self, play: &PlayAudioBasedOnAdHocValue) {
        let value = self.state.borrow().ad_hoc_string(&play.key);
        let filename = value
            .as_ref()
            .and_then(|value| play.audio_filename_map.get(value));
        let Some(filename) = filename else {
            warn!(
                "{}",
                ContentError::UnmappedAdHocValue {
                    key: play.key.clone(),
                    value,
                }
            );
            return;
        };
        let playback = self.audio.play_foreground_audio(filename, 0.0, 0.0);
        let then = play.then.clone();
        self.after_foreground(playback, move |session| {
            if let Some(then) = then {
                session.interpret(&then);
            }
        });
    }

    /// Await a foreground playback in a local task, then continue. Failed
    /// playback ends the chain.
    pub(crate) fn after_foreground<F>(
        &self,
        playback: impl Future<Output = Result<(), AudioError>> + 'static,
        continuation: F,
    ) where
        F: FnOnce(&Self) + 'static,
    {
        let session = self.clone();
        let epoch = self.epoch.get();
        spawn_local(async move {
            match playback.await {
                Ok(()) if session.epoch.get() == epoch => continuation(&session),
                Ok(()) => debug!("Session was reset; dropping continuation"),
                Err(err) => log_audio_error(&err),
            }
        });
    }

    fn pick_random_sample(&self, population: &[Value], key: &str) {
        let picked = population.choose(&mut *self.rng.borrow_mut()).cloned();
        match picked {
            Some(value) => self.state.borrow_mut().set_ad_hoc(key, value),
            None => warn!(
                "{}",
                ContentError::EmptyPopulation {
                    key: key.to_owned()
                }
            ),
        }
    }

    /// Schedule `then` under `name`, replacing a pending timer of that name.
    fn start_timer(&self, name: &str, time: f64, then: &Event) {
        self.cancel_timer(name);

        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        debug!("Starting timer {name} for {time}s");

        let session = self.clone();
        let timer_name = name.to_owned();
        let then = then.clone();
        let handle = spawn_local(async move {
            sleep(seconds(time)).await;
            session.timer_tasks.borrow_mut().remove(&id);
            {
                let mut state = session.state.borrow_mut();
                if state.timers.get(&timer_name) == Some(&id) {
                    state.timers.remove(&timer_name);
                }
            }
            debug!("Timer {timer_name} fired");
            session.interpret(&then);
        })
        .abort_handle();

        self.timer_tasks.borrow_mut().insert(id, handle);
        self.state.borrow_mut().timers.insert(name.to_owned(), id);
    }

    /// Cancelling an unknown or already fired timer is a no-op.
    fn cancel_timer(&self, name: &str) {
        let Some(id) = self.state.borrow_mut().timers.remove(name) else {
            return;
        };
        if let Some(handle) = self.timer_tasks.borrow_mut().remove(&id) {
            debug!("Cancelling timer {name}");
            handle.abort();
        }
    }

    /// Jump to the destination of the first matching case. No match leaves
    /// everything as it was.
    fn switch_goto_station(&self, cases: &[SwitchCase]) {
        let destination = {
            let state = self.state.borrow();
            cases
                .iter()
                .find(|case| case_matches(&state, case))
                .map(|case| case.to_station().to_owned())
        };
        let Some(destination) = destination else {
            debug!("switchGotoStation: no case matched");
            return;
        };
        self.state
            .borrow_mut()
            .update_open_stations(vec![destination.clone()]);
        self.run_station_by_id(&destination);
    }
}

fn branch(choice: &TagChoice, present: bool) -> &Event {
    if present {
        &choice.event_if_present
    } else {
        &choice.event_if_not_present
    }
}

fn case_matches(state: &UserState, case: &SwitchCase) -> bool {
    match case {
        SwitchCase::AdHocKeysAreEqual {
            first_key,
            second_key,
            ..
        } => state.ad_hoc_string(first_key) == state.ad_hoc_string(second_key),
        SwitchCase::AdHocKeysAreNotEqual {
            first_key,
            second_key,
            ..
        } => state.ad_hoc_string(first_key) != state.ad_hoc_string(second_key),
        // Compared against the key name; `value` is not consulted.
        SwitchCase::AdHocKeyEquals { key, .. } => loosely_equals(state.ad_hoc(key), key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case(value: serde_json::Value) -> SwitchCase {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn keys_are_equal_compares_string_forms() {
        let mut state = UserState::default();
        state.set_ad_hoc("a", json!(1));
        state.set_ad_hoc("b", json!("1"));
        let equal = case(json!({
            "condition": "adHocKeysAreEqual",
            "parameters": { "firstKey": "a", "secondKey": "b", "toStation": "x" }
        }));
        assert!(case_matches(&state, &equal));

        state.set_ad_hoc("b", json!("2"));
        assert!(!case_matches(&state, &equal));
    }

    #[test]
    fn two_missing_keys_are_equal() {
        let state = UserState::default();
        let equal = case(json!({
            "condition": "adHocKeysAreEqual",
            "parameters": { "firstKey": "nope", "secondKey": "also-nope", "toStation": "x" }
        }));
        let not_equal = case(json!({
            "condition": "adHocKeysAreNotEqual",
            "parameters": { "firstKey": "nope", "secondKey": "also-nope", "toStation": "x" }
        }));
        assert!(case_matches(&state, &equal));
        assert!(!case_matches(&state, &not_equal));
    }

    #[test]
    fn key_equals_compares_against_key_name() {
        let mut state = UserState::default();
        state.set_ad_hoc("door", json!("open"));
        let by_value = case(json!({
            "condition": "adHocKeyEquals",
            "parameters": { "key": "door", "value": "open", "toStation": "x" }
        }));
        assert!(!case_matches(&state, &by_value));

        state.set_ad_hoc("door", json!("door"));
        assert!(case_matches(&state, &by_value));
    }

    #[test]
    fn tag_branch_selection() {
        let choice: TagChoice = serde_json::from_value(json!({
            "tags": ["t"],
            "eventIfPresent": { "action": "noop" },
            "eventIfNotPresent": { "action": "cancelTimer", "name": "x" }
        }))
        .unwrap();
        assert_eq!(branch(&choice, true).action_name(), "noop");
        assert_eq!(branch(&choice, false).action_name(), "cancelTimer");
    }
}

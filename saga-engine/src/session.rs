//! A running game: config, player progress, audio and scheduled work.

use crate::audio::{AudioBackend, AudioController, AudioStatus};
use crate::config::GameConfig;
use crate::constants::DEFAULT_HELP_AVAILABLE;
use crate::scan;
use crate::state::{TimerId, UserState};
use crate::station::StationId;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::task::AbortHandle;

/// Per-session switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Seed for `pickRandomSample`.
    pub seed: u64,
    /// Starting help budget, also used after a wipe.
    pub help_available: u32,
    /// Replace every foreground track with a short beep.
    pub quick_audio: bool,
    /// Help never debits the budget.
    pub infinite_help: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            help_available: DEFAULT_HELP_AVAILABLE,
            quick_audio: false,
            infinite_help: false,
        }
    }
}

/// Everything worth persisting between page loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: UserState,
    #[serde(default)]
    pub audio: AudioStatus,
}

/// Cheap to clone; clones share all state. Spawned continuations hold a
/// clone, so every method must be called from inside a
/// [`tokio::task::LocalSet`].
#[derive(Debug, Clone)]
pub struct SagaSession {
    pub(crate) config: Rc<GameConfig>,
    pub(crate) state: Rc<RefCell<UserState>>,
    pub(crate) audio: AudioController,
    pub(crate) rng: Rc<RefCell<ChaCha20Rng>>,
    pub(crate) timer_tasks: Rc<RefCell<BTreeMap<TimerId, AbortHandle>>>,
    pub(crate) next_timer_id: Rc<Cell<TimerId>>,
    /// Bumped by wipe and restore so continuations from an earlier life of
    /// the session are ignored.
    pub(crate) epoch: Rc<Cell<u64>>,
    options: SessionOptions,
}

impl SagaSession {
    /// Start a fresh session with the config's starting stations open.
    #[must_use]
    pub fn new(config: GameConfig, backend: &dyn AudioBackend, options: SessionOptions) -> Self {
        let audio = AudioController::new(backend, &config.audio_file_url_base, options.quick_audio);
        let state = UserState::new(options.help_available, config.open_stations_at_start.clone());
        Self {
            config: Rc::new(config),
            state: Rc::new(RefCell::new(state)),
            audio,
            rng: Rc::new(RefCell::new(ChaCha20Rng::seed_from_u64(options.seed))),
            timer_tasks: Rc::new(RefCell::new(BTreeMap::new())),
            next_timer_id: Rc::new(Cell::new(0)),
            epoch: Rc::new(Cell::new(0)),
            options,
        }
    }

    /// Rebuild a session from a snapshot against freshly loaded config.
    #[must_use]
    pub fn from_snapshot(
        config: GameConfig,
        backend: &dyn AudioBackend,
        options: SessionOptions,
        snapshot: SessionSnapshot,
    ) -> Self {
        let session = Self::new(config, backend, options);
        session.restore(snapshot);
        session
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    #[must_use]
    pub const fn audio(&self) -> &AudioController {
        &self.audio
    }

    /// Borrow the player progress. Do not hold the borrow across an await.
    #[must_use]
    pub fn state(&self) -> Ref<'_, UserState> {
        self.state.borrow()
    }

    /// Apply a closure to the mutable player progress.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut UserState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.state.borrow().clone(),
            audio: self.audio.status(),
        }
    }

    /// Replace progress with a snapshot. Pending timers and background sounds
    /// of the replaced progress are dropped.
    pub fn restore(&self, snapshot: SessionSnapshot) {
        self.cancel_all_timers();
        self.audio.stop_all_background();
        self.epoch.set(self.epoch.get() + 1);
        let SessionSnapshot { user, audio } = snapshot;
        self.audio.set_current_station(user.current_station.clone());
        self.audio.restore_status(audio);
        *self.state.borrow_mut() = user;
    }

    /// Reset to a brand new game in one step.
    pub fn wipe_history(&self) {
        info!("Wiping history for {}", self.config.name);
        self.cancel_all_timers();
        self.epoch.set(self.epoch.get() + 1);
        self.audio.reset();
        *self.state.borrow_mut() = UserState::new(
            self.options.help_available,
            self.config.open_stations_at_start.clone(),
        );
    }

    pub fn complete_tutorial(&self) {
        self.state.borrow_mut().complete_tutorial();
    }

    /// Map a scanned payload to a station id without running it.
    #[must_use]
    pub fn resolve_scan(&self, payload: &str) -> Option<StationId> {
        let current = self.state.borrow().current_station.clone();
        scan::resolve_station_id(&self.config, current.as_deref(), payload)
    }

    /// Resolve a scanned payload and run the station it names.
    pub fn scan(&self, payload: &str) -> Option<StationId> {
        let id = self.resolve_scan(payload)?;
        self.run_station_by_id(&id);
        Some(id)
    }

    pub(crate) fn cancel_all_timers(&self) {
        let tasks = std::mem::take(&mut *self.timer_tasks.borrow_mut());
        for handle in tasks.into_values() {
            handle.abort();
        }
        self.state.borrow_mut().timers.clear();
    }
}

//! Saga Station Engine
//!
//! Platform-agnostic core of Saga, a location-based audio story game. Players
//! scan printed codes at physical stations; each scan runs that station's
//! event script, plays narration and unlocks the next stations. This crate
//! holds all game logic. Audio output goes through the [`AudioBackend`]
//! trait, so the same engine runs behind a browser player or the bundled
//! [`SimulatedBackend`].

pub mod audio;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod help;
pub mod interpreter;
pub mod power_name;
pub mod runner;
pub mod scan;
pub mod session;
pub mod state;
pub mod station;
pub mod validate;

// Re-export commonly used types
pub use audio::{
    AudioBackend, AudioController, AudioStatus, AudioTimeout, ChannelRole, MediaChannel,
    MediaEvent, PlaybackAction, PlaybackRecord, SimulatedBackend, TrackBehaviour, TrackProfile,
};
pub use config::{GameConfig, GlobalAudioFilenames, join_paths};
pub use error::{AudioError, ConfigError, ContentError};
pub use event::{
    Action, Event, PlayAudio, PlayAudioBasedOnAdHocValue, PlayBackgroundAudio, PowerNameChoice,
    PowerNameOwner, SwitchCase, TagChoice,
};
pub use help::{HelpPlan, plan_help};
pub use power_name::{GuessOutcome, current_owner, judge_guess};
pub use runner::progressive_reveal_index;
pub use scan::{DistinctScans, resolve_station_id};
pub use session::{SagaSession, SessionOptions, SessionSnapshot};
pub use state::{UserState, VisitCounts, VisitStatus};
pub use station::{Station, StationId, StationType};
pub use validate::{ValidationIssue, validate_config};

/// Trait for abstracting where game content comes from
/// Platform-specific implementations should provide this
pub trait ConfigLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the game config
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be read or parsed.
    fn load_config(&self) -> Result<GameConfig, Self::Error>;
}

/// Trait for abstracting save/load of player progress
/// Platform-specific implementations should provide this
pub trait StateStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_snapshot(&self, save_name: &str, snapshot: &SessionSnapshot)
    -> Result<(), Self::Error>;

    /// Load a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    fn load_snapshot(&self, save_name: &str) -> Result<Option<SessionSnapshot>, Self::Error>;

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Main engine for starting and persisting game sessions
pub struct SagaEngine<L, S>
where
    L: ConfigLoader,
    S: StateStorage,
{
    config_loader: L,
    storage: S,
}

impl<L, S> SagaEngine<L, S>
where
    L: ConfigLoader,
    S: StateStorage,
{
    /// Create a new engine with the provided config loader and storage
    pub const fn new(config_loader: L, storage: S) -> Self {
        Self {
            config_loader,
            storage,
        }
    }

    /// Start a fresh session
    ///
    /// # Errors
    ///
    /// Returns an error if the game config cannot be loaded.
    pub fn start_session(
        &self,
        backend: &dyn AudioBackend,
        options: SessionOptions,
    ) -> Result<SagaSession, L::Error> {
        let config = self.config_loader.load_config()?;
        Ok(SagaSession::new(config, backend, options))
    }

    /// Save a session's progress
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save_session(&self, save_name: &str, session: &SagaSession) -> Result<(), S::Error> {
        self.storage.save_snapshot(save_name, &session.snapshot())
    }

    /// Load a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or the config
    /// cannot be reloaded.
    pub fn load_session(
        &self,
        save_name: &str,
        backend: &dyn AudioBackend,
        options: SessionOptions,
    ) -> Result<Option<SagaSession>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        if let Some(snapshot) = self.storage.load_snapshot(save_name).map_err(Into::into)? {
            // Rehydrate against fresh content
            let config = self.config_loader.load_config().map_err(Into::into)?;
            Ok(Some(SagaSession::from_snapshot(
                config, backend, options, snapshot,
            )))
        } else {
            Ok(None)
        }
    }

    /// Delete a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_save(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}

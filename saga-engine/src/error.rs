//! Error taxonomy for the station engine.
//!
//! Only [`AudioError`] and [`ConfigError`] ever travel through `Result`s.
//! [`ContentError`]s describe authoring defects; they are logged where they
//! are found and the session carries on.

use crate::station::StationId;
use thiserror::Error;

/// Failures surfaced by the audio playback controller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AudioError {
    /// A foreground track was requested while another one is in flight.
    /// This is an expected guard, not a fault.
    #[error("foreground audio already in flight; rejected {filename}")]
    ConcurrentForegroundRequest { filename: String },
    /// Load or playback made no progress within the stall timeout.
    /// `position` is the last known playback offset in seconds.
    #[error("playback of {filename} stalled at {position:.2}s")]
    PlaybackStalled { filename: String, position: f64 },
}

impl AudioError {
    /// Offset to resume from when retrying a stalled track.
    #[must_use]
    pub const fn resume_position(&self) -> Option<f64> {
        match self {
            Self::PlaybackStalled { position, .. } => Some(*position),
            Self::ConcurrentForegroundRequest { .. } => None,
        }
    }
}

/// Content authoring defects discovered while running a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("station {0} is not part of the game config")]
    MissingStation(StationId),
    #[error("no handler for event action {0:?}")]
    UnknownAction(String),
    #[error("station {station} has no usable audio filename")]
    MissingAudioFilename { station: StationId },
    #[error("no free background channel for {filename}")]
    NoFreeBackgroundChannel { filename: String },
    #[error("pickRandomSample for key {key} has an empty population")]
    EmptyPopulation { key: String },
    #[error("ad-hoc value {value:?} under {key} has no mapped audio file")]
    UnmappedAdHocValue { key: String, value: Option<String> },
    #[error("power name part {part} has not been picked yet")]
    MissingPowerName { part: usize },
}

/// Failures while parsing or validating a game config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("game config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("game config failed validation with {} issue(s)", .0.len())]
    Invalid(Vec<crate::validate::ValidationIssue>),
}

//! Centralized tuning constants for the Saga station engine.
//!
//! Content files decide *what* plays and *where* the player may go; the
//! values below decide how the engine behaves while doing it. Keeping them
//! together means timing and budget behaviour only changes through reviewed
//! code, never through a content upload.

use std::time::Duration;

// Foreground audio -----------------------------------------------------------
/// A foreground track that makes no load or playback progress for this long
/// is reported as stalled.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Delay before the scanner is offered again after the last foreground track.
pub const SCAN_UI_REOPEN_DELAY: Duration = Duration::from_millis(2500);
/// Substituted for every foreground track when `quick_audio` is enabled.
pub const QUICK_AUDIO_FILENAME: &str = "/audio/beep.mp3";

// Background audio -----------------------------------------------------------
pub const BACKGROUND_POOL_SIZE: usize = 5;
pub const BACKGROUND_FULL_VOLUME: f32 = 1.0;
pub const BACKGROUND_DUCKED_VOLUME: f32 = 0.15;

// Help budget ------------------------------------------------------------------
pub const DEFAULT_HELP_AVAILABLE: u32 = 3;
/// Highest tier in the "uses of help remaining" announcement table.
pub const HELP_REMAINING_MAX_TIER: u32 = 3;

// Power name puzzle -------------------------------------------------------------
pub(crate) const ADHOC_USER_HAS_SET_POWER_NAME: &str = "userHasSetPowerName";
pub(crate) const ADHOC_USER_POWER_NAME_ATTEMPTS: &str = "attemptsAtPickingTheRightPowerName";
pub(crate) const ADHOC_GHOST_POWER_NAME_ATTEMPTS: &str = "attemptsAtPickingTheGhostsPowerName";
pub(crate) const ADHOC_POWER_NAME: &str = "powerName";
/// The helper ghost's power name is fixed by the story.
pub(crate) const GHOST_POWER_NAME: [&str; 2] = ["sorg", "mane"];

//! Media backend seam.
//!
//! The controller never touches a platform audio API directly. A backend
//! hands out [`MediaChannel`]s, each behaving like one media element: load a
//! URL, report readiness and progress as [`MediaEvent`]s, play from an offset,
//! stop.

use async_trait::async_trait;
use std::rc::Rc;

/// Progress notifications from a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The loaded resource can start playing.
    CanPlay,
    /// Playback advanced to this offset, in seconds.
    TimeUpdate(f64),
    Ended,
    Error(String),
}

/// What a channel is used for. Backends may use it for routing or labelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    Foreground,
    Background(usize),
}

/// One playback element.
///
/// Methods take `&self`; implementations use interior mutability because the
/// controller shares channels between its tasks. Loading or stopping discards
/// any events still queued for the previous resource.
#[async_trait(?Send)]
pub trait MediaChannel {
    fn load(&self, url: &str);
    fn play(&self, from: f64);
    fn stop(&self);
    fn set_volume(&self, volume: f32);

    /// Wait for the next event. `None` means the channel is gone for good.
    async fn next_event(&self) -> Option<MediaEvent>;
}

/// Factory for channels.
pub trait AudioBackend {
    fn create_channel(&self, role: ChannelRole) -> Rc<dyn MediaChannel>;
}

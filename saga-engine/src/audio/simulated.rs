//! Deterministic in-process media backend.
//!
//! Every track plays on the tokio clock, so under a paused runtime a ten
//! minute narration completes instantly and stall timeouts fire on virtual
//! time. Tracks are configured per filename; anything not configured uses the
//! default profile.

use super::backend::{AudioBackend, ChannelRole, MediaChannel, MediaEvent};
use super::seconds;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};

/// Playback position reporting interval, in seconds.
const PROGRESS_TICK: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackBehaviour {
    Plays,
    /// Playback stops reporting progress at this offset.
    StallsAfter(f64),
    /// Loading never reports readiness.
    NeverLoads,
    /// Loading fails with this message.
    Fails(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackProfile {
    pub duration: f64,
    pub load_latency: f64,
    pub behaviour: TrackBehaviour,
}

impl TrackProfile {
    #[must_use]
    pub const fn plays(duration: f64) -> Self {
        Self {
            duration,
            load_latency: 0.1,
            behaviour: TrackBehaviour::Plays,
        }
    }

    #[must_use]
    pub const fn stalls_after(duration: f64, offset: f64) -> Self {
        Self {
            duration,
            load_latency: 0.1,
            behaviour: TrackBehaviour::StallsAfter(offset),
        }
    }

    #[must_use]
    pub const fn never_loads() -> Self {
        Self {
            duration: 0.0,
            load_latency: 0.0,
            behaviour: TrackBehaviour::NeverLoads,
        }
    }

    #[must_use]
    pub fn fails(message: &str) -> Self {
        Self {
            duration: 0.0,
            load_latency: 0.1,
            behaviour: TrackBehaviour::Fails(message.to_owned()),
        }
    }

    #[must_use]
    pub const fn with_load_latency(mut self, latency: f64) -> Self {
        self.load_latency = latency;
        self
    }
}

impl Default for TrackProfile {
    fn default() -> Self {
        Self::plays(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackAction {
    Load,
    Play { from: f64 },
    Stop,
    Ended,
}

/// One entry of the shared playback log.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRecord {
    pub role: ChannelRole,
    pub url: String,
    pub action: PlaybackAction,
    /// Time since the backend was created.
    pub at: Duration,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Loading,
    Ready,
    Playing { position: f64 },
    Stalled,
}

#[derive(Debug)]
struct ChannelState {
    url: Option<String>,
    profile: TrackProfile,
    phase: Phase,
    generation: u64,
    volume: f32,
}

#[derive(Debug)]
struct Shared {
    tracks: HashMap<String, TrackProfile>,
    default_track: TrackProfile,
    log: Vec<PlaybackRecord>,
    channels: Vec<(ChannelRole, Rc<RefCell<ChannelState>>)>,
    epoch: Instant,
}

impl Shared {
    fn profile_for(&self, url: &str) -> TrackProfile {
        let filename = url.rsplit('/').next().unwrap_or(url);
        self.tracks
            .get(filename)
            .cloned()
            .unwrap_or_else(|| self.default_track.clone())
    }

    fn record(&mut self, role: ChannelRole, url: &str, action: PlaybackAction) {
        let at = self.epoch.elapsed();
        self.log.push(PlaybackRecord {
            role,
            url: url.to_owned(),
            action,
            at,
        });
    }
}

/// Shared handle; clones observe the same channels and log.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    shared: Rc<RefCell<Shared>>,
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(Shared {
                tracks: HashMap::new(),
                default_track: TrackProfile::default(),
                log: Vec::new(),
                channels: Vec::new(),
                epoch: Instant::now(),
            })),
        }
    }

    #[must_use]
    pub fn with_default_track(self, profile: TrackProfile) -> Self {
        self.shared.borrow_mut().default_track = profile;
        self
    }

    #[must_use]
    pub fn with_track(self, filename: &str, profile: TrackProfile) -> Self {
        self.set_track(filename, profile);
        self
    }

    /// Configure or reconfigure a track. Takes effect on its next load.
    pub fn set_track(&self, filename: &str, profile: TrackProfile) {
        self.shared
            .borrow_mut()
            .tracks
            .insert(filename.to_owned(), profile);
    }

    #[must_use]
    pub fn log(&self) -> Vec<PlaybackRecord> {
        self.shared.borrow().log.clone()
    }

    /// URLs started on the foreground channel, in order. Resumed plays are
    /// listed again.
    #[must_use]
    pub fn foreground_plays(&self) -> Vec<String> {
        self.plays_where(|role| role == ChannelRole::Foreground)
    }

    /// URLs started on any background channel, in order.
    #[must_use]
    pub fn background_plays(&self) -> Vec<String> {
        self.plays_where(|role| matches!(role, ChannelRole::Background(_)))
    }

    fn plays_where(&self, wanted: impl Fn(ChannelRole) -> bool) -> Vec<String> {
        self.shared
            .borrow()
            .log
            .iter()
            .filter(|record| {
                wanted(record.role) && matches!(record.action, PlaybackAction::Play { .. })
            })
            .map(|record| record.url.clone())
            .collect()
    }

    /// URLs currently audible on background channels.
    #[must_use]
    pub fn playing_background(&self) -> Vec<String> {
        self.shared
            .borrow()
            .channels
            .iter()
            .filter(|(role, _)| matches!(role, ChannelRole::Background(_)))
            .filter_map(|(_, state)| {
                let state = state.borrow();
                match state.phase {
                    Phase::Playing { .. } => state.url.clone(),
                    _ => None,
                }
            })
            .collect()
    }

    #[must_use]
    pub fn volume(&self, role: ChannelRole) -> Option<f32> {
        self.shared
            .borrow()
            .channels
            .iter()
            .find(|(candidate, _)| *candidate == role)
            .map(|(_, state)| state.borrow().volume)
    }
}

impl AudioBackend for SimulatedBackend {
    fn create_channel(&self, role: ChannelRole) -> Rc<dyn MediaChannel> {
        let state = Rc::new(RefCell::new(ChannelState {
            url: None,
            profile: TrackProfile::default(),
            phase: Phase::Idle,
            generation: 0,
            volume: 1.0,
        }));
        self.shared
            .borrow_mut()
            .channels
            .push((role, Rc::clone(&state)));
        Rc::new(SimulatedChannel {
            role,
            state,
            shared: Rc::clone(&self.shared),
            notify: Notify::new(),
        })
    }
}

struct SimulatedChannel {
    role: ChannelRole,
    state: Rc<RefCell<ChannelState>>,
    shared: Rc<RefCell<Shared>>,
    notify: Notify,
}

enum Step {
    Wait,
    Load { latency: f64, behaviour: TrackBehaviour },
    Advance { position: f64, duration: f64, stall_at: Option<f64> },
}

impl SimulatedChannel {
    fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    fn transition(&self, phase: Phase) {
        let mut state = self.state.borrow_mut();
        state.phase = phase;
        state.generation += 1;
        drop(state);
        self.notify.notify_waiters();
    }

    fn set_phase_quietly(&self, phase: Phase) {
        self.state.borrow_mut().phase = phase;
    }

    fn record(&self, action: PlaybackAction) {
        let url = self.state.borrow().url.clone().unwrap_or_default();
        self.shared.borrow_mut().record(self.role, &url, action);
    }

    fn next_step(&self) -> Step {
        let state = self.state.borrow();
        match &state.phase {
            Phase::Idle | Phase::Ready | Phase::Stalled => Step::Wait,
            Phase::Loading => Step::Load {
                latency: state.profile.load_latency,
                behaviour: state.profile.behaviour.clone(),
            },
            Phase::Playing { position } => Step::Advance {
                position: *position,
                duration: state.profile.duration,
                stall_at: match state.profile.behaviour {
                    TrackBehaviour::StallsAfter(offset) => Some(offset),
                    _ => None,
                },
            },
        }
    }

    fn finish(&self) -> MediaEvent {
        self.set_phase_quietly(Phase::Idle);
        self.record(PlaybackAction::Ended);
        MediaEvent::Ended
    }
}

#[async_trait(?Send)]
impl MediaChannel for SimulatedChannel {
    fn load(&self, url: &str) {
        let profile = self.shared.borrow().profile_for(url);
        {
            let mut state = self.state.borrow_mut();
            state.url = Some(url.to_owned());
            state.profile = profile;
        }
        self.record(PlaybackAction::Load);
        self.transition(Phase::Loading);
    }

    fn play(&self, from: f64) {
        if self.state.borrow().url.is_none() {
            return;
        }
        self.record(PlaybackAction::Play { from });
        self.transition(Phase::Playing { position: from });
    }

    fn stop(&self) {
        if self.state.borrow().url.is_some() {
            self.record(PlaybackAction::Stop);
        }
        self.transition(Phase::Idle);
    }

    fn set_volume(&self, volume: f32) {
        self.state.borrow_mut().volume = volume;
    }

    async fn next_event(&self) -> Option<MediaEvent> {
        loop {
            let notified = self.notify.notified();
            let generation = self.generation();
            match self.next_step() {
                Step::Wait => notified.await,
                Step::Load {
                    latency,
                    behaviour,
                } => {
                    sleep(seconds(latency)).await;
                    if self.generation() != generation {
                        continue;
                    }
                    match behaviour {
                        TrackBehaviour::NeverLoads => self.set_phase_quietly(Phase::Stalled),
                        TrackBehaviour::Fails(message) => {
                            self.set_phase_quietly(Phase::Idle);
                            return Some(MediaEvent::Error(message));
                        }
                        TrackBehaviour::Plays | TrackBehaviour::StallsAfter(_) => {
                            self.set_phase_quietly(Phase::Ready);
                            return Some(MediaEvent::CanPlay);
                        }
                    }
                }
                Step::Advance {
                    position,
                    duration,
                    stall_at,
                } => {
                    if stall_at.is_some_and(|offset| position >= offset) {
                        self.set_phase_quietly(Phase::Stalled);
                        continue;
                    }
                    if position >= duration {
                        return Some(self.finish());
                    }
                    let target = stall_at.map_or(duration, |offset| offset.min(duration));
                    let tick = PROGRESS_TICK.min(target - position);
                    sleep(seconds(tick)).await;
                    if self.generation() != generation {
                        continue;
                    }
                    let next = position + tick;
                    if next >= duration {
                        return Some(self.finish());
                    }
                    self.set_phase_quietly(Phase::Playing { position: next });
                    return Some(MediaEvent::TimeUpdate(next));
                }
            }
        }
    }
}

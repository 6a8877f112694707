//! Audio Playback Controller.
//!
//! Owns exactly one foreground channel and a fixed pool of background
//! channels. Foreground playback is exclusive: a request made while another
//! track is in flight is rejected at call time, never queued. Background
//! tracks belong to the station that started them and are cancelled when the
//! player moves on.
//!
//! All methods must run inside a [`tokio::task::LocalSet`]; scheduled work is
//! spawned with [`tokio::task::spawn_local`].

mod backend;
mod simulated;

pub use backend::{AudioBackend, ChannelRole, MediaChannel, MediaEvent};
pub use simulated::{
    PlaybackAction, PlaybackRecord, SimulatedBackend, TrackBehaviour, TrackProfile,
};

use crate::config::join_paths;
use crate::constants::{
    BACKGROUND_DUCKED_VOLUME, BACKGROUND_FULL_VOLUME, BACKGROUND_POOL_SIZE, QUICK_AUDIO_FILENAME,
    SCAN_UI_REOPEN_DELAY, STALL_TIMEOUT,
};
use crate::error::{AudioError, ContentError};
use crate::event::PlayBackgroundAudio;
use crate::station::StationId;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::{AbortHandle, spawn_local};
use tokio::time::{Instant, sleep, timeout_at};

/// Content timings are seconds as `f64`; anything negative or not finite
/// means "no delay".
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

/// Where a stalled foreground track can be resumed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTimeout {
    pub audio_filename: String,
    pub position: f64,
}

/// Observable playback state, consumed by whatever presents the scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioStatus {
    pub foreground_playing: bool,
    pub foreground_filename: Option<String>,
    pub background_playing: bool,
    /// Foreground tracks that played to the end, oldest first.
    pub played_foreground_audio: Vec<String>,
    /// True from a foreground request until shortly after the last
    /// foreground track ends.
    pub station_is_executing: bool,
    pub audio_timeout: Option<AudioTimeout>,
}

impl AudioStatus {
    #[must_use]
    pub const fn should_show_scanner(&self) -> bool {
        !self.station_is_executing && !self.foreground_playing
    }
}

#[derive(Debug)]
struct BackgroundSound {
    id: u64,
    channel: usize,
    station: Option<StationId>,
    cancel_on_leave: bool,
    started: bool,
    task: Option<AbortHandle>,
}

struct AudioInner {
    url_base: String,
    quick_audio: bool,
    current_station: Option<StationId>,
    free_channels: Vec<usize>,
    sounds: Vec<BackgroundSound>,
    next_sound_id: u64,
    ducked: bool,
    executing_reset: Option<AbortHandle>,
    /// Bumped by every reset; outcomes of older foreground tracks are dropped.
    generation: u64,
    status: AudioStatus,
}

impl AudioInner {
    fn release_sound(&mut self, id: u64) -> Option<BackgroundSound> {
        let index = self.sounds.iter().position(|sound| sound.id == id)?;
        let sound = self.sounds.swap_remove(index);
        self.free_channels.push(sound.channel);
        self.status.background_playing = self.sounds.iter().any(|sound| sound.started);
        Some(sound)
    }
}

/// Cloneable handle; clones drive the same channels.
#[derive(Clone)]
pub struct AudioController {
    inner: Rc<RefCell<AudioInner>>,
    foreground: Rc<dyn MediaChannel>,
    background: Rc<[Rc<dyn MediaChannel>]>,
}

impl fmt::Debug for AudioController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("AudioController");
        if let Ok(inner) = self.inner.try_borrow() {
            debug
                .field("current_station", &inner.current_station)
                .field("status", &inner.status);
        }
        debug.finish_non_exhaustive()
    }
}

/// Marks the foreground channel busy for as long as it lives.
struct ForegroundReservation {
    controller: AudioController,
    filename: String,
    generation: u64,
}

impl Drop for ForegroundReservation {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.controller.inner.try_borrow_mut() {
            inner.status.foreground_playing = false;
        }
        self.controller.set_ducked(false);
    }
}

impl AudioController {
    /// Create the foreground channel and the background pool up front.
    #[must_use]
    pub fn new(backend: &dyn AudioBackend, audio_file_url_base: &str, quick_audio: bool) -> Self {
        let foreground = backend.create_channel(ChannelRole::Foreground);
        let background: Rc<[Rc<dyn MediaChannel>]> = (0..BACKGROUND_POOL_SIZE)
            .map(|index| backend.create_channel(ChannelRole::Background(index)))
            .collect();
        Self {
            inner: Rc::new(RefCell::new(AudioInner {
                url_base: audio_file_url_base.to_owned(),
                quick_audio,
                current_station: None,
                free_channels: (0..BACKGROUND_POOL_SIZE).rev().collect(),
                sounds: Vec::new(),
                next_sound_id: 0,
                ducked: false,
                executing_reset: None,
                generation: 0,
                status: AudioStatus::default(),
            })),
            foreground,
            background,
        }
    }

    #[must_use]
    pub fn status(&self) -> AudioStatus {
        self.inner.borrow().status.clone()
    }

    #[must_use]
    pub fn should_show_scanner(&self) -> bool {
        self.inner.borrow().status.should_show_scanner()
    }

    /// Play one foreground track.
    ///
    /// The busy check happens when this is called, not when the returned
    /// future is first polled, so a second call made before the first
    /// finishes yields [`AudioError::ConcurrentForegroundRequest`].
    /// Otherwise the track is loaded, `wait` seconds pass once it is ready,
    /// and playback starts at `position`. The future resolves when the track
    /// ends, or fails with [`AudioError::PlaybackStalled`] when loading or
    /// playback makes no progress for the stall timeout.
    pub fn play_foreground_audio(
        &self,
        filename: &str,
        wait: f64,
        position: f64,
    ) -> impl Future<Output = Result<(), AudioError>> + use<> {
        let reservation = self.reserve_foreground(filename);
        let controller = self.clone();
        async move { controller.run_foreground(reservation?, wait, position).await }
    }

    /// Play several tracks back to back as one unit. Stops quietly if the
    /// foreground channel is taken.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::PlaybackStalled`] if any track stalls; later
    /// tracks are not played.
    pub async fn play_multiple_foreground_audio(&self, filenames: &[String]) -> Result<(), AudioError> {
        for filename in filenames {
            match self.play_foreground_audio(filename, 0.0, 0.0).await {
                Ok(()) => {}
                Err(AudioError::ConcurrentForegroundRequest { .. }) => {
                    debug!("Foreground busy; dropping remaining tracks from {filename}");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Replay the track recorded by the last stall from where it stopped.
    /// Returns `Ok(false)` when nothing is waiting to be retried.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::play_foreground_audio`].
    pub async fn retry_stalled_audio(&self) -> Result<bool, AudioError> {
        let Some(stalled) = self.status().audio_timeout else {
            return Ok(false);
        };
        let reservation = self.reserve_foreground(&stalled.audio_filename)?;
        self.clear_audio_timeout();
        self.run_foreground(reservation, 0.0, stalled.position)
            .await
            .map(|()| true)
    }

    pub fn clear_audio_timeout(&self) {
        self.inner.borrow_mut().status.audio_timeout = None;
    }

    fn reserve_foreground(&self, filename: &str) -> Result<ForegroundReservation, AudioError> {
        let mut inner = self.inner.borrow_mut();
        if inner.status.foreground_playing {
            debug!("Foreground audio busy; rejecting {filename}");
            return Err(AudioError::ConcurrentForegroundRequest {
                filename: filename.to_owned(),
            });
        }
        inner.status.foreground_playing = true;
        inner.status.foreground_filename = Some(filename.to_owned());
        inner.status.station_is_executing = true;
        if let Some(pending) = inner.executing_reset.take() {
            pending.abort();
        }
        let generation = inner.generation;
        drop(inner);
        Ok(ForegroundReservation {
            controller: self.clone(),
            filename: filename.to_owned(),
            generation,
        })
    }

    async fn run_foreground(
        &self,
        reservation: ForegroundReservation,
        wait: f64,
        position: f64,
    ) -> Result<(), AudioError> {
        let filename = reservation.filename.clone();
        let generation = reservation.generation;
        let url = self.foreground_url(&filename);
        info!("Playing {filename} from {position:.2}s");

        let outcome = self.drive_foreground(&url, wait, position).await;
        drop(reservation);
        let current = self.inner.borrow().generation == generation;

        let result = match outcome {
            Ok(()) => {
                debug!("Foreground audio {filename} ended");
                if current {
                    self.inner
                        .borrow_mut()
                        .status
                        .played_foreground_audio
                        .push(filename);
                }
                Ok(())
            }
            Err(last_position) => {
                warn!("Foreground audio {filename} stalled at {last_position:.2}s");
                self.foreground.stop();
                if current {
                    self.inner.borrow_mut().status.audio_timeout = Some(AudioTimeout {
                        audio_filename: filename.clone(),
                        position: last_position,
                    });
                }
                Err(AudioError::PlaybackStalled {
                    filename,
                    position: last_position,
                })
            }
        };
        self.schedule_executing_reset();
        result
    }

    /// Load, wait, play. `Err` carries the last known playback offset.
    async fn drive_foreground(&self, url: &str, wait: f64, position: f64) -> Result<(), f64> {
        let channel = Rc::clone(&self.foreground);
        channel.load(url);

        let deadline = Instant::now() + STALL_TIMEOUT;
        loop {
            match timeout_at(deadline, channel.next_event()).await {
                Ok(Some(MediaEvent::CanPlay)) => break,
                Ok(Some(MediaEvent::TimeUpdate(_) | MediaEvent::Ended)) => {}
                Ok(Some(MediaEvent::Error(message))) => {
                    warn!("Loading {url} failed: {message}");
                    return Err(position);
                }
                Ok(None) | Err(_) => return Err(position),
            }
        }

        sleep(seconds(wait)).await;
        self.set_ducked(true);
        channel.play(position);

        let mut last_position = position;
        let mut deadline = Instant::now() + STALL_TIMEOUT;
        loop {
            match timeout_at(deadline, channel.next_event()).await {
                Ok(Some(MediaEvent::TimeUpdate(now))) => {
                    // Repeated reports of the same offset are not progress.
                    if (now - last_position).abs() > f64::EPSILON {
                        last_position = now;
                        deadline = Instant::now() + STALL_TIMEOUT;
                    }
                }
                Ok(Some(MediaEvent::Ended)) => return Ok(()),
                Ok(Some(MediaEvent::CanPlay)) => {}
                Ok(Some(MediaEvent::Error(message))) => {
                    warn!("Playback of {url} failed: {message}");
                    return Err(last_position);
                }
                Ok(None) | Err(_) => return Err(last_position),
            }
        }
    }

    /// Clear `station_is_executing` once the foreground channel has been idle
    /// for the reopen delay.
    fn schedule_executing_reset(&self) {
        let controller = self.clone();
        let handle = spawn_local(async move {
            loop {
                sleep(SCAN_UI_REOPEN_DELAY).await;
                let mut inner = controller.inner.borrow_mut();
                if !inner.status.foreground_playing {
                    inner.status.station_is_executing = false;
                    inner.executing_reset = None;
                    break;
                }
            }
        })
        .abort_handle();
        if let Some(previous) = self.inner.borrow_mut().executing_reset.replace(handle) {
            previous.abort();
        }
    }

    fn set_ducked(&self, ducked: bool) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };
        if inner.ducked == ducked {
            return;
        }
        inner.ducked = ducked;
        let channels: Vec<usize> = inner
            .sounds
            .iter()
            .filter(|sound| sound.started)
            .map(|sound| sound.channel)
            .collect();
        drop(inner);

        let volume = if ducked {
            BACKGROUND_DUCKED_VOLUME
        } else {
            BACKGROUND_FULL_VOLUME
        };
        for index in channels {
            self.background[index].set_volume(volume);
        }
    }

    fn foreground_url(&self, filename: &str) -> String {
        let inner = self.inner.borrow();
        if inner.quick_audio {
            QUICK_AUDIO_FILENAME.to_owned()
        } else {
            join_paths(&[&inner.url_base, filename])
        }
    }

    /// Schedule a background track for the current station.
    ///
    /// Pending starts that belong to other stations are dropped first. The
    /// track starts after `event.wait` seconds unless the player has left the
    /// station by then.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::NoFreeBackgroundChannel`] when the pool is
    /// exhausted; the request is dropped.
    pub fn handle_play_background_audio_event(
        &self,
        event: &PlayBackgroundAudio,
    ) -> Result<(), ContentError> {
        self.cancel_sounds_where(|sound, current| {
            !sound.started && sound.station.as_deref() != current
        });

        let (id, channel, url) = {
            let mut inner = self.inner.borrow_mut();
            let Some(channel) = inner.free_channels.pop() else {
                return Err(ContentError::NoFreeBackgroundChannel {
                    filename: event.audio_filename.clone(),
                });
            };
            let id = inner.next_sound_id;
            inner.next_sound_id += 1;
            let station = inner.current_station.clone();
            inner.sounds.push(BackgroundSound {
                id,
                channel,
                station,
                cancel_on_leave: event.cancel_on_leave,
                started: false,
                task: None,
            });
            let url = join_paths(&[&inner.url_base, &event.audio_filename]);
            (id, channel, url)
        };

        debug!(
            "Scheduling background audio {} on channel {channel} in {:.2}s",
            event.audio_filename, event.wait
        );
        let controller = self.clone();
        let wait = seconds(event.wait);
        let looping = event.looping;
        let handle = spawn_local(async move {
            controller
                .run_background(id, channel, url, wait, looping)
                .await;
        })
        .abort_handle();

        if let Some(sound) = self
            .inner
            .borrow_mut()
            .sounds
            .iter_mut()
            .find(|sound| sound.id == id)
        {
            sound.task = Some(handle);
        }
        Ok(())
    }

    async fn run_background(&self, id: u64, channel: usize, url: String, wait: Duration, looping: bool) {
        sleep(wait).await;

        let volume = {
            let mut inner = self.inner.borrow_mut();
            let current = inner.current_station.clone();
            let Some(sound) = inner.sounds.iter().find(|sound| sound.id == id) else {
                return;
            };
            // The player may have left between scheduling and now.
            if sound.station != current {
                debug!("Dropping background audio {url}; its station is no longer current");
                inner.release_sound(id);
                return;
            }
            if let Some(sound) = inner.sounds.iter_mut().find(|sound| sound.id == id) {
                sound.started = true;
            }
            inner.status.background_playing = true;
            if inner.ducked {
                BACKGROUND_DUCKED_VOLUME
            } else {
                BACKGROUND_FULL_VOLUME
            }
        };

        let media = Rc::clone(&self.background[channel]);
        media.set_volume(volume);
        media.load(&url);
        while let Some(event) = media.next_event().await {
            match event {
                MediaEvent::CanPlay => media.play(0.0),
                MediaEvent::TimeUpdate(_) => {}
                MediaEvent::Ended if looping => media.play(0.0),
                MediaEvent::Ended => break,
                MediaEvent::Error(message) => {
                    warn!("Background audio {url} failed: {message}");
                    break;
                }
            }
        }
        self.inner.borrow_mut().release_sound(id);
    }

    fn cancel_sounds_where(&self, predicate: impl Fn(&BackgroundSound, Option<&str>) -> bool) -> usize {
        let cancelled: Vec<BackgroundSound> = {
            let mut inner = self.inner.borrow_mut();
            let current = inner.current_station.clone();
            let ids: Vec<u64> = inner
                .sounds
                .iter()
                .filter(|sound| predicate(sound, current.as_deref()))
                .map(|sound| sound.id)
                .collect();
            ids.into_iter()
                .filter_map(|id| inner.release_sound(id))
                .collect()
        };
        for sound in &cancelled {
            if let Some(task) = &sound.task {
                task.abort();
            }
            if sound.started {
                self.background[sound.channel].stop();
            }
        }
        cancelled.len()
    }

    /// Stop every playing background track flagged `cancelOnLeave` whose
    /// station is no longer current.
    pub fn cancel_due_background_sounds(&self) -> usize {
        self.cancel_sounds_where(|sound, current| {
            sound.cancel_on_leave && sound.station.as_deref() != current
        })
    }

    /// Drop every background track that has not started yet.
    pub fn cancel_all_background_timeouts(&self) -> usize {
        self.cancel_sounds_where(|sound, _| !sound.started)
    }

    pub fn stop_all_background(&self) -> usize {
        self.cancel_sounds_where(|_, _| true)
    }

    /// The player moved to a newly opened station.
    pub fn enter_station(&self, id: &str) {
        self.inner.borrow_mut().current_station = Some(id.to_owned());
        let due = self.cancel_due_background_sounds();
        let pending = self.cancel_all_background_timeouts();
        if due + pending > 0 {
            debug!("Entering {id}: stopped {due} background track(s), dropped {pending} pending");
        }
    }

    /// Align the owning-station view without cancelling anything, used when
    /// restoring a saved session.
    pub fn set_current_station(&self, id: Option<StationId>) {
        self.inner.borrow_mut().current_station = id;
    }

    /// Bring back the persisted parts of a saved status.
    pub fn restore_status(&self, saved: AudioStatus) {
        let mut inner = self.inner.borrow_mut();
        inner.status.played_foreground_audio = saved.played_foreground_audio;
        inner.status.audio_timeout = saved.audio_timeout;
    }

    /// Stop background audio and forget history. A foreground track already
    /// in flight keeps its claim on the channel until it finishes, but its
    /// end or stall is no longer recorded.
    pub fn reset(&self) {
        self.stop_all_background();
        let mut inner = self.inner.borrow_mut();
        inner.generation += 1;
        if let Some(pending) = inner.executing_reset.take() {
            pending.abort();
        }
        inner.current_station = None;
        let in_flight = inner.status.foreground_playing;
        inner.status = AudioStatus {
            foreground_playing: in_flight,
            foreground_filename: inner
                .status
                .foreground_filename
                .take()
                .filter(|_| in_flight),
            station_is_executing: in_flight,
            ..AudioStatus::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    fn background(filename: &str, wait: f64, cancel_on_leave: bool, looping: bool) -> PlayBackgroundAudio {
        PlayBackgroundAudio {
            audio_filename: filename.to_owned(),
            wait,
            cancel_on_leave,
            looping,
            then: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_foreground_request_is_rejected_until_first_finishes() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "/audio", false);

                let first = audio.play_foreground_audio("a.mp3", 0.0, 0.0);
                let second = audio.play_foreground_audio("b.mp3", 0.0, 0.0).await;
                assert_eq!(
                    second,
                    Err(AudioError::ConcurrentForegroundRequest {
                        filename: String::from("b.mp3")
                    })
                );

                first.await.unwrap();
                audio.play_foreground_audio("c.mp3", 0.0, 0.0).await.unwrap();

                assert_eq!(audio.status().played_foreground_audio, vec!["a.mp3", "c.mp3"]);
                assert_eq!(backend.foreground_plays(), vec!["/audio/a.mp3", "/audio/c.mp3"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_track_is_recorded_and_resumed() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new()
                    .with_track("long.mp3", TrackProfile::stalls_after(4.0, 1.5));
                let audio = AudioController::new(&backend, "", false);

                let started = Instant::now();
                let err = audio.play_foreground_audio("long.mp3", 0.0, 0.0).await.unwrap_err();
                assert_eq!(
                    err,
                    AudioError::PlaybackStalled {
                        filename: String::from("long.mp3"),
                        position: 1.5
                    }
                );
                assert!(started.elapsed() >= STALL_TIMEOUT);
                let status = audio.status();
                assert!(!status.foreground_playing);
                assert_eq!(
                    status.audio_timeout,
                    Some(AudioTimeout {
                        audio_filename: String::from("long.mp3"),
                        position: 1.5
                    })
                );

                backend.set_track("long.mp3", TrackProfile::plays(4.0));
                assert_eq!(audio.retry_stalled_audio().await, Ok(true));
                assert_eq!(audio.status().audio_timeout, None);
                assert_eq!(audio.status().played_foreground_audio, vec!["long.mp3"]);
                assert!(backend
                    .log()
                    .iter()
                    .any(|record| record.action == PlaybackAction::Play { from: 1.5 }));

                assert_eq!(audio.retry_stalled_audio().await, Ok(false));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn track_that_never_loads_stalls_at_requested_position() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new().with_track("gone.mp3", TrackProfile::never_loads());
                let audio = AudioController::new(&backend, "", false);
                let err = audio.play_foreground_audio("gone.mp3", 0.0, 3.0).await.unwrap_err();
                assert_eq!(err.resume_position(), Some(3.0));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn media_errors_become_stalls() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new().with_track("bad.mp3", TrackProfile::fails("decode"));
                let audio = AudioController::new(&backend, "", false);
                let err = audio.play_foreground_audio("bad.mp3", 0.0, 0.0).await.unwrap_err();
                assert!(matches!(err, AudioError::PlaybackStalled { .. }));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn multiple_tracks_play_in_order() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                let tracks = vec![String::from("one.mp3"), String::from("two.mp3")];
                audio.play_multiple_foreground_audio(&tracks).await.unwrap();
                assert_eq!(audio.status().played_foreground_audio, tracks);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn multiple_tracks_stop_quietly_when_busy() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                let first = audio.play_foreground_audio("narration.mp3", 0.0, 0.0);
                let tracks = vec![String::from("help.mp3")];
                assert_eq!(audio.play_multiple_foreground_audio(&tracks).await, Ok(()));
                first.await.unwrap();
                assert_eq!(audio.status().played_foreground_audio, vec!["narration.mp3"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn quick_audio_substitutes_beep() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "/audio", true);
                audio.play_foreground_audio("intro.mp3", 0.0, 0.0).await.unwrap();
                assert_eq!(backend.foreground_plays(), vec![QUICK_AUDIO_FILENAME]);
                assert_eq!(audio.status().played_foreground_audio, vec!["intro.mp3"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn scanner_reappears_after_reopen_delay() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                assert!(audio.should_show_scanner());

                audio.play_foreground_audio("a.mp3", 0.0, 0.0).await.unwrap();
                assert!(audio.status().station_is_executing);
                assert!(!audio.should_show_scanner());

                sleep(SCAN_UI_REOPEN_DELAY + Duration::from_millis(100)).await;
                assert!(audio.should_show_scanner());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn background_is_ducked_under_foreground() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new()
                    .with_track("rain.mp3", TrackProfile::plays(600.0))
                    .with_track("voice.mp3", TrackProfile::plays(2.0));
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                audio
                    .handle_play_background_audio_event(&background("rain.mp3", 0.0, false, false))
                    .unwrap();
                sleep(Duration::from_millis(500)).await;
                let channel = ChannelRole::Background(0);
                assert_eq!(backend.volume(channel), Some(BACKGROUND_FULL_VOLUME));
                assert!(audio.status().background_playing);

                let voice = spawn_local(audio.play_foreground_audio("voice.mp3", 0.0, 0.0));
                sleep(Duration::from_secs(1)).await;
                assert_eq!(backend.volume(channel), Some(BACKGROUND_DUCKED_VOLUME));

                voice.await.unwrap().unwrap();
                assert_eq!(backend.volume(channel), Some(BACKGROUND_FULL_VOLUME));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_stops_only_cancel_on_leave_sounds() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new().with_default_track(TrackProfile::plays(600.0));
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                audio
                    .handle_play_background_audio_event(&background("wind.mp3", 0.0, true, false))
                    .unwrap();
                audio
                    .handle_play_background_audio_event(&background("drone.mp3", 0.0, false, false))
                    .unwrap();
                sleep(Duration::from_millis(500)).await;
                assert_eq!(backend.playing_background().len(), 2);

                audio.enter_station("cellar");
                assert_eq!(backend.playing_background(), vec!["drone.mp3"]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn pending_start_is_dropped_when_player_moves_on() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                audio
                    .handle_play_background_audio_event(&background("late.mp3", 5.0, false, false))
                    .unwrap();
                sleep(Duration::from_secs(1)).await;
                audio.enter_station("cellar");
                sleep(Duration::from_secs(10)).await;
                assert!(backend.background_plays().is_empty());
                assert!(!audio.status().background_playing);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_rechecked_against_current_station() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                audio
                    .handle_play_background_audio_event(&background("late.mp3", 2.0, false, false))
                    .unwrap();
                // Moving without the usual cancellation still must not start it.
                audio.set_current_station(Some(String::from("attic")));
                sleep(Duration::from_secs(5)).await;
                assert!(backend.background_plays().is_empty());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn looping_track_replays_from_start() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                audio
                    .handle_play_background_audio_event(&background("loop.mp3", 0.0, true, true))
                    .unwrap();
                sleep(Duration::from_millis(3500)).await;
                assert!(backend.background_plays().len() >= 3);
                assert!(backend
                    .log()
                    .iter()
                    .filter(|record| matches!(record.role, ChannelRole::Background(_)))
                    .all(|record| record.action != PlaybackAction::Play { from: 1.0 }));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn pool_exhaustion_is_reported() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new().with_default_track(TrackProfile::plays(600.0));
                let audio = AudioController::new(&backend, "", false);
                audio.enter_station("hall");
                for index in 0..BACKGROUND_POOL_SIZE {
                    audio
                        .handle_play_background_audio_event(&background(&format!("bg{index}.mp3"), 0.0, false, false))
                        .unwrap();
                }
                let err = audio
                    .handle_play_background_audio_event(&background("extra.mp3", 0.0, false, false))
                    .unwrap_err();
                assert_eq!(
                    err,
                    ContentError::NoFreeBackgroundChannel {
                        filename: String::from("extra.mp3")
                    }
                );

                assert_eq!(audio.stop_all_background(), BACKGROUND_POOL_SIZE);
                audio
                    .handle_play_background_audio_event(&background("extra.mp3", 0.0, false, false))
                    .unwrap();
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn reset_forgets_history() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new();
                let audio = AudioController::new(&backend, "", false);
                audio.play_foreground_audio("a.mp3", 0.0, 0.0).await.unwrap();
                audio.reset();
                assert_eq!(audio.status(), AudioStatus::default());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn track_in_flight_during_reset_is_not_recorded() {
        LocalSet::new()
            .run_until(async {
                let backend = SimulatedBackend::new()
                    .with_track("long.mp3", TrackProfile::plays(30.0))
                    .with_track("stuck.mp3", TrackProfile::never_loads());
                let audio = AudioController::new(&backend, "", false);

                let playback = spawn_local(audio.play_foreground_audio("long.mp3", 0.0, 0.0));
                sleep(Duration::from_secs(2)).await;
                audio.reset();
                assert!(playback.await.unwrap().is_ok());
                assert!(audio.status().played_foreground_audio.is_empty());

                let stalled = spawn_local(audio.play_foreground_audio("stuck.mp3", 0.0, 0.0));
                sleep(Duration::from_secs(2)).await;
                audio.reset();
                assert!(stalled.await.unwrap().is_err());
                assert_eq!(audio.status().audio_timeout, None);
                assert!(!audio.status().foreground_playing);
            })
            .await;
    }
}

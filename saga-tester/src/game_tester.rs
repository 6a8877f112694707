use colored::Colorize;
use saga_engine::{AudioError, GameConfig, SagaSession, SessionOptions, SessionSnapshot, SimulatedBackend};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::task::LocalSet;
use tokio::time::sleep;

use crate::scenarios::{RunOutcome, Scenario, Step};
use crate::util::duration_serde;

/// Why a step could not be carried out.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("station {0} is not part of the game config")]
    UnknownStation(String),
    #[error("code {0} does not resolve to a station")]
    UnresolvedCode(String),
    #[error("no stalled audio to retry")]
    NothingToRetry,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("snapshot round trip failed: {0}")]
    Snapshot(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub steps_run: usize,
    pub failures: Vec<String>,
    /// Virtual time the scenario spanned.
    #[serde(with = "duration_serde")]
    pub game_time: Duration,
    #[serde(with = "duration_serde")]
    pub wall_time: Duration,
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

/// Runs scenarios against one game config, each on its own paused-clock
/// runtime so audio and timers take no real time.
#[derive(Debug, Clone)]
pub struct GameTester {
    config: GameConfig,
    verbose: bool,
}

impl GameTester {
    pub const fn new(config: GameConfig, verbose: bool) -> Self {
        Self { config, verbose }
    }

    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns an error if the scenario runtime cannot be built.
    pub fn run_scenario(&self, scenario: &Scenario, seed: u64) -> std::io::Result<ScenarioResult> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()?;
        let started = Instant::now();
        let local = LocalSet::new();
        let (steps_run, failures, game_time) = local.block_on(&runtime, self.play(scenario, seed));

        Ok(ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            steps_run,
            failures,
            game_time,
            wall_time: started.elapsed(),
        })
    }

    async fn play(&self, scenario: &Scenario, seed: u64) -> (usize, Vec<String>, Duration) {
        let backend = SimulatedBackend::new();
        for (filename, track) in &scenario.tracks {
            backend.set_track(filename, track.profile());
        }
        let options = SessionOptions {
            seed,
            ..scenario.options
        };
        let session = SagaSession::new(self.config.clone(), &backend, options);
        let clock = tokio::time::Instant::now();

        let mut failures = Vec::new();
        let mut steps_run = 0;
        for (index, step) in scenario.steps.iter().enumerate() {
            if self.verbose {
                println!("  {} {step:?}", format!("step {}", index + 1).as_str().dimmed());
            }
            steps_run += 1;
            if let Err(err) = apply_step(&session, &backend, step).await {
                failures.push(format!("step {} ({step:?}): {err}", index + 1));
                break;
            }
        }

        let snapshot = session.snapshot();
        let run = RunOutcome {
            user: snapshot.user,
            audio: snapshot.audio,
            background_plays: backend.background_plays(),
        };
        failures.extend(
            scenario
                .expectations
                .iter()
                .filter_map(|expectation| expectation.check(&run).err()),
        );

        // Stop looping ambience so the runtime can wind down.
        session.audio().stop_all_background();
        (steps_run, failures, clock.elapsed())
    }
}

async fn apply_step(
    session: &SagaSession,
    backend: &SimulatedBackend,
    step: &Step,
) -> Result<(), StepError> {
    match step {
        Step::Scan { code, settle } => {
            session
                .scan(code)
                .ok_or_else(|| StepError::UnresolvedCode(code.clone()))?;
            sleep(seconds(*settle)).await;
        }
        Step::Visit { station, settle } => {
            session
                .run_station_by_id(station)
                .ok_or_else(|| StepError::UnknownStation(station.clone()))?;
            sleep(seconds(*settle)).await;
        }
        Step::Wait { seconds: wait } => sleep(seconds(*wait)).await,
        Step::SetAdHoc { key, value } => {
            session.with_state_mut(|state| state.set_ad_hoc(key, value.clone()));
        }
        Step::Reload => {
            let text = serde_json::to_string(&session.snapshot())?;
            let snapshot: SessionSnapshot = serde_json::from_str(&text)?;
            session.restore(snapshot);
        }
        Step::Wipe => session.wipe_history(),
        Step::RetryStalled => {
            if !session.audio().retry_stalled_audio().await? {
                return Err(StepError::NothingToRetry);
            }
        }
        Step::SetTrack { filename, track } => backend.set_track(filename, track.profile()),
    }
    Ok(())
}

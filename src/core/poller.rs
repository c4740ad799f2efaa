//! 3D status poll loop.
//!
//! One loop per model job, tagged with the job's [`PollGeneration`]. The loop
//! polls, applies the result, waits the fixed interval and repeats until a
//! terminal status. Once the workflow moves to a newer generation every
//! result of this loop is rejected by the state machine and the loop exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::store::WorkflowStore;
use crate::providers::{JobBackend, ModelStatus};
use crate::state::{ClientSettings, PollGeneration, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Consecutive failed polls before the job is marked failed.
    pub max_consecutive_errors: u32,
}

impl PollConfig {
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            interval: settings.poll_interval(),
            max_consecutive_errors: settings.max_poll_errors.max(1),
        }
    }
}

pub fn spawn_poll_loop<B: JobBackend + 'static>(
    backend: Arc<B>,
    store: WorkflowStore,
    task_id: String,
    generation: PollGeneration,
    config: PollConfig,
) -> JoinHandle<()> {
    tokio::spawn(run_poll_loop(backend, store, task_id, generation, config))
}

pub async fn run_poll_loop<B: JobBackend>(
    backend: Arc<B>,
    store: WorkflowStore,
    task_id: String,
    generation: PollGeneration,
    config: PollConfig,
) {
    info!(%task_id, %generation, "3D poll loop started");
    loop {
        if store.read(|state| state.generation()) != generation {
            debug!(%task_id, %generation, "poll loop superseded before polling");
            return;
        }

        let transition = match backend.poll_model(&task_id).await {
            Ok(ModelStatus::Processing { progress }) => {
                debug!(%task_id, progress, "3D model processing");
                Transition::ModelProgress {
                    generation,
                    progress,
                }
            }
            Ok(ModelStatus::Succeeded {
                artifact_urls,
                thumbnail_url,
            }) => Transition::ModelSucceeded {
                generation,
                artifact_urls,
                thumbnail_url,
            },
            Ok(ModelStatus::Failed { message }) => Transition::ModelFailed {
                generation,
                message,
                polled: true,
            },
            Ok(ModelStatus::DemoMode { message }) => Transition::ModelDemo {
                generation,
                message,
            },
            Err(err) => {
                let failures = store.read(|state| {
                    state
                        .model()
                        .filter(|model| model.generation == generation)
                        .map(|model| model.consecutive_errors)
                        .unwrap_or(0)
                }) + 1;
                warn!(%task_id, failures, error = %err, "3D status poll failed");
                if failures >= config.max_consecutive_errors {
                    Transition::ModelFailed {
                        generation,
                        message: err.user_message(),
                        polled: true,
                    }
                } else {
                    Transition::ModelPollError {
                        generation,
                        message: err.user_message(),
                    }
                }
            }
        };

        let finished = store.apply_then(transition, |state| {
            let terminal = state
                .model()
                .map_or(true, |model| model.status.is_terminal());
            (state.phase(), terminal)
        });
        match finished {
            Ok((_, (phase, true))) => {
                info!(%task_id, ?phase, "3D poll loop finished");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(%task_id, %generation, "dropping poll result: {}", err);
                return;
            }
        }

        tokio::time::sleep(config.interval).await;
    }
}

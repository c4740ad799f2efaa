//! The result state machine.
//!
//! `WorkflowState` is the single "currently displayed job" slot. Every change
//! goes through [`WorkflowState::apply`]; collaborators read clones of it.
//!
//! ```text
//! Idle -> Staged -> Transforming -> Transformed -> ModelGenerating -> ModelReady
//!                        |                               |  \
//!                        v                               v   -> ModelDemo
//!                  TransformFailed                  ModelFailed
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::constants::CANCELLED_MESSAGE;
use crate::core::error::{TransitionError, ValidationError};
use crate::core::request::TransformParams;
use crate::state::{
    ModelJob, ModelJobStatus, PollGeneration, Preview, StagedImage, StyleId, StyleSelector,
    TransformJob, TransformResult, TransformStatus, UploadStaging,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Staged,
    Transforming,
    Transformed,
    TransformFailed,
    ModelGenerating,
    ModelReady,
    ModelFailed,
    /// The backend has no 3D credentials; informational, never polled.
    ModelDemo,
}

impl Phase {
    /// Phases in which a transform result is on screen.
    pub fn has_transform_result(self) -> bool {
        matches!(
            self,
            Phase::Transformed
                | Phase::ModelGenerating
                | Phase::ModelReady
                | Phase::ModelFailed
                | Phase::ModelDemo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

impl PhaseChange {
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Stage {
        image: StagedImage,
        preview: Preview,
    },
    SelectStyle(StyleId),
    SetParams(TransformParams),
    BeginTransform,
    TransformSucceeded {
        job_id: Uuid,
        result: TransformResult,
    },
    TransformFailed {
        job_id: Uuid,
        message: String,
    },
    BeginModel,
    ModelSubmitted {
        generation: PollGeneration,
        task_id: String,
    },
    ModelProgress {
        generation: PollGeneration,
        progress: u8,
    },
    ModelPollError {
        generation: PollGeneration,
        message: String,
    },
    ModelSucceeded {
        generation: PollGeneration,
        artifact_urls: BTreeMap<String, String>,
        thumbnail_url: Option<String>,
    },
    ModelFailed {
        generation: PollGeneration,
        message: String,
        /// True when the failure came back from a status poll.
        polled: bool,
    },
    ModelDemo {
        generation: PollGeneration,
        message: String,
    },
    /// Drops the live poll loop (navigation, reload, shutdown).
    Invalidate,
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::Stage { .. } => "stage",
            Transition::SelectStyle(_) => "select_style",
            Transition::SetParams(_) => "set_params",
            Transition::BeginTransform => "begin_transform",
            Transition::TransformSucceeded { .. } => "transform_succeeded",
            Transition::TransformFailed { .. } => "transform_failed",
            Transition::BeginModel => "begin_model",
            Transition::ModelSubmitted { .. } => "model_submitted",
            Transition::ModelProgress { .. } => "model_progress",
            Transition::ModelPollError { .. } => "model_poll_error",
            Transition::ModelSucceeded { .. } => "model_succeeded",
            Transition::ModelFailed { .. } => "model_failed",
            Transition::ModelDemo { .. } => "model_demo",
            Transition::Invalidate => "invalidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowState {
    phase: Phase,
    staging: UploadStaging,
    style: StyleSelector,
    params: TransformParams,
    transform: Option<TransformJob>,
    model: Option<ModelJob>,
    generation: PollGeneration,
    last_error: Option<String>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new(StyleId::default(), TransformParams::default())
    }
}

impl WorkflowState {
    pub fn new(style: StyleId, params: TransformParams) -> Self {
        Self {
            phase: Phase::Idle,
            staging: UploadStaging::default(),
            style: StyleSelector::with_default(style),
            params,
            transform: None,
            model: None,
            generation: PollGeneration::default(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn staging(&self) -> &UploadStaging {
        &self.staging
    }

    pub fn style(&self) -> &StyleId {
        self.style.selected()
    }

    pub fn params(&self) -> TransformParams {
        self.params
    }

    pub fn transform(&self) -> Option<&TransformJob> {
        self.transform.as_ref()
    }

    pub fn model(&self) -> Option<&ModelJob> {
        self.model.as_ref()
    }

    /// Token of the live (or most recent) poll loop.
    pub fn generation(&self) -> PollGeneration {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn can_submit(&self) -> bool {
        self.staging.is_ready() && self.phase != Phase::Transforming
    }

    pub fn can_request_model(&self) -> bool {
        self.phase.has_transform_result() && self.result_image_id().is_some()
    }

    pub fn result_image_id(&self) -> Option<&str> {
        self.transform.as_ref().and_then(|job| job.result_image_id())
    }

    pub fn apply(&mut self, transition: Transition) -> Result<PhaseChange, TransitionError> {
        let from = self.phase;
        let name = transition.name();
        self.apply_inner(transition)?;
        let change = PhaseChange {
            from,
            to: self.phase,
        };
        if change.is_change() {
            debug!(transition = name, from = ?change.from, to = ?change.to, "workflow transition");
        }
        Ok(change)
    }

    fn apply_inner(&mut self, transition: Transition) -> Result<(), TransitionError> {
        match transition {
            Transition::Stage { image, preview } => {
                self.invalidate_poll();
                self.staging.replace(image, preview);
                self.transform = None;
                self.model = None;
                self.last_error = None;
                self.phase = Phase::Staged;
            }
            Transition::SelectStyle(style) => self.style.select(style),
            Transition::SetParams(params) => self.params = params,
            Transition::BeginTransform => {
                if self.phase == Phase::Transforming {
                    return Err(self.invalid("begin_transform"));
                }
                let staged = self
                    .staging
                    .staged()
                    .ok_or(ValidationError::MissingImage)?;
                let job = TransformJob::pending(
                    staged.file_name.clone(),
                    self.style.selected().clone(),
                    self.params,
                );
                self.invalidate_poll();
                self.transform = Some(job);
                self.model = None;
                self.last_error = None;
                self.phase = Phase::Transforming;
            }
            Transition::TransformSucceeded { job_id, result } => {
                let job = self.pending_transform(job_id)?;
                job.status = TransformStatus::Succeeded;
                job.result = Some(result);
                self.phase = Phase::Transformed;
            }
            Transition::TransformFailed { job_id, message } => {
                let job = self.pending_transform(job_id)?;
                job.status = TransformStatus::Failed;
                job.error = Some(message.clone());
                self.last_error = Some(message);
                self.phase = Phase::TransformFailed;
            }
            Transition::BeginModel => {
                if !self.phase.has_transform_result() {
                    return Err(self.invalid("begin_model"));
                }
                let parent = self
                    .result_image_id()
                    .ok_or(ValidationError::MissingTransformResult)?
                    .to_string();
                self.invalidate_poll();
                self.model = Some(ModelJob::queued(self.generation, parent));
                self.last_error = None;
                self.phase = Phase::ModelGenerating;
            }
            Transition::ModelSubmitted {
                generation,
                task_id,
            } => {
                let model = self.live_model(generation)?;
                model.task_id = Some(task_id);
                model.status = ModelJobStatus::Processing { progress: 0 };
            }
            Transition::ModelProgress {
                generation,
                progress,
            } => {
                let model = self.live_model(generation)?;
                model.poll_attempts += 1;
                model.consecutive_errors = 0;
                model.status = ModelJobStatus::Processing {
                    progress: progress.min(100),
                };
            }
            Transition::ModelPollError {
                generation,
                message,
            } => {
                let model = self.live_model(generation)?;
                model.poll_attempts += 1;
                model.consecutive_errors += 1;
                model.last_error = Some(message);
            }
            Transition::ModelSucceeded {
                generation,
                artifact_urls,
                thumbnail_url,
            } => {
                let model = self.live_model(generation)?;
                model.poll_attempts += 1;
                model.consecutive_errors = 0;
                model.status = ModelJobStatus::Succeeded {
                    artifact_urls,
                    thumbnail_url,
                };
                self.phase = Phase::ModelReady;
            }
            Transition::ModelFailed {
                generation,
                message,
                polled,
            } => {
                let model = self.live_model(generation)?;
                if polled {
                    model.poll_attempts += 1;
                }
                model.status = ModelJobStatus::Failed {
                    message: message.clone(),
                };
                self.last_error = Some(message);
                self.phase = Phase::ModelFailed;
            }
            Transition::ModelDemo {
                generation,
                message,
            } => {
                let model = self.live_model(generation)?;
                model.status = ModelJobStatus::DemoMode { message };
                self.phase = Phase::ModelDemo;
            }
            Transition::Invalidate => {
                self.invalidate_poll();
                if self.phase == Phase::ModelGenerating {
                    if let Some(model) = self.model.as_mut() {
                        model.status = ModelJobStatus::Failed {
                            message: CANCELLED_MESSAGE.to_string(),
                        };
                    }
                    self.last_error = Some(CANCELLED_MESSAGE.to_string());
                    self.phase = Phase::ModelFailed;
                }
            }
        }
        Ok(())
    }

    fn invalidate_poll(&mut self) {
        self.generation = self.generation.next();
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::InvalidPhase {
            phase: self.phase,
            action,
        }
    }

    fn pending_transform(&mut self, job_id: Uuid) -> Result<&mut TransformJob, TransitionError> {
        if self.phase != Phase::Transforming {
            return Err(self.invalid("resolve_transform"));
        }
        match self.transform.as_mut() {
            Some(job) if job.id == job_id && !job.is_terminal() => Ok(job),
            _ => Err(TransitionError::StaleTransform),
        }
    }

    fn live_model(&mut self, generation: PollGeneration) -> Result<&mut ModelJob, TransitionError> {
        if generation != self.generation {
            return Err(TransitionError::StaleGeneration {
                received: generation,
                current: self.generation,
            });
        }
        let invalid = self.invalid("update_model");
        if self.phase != Phase::ModelGenerating {
            return Err(invalid);
        }
        self.model.as_mut().ok_or(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SelectedFile;

    fn staged() -> (StagedImage, Preview) {
        let file = SelectedFile::new("me.jpg", Some("image/jpeg"), vec![0xFF, 0xD8, 0xFF]);
        let image = UploadStaging::validate(file, 1024).unwrap();
        let preview = Preview {
            data_uri: "data:image/jpeg;base64,/9j/".to_string(),
            dimensions: None,
        };
        (image, preview)
    }

    fn result(id: &str) -> TransformResult {
        TransformResult {
            image_id: id.to_string(),
            image_url: format!("/img/{}.png", id),
            original_url: None,
        }
    }

    fn transformed_state() -> WorkflowState {
        let mut state = WorkflowState::default();
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();
        state.apply(Transition::BeginTransform).unwrap();
        let job_id = state.transform().unwrap().id;
        state
            .apply(Transition::TransformSucceeded {
                job_id,
                result: result("abc"),
            })
            .unwrap();
        state
    }

    #[test]
    fn test_happy_path_to_model_ready() {
        let mut state = transformed_state();
        assert_eq!(state.phase(), Phase::Transformed);
        assert_eq!(state.result_image_id(), Some("abc"));

        let change = state.apply(Transition::BeginModel).unwrap();
        assert_eq!(change.to, Phase::ModelGenerating);
        let generation = state.generation();
        state
            .apply(Transition::ModelSubmitted {
                generation,
                task_id: "t1".to_string(),
            })
            .unwrap();
        state
            .apply(Transition::ModelProgress {
                generation,
                progress: 40,
            })
            .unwrap();
        assert_eq!(state.model().unwrap().progress(), Some(40));

        let mut urls = BTreeMap::new();
        urls.insert("glb".to_string(), "/m/t1.glb".to_string());
        state
            .apply(Transition::ModelSucceeded {
                generation,
                artifact_urls: urls.clone(),
                thumbnail_url: None,
            })
            .unwrap();
        assert_eq!(state.phase(), Phase::ModelReady);
        assert_eq!(state.model().unwrap().poll_attempts, 2);
        assert_eq!(
            state.model().unwrap().status,
            ModelJobStatus::Succeeded {
                artifact_urls: urls,
                thumbnail_url: None
            }
        );
    }

    #[test]
    fn test_submit_requires_staged_image() {
        let mut state = WorkflowState::default();
        let err = state.apply(Transition::BeginTransform).unwrap_err();
        assert_eq!(err, TransitionError::Validation(ValidationError::MissingImage));
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_second_submit_while_transforming_is_refused() {
        let mut state = WorkflowState::default();
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();
        state.apply(Transition::BeginTransform).unwrap();
        let job_id = state.transform().unwrap().id;

        assert!(!state.can_submit());
        assert!(matches!(
            state.apply(Transition::BeginTransform),
            Err(TransitionError::InvalidPhase { .. })
        ));
        assert_eq!(state.transform().unwrap().id, job_id);
    }

    #[test]
    fn test_transform_failure_allows_retry() {
        let mut state = WorkflowState::default();
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();
        state.apply(Transition::BeginTransform).unwrap();
        let job_id = state.transform().unwrap().id;
        state
            .apply(Transition::TransformFailed {
                job_id,
                message: "GPU busy".to_string(),
            })
            .unwrap();
        assert_eq!(state.phase(), Phase::TransformFailed);
        assert_eq!(state.last_error(), Some("GPU busy"));
        assert!(state.can_submit());

        state.apply(Transition::BeginTransform).unwrap();
        assert_eq!(state.phase(), Phase::Transforming);
        assert_ne!(state.transform().unwrap().id, job_id);
    }

    #[test]
    fn test_stale_generation_is_dropped() {
        let mut state = transformed_state();
        state.apply(Transition::BeginModel).unwrap();
        let old = state.generation();
        state.apply(Transition::BeginModel).unwrap();
        let current = state.generation();
        assert!(current > old);

        let err = state
            .apply(Transition::ModelProgress {
                generation: old,
                progress: 90,
            })
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::StaleGeneration {
                received: old,
                current
            }
        );
        assert_eq!(state.model().unwrap().status, ModelJobStatus::Queued);
    }

    #[test]
    fn test_model_failure_keeps_stylized_result() {
        let mut state = transformed_state();
        state.apply(Transition::BeginModel).unwrap();
        let generation = state.generation();
        state
            .apply(Transition::ModelFailed {
                generation,
                message: "FAILED".to_string(),
                polled: false,
            })
            .unwrap();
        assert_eq!(state.phase(), Phase::ModelFailed);
        assert!(state.can_request_model());
        assert_eq!(state.result_image_id(), Some("abc"));
    }

    #[test]
    fn test_demo_mode_is_terminal() {
        let mut state = transformed_state();
        state.apply(Transition::BeginModel).unwrap();
        let generation = state.generation();
        state
            .apply(Transition::ModelDemo {
                generation,
                message: "no key".to_string(),
            })
            .unwrap();
        assert_eq!(state.phase(), Phase::ModelDemo);
        assert!(state
            .apply(Transition::ModelProgress {
                generation,
                progress: 10
            })
            .is_err());
    }

    #[test]
    fn test_invalidate_cancels_live_model() {
        let mut state = transformed_state();
        state.apply(Transition::BeginModel).unwrap();
        let generation = state.generation();
        state.apply(Transition::Invalidate).unwrap();
        assert_eq!(state.phase(), Phase::ModelFailed);
        assert!(state
            .apply(Transition::ModelSubmitted {
                generation,
                task_id: "late".to_string()
            })
            .is_err());
    }

    #[test]
    fn test_new_staging_discards_jobs() {
        let mut state = transformed_state();
        state.apply(Transition::BeginModel).unwrap();
        let generation = state.generation();
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();
        assert_eq!(state.phase(), Phase::Staged);
        assert!(state.transform().is_none());
        assert!(state.model().is_none());
        assert!(state.generation() > generation);
    }

    #[test]
    fn test_late_transform_result_is_dropped() {
        let mut state = WorkflowState::default();
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();
        state.apply(Transition::BeginTransform).unwrap();
        let job_id = state.transform().unwrap().id;
        let (image, preview) = staged();
        state.apply(Transition::Stage { image, preview }).unwrap();

        assert!(state
            .apply(Transition::TransformSucceeded {
                job_id,
                result: result("late")
            })
            .is_err());
        assert_eq!(state.phase(), Phase::Staged);
    }
}

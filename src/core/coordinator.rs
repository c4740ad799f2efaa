//! Drives the result state machine against a [`JobBackend`].
//!
//! Control flow: stage -> select style -> submit transform -> (optional)
//! request 3D model -> poll loop -> gallery refresh. All state changes are
//! routed through [`WorkflowStore::apply`]; renderers subscribe to the
//! published [`PhaseChange`]s and read snapshots.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::connectivity::{ConnectivityMonitor, ConnectivityStatus};
use crate::core::error::{ClientError, TransitionError, ValidationError};
use crate::core::gallery::GallerySynchronizer;
use crate::core::poller::{spawn_poll_loop, PollConfig};
use crate::core::preview::decode_preview;
use crate::core::request::{build_request, TransformParams};
use crate::core::store::WorkflowStore;
use crate::providers::{JobBackend, ModelSubmission};
use crate::state::{
    ClientSettings, GalleryView, PhaseChange, PollGeneration, RejectionReason, SelectedFile,
    StagedImage, StyleCatalog, StyleId, Transition, TransformResult, UploadStaging, WorkflowState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed(TransformResult),
    /// A transform is already in flight; nothing was sent.
    AlreadyRunning,
    /// The staged image changed while the request was in flight.
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    Polling {
        task_id: String,
        generation: PollGeneration,
    },
    DemoMode {
        message: String,
    },
    Failed {
        message: String,
    },
    /// A newer request replaced this one before the backend answered.
    Superseded,
}

pub struct JobCoordinator<B: JobBackend + 'static> {
    backend: Arc<B>,
    store: WorkflowStore,
    gallery: GallerySynchronizer<B>,
    connectivity: ConnectivityMonitor<B>,
    poll_config: PollConfig,
    max_upload_bytes: u64,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl<B: JobBackend + 'static> JobCoordinator<B> {
    pub fn new(backend: Arc<B>, settings: &ClientSettings) -> Self {
        let state = WorkflowState::new(
            StyleId::new(settings.default_style.clone()),
            TransformParams::new(settings.default_denoising_strength),
        );
        Self {
            gallery: GallerySynchronizer::new(Arc::clone(&backend)),
            connectivity: ConnectivityMonitor::new(Arc::clone(&backend)),
            backend,
            store: WorkflowStore::new(state),
            poll_config: PollConfig::from_settings(settings),
            max_upload_bytes: settings.max_upload_bytes,
            poll_task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseChange> {
        self.store.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.store.snapshot()
    }

    pub fn gallery(&self) -> &GallerySynchronizer<B> {
        &self.gallery
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor<B> {
        &self.connectivity
    }

    /// Probes the backend once and loads the gallery.
    pub async fn init(&self) -> (ConnectivityStatus, Result<GalleryView, ClientError>) {
        let (status, gallery) = tokio::join!(self.connectivity.probe(), self.gallery.refresh());
        if let Err(err) = &gallery {
            warn!(error = %err, "initial gallery load failed");
        }
        (status, gallery)
    }

    /// Validates and stages a file. Rejections never touch the network or the
    /// current state.
    pub async fn stage_file(&self, file: SelectedFile) -> Result<StagedImage, RejectionReason> {
        let image = UploadStaging::validate(file, self.max_upload_bytes).map_err(|reason| {
            info!(%reason, "file rejected");
            reason
        })?;
        let preview = decode_preview(&image).await;

        self.abort_poll_task();
        self.apply(Transition::Stage {
            image: image.clone(),
            preview,
        });
        info!(file = %image.file_name, size = image.size, "image staged");
        Ok(image)
    }

    pub fn select_style(&self, style: StyleId) {
        self.apply(Transition::SelectStyle(style));
    }

    /// Clamps the strength into range and returns what was stored.
    pub fn set_denoising(&self, strength: f64) -> TransformParams {
        let params = TransformParams::new(strength);
        self.apply(Transition::SetParams(params));
        params
    }

    pub async fn submit_transform(&self) -> Result<SubmitOutcome, ClientError> {
        let begun = self.store.apply_then(Transition::BeginTransform, |state| {
            let request = build_request(state.staging().staged(), state.style(), state.params());
            (request, state.transform().map(|job| job.id))
        });
        let (request, job_id) = match begun {
            Ok((_, (Ok(request), Some(job_id)))) => (request, job_id),
            Ok((_, (Err(err), _))) => return Err(err.into()),
            Ok((_, (Ok(_), None))) => return Err(ValidationError::MissingImage.into()),
            Err(TransitionError::InvalidPhase { .. }) => {
                debug!("transform already in flight, ignoring submit");
                return Ok(SubmitOutcome::AlreadyRunning);
            }
            Err(TransitionError::Validation(err)) => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "unexpected transition failure");
                return Err(ValidationError::MissingImage.into());
            }
        };
        self.abort_poll_task();

        match self.backend.submit_transform(&request).await {
            Ok(result) => {
                info!(image_id = %result.image_id, "transform succeeded");
                let applied = self.store.apply(Transition::TransformSucceeded {
                    job_id,
                    result: result.clone(),
                });
                // The server stored the image either way.
                if let Err(err) = self.gallery.refresh().await {
                    warn!(error = %err, "gallery refresh after transform failed");
                }
                match applied {
                    Ok(_) => Ok(SubmitOutcome::Completed(result)),
                    Err(err) => {
                        debug!("dropping transform result: {}", err);
                        Ok(SubmitOutcome::Superseded)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "transform failed");
                let applied = self.store.apply(Transition::TransformFailed {
                    job_id,
                    message: err.user_message(),
                });
                if let Err(stale) = applied {
                    debug!("dropping transform failure: {}", stale);
                }
                Err(err)
            }
        }
    }

    /// Starts 3D generation for the current stylized image, superseding any
    /// live poll loop.
    pub async fn request_model(&self) -> Result<ModelOutcome, ClientError> {
        let (generation, image_id) = match self.store.apply_then(Transition::BeginModel, |state| {
            (
                state.generation(),
                state.result_image_id().map(|id| id.to_string()),
            )
        }) {
            Ok((_, (generation, Some(image_id)))) => (generation, image_id),
            Ok((_, (_, None))) | Err(TransitionError::InvalidPhase { .. }) => {
                return Err(ValidationError::MissingTransformResult.into())
            }
            Err(TransitionError::Validation(err)) => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "unexpected transition failure");
                return Err(ValidationError::MissingTransformResult.into());
            }
        };
        self.abort_poll_task();

        let submission = match self.backend.submit_model(&image_id).await {
            Ok(submission) => submission,
            Err(err) => {
                warn!(error = %err, "3D submission failed");
                let applied = self.store.apply(Transition::ModelFailed {
                    generation,
                    message: err.user_message(),
                    polled: false,
                });
                if let Err(stale) = applied {
                    debug!("dropping 3D submission failure: {}", stale);
                }
                return Err(err);
            }
        };

        let (transition, outcome) = match submission {
            ModelSubmission::DemoMode { message } => (
                Transition::ModelDemo {
                    generation,
                    message: message.clone(),
                },
                ModelOutcome::DemoMode { message },
            ),
            ModelSubmission::Error { message } => (
                Transition::ModelFailed {
                    generation,
                    message: message.clone(),
                    polled: false,
                },
                ModelOutcome::Failed { message },
            ),
            ModelSubmission::Processing { task_id } => (
                Transition::ModelSubmitted {
                    generation,
                    task_id: task_id.clone(),
                },
                ModelOutcome::Polling {
                    task_id,
                    generation,
                },
            ),
        };

        if let Err(err) = self.store.apply(transition) {
            debug!("dropping 3D submission result: {}", err);
            return Ok(ModelOutcome::Superseded);
        }

        if let ModelOutcome::Polling { task_id, generation } = &outcome {
            let handle = spawn_poll_loop(
                Arc::clone(&self.backend),
                self.store.clone(),
                task_id.clone(),
                *generation,
                self.poll_config,
            );
            self.replace_poll_task(Some(handle));
        }
        Ok(outcome)
    }

    /// Server style catalog, falling back to the built-in presets.
    pub async fn fetch_styles(&self) -> StyleCatalog {
        match self.backend.styles().await {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(error = %err, "style catalog unavailable, using built-in presets");
                StyleCatalog::builtin()
            }
        }
    }

    pub async fn delete_gallery_entry(&self, image_id: &str) -> Result<GalleryView, ClientError> {
        self.gallery.delete(image_id).await
    }

    /// Invalidates the live poll loop, as when the page is left or reloaded.
    pub fn shutdown(&self) {
        self.apply(Transition::Invalidate);
        self.abort_poll_task();
    }

    fn apply(&self, transition: Transition) {
        if let Err(err) = self.store.apply(transition) {
            debug!("transition refused: {}", err);
        }
    }

    fn abort_poll_task(&self) {
        self.replace_poll_task(None);
    }

    fn replace_poll_task(&self, next: Option<JoinHandle<()>>) {
        let previous = {
            let mut slot = self
                .poll_task
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *slot, next)
        };
        if let Some(handle) = previous {
            handle.abort();
        }
    }
}

impl<B: JobBackend + 'static> Drop for JobCoordinator<B> {
    fn drop(&mut self) {
        self.abort_poll_task();
    }
}

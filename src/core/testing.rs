//! Scripted in-memory backend for exercising the core without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tokio::time::Instant;

use crate::core::error::ClientError;
use crate::core::request::TransformRequest;
use crate::providers::{HealthReport, JobBackend, ModelStatus, ModelSubmission};
use crate::state::{GalleryEntry, StyleCatalog, TransformResult};

#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub transforms: Vec<TransformRequest>,
    pub submissions: Vec<String>,
    pub polls: Vec<(String, Instant)>,
    pub gallery: usize,
    pub deletes: Vec<String>,
    pub health: usize,
}

impl Calls {
    pub fn transformed_files(&self) -> Vec<&str> {
        self.transforms
            .iter()
            .map(|request| request.image.file_name.as_str())
            .collect()
    }

    pub fn polls_for(&self, task_id: &str) -> Vec<Instant> {
        self.polls
            .iter()
            .filter(|(id, _)| id == task_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[derive(Debug, Default)]
struct Script {
    transforms: VecDeque<Result<TransformResult, ClientError>>,
    transform_delay: Duration,
    submissions: VecDeque<Result<ModelSubmission, ClientError>>,
    submission_delay: Duration,
    polls: HashMap<String, VecDeque<Result<ModelStatus, ClientError>>>,
    health: Option<Result<HealthReport, ClientError>>,
    gallery: Vec<GalleryEntry>,
    gallery_delay: Duration,
    calls: Calls,
}

/// Answers each call from a queue of canned responses and records every call.
/// A task with no queued poll responses keeps reporting `Processing`.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn calls(&self) -> Calls {
        self.script().calls.clone()
    }

    pub fn push_transform(&self, result: Result<TransformResult, ClientError>) {
        self.script().transforms.push_back(result);
    }

    pub fn set_transform_delay(&self, delay: Duration) {
        self.script().transform_delay = delay;
    }

    pub fn push_submission(&self, result: Result<ModelSubmission, ClientError>) {
        self.script().submissions.push_back(result);
    }

    pub fn set_submission_delay(&self, delay: Duration) {
        self.script().submission_delay = delay;
    }

    pub fn push_polls(&self, task_id: &str, results: Vec<Result<ModelStatus, ClientError>>) {
        self.script()
            .polls
            .entry(task_id.to_string())
            .or_default()
            .extend(results);
    }

    pub fn set_health(&self, result: Result<HealthReport, ClientError>) {
        self.script().health = Some(result);
    }

    pub fn set_gallery(&self, entries: Vec<GalleryEntry>) {
        self.script().gallery = entries;
    }

    pub fn set_gallery_delay(&self, delay: Duration) {
        self.script().gallery_delay = delay;
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl JobBackend for ScriptedBackend {
    async fn submit_transform(&self, request: &TransformRequest) -> Result<TransformResult, ClientError> {
        let (delay, result) = {
            let mut script = self.script();
            script.calls.transforms.push(request.clone());
            let result = script
                .transforms
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("no scripted transform".to_string())));
            if let Ok(created) = &result {
                script.gallery.insert(
                    0,
                    GalleryEntry {
                        id: created.image_id.clone(),
                        url: created.image_url.clone(),
                        style: request.style.to_string(),
                    },
                );
            }
            (script.transform_delay, result)
        };
        pause(delay).await;
        result
    }

    async fn submit_model(&self, image_id: &str) -> Result<ModelSubmission, ClientError> {
        let (delay, result) = {
            let mut script = self.script();
            script.calls.submissions.push(image_id.to_string());
            let result = script
                .submissions
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Network("no scripted submission".to_string())));
            (script.submission_delay, result)
        };
        pause(delay).await;
        result
    }

    async fn poll_model(&self, task_id: &str) -> Result<ModelStatus, ClientError> {
        let mut script = self.script();
        script.calls.polls.push((task_id.to_string(), Instant::now()));
        script
            .polls
            .get_mut(task_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Ok(ModelStatus::Processing { progress: 0 }))
    }

    async fn health(&self) -> Result<HealthReport, ClientError> {
        let mut script = self.script();
        script.calls.health += 1;
        script.health.clone().unwrap_or_else(|| {
            Ok(HealthReport {
                connected: true,
                models_available: None,
                message: None,
            })
        })
    }

    async fn gallery(&self) -> Result<Vec<GalleryEntry>, ClientError> {
        let (delay, entries) = {
            let mut script = self.script();
            script.calls.gallery += 1;
            (script.gallery_delay, script.gallery.clone())
        };
        pause(delay).await;
        Ok(entries)
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ClientError> {
        let mut script = self.script();
        script.calls.deletes.push(image_id.to_string());
        let before = script.gallery.len();
        script.gallery.retain(|entry| entry.id != image_id);
        if script.gallery.len() == before {
            return Err(ClientError::rejected(StatusCode::NOT_FOUND, "Image not found"));
        }
        Ok(())
    }

    async fn styles(&self) -> Result<StyleCatalog, ClientError> {
        Ok(StyleCatalog::builtin())
    }
}

//! Remote job client.
//!
//! [`JobBackend`] is the uniform contract over the stylization and 3D
//! generation services. [`http::HttpBackend`] talks to the real service; tests
//! drive the core through scripted implementations.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::error::ClientError;
use crate::core::request::TransformRequest;
use crate::state::{GalleryEntry, StyleCatalog, TransformResult};

pub mod http;
pub mod wire;

/// Immediate outcome of a 3D generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSubmission {
    /// No 3D credentials on the backend. Terminal, never polled.
    DemoMode { message: String },
    Processing { task_id: String },
    Error { message: String },
}

/// One status poll of a 3D task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Processing {
        progress: u8,
    },
    Succeeded {
        artifact_urls: BTreeMap<String, String>,
        thumbnail_url: Option<String>,
    },
    Failed {
        message: String,
    },
    DemoMode {
        message: String,
    },
}

/// Health payload of the stylization backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub connected: bool,
    pub models_available: Option<u32>,
    pub message: Option<String>,
}

#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Single shot; never retried.
    async fn submit_transform(&self, request: &TransformRequest) -> Result<TransformResult, ClientError>;

    async fn submit_model(&self, image_id: &str) -> Result<ModelSubmission, ClientError>;

    /// Idempotent; safe to call repeatedly.
    async fn poll_model(&self, task_id: &str) -> Result<ModelStatus, ClientError>;

    async fn health(&self) -> Result<HealthReport, ClientError>;

    async fn gallery(&self) -> Result<Vec<GalleryEntry>, ClientError>;

    async fn delete_image(&self, image_id: &str) -> Result<(), ClientError>;

    async fn styles(&self) -> Result<StyleCatalog, ClientError>;
}

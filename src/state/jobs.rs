//! Transform and 3D model job records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::request::TransformParams;
use crate::state::StyleId;

/// Token tagging one poll loop. Results carrying an older token are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PollGeneration(pub u64);

impl PollGeneration {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PollGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Server response for a successful stylization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    pub image_id: String,
    pub image_url: String,
    #[serde(default)]
    pub original_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One stylization request and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformJob {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source_file: String,
    pub style: StyleId,
    pub params: TransformParams,
    pub status: TransformStatus,
    pub result: Option<TransformResult>,
    pub error: Option<String>,
}

impl TransformJob {
    pub fn pending(source_file: impl Into<String>, style: StyleId, params: TransformParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source_file: source_file.into(),
            style,
            params,
            status: TransformStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TransformStatus::Pending
    }

    /// Stylized image id, once the job succeeded.
    pub fn result_image_id(&self) -> Option<&str> {
        self.result.as_ref().map(|result| result.image_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ModelJobStatus {
    Queued,
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

impl ModelJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModelJobStatus::Succeeded { .. }
                | ModelJobStatus::Failed { .. }
                | ModelJobStatus::DemoMode { .. }
        )
    }
}

/// A 3D generation job for an already-stylized image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelJob {
    pub generation: PollGeneration,
    pub created_at: DateTime<Utc>,
    pub parent_image_id: String,
    pub task_id: Option<String>,
    pub status: ModelJobStatus,
    pub poll_attempts: u32,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
}

impl ModelJob {
    pub fn queued(generation: PollGeneration, parent_image_id: impl Into<String>) -> Self {
        Self {
            generation,
            created_at: Utc::now(),
            parent_image_id: parent_image_id.into(),
            task_id: None,
            status: ModelJobStatus::Queued,
            poll_attempts: 0,
            consecutive_errors: 0,
            last_error: None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match &self.status {
            ModelJobStatus::Processing { progress } => Some(*progress),
            ModelJobStatus::Succeeded { .. } => Some(100),
            _ => None,
        }
    }
}

//! Upload staging: validation and ownership of the photo awaiting submission.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::constants::{FALLBACK_IMAGE_MIME, IMAGE_MIME_PREFIX};

/// A file picked by the user, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(file_name: impl Into<String>, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.map(|mime| mime.to_string()),
            bytes,
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why a selected file was not staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Image must be {limit} bytes or smaller (got {size})")]
    TooLarge { size: u64, limit: u64 },
    #[error("File must be an image (got {})", .mime_type.as_deref().unwrap_or("unknown type"))]
    WrongType { mime_type: Option<String> },
}

/// A validated photo ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
    pub size: u64,
}

/// Browser-style preview of the staged file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub data_uri: String,
    /// Pixel dimensions, when the bytes decode as a known image format.
    pub dimensions: Option<(u32, u32)>,
}

/// Holds at most one staged image and its preview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadStaging {
    staged: Option<StagedImage>,
    preview: Option<Preview>,
}

impl UploadStaging {
    /// Checks size first, then MIME type. Nothing is staged here.
    pub fn validate(file: SelectedFile, max_bytes: u64) -> Result<StagedImage, RejectionReason> {
        let size = file.size();
        if size > max_bytes {
            return Err(RejectionReason::TooLarge {
                size,
                limit: max_bytes,
            });
        }
        let is_image = file
            .mime_type
            .as_deref()
            .map(|mime| mime.starts_with(IMAGE_MIME_PREFIX))
            .unwrap_or(false);
        if !is_image {
            return Err(RejectionReason::WrongType {
                mime_type: file.mime_type,
            });
        }

        Ok(StagedImage {
            file_name: file.file_name,
            mime_type: file
                .mime_type
                .unwrap_or_else(|| FALLBACK_IMAGE_MIME.to_string()),
            bytes: Arc::from(file.bytes),
            size,
        })
    }

    /// Replaces any previous staged file.
    pub fn replace(&mut self, staged: StagedImage, preview: Preview) {
        self.staged = Some(staged);
        self.preview = Some(preview);
    }

    pub fn staged(&self) -> Option<&StagedImage> {
        self.staged.as_ref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.staged.is_some()
    }
}

//! JSON bodies exchanged with the transform API.

use std::collections::BTreeMap;

use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::ClientError;
use crate::providers::{HealthReport, ModelStatus, ModelSubmission};
use crate::state::GalleryEntry;

/// Non-2xx body: `{ "detail": ... }`. FastAPI validation errors send a list.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        match self.detail {
            Some(Value::String(text)) => Some(text),
            Some(Value::Null) | None => self.message,
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Message for a rejected request, preferring the server's `detail`.
pub fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(|reason| format!("Request failed: {}", reason))
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
        })
}

#[derive(Debug, Deserialize)]
pub struct ModelSubmissionBody {
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ModelSubmissionBody {
    pub fn into_submission(self) -> Result<ModelSubmission, ClientError> {
        match self.status.as_str() {
            "demo_mode" => Ok(ModelSubmission::DemoMode {
                message: self
                    .message
                    .unwrap_or_else(|| "3D generation is not configured on the server.".to_string()),
            }),
            "processing" => match self.task_id {
                Some(task_id) if !task_id.is_empty() => Ok(ModelSubmission::Processing { task_id }),
                _ => Err(ClientError::MalformedResponse(
                    "processing response without task_id".to_string(),
                )),
            },
            "error" => Ok(ModelSubmission::Error {
                message: self.message.unwrap_or_else(|| "Unknown error".to_string()),
            }),
            other => Err(ClientError::MalformedResponse(format!(
                "unknown 3D submission status {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelStatusBody {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub model_urls: Option<BTreeMap<String, Option<String>>>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ModelStatusBody {
    /// An explicit `error` payload becomes `RemoteRejected`; any status that is
    /// not terminal counts as still processing.
    pub fn into_status(self, http_status: StatusCode) -> Result<ModelStatus, ClientError> {
        match self.status.to_ascii_uppercase().as_str() {
            "SUCCEEDED" => {
                let artifact_urls = self
                    .model_urls
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(format, url)| url.filter(|url| !url.is_empty()).map(|url| (format, url)))
                    .collect();
                Ok(ModelStatus::Succeeded {
                    artifact_urls,
                    thumbnail_url: self.thumbnail_url,
                })
            }
            "FAILED" | "CANCELED" | "CANCELLED" | "EXPIRED" => Ok(ModelStatus::Failed {
                message: self
                    .message
                    .unwrap_or_else(|| "3D model generation failed".to_string()),
            }),
            "DEMO_MODE" => Ok(ModelStatus::DemoMode {
                message: self.message.unwrap_or_default(),
            }),
            "ERROR" => Err(ClientError::rejected(
                http_status,
                self.message
                    .unwrap_or_else(|| "Failed to get 3D model status".to_string()),
            )),
            _ => Ok(ModelStatus::Processing {
                progress: self.progress.unwrap_or(0.0).round().clamp(0.0, 100.0) as u8,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthBody {
    pub status: String,
    #[serde(default)]
    pub models_available: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<HealthBody> for HealthReport {
    fn from(body: HealthBody) -> Self {
        HealthReport {
            connected: body.status == "connected",
            models_available: body.models_available,
            message: body.message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GalleryBody {
    #[serde(default)]
    pub images: Vec<GalleryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StyleCatalog;

    fn status(json: &str) -> Result<ModelStatus, ClientError> {
        serde_json::from_str::<ModelStatusBody>(json)
            .unwrap()
            .into_status(StatusCode::OK)
    }

    #[test]
    fn test_detail_is_preferred() {
        let message = rejection_message(StatusCode::BAD_REQUEST, br#"{"detail":"File must be an image"}"#);
        assert_eq!(message, "File must be an image");

        let fallback = rejection_message(StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert_eq!(fallback, "Request failed: Bad Gateway");
    }

    #[test]
    fn test_submission_statuses() {
        let parse = |json: &str| {
            serde_json::from_str::<ModelSubmissionBody>(json)
                .unwrap()
                .into_submission()
        };
        assert!(matches!(parse(r#"{"status":"demo_mode","task_id":"demo_task_id"}"#), Ok(ModelSubmission::DemoMode { .. })));
        assert_eq!(
            parse(r#"{"status":"processing","task_id":"t1"}"#).unwrap(),
            ModelSubmission::Processing { task_id: "t1".to_string() }
        );
        assert_eq!(
            parse(r#"{"status":"error","message":"Public URL not available"}"#).unwrap(),
            ModelSubmission::Error { message: "Public URL not available".to_string() }
        );
        assert!(matches!(parse(r#"{"status":"processing"}"#), Err(ClientError::MalformedResponse(_))));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status(r#"{"status":"PROCESSING","progress":40}"#).unwrap(),
            ModelStatus::Processing { progress: 40 }
        );
        assert_eq!(
            status(r#"{"status":"PENDING"}"#).unwrap(),
            ModelStatus::Processing { progress: 0 }
        );

        let succeeded = status(r#"{"status":"SUCCEEDED","model_urls":{"glb":"/m/t1.glb","usdz":null}}"#).unwrap();
        let mut urls = BTreeMap::new();
        urls.insert("glb".to_string(), "/m/t1.glb".to_string());
        assert_eq!(
            succeeded,
            ModelStatus::Succeeded { artifact_urls: urls, thumbnail_url: None }
        );

        assert!(matches!(status(r#"{"status":"FAILED"}"#), Ok(ModelStatus::Failed { .. })));
        assert!(matches!(
            status(r#"{"status":"error","message":"Failed to get status"}"#),
            Err(ClientError::RemoteRejected { .. })
        ));
    }

    #[test]
    fn test_health_and_gallery_bodies() {
        let health: HealthReport = serde_json::from_str::<HealthBody>(r#"{"status":"connected","models_available":3}"#)
            .unwrap()
            .into();
        assert!(health.connected);
        assert_eq!(health.models_available, Some(3));

        let gallery: GalleryBody =
            serde_json::from_str(r#"{"images":[{"id":"abc","url":"api/transform/image/abc","style":"Character"}]}"#).unwrap();
        assert_eq!(gallery.images[0].id, "abc");
    }

    #[test]
    fn test_styles_body() {
        let catalog: StyleCatalog = serde_json::from_str(
            r#"{"styles":{"character":{"name":"Storybook","name_en":"Character","description":"fairy tale"}},"recommended_strength":0.22}"#,
        )
        .unwrap();
        assert_eq!(catalog.recommended_strength, 0.22);
        assert!(catalog.contains(&"character".into()));
    }
}

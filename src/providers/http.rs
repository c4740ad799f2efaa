use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::error::ClientError;
use crate::core::request::TransformRequest;
use crate::providers::wire::{
    rejection_message, GalleryBody, HealthBody, ModelStatusBody, ModelSubmissionBody,
};
use crate::providers::{HealthReport, JobBackend, ModelStatus, ModelSubmission};
use crate::state::{ClientSettings, GalleryEntry, StyleCatalog, TransformResult};
use crate::utils::{endpoint_url, normalize_base_url};

/// `JobBackend` over the transform HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_prefix: String,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let base_url = Url::parse(&normalize_base_url(&settings.base_url)).map_err(|err| {
            ClientError::Network(format!("Invalid base URL {}: {}", settings.base_url, err))
        })?;
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| ClientError::Network(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self {
            client,
            base_url,
            api_prefix: settings.api_prefix.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        endpoint_url(&self.base_url, &self.api_prefix, segments)
            .map_err(|err| ClientError::Network(format!("Invalid endpoint URL: {}", err)))
    }
}

/// Reads the body once and classifies it into the error taxonomy.
async fn read_body(response: Response) -> Result<(http::StatusCode, Vec<u8>), ClientError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ClientError::Network(format!("Failed to read response body: {}", err)))?;
    if !status.is_success() {
        let message = rejection_message(status, &bytes);
        warn!(%status, %message, "request rejected");
        return Err(ClientError::rejected(status, message));
    }
    Ok((status, bytes.to_vec()))
}

fn parse_json<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, ClientError> {
    serde_json::from_slice(bytes)
        .map_err(|err| ClientError::MalformedResponse(format!("Failed to parse {}: {}", what, err)))
}

async fn send(builder: reqwest::RequestBuilder, what: &str) -> Result<Response, ClientError> {
    builder
        .send()
        .await
        .map_err(|err| ClientError::Network(format!("Failed to {}: {}", what, err)))
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn submit_transform(&self, request: &TransformRequest) -> Result<TransformResult, ClientError> {
        let url = self.url(&["character"])?;
        let part = Part::bytes(request.image.bytes.to_vec())
            .file_name(request.image.file_name.clone())
            .mime_str(&request.image.mime_type)
            .map_err(|err| ClientError::Network(format!("Invalid image MIME type: {}", err)))?;
        let form = Form::new()
            .part("image", part)
            .text("style", request.style.to_string())
            .text(
                "denoising_strength",
                request.params.denoising_strength().to_string(),
            );

        info!(
            style = %request.style,
            strength = request.params.denoising_strength(),
            size = request.image.size,
            "submitting transform"
        );
        let response = send(self.client.post(url).multipart(form), "submit transform").await?;
        let (_, body) = read_body(response).await?;
        parse_json(&body, "transform response")
    }

    async fn submit_model(&self, image_id: &str) -> Result<ModelSubmission, ClientError> {
        let url = self.url(&["3d-model"])?;
        info!(image_id, "requesting 3D model");
        let response = send(
            self.client.post(url).form(&[("image_id", image_id)]),
            "start 3D generation",
        )
        .await?;
        let (_, body) = read_body(response).await?;
        parse_json::<ModelSubmissionBody>(&body, "3D submission")?.into_submission()
    }

    async fn poll_model(&self, task_id: &str) -> Result<ModelStatus, ClientError> {
        let url = self.url(&["3d-model", "status", task_id])?;
        debug!(task_id, "polling 3D status");
        let response = send(self.client.get(url), "query 3D status").await?;
        let (status, body) = read_body(response).await?;
        parse_json::<ModelStatusBody>(&body, "3D status")?.into_status(status)
    }

    async fn health(&self) -> Result<HealthReport, ClientError> {
        let url = self.url(&["health"])?;
        let response = send(self.client.get(url), "check health").await?;
        let (_, body) = read_body(response).await?;
        Ok(parse_json::<HealthBody>(&body, "health")?.into())
    }

    async fn gallery(&self) -> Result<Vec<GalleryEntry>, ClientError> {
        let url = self.url(&["gallery"])?;
        let response = send(self.client.get(url), "load gallery").await?;
        let (_, body) = read_body(response).await?;
        Ok(parse_json::<GalleryBody>(&body, "gallery")?.images)
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ClientError> {
        let url = self.url(&["image", image_id])?;
        info!(image_id, "deleting gallery image");
        let response = send(self.client.delete(url), "delete image").await?;
        read_body(response).await.map(|_| ())
    }

    async fn styles(&self) -> Result<StyleCatalog, ClientError> {
        let url = self.url(&["styles"])?;
        let response = send(self.client.get(url), "load styles").await?;
        let (_, body) = read_body(response).await?;
        parse_json(&body, "styles")
    }
}

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageReader;
use tracing::debug;

use crate::state::{Preview, StagedImage};

/// Builds the displayable preview for a staged image off the async executor.
pub async fn decode_preview(image: &StagedImage) -> Preview {
    let bytes = Arc::clone(&image.bytes);
    let mime_type = image.mime_type.clone();
    let fallback = mime_type.clone();
    let blocking_bytes = Arc::clone(&bytes);

    match tokio::task::spawn_blocking(move || build_preview(&blocking_bytes, &mime_type)).await {
        Ok(preview) => preview,
        Err(err) => {
            debug!("preview task failed: {}", err);
            Preview {
                data_uri: data_uri(&bytes, &fallback),
                dimensions: None,
            }
        }
    }
}

fn build_preview(bytes: &[u8], mime_type: &str) -> Preview {
    Preview {
        data_uri: data_uri(bytes, mime_type),
        dimensions: probe_dimensions(bytes),
    }
}

pub fn data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Reads only the header; `None` when the format is unknown or corrupt.
fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

use serde::Serialize;

use crate::constants::{
    DEFAULT_DENOISING_STRENGTH, MAX_DENOISING_STRENGTH, MIN_DENOISING_STRENGTH,
};
use crate::core::error::ValidationError;
use crate::state::{StagedImage, StyleId};

/// Tunable stylization parameters. Values are always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransformParams {
    denoising_strength: f64,
}

impl TransformParams {
    /// Out-of-range strengths are clamped; NaN falls back to the default.
    pub fn new(denoising_strength: f64) -> Self {
        Self {
            denoising_strength: clamp_strength(denoising_strength),
        }
    }

    pub fn denoising_strength(&self) -> f64 {
        self.denoising_strength
    }

    pub fn label(&self) -> String {
        format!("{:.2}", self.denoising_strength)
    }
}

impl Default for TransformParams {
    fn default() -> Self {
        Self::new(DEFAULT_DENOISING_STRENGTH)
    }
}

fn clamp_strength(value: f64) -> f64 {
    if value.is_nan() {
        return DEFAULT_DENOISING_STRENGTH;
    }
    value.clamp(MIN_DENOISING_STRENGTH, MAX_DENOISING_STRENGTH)
}

/// One outbound stylization request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    pub image: StagedImage,
    pub style: StyleId,
    pub params: TransformParams,
}

pub fn build_request(
    staged: Option<&StagedImage>,
    style: &StyleId,
    params: TransformParams,
) -> Result<TransformRequest, ValidationError> {
    let image = staged.ok_or(ValidationError::MissingImage)?;
    Ok(TransformRequest {
        image: image.clone(),
        style: style.clone(),
        params,
    })
}

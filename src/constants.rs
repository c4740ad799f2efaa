//! Shared limits and defaults for the orchestration core.
//! Values mirror what the stylization service enforces server-side.

/// Largest upload accepted before any network call (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Fixed delay between two 3D status polls.
pub const POLL_INTERVAL_MS: u64 = 5_000;
/// Consecutive failed polls tolerated before the model job is marked failed.
pub const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 3;

pub const DEFAULT_STYLE_ID: &str = "sd_character";
pub const DEFAULT_DENOISING_STRENGTH: f64 = 0.42;
pub const MIN_DENOISING_STRENGTH: f64 = 0.0;
pub const MAX_DENOISING_STRENGTH: f64 = 1.0;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_API_PREFIX: &str = "api/transform";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 180;

pub const IMAGE_MIME_PREFIX: &str = "image/";
pub const FALLBACK_IMAGE_MIME: &str = "image/png";

pub const NETWORK_ERROR_MESSAGE: &str = "Could not reach the server. Check your connection and try again.";
pub const MALFORMED_RESPONSE_MESSAGE: &str = "The server returned an unexpected response.";
pub const CANCELLED_MESSAGE: &str = "3D generation was cancelled.";

pub const SETTINGS_ENV_PREFIX: &str = "CHARACTER_FORGE_";

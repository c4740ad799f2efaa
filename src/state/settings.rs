use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_PREFIX, DEFAULT_BASE_URL, DEFAULT_DENOISING_STRENGTH,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_STYLE_ID, MAX_CONSECUTIVE_POLL_ERRORS,
    MAX_UPLOAD_BYTES, POLL_INTERVAL_MS, SETTINGS_ENV_PREFIX,
};
use crate::utils::{parse_f64_input, parse_u64_input};

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Root URL of the stylization service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path prefix of the transform API
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Delay between two 3D status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive poll failures tolerated before giving up
    #[serde(default = "default_max_poll_errors")]
    pub max_poll_errors: u32,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_style")]
    pub default_style: String,
    #[serde(default = "default_denoising_strength")]
    pub default_denoising_strength: f64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_poll_interval_ms() -> u64 {
    POLL_INTERVAL_MS
}

fn default_max_poll_errors() -> u32 {
    MAX_CONSECUTIVE_POLL_ERRORS
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_BYTES
}

fn default_style() -> String {
    DEFAULT_STYLE_ID.to_string()
}

fn default_denoising_strength() -> f64 {
    DEFAULT_DENOISING_STRENGTH
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_errors: default_max_poll_errors(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_upload_bytes: default_max_upload_bytes(),
            default_style: default_style(),
            default_denoising_strength: default_denoising_strength(),
        }
    }
}

impl ClientSettings {
    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load(path: &Path) -> io::Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err),
        };
        serde_json::from_str(&json).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Apply `CHARACTER_FORGE_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", SETTINGS_ENV_PREFIX, key)).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = lookup("API_PREFIX") {
            self.api_prefix = value;
        }
        if let Some(value) = lookup("POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_u64_input(&value, self.poll_interval_ms);
        }
        if let Some(value) = lookup("MAX_POLL_ERRORS") {
            let parsed = parse_u64_input(&value, u64::from(self.max_poll_errors));
            self.max_poll_errors = u32::try_from(parsed).unwrap_or(self.max_poll_errors);
        }
        if let Some(value) = lookup("DEFAULT_DENOISING_STRENGTH") {
            self.default_denoising_strength =
                parse_f64_input(&value, self.default_denoising_strength);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::ClientError;
use crate::providers::JobBackend;

/// Result of one health probe of the stylization backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Connected {
        models_available: Option<u32>,
        message: Option<String>,
    },
    /// The server answered, but reported a problem.
    Error { message: String },
    /// No response at all.
    Unreachable { reason: String },
}

impl ConnectivityStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityStatus::Connected { .. })
    }

    pub fn label(&self) -> String {
        match self {
            ConnectivityStatus::Connected {
                models_available: Some(count),
                ..
            } => format!("Connected ({} models)", count),
            ConnectivityStatus::Connected { .. } => "Connected".to_string(),
            ConnectivityStatus::Error { message } => format!("Server error: {}", message),
            ConnectivityStatus::Unreachable { .. } => "Server unreachable".to_string(),
        }
    }
}

pub struct ConnectivityMonitor<B: JobBackend> {
    backend: Arc<B>,
    last: Mutex<Option<ConnectivityStatus>>,
}

impl<B: JobBackend> ConnectivityMonitor<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            last: Mutex::new(None),
        }
    }

    /// Most recent probe result; `None` until the first probe completes.
    pub fn last(&self) -> Option<ConnectivityStatus> {
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn probe(&self) -> ConnectivityStatus {
        let status = match self.backend.health().await {
            Ok(report) if report.connected => ConnectivityStatus::Connected {
                models_available: report.models_available,
                message: report.message,
            },
            Ok(report) => ConnectivityStatus::Error {
                message: report
                    .message
                    .unwrap_or_else(|| "The stylization server reported an error.".to_string()),
            },
            Err(ClientError::Network(reason)) => ConnectivityStatus::Unreachable { reason },
            Err(err) => ConnectivityStatus::Error {
                message: err.user_message(),
            },
        };

        if status.is_connected() {
            info!(status = %status.label(), "connectivity probe");
        } else {
            warn!(status = %status.label(), "connectivity probe");
        }
        *self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(status.clone());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedBackend;
    use crate::providers::HealthReport;

    #[tokio::test]
    async fn test_connected_report() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.set_health(Ok(HealthReport {
            connected: true,
            models_available: Some(2),
            message: None,
        }));
        let monitor = ConnectivityMonitor::new(backend);
        assert_eq!(monitor.last(), None);

        let status = monitor.probe().await;
        assert_eq!(status.label(), "Connected (2 models)");
        assert_eq!(monitor.last(), Some(status));
    }

    #[tokio::test]
    async fn test_network_failure_is_unreachable_not_error() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.set_health(Err(ClientError::Network("connection refused".to_string())));
        let monitor = ConnectivityMonitor::new(backend.clone());
        let unreachable = monitor.probe().await;
        assert_eq!(
            unreachable,
            ConnectivityStatus::Unreachable {
                reason: "connection refused".to_string()
            }
        );

        backend.set_health(Ok(HealthReport {
            connected: false,
            models_available: None,
            message: Some("Server returned 502".to_string()),
        }));
        let error = monitor.probe().await;
        assert_eq!(
            error,
            ConnectivityStatus::Error {
                message: "Server returned 502".to_string()
            }
        );
        assert_ne!(unreachable, error);
    }

    #[tokio::test]
    async fn test_malformed_health_is_error() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.set_health(Err(ClientError::MalformedResponse("eof".to_string())));
        let monitor = ConnectivityMonitor::new(backend);
        assert!(matches!(monitor.probe().await, ConnectivityStatus::Error { .. }));
    }
}

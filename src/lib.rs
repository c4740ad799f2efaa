//! Character Forge
//!
//! Client-side orchestration for the photo -> stylized character -> 3D model
//! workflow: upload staging, style selection, remote job submission and
//! polling, the result state machine, gallery sync and connectivity checks.

pub mod constants;
pub mod core;
pub mod providers;
pub mod state;
pub mod utils;

pub use crate::core::coordinator::{JobCoordinator, ModelOutcome, SubmitOutcome};
pub use crate::core::error::{ClientError, TransitionError, ValidationError};
pub use crate::providers::http::HttpBackend;
pub use crate::providers::JobBackend;

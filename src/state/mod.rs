//! State management module
//!
//! Plain data for the orchestration core:
//! - Staging: the validated photo awaiting submission
//! - Style: preset catalog and the active selection
//! - Jobs: transform and 3D model job records
//! - Gallery: the cached server gallery
//! - Workflow: the result state machine that owns all of the above
//! - Settings: client configuration

mod staging;
mod style;
mod jobs;
mod gallery;
mod settings;
mod workflow;

pub use staging::*;
pub use style::*;
pub use jobs::*;
pub use gallery::*;
pub use settings::*;
pub use workflow::*;

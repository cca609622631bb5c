//! Model deployment
//!
//! [`ModelDeployer`] keeps one deployment per pipeline in a local registry
//! directory and hands out [`PredictionService`]s for it.

mod registry;
mod service;

pub use registry::{DeploymentConfig, DeploymentRecord, ModelDeployer, ServiceStatus};
pub use service::{PredictionService, SplitPayload};

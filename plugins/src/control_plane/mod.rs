//! Workflow control-plane backend: the workflow document holds the asset
//! listing, grants are presigned POST targets, and a PATCH of the workflow is
//! the commit.

pub mod http_client;
pub mod presigned;
pub mod service;

pub use http_client::{ControlPlaneClient, HttpFailure, HttpFailureKind};
pub use presigned::PresignedPostTransfer;
pub use service::ControlPlanePlugin;

//! Object-store backend over the S3 API.

pub mod client;
pub mod service;
pub mod transfer;

pub use client::build_client;
pub use service::{ObjectStorePlugin, MAX_DELETE_BATCH};

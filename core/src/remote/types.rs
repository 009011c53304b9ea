use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{size_label, LocalAsset};

/// Timestamp layout used for upload results, e.g. `2024-05-01T09:30:00.123Z`.
pub const UPLOADED_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Credentials and workspace for one run, passed explicitly into every backend call.
#[derive(Clone)]
pub struct Session {
    workspace_id: String,
    bearer_token: Option<String>,
}

impl Session {
    pub fn new(workspace_id: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("workspace_id", &self.workspace_id)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// An asset that already exists on the remote side.
///
/// `identifier` is unique and is what deletion uses; several records may share
/// a `display_name` when the same logical file was uploaded more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAssetRecord {
    pub identifier: String,
    pub display_name: String,
    pub size_label: String,
    pub uploaded_timestamp: String,
}

/// Outcome of one file's transfer, kept in memory until the single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub name: String,
    pub uploaded_timestamp: String,
    pub size_label: String,
    pub succeeded: bool,
}

impl UploadResult {
    pub fn succeeded(asset: &LocalAsset, at: DateTime<Utc>) -> Self {
        Self {
            name: asset.name.clone(),
            uploaded_timestamp: at.format(UPLOADED_TIMESTAMP_FORMAT).to_string(),
            size_label: size_label(asset.byte_size),
            succeeded: true,
        }
    }

    pub fn failed(asset: &LocalAsset) -> Self {
        Self {
            name: asset.name.clone(),
            uploaded_timestamp: String::new(),
            size_label: size_label(asset.byte_size),
            succeeded: false,
        }
    }

    /// Listing entry as stored in the remote configuration document.
    pub fn to_listing_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "file_name": self.name,
            "uploaded_timestamp": self.uploaded_timestamp,
            "size": self.size_label,
        })
    }
}

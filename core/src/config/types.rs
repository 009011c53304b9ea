use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Resolved path of the `.env` file consulted at load time.
    #[serde(skip)]
    pub env_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "depot_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    ControlPlane,
    ObjectStore,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::ObjectStore => "object-store",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "control-plane" | "controlplane" | "control_plane" => Some(Self::ControlPlane),
            "object-store" | "objectstore" | "object_store" | "s3" => Some(Self::ObjectStore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub workspace_id: String,

    #[serde(default)]
    pub bearer_token: String,

    /// Sent with every grant request when set; otherwise taken from the
    /// workspace document's top-level `asset_id`.
    #[serde(default)]
    pub asset_id: Option<String>,

    /// Component whose `model_params.modelParam.file_upload` holds the asset listing.
    #[serde(default = "default_component_id")]
    pub component_id: String,

    /// Extra headers for grant and commit calls (e.g. Origin/Referer).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_component_id() -> String {
    "ai_platform_hosted_opensearch_local_data".to_string()
}

fn default_user_agent() -> String {
    format!("depot/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            workspace_id: String::new(),
            bearer_token: String::new(),
            asset_id: None,
            component_id: default_component_id(),
            headers: BTreeMap::new(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Key (under `prefix`) of the JSON manifest used as the commit document.
    #[serde(default = "default_manifest_key")]
    pub manifest_key: String,

    /// Custom endpoint for S3-compatible stores.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static credentials; when unset the default AWS credential chain is used.
    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub session_token: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_prefix() -> String {
    "testcases/".to_string()
}

fn default_manifest_key() -> String {
    "manifest.json".to_string()
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            prefix: default_prefix(),
            manifest_key: default_manifest_key(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Prefix with exactly one trailing slash, or empty.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        }
    }

    pub fn manifest_object_key(&self) -> String {
        format!("{}{}", self.normalized_prefix(), self.manifest_key.trim_matches('/'))
    }
}

/// How existing remote assets are handled before uploading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionPolicy {
    DeleteAll,
    #[default]
    SkipDeletion,
    Abort,
}

impl DeletionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeleteAll => "delete-all",
            Self::SkipDeletion => "skip-deletion",
            Self::Abort => "abort",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Extensions (without the dot) picked up by the directory scan.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Files above this size use chunked multi-part transfer where the backend supports it.
    #[serde(default = "default_multipart_threshold_bytes")]
    pub multipart_threshold_bytes: u64,

    #[serde(default = "default_part_size_bytes")]
    pub part_size_bytes: u64,

    /// Parallel part uploads within a single file.
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,

    /// Used when no policy is given on the command line and prompting is off.
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,

    #[serde(default)]
    pub continue_on_deletion_failure: bool,
}

fn default_source_dir() -> String {
    "test_cases_by_suite".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["xlsx".to_string(), "xls".to_string()]
}

fn default_multipart_threshold_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_part_size_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_part_concurrency() -> usize {
    10
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extensions: default_extensions(),
            multipart_threshold_bytes: default_multipart_threshold_bytes(),
            part_size_bytes: default_part_size_bytes(),
            part_concurrency: default_part_concurrency(),
            deletion_policy: DeletionPolicy::default(),
            continue_on_deletion_failure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Listing, grant, delete and access-check calls.
    #[serde(default = "default_metadata_ms")]
    pub metadata_ms: u64,

    #[serde(default = "default_transfer_ms")]
    pub transfer_ms: u64,

    #[serde(default = "default_commit_ms")]
    pub commit_ms: u64,
}

fn default_metadata_ms() -> u64 {
    30_000
}

fn default_transfer_ms() -> u64 {
    60_000
}

fn default_commit_ms() -> u64 {
    120_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata_ms: default_metadata_ms(),
            transfer_ms: default_transfer_ms(),
            commit_ms: default_commit_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per file, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// "exponential-backoff" or "linear".
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            strategy: default_retry_strategy(),
        }
    }
}

use std::path::{Path, PathBuf};

use super::types::{AppConfig, BackendKind};
use crate::error::EngineError;
use crate::remote::Session;

/// Get the default depot data directory: ~/.depot
pub fn get_depot_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".depot"))
}

pub fn get_depot_env_file_path() -> anyhow::Result<PathBuf> {
    let depot_dir = get_depot_data_dir()?;
    Ok(depot_dir.join(".env"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.depot/config.toml (highest)
    let depot_dir = get_depot_data_dir()?;
    let depot_config = depot_dir.join("config.toml");

    // Priority 2: ./depot.toml (current directory)
    let local_config = Path::new("depot.toml");

    let cfg = if depot_config.exists() {
        load_from(&depot_config)?
    } else if local_config.exists() {
        load_from(local_config)?
    } else {
        AppConfig::default()
    };

    finish(cfg)
}

/// Load an explicit config file, then apply `.env` and environment overrides.
pub fn load_path(path: &Path) -> anyhow::Result<AppConfig> {
    let cfg = load_from(path)?;
    finish(cfg)
}

fn load_from(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)?;
    let cfg = toml::from_str::<AppConfig>(&s)?;
    Ok(cfg)
}

fn finish(mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    let env_file = get_depot_env_file_path()?;
    // Existing process variables win over both files.
    let _ = dotenvy::dotenv();
    if env_file.exists() {
        dotenvy::from_path(&env_file)?;
    }
    cfg.env_file = env_file.to_string_lossy().to_string();

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest).
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("DEPOT_BACKEND") {
        match BackendKind::parse(&v) {
            Some(kind) => cfg.remote.backend = kind,
            None => tracing::warn!(value = %v, "ignoring unknown DEPOT_BACKEND"),
        }
    }

    let cp = &mut cfg.remote.control_plane;
    if let Some(v) = get("DEPOT_BASE_URL") {
        cp.base_url = v;
    }
    if let Some(v) = get("DEPOT_BEARER_TOKEN") {
        cp.bearer_token = v.trim().to_string();
    }
    if let Some(v) = get("DEPOT_WORKSPACE_ID") {
        cp.workspace_id = v;
    }

    let os = &mut cfg.remote.object_store;
    if let Some(v) = get("DEPOT_BUCKET") {
        os.bucket = v;
    }
    if let Some(v) = get("DEPOT_REGION") {
        os.region = v;
    }
    if let Some(v) = get("DEPOT_PREFIX") {
        os.prefix = v;
    }

    if let Some(v) = get("DEPOT_SOURCE_DIR") {
        cfg.upload.source_dir = v;
    }
}

impl AppConfig {
    /// Check that the selected backend has what it needs to talk to the remote.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut issues = Vec::new();

        match self.remote.backend {
            BackendKind::ControlPlane => {
                let cp = &self.remote.control_plane;
                if cp.base_url.trim().is_empty() {
                    issues.push("remote.control_plane.base_url is not set (DEPOT_BASE_URL)");
                }
                if cp.workspace_id.trim().is_empty() {
                    issues.push("remote.control_plane.workspace_id is not set (DEPOT_WORKSPACE_ID)");
                }
                if cp.bearer_token.trim().is_empty() {
                    issues.push("bearer token is not set (DEPOT_BEARER_TOKEN)");
                }
            }
            BackendKind::ObjectStore => {
                let os = &self.remote.object_store;
                if os.bucket.trim().is_empty() {
                    issues.push("remote.object_store.bucket is not set (DEPOT_BUCKET)");
                }
                if os.access_key_id.is_some() != os.secret_access_key.is_some() {
                    issues.push("object store static credentials are incomplete");
                }
            }
        }

        if self.upload.extensions.is_empty() {
            issues.push("upload.extensions is empty");
        }
        if self.upload.part_size_bytes < 5 * 1024 * 1024 {
            issues.push("upload.part_size_bytes must be at least 5 MiB");
        }
        if self.upload.part_concurrency == 0 {
            issues.push("upload.part_concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            issues.push("retry.max_attempts must be at least 1");
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Config(issues.join("; ")))
        }
    }

    /// Session state handed to every engine call.
    pub fn session(&self) -> Session {
        match self.remote.backend {
            BackendKind::ControlPlane => {
                let cp = &self.remote.control_plane;
                Session::new(cp.workspace_id.clone(), Some(cp.bearer_token.clone()))
            }
            BackendKind::ObjectStore => {
                Session::new(self.remote.object_store.bucket.clone(), None)
            }
        }
    }
}

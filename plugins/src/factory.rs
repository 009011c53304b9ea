use std::sync::Arc;

use anyhow::Result;
use depot_core::api::{AppConfig, BackendKind, Backends};

use crate::control_plane::{ControlPlanePlugin, PresignedPostTransfer};
use crate::object_store::{build_client, ObjectStorePlugin};

pub async fn build_backends(cfg: &AppConfig) -> Result<Backends> {
    match cfg.remote.backend {
        BackendKind::ControlPlane => build_control_plane(cfg),
        BackendKind::ObjectStore => Ok(build_object_store(cfg).await),
    }
}

pub fn build_control_plane(cfg: &AppConfig) -> Result<Backends> {
    let plugin = Arc::new(ControlPlanePlugin::new(&cfg.remote.control_plane, &cfg.timeouts)?);
    let transfer = Arc::new(PresignedPostTransfer::new(cfg.timeouts.transfer_ms)?);
    Ok(Backends {
        directory: plugin.clone(),
        deleter: plugin.clone(),
        broker: plugin.clone(),
        transfer,
        commit: plugin,
    })
}

pub async fn build_object_store(cfg: &AppConfig) -> Backends {
    let client = build_client(&cfg.remote.object_store).await;
    let plugin = Arc::new(ObjectStorePlugin::new(
        client,
        &cfg.remote.object_store,
        &cfg.upload,
        &cfg.timeouts,
    ));
    Backends {
        directory: plugin.clone(),
        deleter: plugin.clone(),
        broker: plugin.clone(),
        transfer: plugin.clone(),
        commit: plugin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builds_named_backends() {
        let mut cfg = AppConfig::default();
        cfg.remote.control_plane.base_url = "https://control.example".into();
        let backends = build_backends(&cfg).await.unwrap();
        assert_eq!(backends.directory.name(), "control_plane");
        assert_eq!(backends.deleter.max_batch(), usize::MAX);

        cfg.remote.backend = BackendKind::ObjectStore;
        let backends = build_backends(&cfg).await.unwrap();
        assert_eq!(backends.directory.name(), "object_store");
        assert_eq!(backends.deleter.max_batch(), 1000);
    }
}

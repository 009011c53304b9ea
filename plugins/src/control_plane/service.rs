use async_trait::async_trait;
use depot_core::api::{
    AssetDeleter, BatchOutcome, CommitDocument, CommitReceipt, CommitTarget, ControlPlaneConfig,
    EngineError, GrantBroker, ListingLocator, RemoteAssetRecord, RemoteDirectory, Session,
    TimeoutConfig, UploadGrant,
};
use serde_json::Value;

use super::http_client::ControlPlaneClient;

/// Workflow-backed remote: the asset listing lives inside one component of
/// the workflow document, and saving the workflow is the commit.
pub struct ControlPlanePlugin {
    client: ControlPlaneClient,
    component_id: String,
    asset_id: Option<String>,
}

impl ControlPlanePlugin {
    pub fn new(cfg: &ControlPlaneConfig, timeouts: &TimeoutConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: ControlPlaneClient::new(cfg, timeouts)?,
            component_id: cfg.component_id.clone(),
            asset_id: cfg.asset_id.clone().filter(|s| !s.trim().is_empty()),
        })
    }

    fn locator(&self) -> ListingLocator {
        ListingLocator::Component(self.component_id.clone())
    }

    fn asset_id_for(&self, document: &CommitDocument) -> Option<String> {
        self.asset_id.clone().or_else(|| match document.root().get("asset_id") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[async_trait]
impl RemoteDirectory for ControlPlanePlugin {
    fn name(&self) -> &str {
        "control_plane"
    }

    async fn check_access(&self, session: &Session) -> Result<(), EngineError> {
        let status = self.client.workflow_status(session).await?;
        match status {
            200..=299 => Ok(()),
            401 | 403 => Err(EngineError::AuthInvalid(format!(
                "workflow read returned HTTP {status}"
            ))),
            _ => {
                tracing::warn!(target: "depot.control_plane", status = status, "access check returned unexpected status");
                Ok(())
            }
        }
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteAssetRecord>, EngineError> {
        let Some(root) = self.client.get_workflow_for_listing(session).await? else {
            return Ok(Vec::new());
        };
        let records = CommitDocument::new(root, self.locator()).records();
        tracing::debug!(target: "depot.control_plane", stage = "list.out", records = records.len());
        Ok(records)
    }
}

#[async_trait]
impl AssetDeleter for ControlPlanePlugin {
    fn max_batch(&self) -> usize {
        // The service takes the full list in one call.
        usize::MAX
    }

    async fn delete_batch(
        &self,
        session: &Session,
        identifiers: &[String],
    ) -> Result<BatchOutcome, EngineError> {
        self.client.delete_files(session, identifiers).await
    }
}

#[async_trait]
impl GrantBroker for ControlPlanePlugin {
    async fn request_grant(
        &self,
        session: &Session,
        document: &CommitDocument,
        name: &str,
    ) -> Result<UploadGrant, EngineError> {
        let asset_id = self.asset_id_for(document).ok_or_else(|| {
            EngineError::Config(
                "no asset id configured and the workflow document does not carry one".to_string(),
            )
        })?;
        let target = self
            .client
            .request_upload_target(session, &asset_id, name)
            .await?;
        Ok(UploadGrant::presigned_post(name, target.url, target.fields))
    }
}

#[async_trait]
impl CommitTarget for ControlPlanePlugin {
    async fn read_document(&self, session: &Session) -> Result<CommitDocument, EngineError> {
        let root = self.client.get_workflow(session).await?;
        Ok(CommitDocument::new(root, self.locator()))
    }

    async fn commit(
        &self,
        session: &Session,
        document: &CommitDocument,
    ) -> Result<CommitReceipt, EngineError> {
        let message = self.client.patch_workflow(session, document.root()).await?;
        Ok(CommitReceipt { message })
    }
}

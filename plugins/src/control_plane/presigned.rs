use std::time::Duration;

use async_trait::async_trait;
use depot_core::api::{BlobTransfer, EngineError, GrantMethod, IssuedGrant, LocalAsset};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;

use super::http_client::{preview_body, HttpFailure};
use crate::operation::Operation;

/// Status codes storage endpoints use for an accepted upload.
const ACCEPTED: [u16; 3] = [200, 201, 204];

/// Multipart form POST to a presigned storage endpoint. Sends no session
/// credentials; the grant's form fields are the authorization.
pub struct PresignedPostTransfer {
    http: reqwest::Client,
}

impl PresignedPostTransfer {
    pub fn new(transfer_timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(transfer_timeout_ms))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl BlobTransfer for PresignedPostTransfer {
    async fn transfer(&self, asset: &LocalAsset, grant: IssuedGrant<'_>) -> Result<(), EngineError> {
        let name = asset.name.as_str();
        if grant.method() != GrantMethod::PresignedPost {
            return Err(EngineError::transfer_failed(name, "grant is not a presigned POST"));
        }

        let mut form = Form::new();
        for (k, v) in grant.fields() {
            form = form.text(k.clone(), v.clone());
        }
        // The handle moves into the body stream and is closed when the request ends.
        let file = tokio::fs::File::open(&asset.path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, asset.byte_size)
            .file_name(name.to_string())
            .mime_str(&asset.content_type)
            .map_err(|e| EngineError::transfer_failed(name, e.to_string()))?;
        form = form.part("file", part);

        let url = grant.endpoint().to_string();
        tracing::debug!(
            target: "depot.transfer",
            stage = "presigned.post.in",
            name = %name,
            bytes = asset.byte_size
        );
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::Transfer(name)))?;
        let status = resp.status().as_u16();
        tracing::debug!(target: "depot.transfer", stage = "presigned.post.out", name = %name, status = status);

        if ACCEPTED.contains(&status) {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(HttpFailure::status_error(status, &url, preview_body(&body)).into_engine(Operation::Transfer(name)))
    }
}

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use chrono::{TimeZone, Utc};
use depot_core::api::{
    size_label, AssetDeleter, BatchOutcome, BlobTransfer, CommitDocument, CommitReceipt,
    CommitTarget, EngineError, GrantBroker, GrantMethod, IssuedGrant, ListingLocator, LocalAsset,
    ObjectStoreConfig, RemoteAssetRecord, RemoteDirectory, Session, TimeoutConfig, UploadConfig,
    UploadGrant,
};
use serde_json::{json, Value};

use super::client::{bounded, classify_sdk, is_not_found_code};
use super::transfer::{parse_s3_uri, ObjectUpload};
use crate::operation::Operation;

/// Hard limit on keys per DeleteObjects call.
pub const MAX_DELETE_BATCH: usize = 1000;

pub const MANIFEST_LISTING: &str = "/files_uploaded";

const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Bucket-backed remote. The session's workspace id is the bucket; objects
/// under the prefix are the listing, and a JSON manifest next to them is the
/// commit document.
pub struct ObjectStorePlugin {
    client: aws_sdk_s3::Client,
    prefix: String,
    manifest_key: String,
    metadata_timeout: Duration,
    transfer_timeout: Duration,
    commit_timeout: Duration,
    multipart_threshold: u64,
    part_size: u64,
    part_concurrency: usize,
}

impl ObjectStorePlugin {
    pub fn new(
        client: aws_sdk_s3::Client,
        cfg: &ObjectStoreConfig,
        upload: &UploadConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            client,
            prefix: cfg.normalized_prefix(),
            manifest_key: cfg.manifest_object_key(),
            metadata_timeout: Duration::from_millis(timeouts.metadata_ms),
            transfer_timeout: Duration::from_millis(timeouts.transfer_ms),
            commit_timeout: Duration::from_millis(timeouts.commit_ms),
            multipart_threshold: upload.multipart_threshold_bytes,
            part_size: upload.part_size_bytes,
            part_concurrency: upload.part_concurrency,
        }
    }

    pub fn object_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// Listing record for one object. `None` for directory markers.
pub fn record_from_object(key: &str, size: Option<i64>, modified_secs: Option<i64>) -> Option<RemoteAssetRecord> {
    let name = key.rsplit('/').next().filter(|n| !n.is_empty())?;
    let size_label = size
        .map(|s| size_label(s.max(0) as u64))
        .unwrap_or_else(|| "Unknown".to_string());
    let uploaded_timestamp = modified_secs
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|t| t.format(LAST_MODIFIED_FORMAT).to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    Some(RemoteAssetRecord {
        identifier: key.to_string(),
        display_name: name.to_string(),
        size_label,
        uploaded_timestamp,
    })
}

fn empty_manifest() -> Value {
    json!({ "files_uploaded": [] })
}

#[async_trait]
impl RemoteDirectory for ObjectStorePlugin {
    fn name(&self) -> &str {
        "object_store"
    }

    async fn check_access(&self, session: &Session) -> Result<(), EngineError> {
        let bucket = session.workspace_id();
        let request = self.client.head_bucket().bucket(bucket);
        bounded(self.metadata_timeout, Operation::List, async {
            match request.send().await {
                Ok(_) => Ok(()),
                Err(e) if e.raw_response().map(|r| r.status().as_u16()) == Some(404) => {
                    Err(EngineError::Config(format!("bucket '{bucket}' does not exist")))
                }
                Err(e) => Err(classify_sdk(Operation::List, e)),
            }
        })
        .await
    }

    async fn list(&self, session: &Session) -> Result<Vec<RemoteAssetRecord>, EngineError> {
        let bucket = session.workspace_id();
        let mut records = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation.take());
            let page = bounded(self.metadata_timeout, Operation::List, async {
                request.send().await.map_err(|e| classify_sdk(Operation::List, e))
            })
            .await?;

            for obj in page.contents() {
                let Some(key) = obj.key() else { continue };
                if key == self.manifest_key {
                    continue;
                }
                let modified = obj.last_modified().map(|t| t.secs());
                if let Some(record) = record_from_object(key, obj.size(), modified) {
                    records.push(record);
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }
        tracing::debug!(target: "depot.object_store", stage = "list.out", records = records.len());
        Ok(records)
    }
}

#[async_trait]
impl AssetDeleter for ObjectStorePlugin {
    fn max_batch(&self) -> usize {
        MAX_DELETE_BATCH
    }

    async fn delete_batch(
        &self,
        session: &Session,
        identifiers: &[String],
    ) -> Result<BatchOutcome, EngineError> {
        let objects = identifiers
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::Config(format!("invalid delete request: {e}")))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(false)
            .build()
            .map_err(|e| EngineError::Config(format!("invalid delete request: {e}")))?;
        let request = self
            .client
            .delete_objects()
            .bucket(session.workspace_id())
            .delete(delete);
        let resp = bounded(self.metadata_timeout, Operation::Delete, async {
            request.send().await.map_err(|e| classify_sdk(Operation::Delete, e))
        })
        .await?;

        let mut outcome = BatchOutcome::default();
        for d in resp.deleted() {
            if let Some(key) = d.key() {
                outcome.deleted.push(key.to_string());
            }
        }
        for e in resp.errors() {
            let Some(key) = e.key() else { continue };
            let code = e.code().unwrap_or_default();
            if is_not_found_code(code) {
                outcome.deleted.push(key.to_string());
            } else {
                let reason = format!("{} - {}", code, e.message().unwrap_or_default());
                outcome.failed.push((key.to_string(), reason));
            }
        }

        // The objects are gone either way; a stale manifest only costs a warning.
        if let Err(e) = self.prune_manifest(session, &outcome.deleted).await {
            tracing::warn!(
                target: "depot.object_store",
                error = %e,
                "deleted objects are still listed in the manifest"
            );
        }
        Ok(outcome)
    }
}

impl ObjectStorePlugin {
    /// Drop manifest entries for objects under the prefix that were just deleted.
    async fn prune_manifest(&self, session: &Session, deleted_keys: &[String]) -> Result<usize, EngineError> {
        let names: BTreeSet<String> = deleted_keys
            .iter()
            .filter_map(|key| key.strip_prefix(self.prefix.as_str()))
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(0);
        }

        let document = self.read_document(session).await?;
        let locator = document.locator().clone();
        let mut root = document.into_root();
        let removed = prune_listing(&mut root, &names);
        if removed > 0 {
            self.commit(session, &CommitDocument::new(root, locator)).await?;
            tracing::info!(target: "depot.object_store", removed, "manifest pruned");
        }
        Ok(removed)
    }
}

/// Remove listing entries whose `file_name` is in `names`. Returns how many went.
pub fn prune_listing(manifest: &mut Value, names: &BTreeSet<String>) -> usize {
    let Some(list) = manifest.pointer_mut(MANIFEST_LISTING).and_then(Value::as_array_mut) else {
        return 0;
    };
    let before = list.len();
    list.retain(|entry| {
        entry
            .get("file_name")
            .and_then(Value::as_str)
            .map_or(true, |name| !names.contains(name))
    });
    before - list.len()
}

#[async_trait]
impl GrantBroker for ObjectStorePlugin {
    async fn request_grant(
        &self,
        session: &Session,
        _document: &CommitDocument,
        name: &str,
    ) -> Result<UploadGrant, EngineError> {
        // Static credentials: the grant only fixes the destination.
        let key = self.object_key(name);
        let endpoint = format!("s3://{}/{}", session.workspace_id(), key);
        Ok(UploadGrant::direct_put(key, endpoint))
    }
}

#[async_trait]
impl BlobTransfer for ObjectStorePlugin {
    async fn transfer(&self, asset: &LocalAsset, grant: IssuedGrant<'_>) -> Result<(), EngineError> {
        if grant.method() != GrantMethod::DirectPut {
            return Err(EngineError::transfer_failed(&asset.name, "grant is not a direct PUT"));
        }
        let (bucket, key) = parse_s3_uri(grant.endpoint()).ok_or_else(|| {
            EngineError::transfer_failed(&asset.name, format!("bad destination '{}'", grant.endpoint()))
        })?;
        // Fail on a missing file before any remote call.
        tokio::fs::metadata(&asset.path).await?;

        let upload = ObjectUpload {
            client: &self.client,
            bucket,
            key,
            asset,
            timeout: self.transfer_timeout,
        };
        if asset.byte_size > self.multipart_threshold {
            tracing::info!(
                target: "depot.object_store",
                name = %asset.name,
                bytes = asset.byte_size,
                "using multipart upload"
            );
            upload.multipart(self.part_size, self.part_concurrency).await
        } else {
            upload.put().await
        }
    }
}

#[async_trait]
impl CommitTarget for ObjectStorePlugin {
    async fn read_document(&self, session: &Session) -> Result<CommitDocument, EngineError> {
        let request = self
            .client
            .get_object()
            .bucket(session.workspace_id())
            .key(&self.manifest_key);
        let root = bounded(self.metadata_timeout, Operation::ReadDocument, async {
            let out = match request.send().await {
                Ok(out) => out,
                Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => {
                    tracing::info!(target: "depot.object_store", key = %self.manifest_key, "no manifest yet");
                    return Ok(empty_manifest());
                }
                Err(e) => return Err(classify_sdk(Operation::ReadDocument, e)),
            };
            let bytes = out
                .body
                .collect()
                .await
                .map_err(|e| EngineError::RemoteUnavailable(format!("manifest read interrupted: {e}")))?
                .into_bytes();
            serde_json::from_slice::<Value>(&bytes)
                .map_err(|e| EngineError::Parse(format!("manifest is not valid JSON: {e}")))
        })
        .await?;
        if !root.is_object() {
            return Err(EngineError::Parse("manifest is not a JSON object".to_string()));
        }
        Ok(CommitDocument::new(root, ListingLocator::Pointer(MANIFEST_LISTING.to_string())))
    }

    async fn commit(
        &self,
        session: &Session,
        document: &CommitDocument,
    ) -> Result<CommitReceipt, EngineError> {
        let body = serde_json::to_vec_pretty(document.root())
            .map_err(|e| EngineError::Parse(format!("manifest could not be encoded: {e}")))?;
        let bucket = session.workspace_id();
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(&self.manifest_key)
            .content_type("application/json")
            .body(ByteStream::from(body));
        bounded(self.commit_timeout, Operation::Commit, async {
            request.send().await.map_err(|e| classify_sdk(Operation::Commit, e))
        })
        .await?;
        Ok(CommitReceipt {
            message: format!("manifest written to s3://{}/{}", bucket, self.manifest_key),
        })
    }
}

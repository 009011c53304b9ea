//! Direct object upload: one PUT for small files, a multipart upload with
//! bounded part concurrency for large ones.

use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::Length;
use chrono::Utc;
use depot_core::api::{EngineError, LocalAsset};
use futures::{StreamExt, TryStreamExt};

use super::client::{bounded, classify_sdk};
use crate::operation::Operation;

pub const UPLOADER_TAG: &str = "depot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    pub number: i32,
    pub offset: u64,
    pub length: u64,
}

/// Split `size` bytes into parts of `part_size`; the last part takes the remainder.
pub fn plan_parts(size: u64, part_size: u64) -> Vec<PartPlan> {
    let part_size = part_size.max(1);
    let mut parts = Vec::new();
    let mut offset = 0;
    let mut number = 1;
    while offset < size {
        let length = part_size.min(size - offset);
        parts.push(PartPlan {
            number,
            offset,
            length,
        });
        offset += length;
        number += 1;
    }
    parts
}

/// Split an `s3://bucket/key` endpoint.
pub fn parse_s3_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("s3://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

pub(crate) struct ObjectUpload<'a> {
    pub client: &'a aws_sdk_s3::Client,
    pub bucket: &'a str,
    pub key: &'a str,
    pub asset: &'a LocalAsset,
    pub timeout: Duration,
}

impl ObjectUpload<'_> {
    fn op(&self) -> Operation<'_> {
        Operation::Transfer(&self.asset.name)
    }

    pub(crate) async fn put(&self) -> Result<(), EngineError> {
        let body = ByteStream::from_path(&self.asset.path)
            .await
            .map_err(|e| EngineError::transfer_failed(&self.asset.name, e.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(self.bucket)
            .key(self.key)
            .content_type(&self.asset.content_type)
            .metadata("original-filename", &self.asset.name)
            .metadata("upload-timestamp", Utc::now().to_rfc3339())
            .metadata("uploader", UPLOADER_TAG)
            .body(body);
        bounded(self.timeout, self.op(), async {
            request.send().await.map_err(|e| classify_sdk(self.op(), e))
        })
        .await?;
        Ok(())
    }

    pub(crate) async fn multipart(&self, part_size: u64, concurrency: usize) -> Result<(), EngineError> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .content_type(&self.asset.content_type)
            .metadata("original-filename", &self.asset.name)
            .metadata("upload-timestamp", Utc::now().to_rfc3339())
            .metadata("uploader", UPLOADER_TAG);
        let created = bounded(self.timeout, self.op(), async {
            create.send().await.map_err(|e| classify_sdk(self.op(), e))
        })
        .await?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| EngineError::transfer_failed(&self.asset.name, "no multipart upload id returned"))?
            .to_string();

        let plan = plan_parts(self.asset.byte_size, part_size);
        tracing::debug!(
            target: "depot.transfer",
            name = %self.asset.name,
            parts = plan.len(),
            concurrency = concurrency,
            "multipart upload started"
        );

        let uploaded: Result<Vec<CompletedPart>, EngineError> = futures::stream::iter(plan)
            .map(|part| self.upload_part(&upload_id, part))
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await;

        let mut parts = match uploaded {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(&upload_id).await;
                return Err(e);
            }
        };
        parts.sort_by_key(|p| p.part_number());

        let complete = self
            .client
            .complete_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            );
        let completed = bounded(self.timeout, self.op(), async {
            complete.send().await.map_err(|e| classify_sdk(self.op(), e))
        })
        .await;
        if let Err(e) = completed {
            self.abort(&upload_id).await;
            return Err(e);
        }
        Ok(())
    }

    async fn upload_part(&self, upload_id: &str, part: PartPlan) -> Result<CompletedPart, EngineError> {
        let body = read_range(&self.asset.path, part.offset, part.length)
            .await
            .map_err(|e| EngineError::transfer_failed(&self.asset.name, e))?;
        let request = self
            .client
            .upload_part()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(upload_id)
            .part_number(part.number)
            .body(body);
        let out = bounded(self.timeout, self.op(), async {
            request.send().await.map_err(|e| classify_sdk(self.op(), e))
        })
        .await?;
        Ok(CompletedPart::builder()
            .set_e_tag(out.e_tag().map(str::to_string))
            .part_number(part.number)
            .build())
    }

    async fn abort(&self, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(self.bucket)
            .key(self.key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(
                target: "depot.transfer",
                name = %self.asset.name,
                error = %aws_sdk_s3::error::DisplayErrorContext(&e),
                "failed to abort multipart upload"
            );
        }
    }
}

async fn read_range(path: &Path, offset: u64, length: u64) -> Result<ByteStream, String> {
    ByteStream::read_from()
        .path(path)
        .offset(offset)
        .length(Length::Exact(length))
        .build()
        .await
        .map_err(|e| e.to_string())
}

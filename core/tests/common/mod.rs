#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use depot_core::api::{
    AssetDeleter, Backends, BatchOutcome, BlobTransfer, CommitDocument, CommitReceipt,
    CommitTarget, EngineError, GrantBroker, IssuedGrant, ListingLocator, LocalAsset,
    RemoteAssetRecord, RemoteDirectory, RunObserver, RunPhase, Session, UploadGrant,
};

pub const LISTING: &str = "/files_uploaded";

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub reads: usize,
    pub lists: usize,
    pub delete_batches: usize,
    pub grants: usize,
    pub transfers: usize,
    pub commits: usize,
    /// A grant was requested while the previous one was still unused.
    pub overlapping_grants: usize,
}

#[derive(Default)]
struct State {
    document: Value,
    calls: Calls,
    live_grant: Option<String>,
    stored: Vec<String>,
    committed: Vec<Value>,
}

/// In-memory remote that plays every backend role and counts calls.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
    pub deny_grant: BTreeSet<String>,
    pub fail_transfer: BTreeSet<String>,
    pub reject_delete: BTreeSet<String>,
    pub reject_commit: bool,
    pub unreadable_listing: bool,
    pub auth_fail_transfer: BTreeSet<String>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::with_listing(Vec::new())
    }

    pub fn with_listing(entries: Vec<Value>) -> Self {
        let remote = Self::default();
        remote.state.lock().unwrap().document = json!({
            "owner": "ops",
            "settings": {"chunking": "auto"},
            "files_uploaded": entries,
        });
        remote
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn document(&self) -> Value {
        self.state.lock().unwrap().document.clone()
    }

    pub fn committed(&self) -> Vec<Value> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn stored(&self) -> Vec<String> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn listed_names(&self) -> Vec<String> {
        names_in(&self.document())
    }

    pub fn backends(self: &Arc<Self>) -> Backends {
        Backends {
            directory: self.clone(),
            deleter: self.clone(),
            broker: self.clone(),
            transfer: self.clone(),
            commit: self.clone(),
        }
    }
}

pub fn names_in(document: &Value) -> Vec<String> {
    document["files_uploaded"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|e| e["file_name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn entry(name: &str) -> Value {
    json!({"file_name": name, "uploaded_timestamp": "2024-01-01T00:00:00.000Z", "size": "1.0 KB"})
}

pub fn asset(name: &str) -> LocalAsset {
    LocalAsset {
        path: PathBuf::from(format!("/exports/{name}")),
        name: name.to_string(),
        byte_size: 1024,
        content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            .to_string(),
    }
}

pub fn assets(names: &[&str]) -> Vec<LocalAsset> {
    names.iter().map(|n| asset(n)).collect()
}

pub fn session() -> Session {
    Session::new("ws-1", Some("token".to_string()))
}

#[async_trait]
impl RemoteDirectory for FakeRemote {
    fn name(&self) -> &str {
        "fake"
    }

    async fn check_access(&self, _session: &Session) -> Result<(), EngineError> {
        Ok(())
    }

    async fn list(&self, _session: &Session) -> Result<Vec<RemoteAssetRecord>, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.lists += 1;
        if self.unreadable_listing {
            return Err(EngineError::Parse("listing body was not JSON".into()));
        }
        let doc = CommitDocument::new(state.document.clone(), ListingLocator::Pointer(LISTING.into()));
        Ok(doc.records())
    }
}

#[async_trait]
impl AssetDeleter for FakeRemote {
    fn max_batch(&self) -> usize {
        1000
    }

    async fn delete_batch(
        &self,
        _session: &Session,
        identifiers: &[String],
    ) -> Result<BatchOutcome, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.delete_batches += 1;
        let mut outcome = BatchOutcome::default();
        for id in identifiers {
            if self.reject_delete.contains(id) {
                outcome.failed.push((id.clone(), "AccessDenied".into()));
                continue;
            }
            // Unknown identifiers are the 404 case and still count as deleted.
            if let Some(list) = state.document["files_uploaded"].as_array_mut() {
                list.retain(|e| e["file_name"].as_str() != Some(id.as_str()));
            }
            outcome.deleted.push(id.clone());
        }
        Ok(outcome)
    }
}

#[async_trait]
impl GrantBroker for FakeRemote {
    async fn request_grant(
        &self,
        _session: &Session,
        _document: &CommitDocument,
        name: &str,
    ) -> Result<UploadGrant, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.grants += 1;
        if state.live_grant.is_some() {
            state.calls.overlapping_grants += 1;
        }
        if self.deny_grant.contains(name) {
            return Err(EngineError::grant_denied(name, "HTTP 400: quota exceeded"));
        }
        state.live_grant = Some(name.to_string());
        Ok(UploadGrant::direct_put(name, format!("mem://bucket/{name}")))
    }
}

#[async_trait]
impl BlobTransfer for FakeRemote {
    async fn transfer(&self, asset: &LocalAsset, grant: IssuedGrant<'_>) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.transfers += 1;
        assert_eq!(state.live_grant.take().as_deref(), Some(grant.target_name()));
        if self.auth_fail_transfer.contains(&asset.name) {
            return Err(EngineError::AuthInvalid("HTTP 401".into()));
        }
        if self.fail_transfer.contains(&asset.name) {
            return Err(EngineError::transfer_failed(&asset.name, "HTTP 500"));
        }
        state.stored.push(asset.name.clone());
        Ok(())
    }
}

#[async_trait]
impl CommitTarget for FakeRemote {
    async fn read_document(&self, _session: &Session) -> Result<CommitDocument, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.reads += 1;
        Ok(CommitDocument::new(
            state.document.clone(),
            ListingLocator::Pointer(LISTING.into()),
        ))
    }

    async fn commit(
        &self,
        _session: &Session,
        document: &CommitDocument,
    ) -> Result<CommitReceipt, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.commits += 1;
        if self.reject_commit {
            return Err(EngineError::CommitRejected("HTTP 409: stale document".into()));
        }
        state.document = document.root().clone();
        state.committed.push(document.root().clone());
        Ok(CommitReceipt {
            message: "Workflow updated".into(),
        })
    }
}

#[derive(Default)]
pub struct PhaseLog(pub Mutex<Vec<RunPhase>>);

impl PhaseLog {
    pub fn phases(&self) -> Vec<RunPhase> {
        self.0.lock().unwrap().clone()
    }
}

impl RunObserver for PhaseLog {
    fn phase_changed(&self, _from: RunPhase, to: RunPhase) {
        self.0.lock().unwrap().push(to);
    }
}

use std::collections::BTreeMap;
use std::time::Duration;
use std::{error::Error as StdError, fmt};

use depot_core::api::{BatchOutcome, ControlPlaneConfig, EngineError, Session, TimeoutConfig};
use serde_json::{json, Value};

use crate::operation::Operation;

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpFailureKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl HttpFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HttpFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct HttpFailure {
    kind: HttpFailureKind,
    status: Option<u16>,
    url: Option<String>,
    message: String,
    source: Option<reqwest::Error>,
}

impl HttpFailure {
    pub fn kind(&self) -> HttpFailureKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        let kind = if err.is_timeout() {
            HttpFailureKind::Timeout
        } else if err.is_connect() {
            HttpFailureKind::Connect
        } else if err.is_request() {
            HttpFailureKind::Request
        } else if err.is_body() {
            HttpFailureKind::Body
        } else if err.is_decode() {
            HttpFailureKind::Decode
        } else {
            HttpFailureKind::Unknown
        };
        HttpFailure {
            kind,
            status: err.status().map(|s| s.as_u16()),
            url: Some(url.to_string()),
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub(crate) fn status_error(status: u16, url: &str, preview: String) -> Self {
        HttpFailure {
            kind: HttpFailureKind::Status,
            status: Some(status),
            url: Some(url.to_string()),
            message: preview,
            source: None,
        }
    }

    pub(crate) fn decode_error(status: u16, url: &str, err: serde_json::Error, preview: String) -> Self {
        HttpFailure {
            kind: HttpFailureKind::Decode,
            status: Some(status),
            url: Some(url.to_string()),
            message: format!("failed to decode response body: {} | body={}", err, preview),
            source: None,
        }
    }

    /// Map onto the engine taxonomy for the call that produced it.
    pub fn into_engine(self, op: Operation<'_>) -> EngineError {
        let text = self.to_string();
        if self.kind == HttpFailureKind::Decode && !matches!(op, Operation::Transfer(_)) {
            return EngineError::Parse(text);
        }
        let transient = matches!(self.kind, HttpFailureKind::Timeout | HttpFailureKind::Connect);
        op.classify(self.status, transient, text)
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http error kind={}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={}", status)?;
        }
        if let Some(url) = &self.url {
            write!(f, " url={}", url)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl StdError for HttpFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

pub(crate) fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

async fn read_body(resp: reqwest::Response, op: Operation<'_>) -> Result<(u16, String, String), EngineError> {
    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(op))?;
    Ok((status, url, body))
}

fn parse_json(status: u16, url: &str, body: &str) -> Result<Value, HttpFailure> {
    serde_json::from_str::<Value>(body)
        .map_err(|err| HttpFailure::decode_error(status, url, err, preview_body(body)))
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn entry_identifier(v: &Value) -> Option<String> {
    value_as_string(v).or_else(|| {
        ["file_name", "name", "key", "id"]
            .iter()
            .find_map(|k| v.get(*k).and_then(value_as_string))
    })
}

fn is_not_found(code: &str) -> bool {
    matches!(code, "404" | "NotFound" | "NoSuchKey" | "not_found")
}

/// Interpret a delete response against the identifiers that were sent.
pub(crate) fn parse_delete_response(requested: &[String], body: &str) -> BatchOutcome {
    let all_deleted = || BatchOutcome {
        deleted: requested.to_vec(),
        failed: Vec::new(),
    };
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        // 200 without a JSON body: the service accepted the whole list.
        return all_deleted();
    };
    let deleted_list = value.get("deleted_files").and_then(Value::as_array);
    let error_list = value.get("errors").and_then(Value::as_array);
    if deleted_list.is_none() && error_list.is_none() {
        return all_deleted();
    }

    let mut outcome = BatchOutcome::default();
    for v in deleted_list.into_iter().flatten() {
        if let Some(id) = entry_identifier(v) {
            outcome.deleted.push(id);
        }
    }
    for v in error_list.into_iter().flatten() {
        let Some(id) = entry_identifier(v) else {
            tracing::warn!(target: "depot.control_plane", error = %v, "delete error without identifier");
            continue;
        };
        let code = ["code", "status"]
            .iter()
            .find_map(|k| v.get(*k).and_then(value_as_string))
            .unwrap_or_default();
        if is_not_found(&code) {
            outcome.deleted.push(id);
        } else {
            let reason = v
                .get("message")
                .and_then(value_as_string)
                .unwrap_or_else(|| if code.is_empty() { "unknown error".to_string() } else { code });
            outcome.failed.push((id, reason));
        }
    }
    outcome
}

/// One presigned POST target from a grant response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedTarget {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

pub(crate) fn parse_grant_response(name: &str, value: &Value) -> Result<PresignedTarget, EngineError> {
    let uploads = value.get("url").and_then(Value::as_array).ok_or_else(|| {
        EngineError::grant_denied(name, "grant response has no upload targets")
    })?;
    let entry = uploads
        .iter()
        .find(|u| u.get("file_name").and_then(Value::as_str) == Some(name))
        .or_else(|| uploads.first())
        .ok_or_else(|| EngineError::grant_denied(name, "grant response has no upload targets"))?;
    let target = entry.get("url").unwrap_or(&Value::Null);
    let url = target
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| EngineError::grant_denied(name, "grant is missing the upload url"))?;
    let fields = target
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| EngineError::grant_denied(name, "grant is missing form fields"))?;
    let fields = fields
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect();
    Ok(PresignedTarget {
        url: url.to_string(),
        fields,
    })
}

#[derive(Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    commit_timeout: Duration,
    headers: BTreeMap<String, String>,
    // Pre-built URL prefixes
    url_workflow: String,
    url_document: String,
    url_grant: String,
}

impl ControlPlaneClient {
    pub fn new(cfg: &ControlPlaneConfig, timeouts: &TimeoutConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeouts.metadata_ms))
            .user_agent(cfg.user_agent.clone())
            .build()?;
        let normalized = cfg.base_url.trim_end_matches('/');
        Ok(Self {
            http,
            commit_timeout: Duration::from_millis(timeouts.commit_ms),
            headers: cfg.headers.clone(),
            url_workflow: format!("{}/v1/workflow", normalized),
            url_document: format!("{}/v1/document", normalized),
            url_grant: format!("{}/v3/document/file_upload", normalized),
        })
    }

    fn auth(&self, mut req: reqwest::RequestBuilder, session: &Session) -> reqwest::RequestBuilder {
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        match session.bearer_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn workflow_url(&self, session: &Session) -> String {
        format!("{}/{}", self.url_workflow, session.workspace_id())
    }

    /// Status of a plain workflow read, for access checks.
    pub async fn workflow_status(&self, session: &Session) -> Result<u16, EngineError> {
        let url = self.workflow_url(session);
        let resp = self
            .auth(self.http.get(&url), session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::ReadDocument))?;
        Ok(resp.status().as_u16())
    }

    /// The workflow document. Anything other than a JSON object is an error.
    pub async fn get_workflow(&self, session: &Session) -> Result<Value, EngineError> {
        let url = self.workflow_url(session);
        tracing::debug!(target: "depot.control_plane", stage = "workflow.get.in", url = %url);
        let resp = self
            .auth(self.http.get(&url), session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::ReadDocument))?;
        let (status, url, body) = read_body(resp, Operation::ReadDocument).await?;
        tracing::debug!(target: "depot.control_plane", stage = "workflow.get.out", status = status);

        if status == 404 {
            return Err(EngineError::Config(format!(
                "workspace '{}' not found",
                session.workspace_id()
            )));
        }
        if !(200..300).contains(&status) {
            return Err(HttpFailure::status_error(status, &url, preview_body(&body))
                .into_engine(Operation::ReadDocument));
        }
        if body.trim().is_empty() {
            return Err(EngineError::Parse("workflow response body is empty".to_string()));
        }
        let value = parse_json(status, &url, &body).map_err(|e| e.into_engine(Operation::ReadDocument))?;
        if !value.is_object() {
            return Err(EngineError::Parse("workflow response is not a JSON object".to_string()));
        }
        Ok(value)
    }

    /// The workflow document for listing purposes. Unusable responses become
    /// `None` so an empty listing can be assumed.
    pub async fn get_workflow_for_listing(&self, session: &Session) -> Result<Option<Value>, EngineError> {
        let url = self.workflow_url(session);
        let resp = self
            .auth(self.http.get(&url), session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::List))?;
        let (status, url, body) = read_body(resp, Operation::List).await?;

        match status {
            200..=299 => {}
            401 | 403 => {
                return Err(HttpFailure::status_error(status, &url, preview_body(&body))
                    .into_engine(Operation::List))
            }
            404 => {
                tracing::warn!(target: "depot.control_plane", url = %url, "workflow not found, listing is empty");
                return Ok(None);
            }
            _ => {
                tracing::warn!(
                    target: "depot.control_plane",
                    status = status,
                    body = %preview_body(&body),
                    "could not read workflow, listing is empty"
                );
                return Ok(None);
            }
        }
        if body.trim().is_empty() {
            tracing::info!(target: "depot.control_plane", "workflow is empty");
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(v) => Ok(Some(v)),
            Err(_) => {
                tracing::warn!(
                    target: "depot.control_plane",
                    body = %preview_body(&body),
                    "workflow response is not JSON, listing is empty"
                );
                Ok(None)
            }
        }
    }

    pub async fn delete_files(
        &self,
        session: &Session,
        identifiers: &[String],
    ) -> Result<BatchOutcome, EngineError> {
        let url = format!("{}/{}", self.url_document, session.workspace_id());
        tracing::debug!(
            target: "depot.control_plane",
            stage = "document.delete.in",
            url = %url,
            count = identifiers.len()
        );
        let req = self
            .http
            .delete(&url)
            .json(&json!({ "files_to_delete": identifiers }));
        let resp = self
            .auth(req, session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::Delete))?;
        let (status, url, body) = read_body(resp, Operation::Delete).await?;
        tracing::debug!(target: "depot.control_plane", stage = "document.delete.out", status = status);

        if status == 404 {
            // Nothing left to delete.
            return Ok(BatchOutcome {
                deleted: identifiers.to_vec(),
                failed: Vec::new(),
            });
        }
        if !(200..300).contains(&status) {
            return Err(HttpFailure::status_error(status, &url, preview_body(&body))
                .into_engine(Operation::Delete));
        }
        Ok(parse_delete_response(identifiers, &body))
    }

    pub async fn request_upload_target(
        &self,
        session: &Session,
        asset_id: &str,
        name: &str,
    ) -> Result<PresignedTarget, EngineError> {
        let url = &self.url_grant;
        let payload = json!({
            "asset_id": asset_id,
            "files_names": [{
                "file_name": name,
                "file_id": uuid::Uuid::new_v4().to_string(),
            }],
            "is_rag_storage_request": true,
            "workflow_id": session.workspace_id(),
        });
        tracing::debug!(target: "depot.control_plane", stage = "grant.in", url = %url, name = %name);
        let resp = self
            .auth(self.http.post(url).json(&payload), session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, url).into_engine(Operation::Grant(name)))?;
        let (status, url, body) = read_body(resp, Operation::Grant(name)).await?;
        tracing::debug!(target: "depot.control_plane", stage = "grant.out", status = status);

        if !(200..300).contains(&status) {
            return Err(HttpFailure::status_error(status, &url, preview_body(&body))
                .into_engine(Operation::Grant(name)));
        }
        let value = parse_json(status, &url, &body)
            .map_err(|e| EngineError::grant_denied(name, e.to_string()))?;
        parse_grant_response(name, &value)
    }

    /// Submit the whole document. Returns the service's message.
    pub async fn patch_workflow(&self, session: &Session, document: &Value) -> Result<String, EngineError> {
        let url = self.workflow_url(session);
        tracing::debug!(target: "depot.control_plane", stage = "workflow.patch.in", url = %url);
        let req = self
            .http
            .patch(&url)
            .timeout(self.commit_timeout)
            .json(document);
        let resp = self
            .auth(req, session)
            .send()
            .await
            .map_err(|err| HttpFailure::from_reqwest(err, &url).into_engine(Operation::Commit))?;
        let (status, url, body) = read_body(resp, Operation::Commit).await?;
        tracing::debug!(target: "depot.control_plane", stage = "workflow.patch.out", status = status);

        if !(200..300).contains(&status) {
            return Err(HttpFailure::status_error(status, &url, preview_body(&body))
                .into_engine(Operation::Commit));
        }
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(value_as_string))
            .unwrap_or_else(|| "Workflow updated successfully".to_string());
        Ok(message)
    }
}

use std::future::Future;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use depot_core::api::{EngineError, ObjectStoreConfig};

use crate::operation::Operation;

/// Error codes that mean the configured credentials are unusable.
const AUTH_CODES: [&str; 5] = [
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

const NOT_FOUND_CODES: [&str; 3] = ["NoSuchKey", "NotFound", "NoSuchBucket"];

pub async fn build_client(cfg: &ObjectStoreConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
    if let (Some(key), Some(secret)) = (&cfg.access_key_id, &cfg.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            key.clone(),
            secret.clone(),
            cfg.session_token.clone(),
            None,
            "depot-config",
        ));
    }
    if let Some(endpoint) = &cfg.endpoint_url {
        loader = loader.endpoint_url(endpoint.clone());
    }
    let shared = loader.load().await;
    let s3_cfg = aws_sdk_s3::config::Builder::from(&shared)
        // S3-compatible endpoints usually lack virtual-host routing.
        .force_path_style(cfg.endpoint_url.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_cfg)
}

pub(crate) fn is_not_found_code(code: &str) -> bool {
    NOT_FOUND_CODES.contains(&code)
}

/// Map a status and error code onto the engine taxonomy.
pub(crate) fn classify_parts(
    op: Operation<'_>,
    status: Option<u16>,
    code: Option<&str>,
    transient: bool,
    text: String,
) -> EngineError {
    // Static credentials are shared by every call, so a rejection here is fatal even mid-transfer.
    if code.is_some_and(|c| AUTH_CODES.contains(&c)) {
        return EngineError::AuthInvalid(text);
    }
    op.classify(status, transient, text)
}

pub(crate) fn classify_sdk<E>(op: Operation<'_>, err: SdkError<E, HttpResponse>) -> EngineError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    let transient = matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_));
    let text = DisplayErrorContext(&err).to_string();
    classify_parts(op, status, code.as_deref(), transient, text)
}

/// Bound one SDK call by `limit`.
pub(crate) async fn bounded<T, F>(limit: Duration, op: Operation<'_>, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(op.timed_out(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::api::ErrorKind;

    #[test]
    fn test_auth_codes_are_fatal_even_for_transfers() {
        let err = classify_parts(
            Operation::Transfer("a.xlsx"),
            Some(403),
            Some("InvalidAccessKeyId"),
            false,
            "denied".into(),
        );
        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
    }

    #[test]
    fn test_server_errors_are_unavailable() {
        let err = classify_parts(Operation::List, Some(503), Some("SlowDown"), false, "slow".into());
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }

    #[test]
    fn test_not_found_codes() {
        assert!(is_not_found_code("NoSuchKey"));
        assert!(!is_not_found_code("AccessDenied"));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded(Duration::from_millis(10), Operation::Commit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, EngineError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    }
}

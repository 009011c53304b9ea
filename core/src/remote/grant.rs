use std::collections::BTreeMap;

/// How the bytes reach storage under a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantMethod {
    /// Multipart form POST to a presigned endpoint, form fields taken from the grant.
    PresignedPost,
    /// Direct object PUT with the backend's own credentials.
    DirectPut,
}

/// Short-lived authorization and destination for uploading exactly one file.
///
/// Not `Clone`: a grant is consumed by the transfer that uses it. Engine code
/// only ever sees grants through [`crate::engine::IssuedGrant`].
#[derive(Debug)]
pub struct UploadGrant {
    target_name: String,
    endpoint: String,
    fields: BTreeMap<String, String>,
    method: GrantMethod,
}

impl UploadGrant {
    pub fn presigned_post(
        target_name: impl Into<String>,
        endpoint: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            endpoint: endpoint.into(),
            fields,
            method: GrantMethod::PresignedPost,
        }
    }

    pub fn direct_put(target_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            endpoint: endpoint.into(),
            fields: BTreeMap::new(),
            method: GrantMethod::DirectPut,
        }
    }

    /// Name (or object key) the remote side expects the bytes under.
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Opaque auth fields issued with the grant.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn method(&self) -> GrantMethod {
        self.method
    }
}

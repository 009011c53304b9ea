//! Data model shared by the engine and its backends.

pub mod document;
pub mod grant;
pub mod types;

pub use document::{CommitDocument, ListingLocator};
pub use grant::{GrantMethod, UploadGrant};
pub use types::{RemoteAssetRecord, Session, UploadResult, UPLOADED_TIMESTAMP_FORMAT};

//! Local export artifacts picked up for upload.

mod scan;

pub use scan::{content_type_for, scan_directory, size_label};

use std::path::PathBuf;

/// A local file to upload. Discovered once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub name: String,
    pub byte_size: u64,
    pub content_type: String,
}

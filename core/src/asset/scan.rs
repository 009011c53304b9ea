use std::collections::BTreeMap;
use std::path::Path;

use super::LocalAsset;
use crate::error::EngineError;

/// Human size label stored alongside uploaded entries, e.g. `12.5 KB`.
pub fn size_label(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Flat scan of `dir` for files whose extension is in `extensions`
/// (case-insensitive, without the dot). The result is ordered by file name.
pub fn scan_directory(dir: &Path, extensions: &[String]) -> Result<Vec<LocalAsset>, EngineError> {
    if !dir.is_dir() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("directory not found: {}", dir.display()),
        )));
    }

    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };

    // Keyed by name so overlapping patterns cannot produce duplicates.
    let mut found: BTreeMap<String, LocalAsset> = BTreeMap::new();
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.');
        if ext.is_empty() {
            continue;
        }
        let pattern = format!("{base}/*.{ext}");
        let paths = glob::glob_with(&pattern, options)
            .map_err(|e| EngineError::Config(format!("invalid extension '{ext}': {e}")))?;

        let mut matched = 0usize;
        for entry in paths {
            let path = entry.map_err(|e| EngineError::Io(e.into_error()))?;
            let meta = std::fs::metadata(&path)?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            matched += 1;
            found.entry(name.clone()).or_insert_with(|| LocalAsset {
                content_type: content_type_for(&path),
                byte_size: meta.len(),
                name,
                path,
            });
        }
        tracing::debug!(target: "depot.scan", ext = %ext, matched, "pattern scanned");
    }

    let assets: Vec<LocalAsset> = found.into_values().collect();
    tracing::info!(
        target: "depot.scan",
        dir = %dir.display(),
        files = assets.len(),
        "local scan complete"
    );
    Ok(assets)
}

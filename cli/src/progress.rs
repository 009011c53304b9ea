use std::time::Duration;

use depot_core::api::{EngineError, LocalAsset, RunObserver, RunPhase};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Upload progress on stderr, driven by the orchestrator's observer hooks.
///
/// When disabled the bar is hidden but still counts, so callers can read the
/// position back.
pub struct UploadProgress {
    bar: ProgressBar,
    enabled: bool,
}

impl UploadProgress {
    pub fn new(total_files: usize, enabled: bool) -> Self {
        let target = if enabled {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(total_files as u64), target);
        if enabled {
            let style = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  ");
            bar.set_style(style);
        }
        Self { bar, enabled }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn line(&self, msg: String) {
        if self.enabled {
            self.bar.println(msg);
        }
    }
}

impl RunObserver for UploadProgress {
    fn phase_changed(&self, _from: RunPhase, to: RunPhase) {
        match to {
            RunPhase::ReadingRemote => self.bar.set_message("reading remote state"),
            RunPhase::Reconciling => self.bar.set_message("reconciling"),
            RunPhase::Uploading(0) => {
                self.bar.set_message("");
                if self.enabled {
                    self.bar.enable_steady_tick(Duration::from_millis(200));
                }
            }
            RunPhase::Committing => self.bar.set_message("committing"),
            RunPhase::Done => self.bar.finish_with_message("done"),
            RunPhase::Aborted => self.bar.abandon_with_message("aborted"),
            _ => {}
        }
    }

    fn file_started(&self, index: usize, total: usize, asset: &LocalAsset) {
        self.bar
            .set_message(format!("{}/{} {}", index + 1, total, asset.name));
    }

    fn file_finished(&self, _index: usize, asset: &LocalAsset, error: Option<&EngineError>) {
        match error {
            None => self.line(format!("  ✅ {}", asset.name)),
            Some(e) => self.line(format!("  ❌ {}: {e}", asset.name)),
        }
        self.bar.inc(1);
    }
}

impl Drop for UploadProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_disabled_progress_counts_files() {
        let progress = UploadProgress::new(2, false);
        let asset = LocalAsset {
            path: PathBuf::from("a.xlsx"),
            name: "a.xlsx".to_string(),
            byte_size: 3,
            content_type: "application/octet-stream".to_string(),
        };
        progress.phase_changed(RunPhase::Reconciling, RunPhase::Uploading(0));
        progress.file_started(0, 2, &asset);
        progress.file_finished(0, &asset, None);
        let err = EngineError::transfer_failed("a.xlsx", "HTTP 500");
        progress.file_finished(1, &asset, Some(&err));
        progress.phase_changed(RunPhase::Uploading(2), RunPhase::Committing);
        progress.phase_changed(RunPhase::Committing, RunPhase::Done);
        assert_eq!(progress.position(), 2);
    }
}

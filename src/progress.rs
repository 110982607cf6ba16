//! Progress bar for download runs.

use std::time::Duration;

use harvester_core::download::Progress;
use indicatif::{ProgressBar, ProgressStyle};

/// Draws download progress on stderr; a no-op when disabled.
pub(crate) struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    /// Creates the bar when `enabled` (interactive stderr, not `--quiet`).
    pub(crate) fn new(enabled: bool, total: usize) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Applies one progress event.
    pub(crate) fn update(&self, progress: &Progress) {
        if let Some(bar) = &self.bar {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.current as u64);
            bar.set_message(format!("{}% {}", progress.percentage, progress.message));
        }
    }

    /// Removes the bar from the terminal.
    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Whether to draw a bar for this terminal and verbosity.
pub(crate) fn should_draw(stderr_is_terminal: bool, quiet: bool) -> bool {
    stderr_is_terminal && !quiet && std::env::var("TERM").map_or(true, |term| term != "dumb")
}

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use popexp_exposure::{ProgressObserver, Stage};
use std::collections::HashMap;
use std::sync::Mutex;

/// Create a progress bar for determinate progress
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Finish a progress bar with success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {}", message));
}

/// One progress bar per pipeline stage
pub struct StageProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<Stage, ProgressBar>>,
}

impl StageProgress {
    /// Bars are drawn on stderr unless `hidden` is set
    pub fn new(hidden: bool) -> Self {
        let multi = if hidden {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self { multi, bars: Mutex::new(HashMap::new()) }
    }

    fn bar(&self, stage: Stage) -> Option<ProgressBar> {
        self.bars.lock().ok().and_then(|bars| bars.get(&stage).cloned())
    }
}

impl ProgressObserver for StageProgress {
    fn stage_started(&self, stage: Stage, total: usize) {
        let pb = self.multi.add(create_progress_bar(total as u64, &stage.to_string()));
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(stage, pb);
        }
    }

    fn advance(&self, stage: Stage, n: usize) {
        if let Some(pb) = self.bar(stage) {
            pb.inc(n as u64);
        }
    }

    fn stage_finished(&self, stage: Stage) {
        if let Some(pb) = self.bar(stage) {
            finish_success(&pb, &stage.to_string());
        }
    }
}

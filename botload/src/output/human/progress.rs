use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct HumanProgress {
    pb: ProgressBar,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
        pb.set_style(bar_style());
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    pub(crate) fn update(&self, done: u64, total: u64, message: String) {
        self.pb.set_length(total);
        self.pb.set_position(done.min(total));
        self.pb.set_message(message);
    }

    pub(crate) fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{wide_bar}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Single in-place progress line on stderr. A run with a known duration gets
/// a bar; an iteration-capped run gets a spinner.
pub(crate) struct HumanProgress {
    total: Option<Duration>,
    bar: Mutex<Option<ProgressBar>>,
}

impl HumanProgress {
    pub(crate) fn new(total: Option<Duration>) -> Self {
        Self {
            total,
            bar: Mutex::new(None),
        }
    }

    pub(crate) fn update(&self, elapsed: Duration, message: String) {
        let mut slot = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let pb = slot.get_or_insert_with(|| match self.total {
            Some(_) => {
                let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr_with_hz(5));
                pb.set_style(bar_style());
                pb.set_prefix("load");
                pb
            }
            None => {
                let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr_with_hz(5));
                pb.set_style(spinner_style());
                pb.set_prefix("load");
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            }
        });

        pb.set_message(message);

        match self.total {
            Some(total) => {
                let total_ms = total.as_millis() as u64;
                let elapsed_ms = elapsed.as_millis() as u64;
                pb.set_length(total_ms);
                pb.set_position(elapsed_ms.min(total_ms));
            }
            None => {
                pb.tick();
            }
        }
    }

    pub(crate) fn finish(&self) {
        let mut slot = self
            .bar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(pb) = slot.take() {
            pb.finish_and_clear();
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} {spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

//! Progress reporting collaborators.
//!
//! Reporters are shared by every worker of a pass, so all methods take `&self`.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

pub trait ProgressReporter: Send + Sync {
    /// Start a new run of `total_steps` steps.
    fn init(&self, total_steps: u64);

    fn update(&self, steps: u64);

    fn done(&self);

    fn set_tag(&self, text: &str);

    fn tag(&self) -> String;

    /// Completion of the current run in [0, 100].
    fn percent(&self) -> f32;

    fn total_steps(&self) -> u64;
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn init(&self, _total_steps: u64) {}

    fn update(&self, _steps: u64) {}

    fn done(&self) {}

    fn set_tag(&self, _text: &str) {}

    fn tag(&self) -> String {
        String::new()
    }

    fn percent(&self) -> f32 {
        0.0
    }

    fn total_steps(&self) -> u64 {
        0
    }
}

/// Shared handle to the default silent reporter.
pub fn silent() -> Arc<dyn ProgressReporter> {
    static SILENT: Lazy<Arc<SilentProgress>> = Lazy::new(|| Arc::new(SilentProgress));
    SILENT.clone()
}

/// Terminal progress bar.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        // The template is a constant, so this only fails if it is edited badly
        if let Ok(style) = ProgressStyle::with_template(
            "{msg:>12} [{elapsed_precise}] {wide_bar} {pos}/{len} ({percent}%)"
        ) {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// A bar that keeps track of progress but never draws.
    pub fn hidden() -> Self {
        Self { bar: ProgressBar::hidden() }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn init(&self, total_steps: u64) {
        self.bar.reset();
        self.bar.set_length(total_steps);
    }

    fn update(&self, steps: u64) {
        self.bar.inc(steps);
    }

    fn done(&self) {
        self.bar.finish();
    }

    fn set_tag(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn tag(&self) -> String {
        self.bar.message()
    }

    fn percent(&self) -> f32 {
        match self.bar.length() {
            Some(len) if len > 0 => (100.0 * self.bar.position() as f32 / len as f32).min(100.0),
            _ => 0.0,
        }
    }

    fn total_steps(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent() {
        let p = silent();
        p.init(10);
        p.update(5);
        p.set_tag("ignored");
        assert_eq!(p.percent(), 0.0);
        assert_eq!(p.tag(), "");
    }

    #[test]
    fn test_console_percent() {
        let p = ConsoleProgress::hidden();
        p.init(8);
        p.update(2);
        assert_eq!(p.percent(), 25.0);
        p.set_tag("pass 1");
        assert_eq!(p.tag(), "pass 1");
        assert_eq!(p.total_steps(), 8);

        p.init(4);
        assert_eq!(p.percent(), 0.0);
        p.done();
    }
}

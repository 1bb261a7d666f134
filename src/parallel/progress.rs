//! Progress reporting for the transform phase

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Thin wrapper over an optional terminal progress bar.
///
/// A disabled reporter accepts every call and draws nothing, so the
/// pipeline never branches on whether output is interactive.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Reporter that draws a bar on stderr
    pub fn terminal() -> Self {
        Self {
            bar: Some(ProgressBar::hidden()),
        }
    }

    /// Reporter that draws nothing
    pub fn disabled() -> Self {
        Self { bar: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.bar.is_some()
    }

    /// Reset the bar for `total` files and show it
    pub fn start(&self, total: u64) {
        if let Some(bar) = &self.bar {
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            bar.set_length(total);
            bar.set_position(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
        }
        debug!("Progress started for {} files", total);
    }

    /// Show the file currently being worked on
    pub fn set_message(&self, filename: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(filename.to_string());
        }
    }

    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, ProgressBar::position)
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_reporter_is_inert() {
        let progress = ProgressReporter::disabled();
        progress.start(3);
        progress.set_message("a.png");
        progress.inc();
        progress.finish();
        assert!(!progress.is_enabled());
        assert_eq!(progress.position(), 0);
    }

    #[test]
    fn test_enabled_reporter_counts() {
        let progress = ProgressReporter::terminal();
        progress.start(2);
        progress.inc();
        progress.inc();
        assert_eq!(progress.position(), 2);
        progress.finish();
    }
}

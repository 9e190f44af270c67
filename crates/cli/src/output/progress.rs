//! Progress indication for long-running operations
//!
//! Tree uploads have no known total up front, so progress is a spinner
//! that counts completed items.

use std::time::Duration;

use indicatif::ProgressStyle;

use super::OutputConfig;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {pos} done";

/// Spinner wrapper
///
/// Handles progress display based on output configuration.
/// In quiet or JSON mode, progress is suppressed.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a spinner for indeterminate progress
    pub fn spinner(config: &OutputConfig, message: &str) -> Self {
        let bar = if config.quiet || config.json || config.no_progress {
            None
        } else {
            let bar = indicatif::ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
            Some(bar)
        };

        Self { bar }
    }

    /// Count one finished item
    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Finish and clear the spinner
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_suppressed_in_quiet_mode() {
        let config = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        let bar = ProgressBar::spinner(&config, "Uploading");
        assert!(bar.bar.is_none());
        bar.inc();
        bar.finish_and_clear();
    }

    #[test]
    fn test_spinner_suppressed_in_json_mode() {
        let config = OutputConfig {
            json: true,
            ..Default::default()
        };
        assert!(ProgressBar::spinner(&config, "Uploading").bar.is_none());
    }

    #[test]
    fn test_spinner_suppressed_with_no_progress() {
        let config = OutputConfig {
            no_progress: true,
            ..Default::default()
        };
        assert!(ProgressBar::spinner(&config, "Uploading").bar.is_none());
    }

    #[test]
    fn test_spinner_counts_items() {
        let bar = ProgressBar::spinner(&OutputConfig::default(), "Uploading");
        bar.inc();
        bar.inc();
        assert_eq!(bar.bar.as_ref().map(|b| b.position()), Some(2));
        bar.finish_and_clear();
    }
}

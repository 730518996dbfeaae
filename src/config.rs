//! # Configuration
//!
//! Compile-time defaults for the editor. There is no configuration file.

use std::time::Duration;

#[derive(Debug, PartialEq)]
pub struct Config {
    /// The size of a tab. Must be > 0.
    pub tab_stop: usize,
    /// The number of confirmations needed before quitting, when changes have been made since the
    /// file was last saved.
    pub quit_times: usize,
    /// The duration for which messages are shown in the status bar.
    pub message_dur: Duration,
}

impl Default for Config {
    /// Default configuration.
    fn default() -> Self {
        Self { tab_stop: 8, quit_times: 3, message_dur: Duration::new(5, 0) }
    }
}

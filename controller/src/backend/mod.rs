//! Frame sources: stdin or a recorded replay file.

pub mod frames;
pub mod stream;

use std::path::PathBuf;

use crate::settings::ControllerConfig;

/// Frame source selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
    /// Live frames piped from the tracker.
    Stdin,
    /// A recorded frame log.
    Replay(PathBuf),
}

/// Options that are not part of the configuration file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Log actions instead of writing them to stdout.
    pub dry_run: bool,
    /// Stop after N seconds.
    pub exit_after: Option<u64>,
}

/// Run the controller over the selected frame source.
pub fn run(backend: BackendType, config: ControllerConfig, opts: RunOptions) -> anyhow::Result<()> {
    stream::run(backend, config, opts)
}

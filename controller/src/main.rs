//! handpilot - hand-landmark gesture control.
//!
//! Reads hand-landmark frames, turns gestures into cursor, click, scroll
//! and key actions, and serves a Unix-socket control channel.

mod actions;
mod backend;
mod gesture;
pub mod ipc;
mod settings;
mod sexp;
mod voice;

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::info;

use crate::backend::stream::parse_resolution;
use crate::settings::ControllerConfig;

#[derive(Parser, Debug)]
#[command(name = "handpilot", version, about = "Hand-gesture pointer and keyboard control")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay frames from a recorded file instead of stdin
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Screen resolution, e.g. 1920x1080
    #[arg(long)]
    screen: Option<String>,

    /// Camera frame resolution, e.g. 640x480
    #[arg(long)]
    frame: Option<String>,

    /// Show the virtual keyboard at start
    #[arg(long)]
    keyboard: bool,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/handpilot-ipc.sock)
    #[arg(long)]
    ipc_socket: Option<PathBuf>,

    /// Do not start the IPC server
    #[arg(long)]
    no_ipc: bool,

    /// Log all IPC messages to stderr
    #[arg(long)]
    ipc_trace: bool,

    /// Log actions instead of writing them to stdout
    #[arg(long)]
    dry_run: bool,

    /// Exit after N seconds
    #[arg(long)]
    exit_after: Option<u64>,
}

/// Apply command-line overrides on top of the file configuration.
fn apply_overrides(cli: &Cli, config: &mut ControllerConfig) -> anyhow::Result<()> {
    if let Some(s) = &cli.screen {
        let Some((w, h)) = parse_resolution(s) else {
            bail!("Invalid --screen resolution: {s} (expected WxH)");
        };
        config.screen.width = w;
        config.screen.height = h;
    }
    if let Some(s) = &cli.frame {
        let Some((w, h)) = parse_resolution(s) else {
            bail!("Invalid --frame resolution: {s} (expected WxH)");
        };
        config.frame.width = w;
        config.frame.height = h;
    }
    if cli.keyboard {
        config.keyboard.visible = true;
    }
    if let Some(path) = &cli.ipc_socket {
        config.ipc.socket = Some(path.clone());
    }
    if cli.no_ipc {
        config.ipc.enabled = false;
    }
    if cli.ipc_trace {
        config.ipc.trace = true;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries actions; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handpilot=info".into()),
        )
        .init();

    info!("handpilot v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = ControllerConfig::load_or_default(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config)?;

    let backend_type = match &cli.replay {
        Some(path) => backend::BackendType::Replay(path.clone()),
        None => backend::BackendType::Stdin,
    };
    info!("frame source: {:?}", backend_type);

    backend::run(
        backend_type,
        config,
        backend::RunOptions {
            dry_run: cli.dry_run,
            exit_after: cli.exit_after,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("handpilot").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_overrides_layer_on_config() {
        let cli = parse(&[
            "--screen",
            "2560x1440",
            "--frame",
            "1280x720",
            "--keyboard",
            "--no-ipc",
            "--ipc-trace",
        ]);
        let mut config = ControllerConfig::default();
        apply_overrides(&cli, &mut config).unwrap();
        assert_eq!((config.screen.width, config.screen.height), (2560, 1440));
        assert_eq!((config.frame.width, config.frame.height), (1280, 720));
        assert!(config.keyboard.visible);
        assert!(!config.ipc.enabled);
        assert!(config.ipc.trace);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = parse(&[]);
        let mut config = ControllerConfig::default();
        apply_overrides(&cli, &mut config).unwrap();
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_bad_resolution_rejected() {
        let cli = parse(&["--screen", "wide"]);
        let mut config = ControllerConfig::default();
        let err = apply_overrides(&cli, &mut config).unwrap_err();
        assert!(err.to_string().contains("--screen"));
    }

    #[test]
    fn test_replay_and_socket_paths() {
        let cli = parse(&["--replay", "session.sexp", "--ipc-socket", "/tmp/hp.sock", "--dry-run"]);
        assert_eq!(cli.replay, Some(PathBuf::from("session.sexp")));
        assert!(cli.dry_run);
        let mut config = ControllerConfig::default();
        apply_overrides(&cli, &mut config).unwrap();
        assert_eq!(config.ipc.socket, Some(PathBuf::from("/tmp/hp.sock")));
    }
}

//! Frame loop over a line-oriented frame source.
//!
//! Reads one frame per line, drains the voice inbox, runs the gesture
//! pipeline and publishes telemetry for the IPC `status` query.  The IPC
//! server runs on its own thread for the lifetime of the loop.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};

use super::frames::FrameReader;
use super::{BackendType, RunOptions};
use crate::actions::{ActionSink, LogSink, SexpSink};
use crate::gesture::controller::{ControllerState, SharedState};
use crate::ipc::IpcServer;
use crate::settings::{ControllerConfig, LiveSettings};
use crate::voice::VoiceInbox;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Parse a "WxH" resolution string. Returns (width, height) or None.
pub fn parse_resolution(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    let w = w.trim().parse::<u32>().ok()?;
    let h = h.trim().parse::<u32>().ok()?;
    if w > 0 && h > 0 {
        Some((w, h))
    } else {
        None
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
///
/// The flag is checked between frames, so a blocked read on an idle
/// tracker only notices it when the next line arrives.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn open_source(backend: &BackendType) -> anyhow::Result<Box<dyn BufRead>> {
    match backend {
        BackendType::Stdin => {
            info!("Reading landmark frames from stdin");
            Ok(Box::new(io::stdin().lock()))
        }
        BackendType::Replay(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open replay file: {}", path.display()))?;
            info!(path = %path.display(), "Replaying landmark frames");
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Drive `controller` until the source is exhausted, a shutdown signal
/// arrives or `exit_after` elapses.  Returns the number of lines that
/// produced a frame (including unreadable ones).
pub fn run_frames<R: BufRead>(
    reader: &mut FrameReader<R>,
    controller: &mut ControllerState,
    shared: &SharedState,
    sink: &mut dyn ActionSink,
    exit_after: Option<Duration>,
) -> anyhow::Result<u64> {
    let start = Instant::now();
    let mut last_status_log = Instant::now();
    let mut processed = 0u64;

    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, exiting");
            break;
        }
        if let Some(dur) = exit_after {
            if start.elapsed() >= dur {
                info!("Exit timer fired after {}s", dur.as_secs());
                break;
            }
        }

        let Some(next) = reader
            .next_frame()
            .with_context(|| format!("Failed to read frame source at line {}", reader.line_no + 1))?
        else {
            info!(lines = reader.line_no, "Frame source exhausted");
            break;
        };

        controller.apply_inbox(&shared.voice, sink);
        let settings = shared.settings.snapshot();
        let telemetry = match next {
            Ok(frame) => {
                let now = frame
                    .timestamp_s
                    .unwrap_or_else(|| start.elapsed().as_secs_f64());
                controller.process_frame(&frame, now, &settings, sink)
            }
            Err(e) => {
                warn!(line = reader.line_no, error = %e, "Unreadable landmark frame");
                controller.process_unreadable(start.elapsed().as_secs_f64(), &settings, sink)
            }
        };
        shared.status.publish(telemetry.to_sexp());
        processed += 1;

        if last_status_log.elapsed() >= STATUS_INTERVAL {
            let t = controller.telemetry();
            info!(
                "Status: {} frame(s), {} malformed, mode {}, keyboard {}",
                t.frames,
                t.malformed_frames,
                t.mode,
                if t.keyboard_visible { "shown" } else { "hidden" }
            );
            last_status_log = Instant::now();
        }
    }
    Ok(processed)
}

/// Set up shared state, the IPC thread and the sink, then run the loop.
pub fn run(backend: BackendType, config: ControllerConfig, opts: RunOptions) -> anyhow::Result<()> {
    let source = open_source(&backend)?;

    let shared = SharedState::new(
        LiveSettings::new(config.tunables()),
        VoiceInbox::new(config.voice.enabled),
    );
    let mut controller = ControllerState::new(
        config.screen_size(),
        config.frame_size(),
        config.pointer.buffer_len,
    );
    if config.keyboard.visible {
        controller.keyboard.show();
    }
    info!(
        "Screen {}x{}, frame {}x{}",
        config.screen.width, config.screen.height, config.frame.width, config.frame.height
    );

    let ipc_stop = Arc::new(AtomicBool::new(false));
    let ipc_thread = if config.ipc.enabled {
        let path = config
            .ipc
            .socket
            .clone()
            .unwrap_or_else(IpcServer::default_socket_path);
        let mut server = IpcServer::new(path, shared.clone());
        server.ipc_trace = config.ipc.trace;
        Some(server.spawn(ipc_stop.clone())?)
    } else {
        info!("IPC disabled");
        None
    };

    install_signal_handlers();

    let mut sink: Box<dyn ActionSink> = if opts.dry_run {
        info!("Dry run: actions are logged, not emitted");
        Box::new(LogSink)
    } else {
        Box::new(SexpSink::new(io::stdout()))
    };

    let mut reader = FrameReader::new(source);
    let result = run_frames(
        &mut reader,
        &mut controller,
        &shared,
        sink.as_mut(),
        opts.exit_after.map(Duration::from_secs),
    );

    ipc_stop.store(true, Ordering::Relaxed);
    if let Some(handle) = ipc_thread {
        if handle.join().is_err() {
            warn!("IPC thread panicked");
        }
    }

    let t = controller.telemetry();
    info!(
        "Shutting down ({} frame(s), {} malformed)",
        t.frames, t.malformed_frames
    );
    result.map(|_| ())
}

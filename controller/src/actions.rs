//! Output contract: the input-device actions the controller emits.

use std::io::Write;

use thiserror::Error;
use tracing::{info, warn};

use crate::sexp::{escape_string, format_event};

/// Mouse button for `Action::Click`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
}

impl Button {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// One input-device action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Absolute cursor position in screen pixels.
    MoveCursor { x: i32, y: i32 },
    Click(Button),
    DoubleClick,
    /// Positive scrolls up.
    Scroll(i32),
    /// Device key name, e.g. `"a"`, `"space"`, `"backspace"`.
    PressKey(String),
    /// Ask the desktop side to start an application.
    Launch(String),
}

impl Action {
    /// Event name on the wire and in telemetry.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveCursor { .. } => "move-cursor",
            Self::Click(_) => "click",
            Self::DoubleClick => "double-click",
            Self::Scroll(_) => "scroll",
            Self::PressKey(_) => "press-key",
            Self::Launch(_) => "launch",
        }
    }

    /// Render as an s-expression event.
    pub fn to_sexp(&self) -> String {
        match self {
            Self::MoveCursor { x, y } => format_event(
                self.name(),
                &[("x", &x.to_string()), ("y", &y.to_string())],
            ),
            Self::Click(b) => format_event(self.name(), &[("button", &format!(":{}", b.as_str()))]),
            Self::DoubleClick => format_event(self.name(), &[]),
            Self::Scroll(amount) => format_event(self.name(), &[("amount", &amount.to_string())]),
            Self::PressKey(key) => {
                format_event(self.name(), &[("key", &format!("\"{}\"", escape_string(key)))])
            }
            Self::Launch(app) => {
                format_event(self.name(), &[("app", &format!("\"{}\"", escape_string(app)))])
            }
        }
    }
}

/// Why an action could not be delivered.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("action sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("action rejected: {0}")]
    Rejected(String),
}

/// Receiver of controller actions (input injection backend).
pub trait ActionSink {
    fn dispatch(&mut self, action: &Action) -> Result<(), DispatchError>;
}

/// Writes one s-expression event per line.
///
/// Once the reader hangs up (`BrokenPipe`) the sink stays closed and
/// rejects further actions without touching the writer.
pub struct SexpSink<W: Write> {
    out: W,
    closed: bool,
}

impl<W: Write> SexpSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, closed: false }
    }

    fn write_event(&mut self, action: &Action) -> std::io::Result<()> {
        writeln!(self.out, "{}", action.to_sexp())?;
        self.out.flush()
    }
}

impl<W: Write> ActionSink for SexpSink<W> {
    fn dispatch(&mut self, action: &Action) -> Result<(), DispatchError> {
        if self.closed {
            return Err(DispatchError::Rejected("action output closed".to_string()));
        }
        self.write_event(action).map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                warn!("Action output closed by reader");
                self.closed = true;
            }
            DispatchError::Io(e)
        })
    }
}

/// Logs actions instead of performing them (`--dry-run`).
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn dispatch(&mut self, action: &Action) -> Result<(), DispatchError> {
        match action {
            Action::MoveCursor { .. } => tracing::trace!(?action, "dry-run"),
            _ => info!(?action, "dry-run"),
        }
        Ok(())
    }
}

/// Records actions; optionally fails every dispatch.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub actions: Vec<Action>,
    pub fail: bool,
}

#[cfg(test)]
impl ActionSink for RecordingSink {
    fn dispatch(&mut self, action: &Action) -> Result<(), DispatchError> {
        self.actions.push(action.clone());
        if self.fail {
            return Err(DispatchError::Rejected("sink offline".to_string()));
        }
        Ok(())
    }
}

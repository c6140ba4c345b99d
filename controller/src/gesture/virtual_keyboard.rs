//! On-screen keyboard driven by the index fingertip.
//!
//! Provides the static frame-relative key layout, hit testing, and the
//! hover-to-type state machine: dwelling on a key for `hover_threshold`
//! seconds presses it, and a pinch presses the hovered key at once.  Both
//! paths share one typing cooldown.

use tracing::{debug, info};

use crate::sexp::{escape_string, t_or_nil};

use super::landmarks::{FrameSize, Point};

// ── Key definition ─────────────────────────────────────────

/// One key of the overlay, positioned in frame pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDef {
    /// Label drawn on the key (e.g. "Q", "SPACE").
    pub label: String,
    /// Key name sent to the input device (e.g. "q", "space").
    pub key_code: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl KeyDef {
    /// Whether point (px, py) is inside this key's bounding box, edges included.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

// ── Layout generation ──────────────────────────────────────

const KEY_SIZE: f64 = 50.0;
const KEY_MARGIN: f64 = 10.0;
const LAYOUT_TOP: f64 = 0.55;
/// The space row is centred as if it were this wide.
const SPACE_ROW_WIDTH: f64 = 400.0;

const ROWS: [&[&str]; 5] = [
    &["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"],
    &["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"],
    &["A", "S", "D", "F", "G", "H", "J", "K", "L"],
    &["Z", "X", "C", "V", "B", "N", "M", "BACK"],
    &["SPACE", "ENTER"],
];

/// Device key name for a key label.
pub fn key_code(label: &str) -> String {
    match label {
        "SPACE" => "space".to_string(),
        "ENTER" => "enter".to_string(),
        "BACK" => "backspace".to_string(),
        other => other.to_lowercase(),
    }
}

fn key_width(label: &str) -> f64 {
    match label {
        "SPACE" => 250.0,
        "BACK" => 80.0,
        "ENTER" => 120.0,
        _ => KEY_SIZE,
    }
}

/// Generate key definitions for a frame of the given size.
///
/// Rows are centred horizontally using the nominal key width for every key;
/// the space row uses a fixed nominal width.  Positions are whole pixels.
pub fn generate_layout(frame: FrameSize) -> Vec<KeyDef> {
    let mut keys = Vec::new();
    let mut y = (frame.height * LAYOUT_TOP).trunc();

    for row in ROWS {
        let row_width = if row.contains(&"SPACE") {
            SPACE_ROW_WIDTH
        } else {
            row.len() as f64 * KEY_SIZE + (row.len() as f64 - 1.0) * KEY_MARGIN
        };
        let mut x = ((frame.width - row_width) / 2.0).floor();

        for label in row.iter() {
            let width = key_width(label);
            keys.push(KeyDef {
                label: label.to_string(),
                key_code: key_code(label),
                x,
                y,
                width,
                height: KEY_SIZE,
            });
            x += width + KEY_MARGIN;
        }
        y += KEY_SIZE + KEY_MARGIN;
    }

    keys
}

// ── State ──────────────────────────────────────────────────

/// Overlay visibility, layout and hover progress.
pub struct VirtualKeyboardState {
    /// Whether the overlay is currently shown.
    pub visible: bool,
    /// Current key layout.
    pub keys: Vec<KeyDef>,
    /// Frame size the layout was generated for.
    layout_frame: FrameSize,
    /// Index into `keys` of the hovered key.
    current_key: Option<usize>,
    hover_start: f64,
    /// Shared by the hover and pinch paths; `None` means never typed.
    last_typed_at: Option<f64>,
    last_typed_key: Option<String>,
    /// Previous frame's pinch, for rising-edge detection.
    pinch_held: bool,
    progress: f64,
}

impl VirtualKeyboardState {
    /// Create a hidden keyboard laid out for `frame`.
    pub fn new(frame: FrameSize) -> Self {
        Self {
            visible: false,
            keys: generate_layout(frame),
            layout_frame: frame,
            current_key: None,
            hover_start: 0.0,
            last_typed_at: None,
            last_typed_key: None,
            pinch_held: false,
            progress: 0.0,
        }
    }

    /// Show the overlay.
    pub fn show(&mut self) {
        self.visible = true;
        info!("Virtual keyboard shown");
    }

    /// Hide the overlay and forget any hover.
    pub fn hide(&mut self) {
        self.visible = false;
        self.idle();
        info!("Virtual keyboard hidden");
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.hide();
        } else {
            self.show();
        }
    }

    /// Regenerate the layout when the camera frame size changes.
    pub fn ensure_layout(&mut self, frame: FrameSize) {
        if frame != self.layout_frame {
            debug!(
                width = frame.width,
                height = frame.height,
                "Rebuilding keyboard layout"
            );
            self.keys = generate_layout(frame);
            self.layout_frame = frame;
            self.idle();
        }
    }

    /// Find the first key containing a point, in layout order.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        self.keys.iter().position(|k| k.contains(x, y))
    }

    /// Return to `Idle`: no hovered key, pinch released.
    pub fn idle(&mut self) {
        self.current_key = None;
        self.pinch_held = false;
        self.progress = 0.0;
    }

    /// Advance the hover state machine by one frame.
    ///
    /// `tip` is the index fingertip in frame pixels; `pinch` is this frame's
    /// index–thumb pinch predicate.  Returns the key name to press, if any.
    pub fn update(
        &mut self,
        tip: Point,
        now: f64,
        pinch: bool,
        hover_threshold: f64,
        typing_cooldown: f64,
    ) -> Option<String> {
        let pinch_edge = pinch && !self.pinch_held;
        self.pinch_held = pinch;

        let Some(hit) = self.hit_test(tip.x, tip.y) else {
            self.current_key = None;
            self.progress = 0.0;
            return None;
        };

        if self.current_key != Some(hit) {
            debug!(key = %self.keys[hit].label, "hover start");
            self.current_key = Some(hit);
            self.hover_start = now;
            self.progress = 0.0;
        } else {
            let elapsed = now - self.hover_start;
            self.progress = if hover_threshold > 0.0 {
                (elapsed / hover_threshold).min(1.0)
            } else {
                1.0
            };
            if elapsed >= hover_threshold && self.hover_cooled(now, typing_cooldown) {
                self.hover_start = now;
                return Some(self.record_typed(hit, now, "hover"));
            }
        }

        if pinch_edge && self.pinch_cooled(now, typing_cooldown) {
            return Some(self.record_typed(hit, now, "pinch"));
        }
        None
    }

    /// Hover repeats need strictly more than the cooldown.
    fn hover_cooled(&self, now: f64, typing_cooldown: f64) -> bool {
        self.last_typed_at
            .map_or(true, |last| now - last > typing_cooldown)
    }

    /// A pinch is refused only while still inside the cooldown.
    fn pinch_cooled(&self, now: f64, typing_cooldown: f64) -> bool {
        self.last_typed_at
            .map_or(true, |last| now - last >= typing_cooldown)
    }

    fn record_typed(&mut self, key: usize, now: f64, via: &str) -> String {
        let code = self.keys[key].key_code.clone();
        info!(key = %code, via, "Key typed");
        self.last_typed_at = Some(now);
        self.last_typed_key = Some(code.clone());
        code
    }

    /// Hover progress toward the next press, in [0, 1].
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Label of the hovered key.
    pub fn hovered(&self) -> Option<&str> {
        self.current_key.map(|i| self.keys[i].label.as_str())
    }

    pub fn last_typed_key(&self) -> Option<&str> {
        self.last_typed_key.as_deref()
    }

    /// Generate s-expression for IPC status.
    pub fn status_sexp(&self) -> String {
        let quoted = |s: Option<&str>| {
            s.map(|v| format!("\"{}\"", escape_string(v)))
                .unwrap_or_else(|| "nil".to_string())
        };
        format!(
            "(:visible {} :key-count {} :hover {} :progress {:.2} :last-typed {})",
            t_or_nil(self.visible),
            self.keys.len(),
            quoted(self.hovered()),
            self.progress,
            quoted(self.last_typed_key()),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

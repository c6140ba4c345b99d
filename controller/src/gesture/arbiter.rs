//! Gesture mode classification.
//!
//! Reads a finger-state vector plus a handful of landmark distances and
//! decides which control modes are active this frame.  Classification is a
//! pure function; all temporal behaviour (debounce, smoothing, scroll
//! reference) lives in the components the directives drive.

use tracing::trace;

use super::landmarks::{FingerState, HandLandmark, HandPose, Point};

// ── Mode types ─────────────────────────────────────────────

/// Which hand shape selected scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollSource {
    /// Pinky alone extended.
    Pinky,
    /// All five fingers extended.
    Palm,
}

impl ScrollSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinky => "pinky",
            Self::Palm => "palm",
        }
    }
}

/// Control mode active in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureMode {
    Idle,
    /// Cursor follows the index tip; index–thumb pinch is a left click.
    Move,
    /// Cursor follows the middle tip; middle–thumb pinch is a right click.
    RightClickTrack,
    Scroll(ScrollSource),
}

impl GestureMode {
    /// String representation for IPC and logs.
    pub fn label(&self) -> String {
        match self {
            Self::Idle => "idle".to_string(),
            Self::Move => "move".to_string(),
            Self::RightClickTrack => "right-click-track".to_string(),
            Self::Scroll(src) => format!("scroll({})", src.as_str()),
        }
    }
}

// ── Directives ─────────────────────────────────────────────

/// Everything the per-frame pipeline should do, as decided by `classify`.
///
/// The tracking mode and scroll are independent: an open palm yields
/// `RightClickTrack` and `Scroll(Palm)` together.
#[derive(Debug, Clone, PartialEq)]
pub struct Directives {
    /// Tracking mode: `Idle`, `Move` or `RightClickTrack`.
    pub tracking: GestureMode,
    /// Landmark the cursor should follow, in frame pixels.
    pub track_point: Option<Point>,
    pub left_click: bool,
    pub right_click: bool,
    pub double_click: bool,
    pub scroll: Option<ScrollSource>,
    /// Wrist height, the scroll integrator's input.
    pub wrist_y: f64,
    /// Index tip when the index finger is extended (keyboard pointer).
    pub index_tip: Option<Point>,
}

impl Directives {
    /// Directives for a frame with no hand.
    pub fn idle() -> Self {
        Self {
            tracking: GestureMode::Idle,
            track_point: None,
            left_click: false,
            right_click: false,
            double_click: false,
            scroll: None,
            wrist_y: 0.0,
            index_tip: None,
        }
    }

    /// All active modes, tracking first.
    pub fn modes(&self) -> Vec<GestureMode> {
        let mut modes = Vec::with_capacity(2);
        if self.tracking != GestureMode::Idle {
            modes.push(self.tracking);
        }
        if let Some(src) = self.scroll {
            modes.push(GestureMode::Scroll(src));
        }
        modes
    }

    /// Combined mode label, e.g. `right-click-track+scroll(palm)`.
    pub fn label(&self) -> String {
        let modes = self.modes();
        if modes.is_empty() {
            return GestureMode::Idle.label();
        }
        modes
            .iter()
            .map(|m| m.label())
            .collect::<Vec<_>>()
            .join("+")
    }
}

// ── Classification ─────────────────────────────────────────

/// Classify one frame.
///
/// `click_distance` is the fingertip-to-thumb distance in frame pixels
/// below which a pinch counts as a click.
pub fn classify(pose: &HandPose, fingers: FingerState, click_distance: f64) -> Directives {
    let mut d = Directives::idle();
    d.wrist_y = pose.point(HandLandmark::Wrist).y;

    if fingers.index() && !fingers.middle() {
        d.tracking = GestureMode::Move;
        d.track_point = Some(pose.point(HandLandmark::IndexTip));
        d.left_click =
            pose.distance(HandLandmark::IndexTip, HandLandmark::ThumbTip) < click_distance;
    } else if fingers.middle() {
        d.tracking = GestureMode::RightClickTrack;
        d.track_point = Some(pose.point(HandLandmark::MiddleTip));
        d.right_click =
            pose.distance(HandLandmark::MiddleTip, HandLandmark::ThumbTip) < click_distance;
    }

    d.double_click = fingers.index() && pose.ring_folded();

    if fingers.all_up() {
        d.scroll = Some(ScrollSource::Palm);
    } else if fingers.pinky() && !fingers.index() && !fingers.middle() && !fingers.ring() {
        d.scroll = Some(ScrollSource::Pinky);
    }

    if fingers.index() {
        d.index_tip = Some(pose.point(HandLandmark::IndexTip));
    }

    trace!(fingers = %fingers, mode = %d.label(), "classified frame");
    d
}

// ── Tests ──────────────────────────────────────────────────

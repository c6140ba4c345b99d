//! Hand landmark frames as produced by the external detector.
//!
//! Models the 21-point hand topology (wrist + four joints per finger) in
//! frame-pixel space.  Provides validation of raw detector output, named
//! point access, pixel distances and finger-state derivation.

use thiserror::Error;
use tracing::debug;

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks, in detector index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

impl HandLandmark {
    /// Convert landmark enum to detector index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ── Points ─────────────────────────────────────────────────

/// One landmark as reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPoint {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

/// A position in frame-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ── Frame ──────────────────────────────────────────────────

/// Size of the camera frame the landmarks were measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

impl Default for FrameSize {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
        }
    }
}

/// Raw detector output for one frame.
#[derive(Debug, Clone, Default)]
pub struct LandmarkFrame {
    /// Frame timestamp in seconds, when the source supplies one.
    pub timestamp_s: Option<f64>,
    /// Frame dimensions, when the source supplies them.
    pub size: Option<FrameSize>,
    /// Detected points; empty when no hand is in view.
    pub points: Vec<LandmarkPoint>,
    /// Finger state computed upstream, if the detector provides it.
    pub fingers: Option<FingerState>,
}

impl LandmarkFrame {
    /// Whether the detector reported no hand at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Why a non-empty landmark frame could not be used.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("expected {LANDMARK_COUNT} landmarks, got {0}")]
    WrongCount(usize),
    #[error("landmark id {0} out of range")]
    IdOutOfRange(usize),
    #[error("landmark id {0} reported twice")]
    DuplicateId(usize),
    #[error("landmark {0} has a non-finite coordinate")]
    NonFinite(usize),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

// ── Hand pose ──────────────────────────────────────────────

/// A validated hand: all 21 landmarks present, indexed by `HandLandmark`.
#[derive(Debug, Clone)]
pub struct HandPose {
    points: [Point; LANDMARK_COUNT],
}

impl HandPose {
    /// Validate a frame's points into a complete pose.
    ///
    /// Returns `Ok(None)` for an empty frame (no hand).  Partial, duplicated
    /// or out-of-range ids are rejected so callers never index missing data.
    pub fn from_frame(frame: &LandmarkFrame) -> Result<Option<Self>, FrameError> {
        if frame.is_empty() {
            return Ok(None);
        }
        if frame.points.len() != LANDMARK_COUNT {
            return Err(FrameError::WrongCount(frame.points.len()));
        }

        let mut seen = [false; LANDMARK_COUNT];
        let mut points = [Point::default(); LANDMARK_COUNT];
        for p in &frame.points {
            if p.id >= LANDMARK_COUNT {
                return Err(FrameError::IdOutOfRange(p.id));
            }
            if seen[p.id] {
                return Err(FrameError::DuplicateId(p.id));
            }
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(FrameError::NonFinite(p.id));
            }
            seen[p.id] = true;
            points[p.id] = Point::new(p.x, p.y);
        }

        Ok(Some(Self { points }))
    }

    /// Position of a landmark.
    pub fn point(&self, landmark: HandLandmark) -> Point {
        self.points[landmark.index()]
    }

    /// Pixel distance between two landmarks.
    pub fn distance(&self, a: HandLandmark, b: HandLandmark) -> f64 {
        self.point(a).distance(&self.point(b))
    }

    /// Ring finger folded toward the palm: tip below its PIP joint.
    pub fn ring_folded(&self) -> bool {
        self.point(HandLandmark::RingTip).y > self.point(HandLandmark::RingPip).y
    }

    /// Derive which fingers are extended from the landmark geometry.
    ///
    /// Thumb: tip to the right of the IP joint (mirrored camera image).
    /// Other fingers: tip above the PIP joint.
    pub fn fingers_up(&self) -> FingerState {
        let thumb = self.point(HandLandmark::ThumbTip).x > self.point(HandLandmark::ThumbIp).x;
        let up = |tip: HandLandmark, pip: HandLandmark| self.point(tip).y < self.point(pip).y;
        let state = FingerState([
            thumb,
            up(HandLandmark::IndexTip, HandLandmark::IndexPip),
            up(HandLandmark::MiddleTip, HandLandmark::MiddlePip),
            up(HandLandmark::RingTip, HandLandmark::RingPip),
            up(HandLandmark::PinkyTip, HandLandmark::PinkyPip),
        ]);
        debug!(fingers = %state, "derived finger state");
        state
    }
}

// ── Finger state ───────────────────────────────────────────

/// Which fingers are extended, ordered thumb, index, middle, ring, pinky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FingerState(pub [bool; 5]);

impl FingerState {
    pub fn index(&self) -> bool {
        self.0[1]
    }

    pub fn middle(&self) -> bool {
        self.0[2]
    }

    pub fn ring(&self) -> bool {
        self.0[3]
    }

    pub fn pinky(&self) -> bool {
        self.0[4]
    }

    /// All five fingers extended.
    pub fn all_up(&self) -> bool {
        self.0.iter().all(|f| *f)
    }
}

impl std::fmt::Display for FingerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for up in self.0 {
            f.write_str(if up { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Build a frame with every landmark at the given default position.
#[cfg(test)]
pub(crate) fn uniform_frame(x: f64, y: f64) -> LandmarkFrame {
    LandmarkFrame {
        points: (0..LANDMARK_COUNT)
            .map(|id| LandmarkPoint { id, x, y })
            .collect(),
        ..Default::default()
    }
}

#[cfg(test)]
pub(crate) fn set_point(frame: &mut LandmarkFrame, landmark: HandLandmark, x: f64, y: f64) {
    if let Some(p) = frame.points.iter_mut().find(|p| p.id == landmark.index()) {
        p.x = x;
        p.y = y;
    }
}

// ── Tests ──────────────────────────────────────────────────

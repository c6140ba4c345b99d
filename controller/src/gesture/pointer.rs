//! Frame-to-screen coordinate mapping and cursor smoothing.

use std::collections::VecDeque;

use super::landmarks::{FrameSize, Point};

/// Default number of EMA outputs averaged by the smoothing filter.
pub const DEFAULT_BUFFER_LEN: usize = 5;

/// Target display size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

/// Inset of the active rectangle from each frame edge, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Padding {
    pub fn uniform(px: f64) -> Self {
        Self {
            left: px,
            right: px,
            top: px,
            bottom: px,
        }
    }
}

/// Linear interpolation of `v` from `[src_lo, src_hi]` onto
/// `[dst_lo, dst_hi]`, clamped to the target range.
///
/// An empty or inverted source range maps everything at or below `src_lo`
/// to `dst_lo` and everything else to `dst_hi`.
pub fn clamp_interp(v: f64, src_lo: f64, src_hi: f64, dst_lo: f64, dst_hi: f64) -> f64 {
    if src_hi <= src_lo {
        return if v <= src_lo { dst_lo } else { dst_hi };
    }
    let t = ((v - src_lo) / (src_hi - src_lo)).clamp(0.0, 1.0);
    dst_lo + t * (dst_hi - dst_lo)
}

/// Maps a point inside the padded active rectangle of the camera frame to
/// absolute screen coordinates.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    pub frame: FrameSize,
    pub screen: ScreenSize,
    pub padding: Padding,
}

impl CoordinateMapper {
    pub fn map(&self, p: Point) -> Point {
        let x = clamp_interp(
            p.x,
            self.padding.left,
            self.frame.width - self.padding.right,
            0.0,
            self.screen.width,
        );
        let y = clamp_interp(
            p.y,
            self.padding.top,
            self.frame.height - self.padding.bottom,
            0.0,
            self.screen.height,
        );
        Point::new(x, y)
    }
}

/// Two-stage cursor filter: exponential moving average followed by a
/// moving mean over the last `capacity` EMA outputs.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    prev: Option<Point>,
    buffer: VecDeque<Point>,
    capacity: usize,
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LEN)
    }
}

impl SmoothingFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            prev: None,
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Feed one mapped position and return the smoothed one.
    ///
    /// The first call seeds the filter at `mapped`, so a fresh filter
    /// passes its first input through unchanged.
    pub fn update(&mut self, mapped: Point, factor: u32) -> Point {
        let factor = f64::from(factor.max(1));
        let prev = match self.prev {
            Some(p) => p,
            None => {
                self.buffer.clear();
                self.buffer.extend(std::iter::repeat(mapped).take(self.capacity));
                mapped
            }
        };

        let ema = Point::new(
            prev.x + (mapped.x - prev.x) / factor,
            prev.y + (mapped.y - prev.y) / factor,
        );
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(ema);

        let n = self.buffer.len() as f64;
        let (sx, sy) = self
            .buffer
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let out = Point::new(sx / n, sy / n);
        self.prev = Some(out);
        out
    }

    #[cfg(test)]
    pub fn is_seeded(&self) -> bool {
        self.prev.is_some()
    }
}

/// Round a screen position to device pixels.
pub fn to_device(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

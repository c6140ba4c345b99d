//! Landmark frame wire format.
//!
//! One plist per line:
//!
//! ```text
//! (:t 12.345 :size (640 480) :landmarks ((0 320 400) ... (20 300 210)) :fingers (0 1 0 0 0))
//! ```
//!
//! `:t`, `:size` and `:fingers` are optional; `:landmarks nil` means no
//! hand.  Blank lines and `;` comments are skipped.

use std::io::BufRead;

use lexpr::Value;

use crate::gesture::landmarks::{FingerState, FrameError, FrameSize, LandmarkFrame, LandmarkPoint};
use crate::sexp::{as_number, get_value, is_empty_list, list_items};

fn malformed(msg: impl Into<String>) -> FrameError {
    FrameError::Malformed(msg.into())
}

/// Parse one line.  `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<LandmarkFrame>, FrameError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') {
        return Ok(None);
    }
    let value = lexpr::from_str(line).map_err(|e| malformed(e.to_string()))?;
    parse_frame(&value).map(Some)
}

/// Decode a frame plist.
pub fn parse_frame(value: &Value) -> Result<LandmarkFrame, FrameError> {
    if !matches!(value, Value::Cons(_)) {
        return Err(malformed("expected a plist"));
    }

    let timestamp_s = match get_value(value, "t") {
        Some(v) => Some(as_number(v).ok_or_else(|| malformed(":t is not a number"))?),
        None => None,
    };

    let size = match get_value(value, "size") {
        Some(v) => Some(parse_size(v)?),
        None => None,
    };

    let landmarks = get_value(value, "landmarks").ok_or_else(|| malformed("missing :landmarks"))?;
    let points = parse_points(landmarks)?;

    let fingers = match get_value(value, "fingers") {
        Some(v) if is_empty_list(v) => None,
        Some(v) => Some(parse_fingers(v)?),
        None => None,
    };

    Ok(LandmarkFrame {
        timestamp_s,
        size,
        points,
        fingers,
    })
}

fn parse_size(v: &Value) -> Result<FrameSize, FrameError> {
    let items = list_items(v).ok_or_else(|| malformed(":size must be (W H)"))?;
    match items.as_slice() {
        [w, h] => {
            let (w, h) = (
                as_number(w).ok_or_else(|| malformed(":size width"))?,
                as_number(h).ok_or_else(|| malformed(":size height"))?,
            );
            if w > 0.0 && h > 0.0 {
                Ok(FrameSize {
                    width: w,
                    height: h,
                })
            } else {
                Err(malformed(":size must be positive"))
            }
        }
        _ => Err(malformed(":size must be (W H)")),
    }
}

fn parse_points(v: &Value) -> Result<Vec<LandmarkPoint>, FrameError> {
    let items = list_items(v).ok_or_else(|| malformed(":landmarks must be a list"))?;
    items
        .into_iter()
        .map(|item| {
            let fields = list_items(item).ok_or_else(|| malformed("landmark must be (ID X Y)"))?;
            let [id, x, y] = fields.as_slice() else {
                return Err(malformed("landmark must be (ID X Y)"));
            };
            let id = as_number(id).ok_or_else(|| malformed("landmark id"))?;
            if id < 0.0 || id.fract() != 0.0 {
                return Err(malformed(format!("landmark id {} is not an index", id)));
            }
            Ok(LandmarkPoint {
                id: id as usize,
                x: as_number(x).ok_or_else(|| malformed("landmark x"))?,
                y: as_number(y).ok_or_else(|| malformed("landmark y"))?,
            })
        })
        .collect()
}

fn parse_fingers(v: &Value) -> Result<FingerState, FrameError> {
    let items = list_items(v).ok_or_else(|| malformed(":fingers must be a list"))?;
    if items.len() != 5 {
        return Err(malformed(format!(":fingers needs 5 entries, got {}", items.len())));
    }
    let mut state = [false; 5];
    for (slot, item) in state.iter_mut().zip(items) {
        *slot = match item {
            _ if is_empty_list(item) => false,
            Value::Bool(b) => *b,
            Value::Symbol(s) if s.as_ref() == "t" => true,
            other => as_number(other).ok_or_else(|| malformed(":fingers entry"))? != 0.0,
        };
    }
    Ok(FingerState(state))
}

/// Line-oriented frame source over any reader.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    pub line_no: u64,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    /// Next frame, skipping blank and comment lines.  `Ok(None)` at end of
    /// input; the inner `Result` carries per-line failures, including lines
    /// that are not UTF-8.
    pub fn next_frame(&mut self) -> std::io::Result<Option<Result<LandmarkFrame, FrameError>>> {
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line,
                Err(e) => return Ok(Some(Err(malformed(format!("line is not UTF-8: {}", e))))),
            };
            match parse_line(line) {
                Ok(Some(frame)) => return Ok(Some(Ok(frame))),
                Ok(None) => continue,
                Err(e) => return Ok(Some(Err(e))),
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn frame_line(t: f64, points: &[(usize, f64, f64)], fingers: Option<[u8; 5]>) -> String {
    let lms: Vec<String> = points
        .iter()
        .map(|(id, x, y)| format!("({} {} {})", id, x, y))
        .collect();
    let fingers = fingers
        .map(|f| {
            format!(
                " :fingers ({})",
                f.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(" ")
            )
        })
        .unwrap_or_default();
    format!("(:t {} :landmarks ({}){})", t, lms.join(" "), fingers)
}

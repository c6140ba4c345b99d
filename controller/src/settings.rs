//! Configuration: TOML file, CLI overrides and hot-reloadable tunables.
//!
//! Startup configuration is a `ControllerConfig` loaded from an optional
//! TOML file.  The tunables that may change while running live in
//! `LiveSettings`, a set of relaxed atomics written by the IPC thread and
//! read once per frame by the controller.  Every write is clamped to its
//! valid range; out-of-range values are never rejected.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::gesture::landmarks::FrameSize;
use crate::gesture::pointer::{Padding, ScreenSize, DEFAULT_BUFFER_LEN};

// ── Ranges ─────────────────────────────────────────────────

pub const SMOOTHING_RANGE: (u32, u32) = (1, 20);
pub const PADDING_RANGE: (u32, u32) = (10, 300);
const CLICK_DISTANCE_RANGE: (f64, f64) = (5.0, 200.0);
const HOVER_RANGE: (f64, f64) = (0.1, 5.0);
const COOLDOWN_RANGE: (f64, f64) = (0.0, 5.0);
const SCROLL_THRESHOLD_RANGE: (f64, f64) = (1.0, 200.0);
const SCROLL_SENSITIVITY_RANGE: (f64, f64) = (0.1, 20.0);

fn clamp_f(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if v.is_nan() {
        return lo;
    }
    v.clamp(lo, hi)
}

fn clamp_u(v: u32, (lo, hi): (u32, u32)) -> u32 {
    v.clamp(lo, hi)
}

// ── File configuration ─────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    pub screen: ScreenConfig,
    pub frame: FrameConfig,
    pub pointer: PointerConfig,
    pub gesture: GestureConfig,
    pub scroll: ScrollConfig,
    pub keyboard: KeyboardConfig,
    pub voice: VoiceConfig,
    pub ipc: IpcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Camera frame size assumed when a frame does not carry `:size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    pub smoothing_factor: u32,
    /// Symmetric padding; per-edge values below override it.
    pub padding_px: u32,
    pub padding_left: Option<u32>,
    pub padding_right: Option<u32>,
    pub padding_top: Option<u32>,
    pub padding_bottom: Option<u32>,
    /// Moving-mean window of the smoothing filter.
    pub buffer_len: usize,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 7,
            padding_px: 150,
            padding_left: None,
            padding_right: None,
            padding_top: None,
            padding_bottom: None,
            buffer_len: DEFAULT_BUFFER_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub click_distance_px: f64,
    pub click_cooldown_s: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            click_distance_px: 30.0,
            click_cooldown_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    pub threshold_px: f64,
    pub sensitivity: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            threshold_px: 15.0,
            sensitivity: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Show the overlay at startup.
    pub visible: bool,
    pub hover_threshold_s: f64,
    pub typing_cooldown_s: f64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            visible: false,
            hover_threshold_s: 1.0,
            typing_cooldown_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Accept transcripts at startup.
    pub enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    pub enabled: bool,
    /// Socket path; defaults to `$XDG_RUNTIME_DIR/handpilot-ipc.sock`.
    pub socket: Option<PathBuf>,
    /// Log every IPC message at debug level.
    pub trace: bool,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: None,
            trace: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ControllerConfig =
            toml::from_str(&content).context("Failed to parse config file")?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn screen_size(&self) -> ScreenSize {
        ScreenSize {
            width: f64::from(self.screen.width.max(1)),
            height: f64::from(self.screen.height.max(1)),
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        FrameSize {
            width: f64::from(self.frame.width.max(1)),
            height: f64::from(self.frame.height.max(1)),
        }
    }

    /// The hot-reloadable subset, clamped.
    pub fn tunables(&self) -> SettingsSnapshot {
        let p = &self.pointer;
        let edge = |v: Option<u32>| v.unwrap_or(p.padding_px);
        SettingsSnapshot {
            smoothing_factor: p.smoothing_factor,
            padding: [
                edge(p.padding_left),
                edge(p.padding_right),
                edge(p.padding_top),
                edge(p.padding_bottom),
            ],
            click_distance_px: self.gesture.click_distance_px,
            hover_threshold_s: self.keyboard.hover_threshold_s,
            typing_cooldown_s: self.keyboard.typing_cooldown_s,
            click_cooldown_s: self.gesture.click_cooldown_s,
            scroll_threshold_px: self.scroll.threshold_px,
            scroll_sensitivity: self.scroll.sensitivity,
        }
        .clamped()
    }
}

// ── Snapshot ───────────────────────────────────────────────

/// Tunables as read by the frame loop for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub smoothing_factor: u32,
    /// Left, right, top, bottom.
    pub padding: [u32; 4],
    pub click_distance_px: f64,
    pub hover_threshold_s: f64,
    pub typing_cooldown_s: f64,
    pub click_cooldown_s: f64,
    pub scroll_threshold_px: f64,
    pub scroll_sensitivity: f64,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        ControllerConfig::default().tunables()
    }
}

impl SettingsSnapshot {
    pub fn clamped(self) -> Self {
        Self {
            smoothing_factor: clamp_u(self.smoothing_factor, SMOOTHING_RANGE),
            padding: self.padding.map(|p| clamp_u(p, PADDING_RANGE)),
            click_distance_px: clamp_f(self.click_distance_px, CLICK_DISTANCE_RANGE),
            hover_threshold_s: clamp_f(self.hover_threshold_s, HOVER_RANGE),
            typing_cooldown_s: clamp_f(self.typing_cooldown_s, COOLDOWN_RANGE),
            click_cooldown_s: clamp_f(self.click_cooldown_s, COOLDOWN_RANGE),
            scroll_threshold_px: clamp_f(self.scroll_threshold_px, SCROLL_THRESHOLD_RANGE),
            scroll_sensitivity: clamp_f(self.scroll_sensitivity, SCROLL_SENSITIVITY_RANGE),
        }
    }

    pub fn padding(&self) -> Padding {
        let [left, right, top, bottom] = self.padding.map(f64::from);
        Padding {
            left,
            right,
            top,
            bottom,
        }
    }

    /// Generate s-expression for IPC `settings-get`.
    pub fn to_sexp(&self) -> String {
        format!(
            "(:smoothing-factor {} :padding-left {} :padding-right {} :padding-top {} :padding-bottom {} :click-distance {:.1} :hover-threshold {:.2} :typing-cooldown {:.2} :click-cooldown {:.2} :scroll-threshold {:.1} :scroll-sensitivity {:.2})",
            self.smoothing_factor,
            self.padding[0],
            self.padding[1],
            self.padding[2],
            self.padding[3],
            self.click_distance_px,
            self.hover_threshold_s,
            self.typing_cooldown_s,
            self.click_cooldown_s,
            self.scroll_threshold_px,
            self.scroll_sensitivity,
        )
    }
}

// ── Live settings ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
}

/// `f64` stored as its bit pattern.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Hot-reloadable tunables shared between the IPC thread and the frame loop.
///
/// Each field is independent; a reader may observe a mix of old and new
/// values across fields within one snapshot, never a torn field.
#[derive(Debug)]
pub struct LiveSettings {
    smoothing_factor: AtomicU32,
    padding: [AtomicU32; 4],
    click_distance_px: AtomicF64,
    hover_threshold_s: AtomicF64,
    typing_cooldown_s: AtomicF64,
    click_cooldown_s: AtomicF64,
    scroll_threshold_px: AtomicF64,
    scroll_sensitivity: AtomicF64,
    /// Values restored by `reset`.
    defaults: SettingsSnapshot,
}

/// Names accepted by `LiveSettings::set`.
pub const SETTING_KEYS: &[&str] = &[
    "smoothing-factor",
    "padding",
    "padding-left",
    "padding-right",
    "padding-top",
    "padding-bottom",
    "click-distance",
    "hover-threshold",
    "typing-cooldown",
    "click-cooldown",
    "scroll-threshold",
    "scroll-sensitivity",
];

impl LiveSettings {
    pub fn new(defaults: SettingsSnapshot) -> Self {
        let d = defaults.clamped();
        Self {
            smoothing_factor: AtomicU32::new(d.smoothing_factor),
            padding: d.padding.map(AtomicU32::new),
            click_distance_px: AtomicF64::new(d.click_distance_px),
            hover_threshold_s: AtomicF64::new(d.hover_threshold_s),
            typing_cooldown_s: AtomicF64::new(d.typing_cooldown_s),
            click_cooldown_s: AtomicF64::new(d.click_cooldown_s),
            scroll_threshold_px: AtomicF64::new(d.scroll_threshold_px),
            scroll_sensitivity: AtomicF64::new(d.scroll_sensitivity),
            defaults: d,
        }
    }

    /// Read every tunable once.
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            smoothing_factor: self.smoothing_factor.load(Ordering::Relaxed),
            padding: [
                self.padding[0].load(Ordering::Relaxed),
                self.padding[1].load(Ordering::Relaxed),
                self.padding[2].load(Ordering::Relaxed),
                self.padding[3].load(Ordering::Relaxed),
            ],
            click_distance_px: self.click_distance_px.load(),
            hover_threshold_s: self.hover_threshold_s.load(),
            typing_cooldown_s: self.typing_cooldown_s.load(),
            click_cooldown_s: self.click_cooldown_s.load(),
            scroll_threshold_px: self.scroll_threshold_px.load(),
            scroll_sensitivity: self.scroll_sensitivity.load(),
        }
    }

    /// Set one tunable by name, clamping it.  Returns the stored value.
    pub fn set(&self, key: &str, value: f64) -> Result<f64, SettingsError> {
        let as_u32 = |v: f64, range: (u32, u32)| {
            let v = if v.is_nan() { 0.0 } else { v.round() };
            clamp_u(v.clamp(0.0, f64::from(u32::MAX)) as u32, range)
        };
        let stored = match key {
            "smoothing-factor" => {
                let v = as_u32(value, SMOOTHING_RANGE);
                self.smoothing_factor.store(v, Ordering::Relaxed);
                f64::from(v)
            }
            "padding" => {
                let v = as_u32(value, PADDING_RANGE);
                for p in &self.padding {
                    p.store(v, Ordering::Relaxed);
                }
                f64::from(v)
            }
            "padding-left" | "padding-right" | "padding-top" | "padding-bottom" => {
                let idx = match key {
                    "padding-left" => 0,
                    "padding-right" => 1,
                    "padding-top" => 2,
                    _ => 3,
                };
                let v = as_u32(value, PADDING_RANGE);
                self.padding[idx].store(v, Ordering::Relaxed);
                f64::from(v)
            }
            "click-distance" => store_f(&self.click_distance_px, value, CLICK_DISTANCE_RANGE),
            "hover-threshold" => store_f(&self.hover_threshold_s, value, HOVER_RANGE),
            "typing-cooldown" => store_f(&self.typing_cooldown_s, value, COOLDOWN_RANGE),
            "click-cooldown" => store_f(&self.click_cooldown_s, value, COOLDOWN_RANGE),
            "scroll-threshold" => store_f(&self.scroll_threshold_px, value, SCROLL_THRESHOLD_RANGE),
            "scroll-sensitivity" => {
                store_f(&self.scroll_sensitivity, value, SCROLL_SENSITIVITY_RANGE)
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        };
        debug!(key, requested = value, stored, "Setting updated");
        Ok(stored)
    }

    /// Restore startup values.
    pub fn reset(&self) {
        let d = self.defaults;
        self.smoothing_factor.store(d.smoothing_factor, Ordering::Relaxed);
        for (slot, v) in self.padding.iter().zip(d.padding) {
            slot.store(v, Ordering::Relaxed);
        }
        self.click_distance_px.store(d.click_distance_px);
        self.hover_threshold_s.store(d.hover_threshold_s);
        self.typing_cooldown_s.store(d.typing_cooldown_s);
        self.click_cooldown_s.store(d.click_cooldown_s);
        self.scroll_threshold_px.store(d.scroll_threshold_px);
        self.scroll_sensitivity.store(d.scroll_sensitivity);
        info!("Settings reset to startup values");
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self::new(SettingsSnapshot::default())
    }
}

fn store_f(slot: &AtomicF64, value: f64, range: (f64, f64)) -> f64 {
    let v = clamp_f(value, range);
    slot.store(v);
    v
}

// ── Tests ──────────────────────────────────────────────────

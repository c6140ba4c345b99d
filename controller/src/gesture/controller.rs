//! Per-frame orchestration of the gesture pipeline.
//!
//! `ControllerState` owns all session state (cooldowns, smoothing memory,
//! scroll reference, keyboard hover) and advances it once per landmark
//! frame.  Cross-thread inputs arrive through `LiveSettings` and the
//! `VoiceInbox`; results leave through an `ActionSink` and the
//! `StatusBoard` telemetry snapshot.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::actions::{Action, ActionSink, Button};
use crate::settings::{LiveSettings, SettingsSnapshot};
use crate::sexp::{escape_string, t_or_nil};
use crate::voice::{key_for_char, VoiceCommand, VoiceInbox};

use super::arbiter::{classify, Directives};
use super::debounce::{ActionCooldown, ActionKind};
use super::landmarks::{FrameSize, HandPose, LandmarkFrame};
use super::pointer::{to_device, CoordinateMapper, ScreenSize, SmoothingFilter};
use super::scroll::ScrollIntegrator;
use super::virtual_keyboard::VirtualKeyboardState;

// ── Shared handles ─────────────────────────────────────────

/// Latest telemetry, published by the frame loop and read by IPC `status`.
#[derive(Debug, Default)]
pub struct StatusBoard {
    sexp: Mutex<String>,
}

impl StatusBoard {
    pub fn publish(&self, sexp: String) {
        *self.sexp.lock() = sexp;
    }

    pub fn latest(&self) -> String {
        let s = self.sexp.lock();
        if s.is_empty() {
            "nil".to_string()
        } else {
            s.clone()
        }
    }
}

/// Handles shared between the frame loop and the IPC thread.
#[derive(Debug, Clone)]
pub struct SharedState {
    pub settings: Arc<LiveSettings>,
    pub voice: Arc<VoiceInbox>,
    pub status: Arc<StatusBoard>,
}

impl SharedState {
    pub fn new(settings: LiveSettings, voice: VoiceInbox) -> Self {
        Self {
            settings: Arc::new(settings),
            voice: Arc::new(voice),
            status: Arc::new(StatusBoard::default()),
        }
    }
}

// ── Telemetry ──────────────────────────────────────────────

/// Read-only view of the last processed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub frames: u64,
    pub malformed_frames: u64,
    pub hand_present: bool,
    pub mode: String,
    pub left_click_fired: bool,
    pub right_click_fired: bool,
    pub double_click_fired: bool,
    /// Trigger held since the last fire, ordered left, right, double.
    pub armed: [bool; 3],
    /// Frame time of each action's last fire, same order.
    pub last_fired_s: [Option<f64>; 3],
    pub scroll_amount: i32,
    pub cursor: Option<(i32, i32)>,
    pub keyboard_visible: bool,
    pub hover_key: Option<String>,
    pub hover_progress: f64,
    pub last_typed_key: Option<String>,
    pub voice_enabled: bool,
    pub voice_status: Option<String>,
    pub last_dispatch_error: Option<String>,
}

fn seconds(t: Option<f64>) -> String {
    t.map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "nil".to_string())
}

fn quoted(s: &Option<String>) -> String {
    s.as_ref()
        .map(|v| format!("\"{}\"", escape_string(v)))
        .unwrap_or_else(|| "nil".to_string())
}

impl Telemetry {
    /// Generate s-expression for IPC `status`.
    pub fn to_sexp(&self) -> String {
        let cursor = self
            .cursor
            .map(|(x, y)| format!("({} {})", x, y))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:frames {} :malformed {} :hand {} :mode \"{}\" :left-click {} :right-click {} :double-click {} :armed ({} {} {}) :last-fired ({} {} {}) :scroll {} :cursor {} :keyboard {} :hover {} :hover-progress {:.2} :last-typed {} :voice {} :voice-status {} :last-error {})",
            self.frames,
            self.malformed_frames,
            t_or_nil(self.hand_present),
            self.mode,
            t_or_nil(self.left_click_fired),
            t_or_nil(self.right_click_fired),
            t_or_nil(self.double_click_fired),
            t_or_nil(self.armed[0]),
            t_or_nil(self.armed[1]),
            t_or_nil(self.armed[2]),
            seconds(self.last_fired_s[0]),
            seconds(self.last_fired_s[1]),
            seconds(self.last_fired_s[2]),
            self.scroll_amount,
            cursor,
            t_or_nil(self.keyboard_visible),
            quoted(&self.hover_key),
            self.hover_progress,
            quoted(&self.last_typed_key),
            t_or_nil(self.voice_enabled),
            quoted(&self.voice_status),
            quoted(&self.last_dispatch_error),
        )
    }
}

// ── Controller ─────────────────────────────────────────────

/// Gesture session state, threaded through `process_frame`.
pub struct ControllerState {
    pub screen: ScreenSize,
    /// Frame size used when a frame does not carry one.
    pub default_frame: FrameSize,
    left_click: ActionCooldown,
    right_click: ActionCooldown,
    double_click: ActionCooldown,
    smoothing: SmoothingFilter,
    scroll: ScrollIntegrator,
    pub keyboard: VirtualKeyboardState,
    telemetry: Telemetry,
}

impl ControllerState {
    pub fn new(screen: ScreenSize, frame: FrameSize, buffer_len: usize) -> Self {
        Self {
            screen,
            default_frame: frame,
            left_click: ActionCooldown::new(ActionKind::LeftClick),
            right_click: ActionCooldown::new(ActionKind::RightClick),
            double_click: ActionCooldown::new(ActionKind::DoubleClick),
            smoothing: SmoothingFilter::new(buffer_len),
            scroll: ScrollIntegrator::default(),
            keyboard: VirtualKeyboardState::new(frame),
            telemetry: Telemetry {
                mode: "idle".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Count a frame that could not even be parsed; it is handled as no hand.
    pub fn process_unreadable(
        &mut self,
        now: f64,
        settings: &SettingsSnapshot,
        sink: &mut dyn ActionSink,
    ) -> &Telemetry {
        self.telemetry.malformed_frames += 1;
        self.process_frame(&LandmarkFrame::default(), now, settings, sink)
    }

    /// Run one frame through the pipeline.
    pub fn process_frame(
        &mut self,
        frame: &LandmarkFrame,
        now: f64,
        settings: &SettingsSnapshot,
        sink: &mut dyn ActionSink,
    ) -> &Telemetry {
        self.telemetry.frames += 1;
        self.telemetry.left_click_fired = false;
        self.telemetry.right_click_fired = false;
        self.telemetry.double_click_fired = false;
        self.telemetry.scroll_amount = 0;
        self.telemetry.cursor = None;

        let frame_size = frame.size.unwrap_or(self.default_frame);
        self.keyboard.ensure_layout(frame_size);

        let pose = match HandPose::from_frame(frame) {
            Ok(pose) => pose,
            Err(e) => {
                self.telemetry.malformed_frames += 1;
                warn!(
                    error = %e,
                    malformed = self.telemetry.malformed_frames,
                    "Malformed landmark frame treated as no hand"
                );
                None
            }
        };
        self.telemetry.hand_present = pose.is_some();

        let directives = match &pose {
            Some(pose) => {
                let fingers = frame.fingers.unwrap_or_else(|| pose.fingers_up());
                classify(pose, fingers, settings.click_distance_px)
            }
            None => Directives::idle(),
        };

        let label = directives.label();
        if label != self.telemetry.mode {
            debug!(from = %self.telemetry.mode, to = %label, "Mode change");
            self.telemetry.mode = label;
        }

        if pose.is_none() {
            self.reset_to_idle();
        } else {
            self.run_directives(&directives, frame_size, now, settings, sink);
        }
        let cooldowns = [&self.left_click, &self.right_click, &self.double_click];
        self.telemetry.armed = cooldowns.map(|c| c.is_armed());
        self.telemetry.last_fired_s = cooldowns.map(|c| c.last_fired_at());
        self.telemetry.keyboard_visible = self.keyboard.visible;
        self.telemetry.hover_key = self.keyboard.hovered().map(str::to_string);
        self.telemetry.hover_progress = self.keyboard.progress();
        self.telemetry.last_typed_key = self.keyboard.last_typed_key().map(str::to_string);
        &self.telemetry
    }

    /// Apply pending voice/keyboard commands.  Runs before the frame so
    /// toggles take effect on it.
    pub fn apply_inbox(&mut self, inbox: &VoiceInbox, sink: &mut dyn ActionSink) {
        let (cmd, status) = inbox.take();
        self.telemetry.voice_enabled = inbox.is_enabled();
        if let Some(status) = status {
            self.telemetry.voice_status = Some(status);
        }
        let Some(cmd) = cmd else {
            return;
        };
        match cmd {
            VoiceCommand::ShowKeyboard => {
                self.keyboard.show();
                self.telemetry.voice_status = Some("keyboard shown".to_string());
            }
            VoiceCommand::HideKeyboard => {
                self.keyboard.hide();
                self.telemetry.voice_status = Some("keyboard hidden".to_string());
            }
            VoiceCommand::ToggleKeyboard => self.keyboard.toggle(),
            VoiceCommand::TypeText(text) => {
                for c in text.chars() {
                    self.emit(sink, Action::PressKey(key_for_char(c)));
                }
                self.telemetry.voice_status = Some(format!("typed: {}", text));
            }
            VoiceCommand::PressKey(key) => {
                self.telemetry.voice_status = Some(format!("pressed: {}", key));
                self.emit(sink, Action::PressKey(key));
            }
            VoiceCommand::OpenApp(app) => {
                self.telemetry.voice_status = Some(format!("opening: {}", app));
                self.emit(sink, Action::Launch(app));
            }
            VoiceCommand::StopListening | VoiceCommand::Unknown(_) => {}
        }
        self.telemetry.keyboard_visible = self.keyboard.visible;
    }

    fn reset_to_idle(&mut self) {
        self.left_click.disarm();
        self.right_click.disarm();
        self.double_click.disarm();
        self.scroll.clear();
        self.keyboard.idle();
    }

    fn run_directives(
        &mut self,
        d: &Directives,
        frame_size: FrameSize,
        now: f64,
        settings: &SettingsSnapshot,
        sink: &mut dyn ActionSink,
    ) {
        if let Some(track) = d.track_point {
            let mapper = CoordinateMapper {
                frame: frame_size,
                screen: self.screen,
                padding: settings.padding(),
            };
            let smoothed = self
                .smoothing
                .update(mapper.map(track), settings.smoothing_factor);
            let (x, y) = to_device(smoothed);
            self.telemetry.cursor = Some((x, y));
            self.emit(sink, Action::MoveCursor { x, y });
        }

        // A visible keyboard takes the index pinch for its immediate path.
        let keyboard_pinch = self.keyboard.visible && d.left_click;
        let left = !self.keyboard.visible && d.left_click;
        if self.left_click.update(left, now, settings.click_cooldown_s) {
            self.telemetry.left_click_fired = true;
            info!("Left click");
            self.emit(sink, Action::Click(Button::Left));
        }
        if self
            .right_click
            .update(d.right_click, now, settings.click_cooldown_s)
        {
            self.telemetry.right_click_fired = true;
            info!("Right click");
            self.emit(sink, Action::Click(Button::Right));
        }
        if self
            .double_click
            .update(d.double_click, now, settings.click_cooldown_s)
        {
            self.telemetry.double_click_fired = true;
            info!("Double click");
            self.emit(sink, Action::DoubleClick);
        }

        match d.scroll {
            Some(_) => {
                if let Some(amount) = self.scroll.update(
                    d.wrist_y,
                    settings.scroll_threshold_px,
                    settings.scroll_sensitivity,
                ) {
                    self.telemetry.scroll_amount = amount;
                    self.emit(sink, Action::Scroll(amount));
                }
            }
            None => self.scroll.clear(),
        }

        match (self.keyboard.visible, d.index_tip) {
            (true, Some(tip)) => {
                if let Some(key) = self.keyboard.update(
                    tip,
                    now,
                    keyboard_pinch,
                    settings.hover_threshold_s,
                    settings.typing_cooldown_s,
                ) {
                    self.emit(sink, Action::PressKey(key));
                }
            }
            _ => self.keyboard.idle(),
        }
    }

    /// Dispatch one action.  Failures are logged and recorded; the caller's
    /// state (cooldowns included) is left as is.
    fn emit(&mut self, sink: &mut dyn ActionSink, action: Action) {
        if let Err(e) = sink.dispatch(&action) {
            warn!(action = action.name(), error = %e, "Action dispatch failed");
            self.telemetry.last_dispatch_error = Some(format!("{}: {}", action.name(), e));
        }
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::RecordingSink;
    use crate::gesture::landmarks::{set_point, uniform_frame, FingerState, HandLandmark};

    const DT: f64 = 1.0 / 32.0;

    fn controller() -> ControllerState {
        ControllerState::new(ScreenSize::default(), FrameSize::default(), 5)
    }

    fn settings() -> SettingsSnapshot {
        SettingsSnapshot::default()
    }

    /// Hand with explicit finger state; index tip at (320, 240), thumb far.
    fn hand(fingers: [u8; 5]) -> LandmarkFrame {
        let mut f = uniform_frame(0.0, 0.0);
        set_point(&mut f, HandLandmark::ThumbTip, 0.0, 0.0);
        set_point(&mut f, HandLandmark::IndexTip, 320.0, 240.0);
        set_point(&mut f, HandLandmark::MiddleTip, 400.0, 240.0);
        set_point(&mut f, HandLandmark::Wrist, 320.0, 300.0);
        f.fingers = Some(FingerState(fingers.map(|b| b == 1)));
        f
    }

    fn pinching(mut f: LandmarkFrame) -> LandmarkFrame {
        set_point(&mut f, HandLandmark::ThumbTip, 325.0, 245.0);
        f
    }

    fn clicks(sink: &RecordingSink) -> usize {
        sink.actions
            .iter()
            .filter(|a| matches!(a, Action::Click(Button::Left)))
            .count()
    }

    #[test]
    fn test_move_emits_cursor_at_screen_centre() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        c.process_frame(&hand([0, 1, 0, 0, 0]), 0.0, &settings(), &mut sink);
        assert_eq!(sink.actions, vec![Action::MoveCursor { x: 960, y: 540 }]);
        assert_eq!(c.telemetry().mode, "move");
        assert_eq!(c.telemetry().cursor, Some((960, 540)));
    }

    #[test]
    fn test_held_pinch_clicks_once() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let mut t = 0.0;
        for _ in 0..40 {
            c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), t, &settings(), &mut sink);
            t += DT;
        }
        assert_eq!(clicks(&sink), 1);
    }

    #[test]
    fn test_release_and_repinch_after_cooldown_clicks_again() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.0, &s, &mut sink);
        c.process_frame(&hand([0, 1, 0, 0, 0]), 0.25, &s, &mut sink);
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.5, &s, &mut sink);
        assert_eq!(clicks(&sink), 1, "Δt == cooldown must not click");
        c.process_frame(&hand([0, 1, 0, 0, 0]), 0.55, &s, &mut sink);
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.6, &s, &mut sink);
        assert_eq!(clicks(&sink), 2);
    }

    #[test]
    fn test_open_palm_moves_and_scrolls_in_one_frame() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        c.process_frame(&hand([1, 1, 1, 1, 1]), 0.0, &s, &mut sink);
        sink.actions.clear();

        let mut f = hand([1, 1, 1, 1, 1]);
        set_point(&mut f, HandLandmark::Wrist, 320.0, 270.0);
        c.process_frame(&f, DT, &s, &mut sink);

        assert!(matches!(sink.actions[0], Action::MoveCursor { .. }));
        assert!(sink.actions.contains(&Action::Scroll(6)));
        assert_eq!(c.telemetry().mode, "right-click-track+scroll(palm)");
        assert_eq!(c.telemetry().scroll_amount, 6);
    }

    #[test]
    fn test_pinky_scroll_clears_when_mode_ends() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        c.process_frame(&hand([0, 0, 0, 0, 1]), 0.0, &s, &mut sink);
        // Leaving scroll drops the reference, so re-entering lower is silent.
        c.process_frame(&hand([0, 0, 0, 0, 0]), DT, &s, &mut sink);
        let mut f = hand([0, 0, 0, 0, 1]);
        set_point(&mut f, HandLandmark::Wrist, 320.0, 200.0);
        c.process_frame(&f, 2.0 * DT, &s, &mut sink);
        assert!(sink.actions.is_empty(), "got {:?}", sink.actions);
    }

    #[test]
    fn test_no_hand_resets_and_fires_nothing() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.0, &s, &mut sink);
        assert_eq!(c.telemetry().armed, [true, false, false]);
        c.process_frame(&LandmarkFrame::default(), DT, &s, &mut sink);
        assert_eq!(c.telemetry().mode, "idle");
        assert!(!c.telemetry().hand_present);
        assert_eq!(c.telemetry().armed, [false; 3]);
        assert_eq!(c.telemetry().last_fired_s, [Some(0.0), None, None]);
        assert_eq!(sink.actions.len(), 2, "move + click from first frame only");
    }

    #[test]
    fn test_middle_pinch_right_clicks_once() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        let mut f = hand([0, 1, 1, 0, 0]);
        set_point(&mut f, HandLandmark::ThumbTip, 405.0, 245.0);
        for i in 0..10 {
            c.process_frame(&f, i as f64 * DT, &s, &mut sink);
        }
        let rights = sink
            .actions
            .iter()
            .filter(|a| matches!(a, Action::Click(Button::Right)))
            .count();
        assert_eq!(rights, 1);
        assert_eq!(clicks(&sink), 0);
        assert_eq!(c.telemetry().mode, "right-click-track");
        assert_eq!(c.telemetry().last_fired_s[1], Some(0.0));
    }

    #[test]
    fn test_folded_ring_double_clicks_while_moving() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let s = settings();
        let mut f = hand([0, 1, 0, 0, 0]);
        set_point(&mut f, HandLandmark::RingPip, 360.0, 250.0);
        set_point(&mut f, HandLandmark::RingTip, 360.0, 270.0);
        c.process_frame(&f, 0.0, &s, &mut sink);
        c.process_frame(&f, DT, &s, &mut sink);

        assert_eq!(c.telemetry().mode, "move");
        assert_eq!(
            sink.actions.iter().filter(|a| **a == Action::DoubleClick).count(),
            1
        );
        let moves = sink
            .actions
            .iter()
            .filter(|a| matches!(a, Action::MoveCursor { .. }))
            .count();
        assert_eq!(moves, 2, "cursor keeps tracking during the double click");
    }

    #[test]
    fn test_no_hand_returns_keyboard_hover_to_idle() {
        let mut c = controller();
        c.keyboard.show();
        let key = c.keyboard.keys.iter().find(|k| k.label == "A").unwrap().clone();
        let mut sink = RecordingSink::default();
        let s = settings();

        let mut f = hand([0, 1, 0, 0, 0]);
        set_point(&mut f, HandLandmark::IndexTip, key.x + 10.0, key.y + 10.0);
        c.process_frame(&f, 0.0, &s, &mut sink);
        assert_eq!(c.telemetry().hover_key.as_deref(), Some("A"));

        c.process_frame(&LandmarkFrame::default(), 0.5, &s, &mut sink);
        assert!(c.keyboard.hovered().is_none());
        assert!(c.telemetry().hover_key.is_none());
        assert_eq!(c.telemetry().hover_progress, 0.0);
    }

    #[test]
    fn test_open_app_becomes_launch_action() {
        let mut c = controller();
        let inbox = VoiceInbox::default();
        let mut sink = RecordingSink::default();
        inbox.submit_transcript("open browser");
        c.apply_inbox(&inbox, &mut sink);
        assert_eq!(sink.actions, vec![Action::Launch("chrome".to_string())]);
        assert_eq!(c.telemetry().voice_status.as_deref(), Some("opening: chrome"));
    }

    #[test]
    fn test_malformed_frame_is_counted_as_no_hand() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let mut f = hand([0, 1, 0, 0, 0]);
        f.points.truncate(12);
        let t = c.process_frame(&f, 0.0, &settings(), &mut sink);
        assert_eq!(t.malformed_frames, 1);
        assert!(!t.hand_present);
        assert!(sink.actions.is_empty());
    }

    #[test]
    fn test_unreadable_frame_counted() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let t = c.process_unreadable(0.0, &settings(), &mut sink);
        assert_eq!(t.malformed_frames, 1);
        assert_eq!(t.frames, 1);
    }

    #[test]
    fn test_dispatch_failure_recorded_and_cooldown_kept() {
        let mut c = controller();
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let s = settings();
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.0, &s, &mut sink);
        let err = c.telemetry().last_dispatch_error.clone().unwrap();
        assert!(err.starts_with("click:"), "{}", err);
        // Release and re-pinch inside the cooldown: still suppressed.
        c.process_frame(&hand([0, 1, 0, 0, 0]), 0.1, &s, &mut sink);
        c.process_frame(&pinching(hand([0, 1, 0, 0, 0])), 0.2, &s, &mut sink);
        assert_eq!(clicks(&sink), 1);
    }

    #[test]
    fn test_derives_fingers_when_absent() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        let mut f = uniform_frame(300.0, 300.0);
        // Index extended; everything else level (not up).
        set_point(&mut f, HandLandmark::IndexPip, 300.0, 250.0);
        set_point(&mut f, HandLandmark::IndexTip, 320.0, 240.0);
        c.process_frame(&f, 0.0, &settings(), &mut sink);
        assert_eq!(c.telemetry().mode, "move");
    }

    #[test]
    fn test_keyboard_hover_types_and_pinch_goes_to_keyboard() {
        let mut c = controller();
        c.keyboard.show();
        let key = c.keyboard.keys.iter().find(|k| k.label == "Q").unwrap().clone();
        let (kx, ky) = (key.x + 25.0, key.y + 25.0);
        let mut sink = RecordingSink::default();
        let s = settings();

        let mut f = hand([0, 1, 0, 0, 0]);
        set_point(&mut f, HandLandmark::IndexTip, kx, ky);
        set_point(&mut f, HandLandmark::ThumbTip, kx + 5.0, ky + 5.0);
        c.process_frame(&f, 0.0, &s, &mut sink);

        assert_eq!(clicks(&sink), 0, "pinch is routed to the keyboard");
        assert!(sink.actions.contains(&Action::PressKey("q".to_string())));
        assert_eq!(c.telemetry().last_typed_key.as_deref(), Some("q"));
    }

    #[test]
    fn test_inbox_toggles_keyboard_and_types() {
        let mut c = controller();
        let inbox = VoiceInbox::default();
        let mut sink = RecordingSink::default();

        inbox.submit_transcript("show keyboard");
        c.apply_inbox(&inbox, &mut sink);
        assert!(c.keyboard.visible);

        inbox.submit_transcript("type a b");
        c.apply_inbox(&inbox, &mut sink);
        assert_eq!(
            sink.actions,
            vec![
                Action::PressKey("a".to_string()),
                Action::PressKey("space".to_string()),
                Action::PressKey("b".to_string()),
            ]
        );
        assert_eq!(c.telemetry().voice_status.as_deref(), Some("typed: a b"));

        inbox.post(VoiceCommand::ToggleKeyboard);
        c.apply_inbox(&inbox, &mut sink);
        assert!(!c.keyboard.visible);
    }

    #[test]
    fn test_telemetry_sexp_parses() {
        let mut c = controller();
        let mut sink = RecordingSink::default();
        c.process_frame(&hand([0, 1, 0, 0, 0]), 0.0, &settings(), &mut sink);
        let sexp = c.telemetry().to_sexp();
        let v = lexpr::from_str(&sexp).unwrap();
        assert_eq!(crate::sexp::get_string(&v, "mode"), Some("move".to_string()));
        assert_eq!(crate::sexp::get_int(&v, "frames"), Some(1));
        assert!(sexp.contains(":armed (nil nil nil) :last-fired (nil nil nil)"), "{}", sexp);
    }

    #[test]
    fn test_status_board_defaults_to_nil() {
        let board = StatusBoard::default();
        assert_eq!(board.latest(), "nil");
        board.publish("(:frames 1)".to_string());
        assert_eq!(board.latest(), "(:frames 1)");
    }
}

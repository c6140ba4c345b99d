//! Voice command keywords and the inbox that carries them to the frame loop.
//!
//! Transcripts come from an external recognizer over IPC.  They are mapped
//! to commands by plain keyword lookup and posted into a single-slot,
//! last-write-wins inbox that the controller drains at the start of each
//! frame.  The IPC keyboard show/hide/toggle messages use the same inbox.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

/// A command for the frame loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    ShowKeyboard,
    HideKeyboard,
    ToggleKeyboard,
    /// Press one key per character.
    TypeText(String),
    /// Press a named key.
    PressKey(String),
    /// Launch an application by its canonical name.
    OpenApp(String),
    StopListening,
    Unknown(String),
}

impl VoiceCommand {
    /// String representation for IPC.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowKeyboard => "show-keyboard",
            Self::HideKeyboard => "hide-keyboard",
            Self::ToggleKeyboard => "toggle-keyboard",
            Self::TypeText(_) => "type-text",
            Self::PressKey(_) => "press-key",
            Self::OpenApp(_) => "open-app",
            Self::StopListening => "stop-listening",
            Self::Unknown(_) => "unknown",
        }
    }
}

const KEY_PHRASES: &[(&str, &[&str])] = &[
    ("enter", &["enter", "return"]),
    ("escape", &["escape", "cancel"]),
    ("backspace", &["backspace", "delete", "back space"]),
    ("space", &["space", "spacebar"]),
    ("tab", &["tab"]),
];

const APP_KEYWORDS: &[(&str, &[&str])] = &[
    ("chrome", &["chrome", "google chrome", "browser"]),
    ("notepad", &["notepad", "text editor"]),
    ("calculator", &["calculator", "calc"]),
    ("explorer", &["explorer", "file explorer", "files"]),
    ("cmd", &["command prompt", "cmd", "terminal"]),
    ("paint", &["paint", "mspaint"]),
];

fn lookup(table: &[(&str, &[&str])], text: &str) -> Option<String> {
    table
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| text.contains(p)))
        .map(|(name, _)| name.to_string())
}

/// Map a transcript to a command.
///
/// Checked in order: `open <app>`, `type <text>`, key phrases, stop, then
/// keyboard show/hide.  `open keyboard` is not an app and falls through to
/// the keyboard check.
pub fn parse_command(transcript: &str) -> VoiceCommand {
    let command = transcript.trim().to_lowercase();

    if let Some(name) = command.strip_prefix("open ") {
        if let Some(app) = lookup(APP_KEYWORDS, name.trim()) {
            return VoiceCommand::OpenApp(app);
        }
        if !name.contains("keyboard") {
            return VoiceCommand::Unknown(command);
        }
    }

    if let Some(text) = command.strip_prefix("type ") {
        let text = text.trim();
        if !text.is_empty() {
            return VoiceCommand::TypeText(text.to_string());
        }
    }

    if let Some(key) = lookup(KEY_PHRASES, &command) {
        return VoiceCommand::PressKey(key);
    }

    if command.contains("stop listening") || command.contains("stop voice") {
        return VoiceCommand::StopListening;
    }
    if command.contains("show keyboard") || command.contains("open keyboard") {
        return VoiceCommand::ShowKeyboard;
    }
    if command.contains("hide keyboard") || command.contains("close keyboard") {
        return VoiceCommand::HideKeyboard;
    }

    VoiceCommand::Unknown(command)
}

/// Device key name for a typed character.
pub fn key_for_char(c: char) -> String {
    match c {
        ' ' => "space".to_string(),
        '\n' => "enter".to_string(),
        '\t' => "tab".to_string(),
        other => other.to_string(),
    }
}

/// Single-slot mailbox from the IPC thread to the frame loop.
#[derive(Debug)]
pub struct VoiceInbox {
    command: Mutex<Option<VoiceCommand>>,
    status: Mutex<Option<String>>,
    enabled: AtomicBool,
}

impl VoiceInbox {
    pub fn new(enabled: bool) -> Self {
        Self {
            command: Mutex::new(None),
            status: Mutex::new(None),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Post a command, replacing any the frame loop has not consumed yet.
    pub fn post(&self, cmd: VoiceCommand) {
        if let Some(dropped) = self.command.lock().replace(cmd) {
            debug!(?dropped, "Voice command superseded before delivery");
        }
    }

    /// Post a status line for telemetry, replacing any pending one.
    pub fn post_status(&self, status: impl Into<String>) {
        *self.status.lock() = Some(status.into());
    }

    /// Drain both slots.  Never blocks: a slot held by the IPC thread is
    /// left for the next frame.
    pub fn take(&self) -> (Option<VoiceCommand>, Option<String>) {
        let cmd = self.command.try_lock().and_then(|mut g| g.take());
        let status = self.status.try_lock().and_then(|mut g| g.take());
        (cmd, status)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "Voice control");
        self.post_status(if enabled {
            "voice listening"
        } else {
            "voice stopped"
        });
    }

    /// Handle a recognizer transcript.  Returns the parsed command, or
    /// `None` when voice control is disabled and the transcript was ignored.
    pub fn submit_transcript(&self, transcript: &str) -> Option<VoiceCommand> {
        if !self.is_enabled() {
            debug!(transcript, "Transcript ignored: voice disabled");
            return None;
        }
        let cmd = parse_command(transcript);
        info!(transcript, ?cmd, "Voice command");
        match &cmd {
            VoiceCommand::StopListening => self.set_enabled(false),
            VoiceCommand::Unknown(text) => {
                self.post_status(format!("unknown command: {}", text));
            }
            other => self.post(other.clone()),
        }
        Some(cmd)
    }
}

impl Default for VoiceInbox {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_visibility_commands() {
        assert_eq!(parse_command("Show keyboard"), VoiceCommand::ShowKeyboard);
        assert_eq!(parse_command("please open keyboard"), VoiceCommand::ShowKeyboard);
        assert_eq!(parse_command("hide keyboard"), VoiceCommand::HideKeyboard);
        assert_eq!(parse_command("close keyboard"), VoiceCommand::HideKeyboard);
    }

    #[test]
    fn test_type_command_keeps_text() {
        assert_eq!(
            parse_command("  Type Hello World "),
            VoiceCommand::TypeText("hello world".to_string())
        );
    }

    #[test]
    fn test_type_wins_over_key_words() {
        // "type" is checked before the key phrases it may contain.
        assert_eq!(
            parse_command("type enter the room"),
            VoiceCommand::TypeText("enter the room".to_string())
        );
    }

    #[test]
    fn test_key_phrases() {
        assert_eq!(parse_command("return"), VoiceCommand::PressKey("enter".into()));
        assert_eq!(parse_command("cancel"), VoiceCommand::PressKey("escape".into()));
        assert_eq!(parse_command("back space"), VoiceCommand::PressKey("backspace".into()));
        assert_eq!(parse_command("spacebar"), VoiceCommand::PressKey("space".into()));
        assert_eq!(parse_command("tab"), VoiceCommand::PressKey("tab".into()));
    }

    #[test]
    fn test_stop_listening() {
        assert_eq!(parse_command("stop listening"), VoiceCommand::StopListening);
        assert_eq!(parse_command("stop voice now"), VoiceCommand::StopListening);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(
            parse_command("make coffee"),
            VoiceCommand::Unknown("make coffee".to_string())
        );
        assert_eq!(
            parse_command("open the pod bay doors"),
            VoiceCommand::Unknown("open the pod bay doors".to_string())
        );
    }

    #[test]
    fn test_open_app_keywords() {
        assert_eq!(parse_command("open chrome"), VoiceCommand::OpenApp("chrome".into()));
        assert_eq!(parse_command("Open the browser"), VoiceCommand::OpenApp("chrome".into()));
        assert_eq!(parse_command("open text editor"), VoiceCommand::OpenApp("notepad".into()));
        assert_eq!(parse_command("open calc"), VoiceCommand::OpenApp("calculator".into()));
        assert_eq!(parse_command("open terminal"), VoiceCommand::OpenApp("cmd".into()));
        assert_eq!(parse_command("open files"), VoiceCommand::OpenApp("explorer".into()));
    }

    #[test]
    fn test_open_keyboard_is_not_an_app() {
        assert_eq!(parse_command("open keyboard"), VoiceCommand::ShowKeyboard);
    }

    #[test]
    fn test_key_phrases_win_over_keyboard_and_stop() {
        assert_eq!(
            parse_command("hide keyboard and press enter"),
            VoiceCommand::PressKey("enter".into())
        );
        assert_eq!(
            parse_command("stop listening, cancel"),
            VoiceCommand::PressKey("escape".into())
        );
    }

    #[test]
    fn test_key_for_char() {
        assert_eq!(key_for_char(' '), "space");
        assert_eq!(key_for_char('a'), "a");
        assert_eq!(key_for_char('\n'), "enter");
    }

    #[test]
    fn test_inbox_last_write_wins() {
        let inbox = VoiceInbox::default();
        inbox.post(VoiceCommand::ShowKeyboard);
        inbox.post(VoiceCommand::HideKeyboard);
        let (cmd, _) = inbox.take();
        assert_eq!(cmd, Some(VoiceCommand::HideKeyboard));
        assert_eq!(inbox.take(), (None, None), "slot consumed once");
    }

    #[test]
    fn test_transcript_posts_command() {
        let inbox = VoiceInbox::default();
        let cmd = inbox.submit_transcript("type hi");
        assert_eq!(cmd, Some(VoiceCommand::TypeText("hi".to_string())));
        assert_eq!(inbox.take().0, Some(VoiceCommand::TypeText("hi".to_string())));
    }

    #[test]
    fn test_unknown_transcript_posts_status_only() {
        let inbox = VoiceInbox::default();
        inbox.submit_transcript("make coffee");
        let (cmd, status) = inbox.take();
        assert!(cmd.is_none());
        assert_eq!(status.as_deref(), Some("unknown command: make coffee"));
    }

    #[test]
    fn test_stop_disables_and_ignores_later_transcripts() {
        let inbox = VoiceInbox::default();
        inbox.submit_transcript("stop listening");
        assert!(!inbox.is_enabled());
        assert_eq!(inbox.take().1.as_deref(), Some("voice stopped"));
        assert!(inbox.submit_transcript("show keyboard").is_none());
        assert_eq!(inbox.take(), (None, None));
        inbox.set_enabled(true);
        assert!(inbox.submit_transcript("show keyboard").is_some());
    }
}

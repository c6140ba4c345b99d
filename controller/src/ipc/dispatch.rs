//! IPC message dispatch: parse s-expressions and route to handlers.

use std::time::{SystemTime, UNIX_EPOCH};

use lexpr::Value;
use tracing::{debug, warn};

use super::server::IpcClient;
use crate::gesture::controller::SharedState;
use crate::settings::SETTING_KEYS;
use crate::sexp::{escape_string, get_float, get_int, get_keyword, get_string, t_or_nil};
use crate::voice::VoiceCommand;

/// Parse an s-expression message and dispatch to the appropriate handler.
/// Returns an optional response string (s-expression).
pub fn handle_message(shared: &SharedState, client: &mut IpcClient, raw: &str) -> Option<String> {
    let value = match lexpr::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(client_id = client.id, "malformed s-expression: {}", e);
            return Some(error_response(0, &format!("malformed s-expression: {e}")));
        }
    };

    let msg_type = get_keyword(&value, "type");
    let msg_id = get_int(&value, "id").unwrap_or(0);

    match msg_type.as_deref() {
        Some("hello") => handle_hello(client, msg_id, &value),
        _ if !client.authenticated => Some(error_response(msg_id, "hello handshake required")),
        Some("ping") => handle_ping(msg_id, &value),
        Some("settings-get") => handle_settings_get(shared, msg_id),
        Some("settings-set") => handle_settings_set(shared, msg_id, &value),
        Some("settings-reset") => handle_settings_reset(shared, msg_id),
        Some("keyboard-show") => handle_keyboard(shared, msg_id, VoiceCommand::ShowKeyboard),
        Some("keyboard-hide") => handle_keyboard(shared, msg_id, VoiceCommand::HideKeyboard),
        Some("keyboard-toggle") => handle_keyboard(shared, msg_id, VoiceCommand::ToggleKeyboard),
        Some("voice-transcript") => handle_voice_transcript(shared, msg_id, &value),
        Some("voice-start") => handle_voice_enable(shared, msg_id, true),
        Some("voice-stop") => handle_voice_enable(shared, msg_id, false),
        Some("status") => handle_status(shared, msg_id),
        Some(other) => Some(error_response(
            msg_id,
            &format!("unknown message type: {other}"),
        )),
        None => Some(error_response(msg_id, "missing :type field")),
    }
}

// ── Handlers ────────────────────────────────────────────────

fn handle_hello(client: &mut IpcClient, msg_id: i64, value: &Value) -> Option<String> {
    let version = get_int(value, "version").unwrap_or(0);
    if version != 1 {
        return Some(error_response(
            msg_id,
            &format!("unsupported protocol version: {version}"),
        ));
    }

    // Only the user running the controller may drive it.
    if let Some(peer_uid) = client.peer_uid {
        let our_uid = unsafe { libc::getuid() };
        if peer_uid != our_uid {
            warn!(
                client_id = client.id,
                peer_uid,
                our_uid,
                "rejecting client: UID mismatch"
            );
            return Some(error_response(msg_id, "authentication failed: UID mismatch"));
        }
    }

    let client_name = get_string(value, "client").unwrap_or_default();
    debug!(client_id = client.id, client_name, "hello handshake (authenticated)");
    client.authenticated = true;

    let pid_field = client
        .peer_pid
        .map(|p| format!(" :peer-pid {}", p))
        .unwrap_or_default();
    Some(format!(
        "(:type :hello :id {} :version 1 :server \"handpilot\" :features (:keyboard t :voice t){})",
        msg_id, pid_field
    ))
}

fn handle_ping(msg_id: i64, value: &Value) -> Option<String> {
    let client_ts = get_int(value, "timestamp").unwrap_or(0);
    let server_ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    Some(format!(
        "(:type :response :id {} :status :ok :client-timestamp {} :server-timestamp {})",
        msg_id, client_ts, server_ts
    ))
}

fn handle_settings_get(shared: &SharedState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :settings {})",
        msg_id,
        shared.settings.snapshot().to_sexp()
    ))
}

/// Apply every recognised `:setting value` pair in the message.
fn handle_settings_set(shared: &SharedState, msg_id: i64, value: &Value) -> Option<String> {
    let mut applied = 0;
    for key in SETTING_KEYS {
        if let Some(v) = get_float(value, key) {
            if let Err(e) = shared.settings.set(key, v) {
                return Some(error_response(msg_id, &e.to_string()));
            }
            applied += 1;
        }
    }
    if applied == 0 {
        return Some(error_response(
            msg_id,
            &format!("no settings given (known: {})", SETTING_KEYS.join(" ")),
        ));
    }
    handle_settings_get(shared, msg_id)
}

fn handle_settings_reset(shared: &SharedState, msg_id: i64) -> Option<String> {
    shared.settings.reset();
    handle_settings_get(shared, msg_id)
}

fn handle_keyboard(shared: &SharedState, msg_id: i64, cmd: VoiceCommand) -> Option<String> {
    debug!(command = cmd.name(), "keyboard request");
    shared.voice.post(cmd);
    Some(ok_response(msg_id))
}

fn handle_voice_transcript(shared: &SharedState, msg_id: i64, value: &Value) -> Option<String> {
    let text = match get_string(value, "text") {
        Some(t) => t,
        None => return Some(error_response(msg_id, "missing :text")),
    };
    match shared.voice.submit_transcript(&text) {
        Some(cmd) => Some(format!(
            "(:type :response :id {} :status :ok :command :{})",
            msg_id,
            cmd.name()
        )),
        None => Some(format!(
            "(:type :response :id {} :status :ok :ignored t)",
            msg_id
        )),
    }
}

fn handle_voice_enable(shared: &SharedState, msg_id: i64, enabled: bool) -> Option<String> {
    shared.voice.set_enabled(enabled);
    Some(format!(
        "(:type :response :id {} :status :ok :voice {})",
        msg_id,
        t_or_nil(enabled)
    ))
}

fn handle_status(shared: &SharedState, msg_id: i64) -> Option<String> {
    Some(format!(
        "(:type :response :id {} :status :ok :voice {} :telemetry {})",
        msg_id,
        t_or_nil(shared.voice.is_enabled()),
        shared.status.latest()
    ))
}

// ── Helpers ────────────────────────────────────────────────

fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LiveSettings;
    use crate::voice::VoiceInbox;
    use std::os::unix::net::UnixStream;

    fn setup() -> (SharedState, IpcClient, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        let shared = SharedState::new(LiveSettings::default(), VoiceInbox::default());
        (shared, IpcClient::new(a, 1), b)
    }

    fn authed() -> (SharedState, IpcClient, UnixStream) {
        let (shared, mut client, peer) = setup();
        let r = handle_message(&shared, &mut client, "(:type :hello :id 1 :version 1)");
        assert!(r.unwrap().contains(":type :hello"));
        (shared, client, peer)
    }

    #[test]
    fn test_ok_response_format() {
        let r = ok_response(42);
        assert!(r.contains(":type :response"));
        assert!(r.contains(":id 42"));
        assert!(r.contains(":status :ok"));
    }

    #[test]
    fn test_error_response_escapes_quotes() {
        let r = error_response(1, "say \"hello\"");
        assert!(r.contains(":status :error"));
        assert!(r.contains("say \\\"hello\\\""));
    }

    #[test]
    fn test_hello_required_first() {
        let (shared, mut client, _peer) = setup();
        let r = handle_message(&shared, &mut client, "(:type :ping :id 3)").unwrap();
        assert!(r.contains("hello handshake required"), "{}", r);
        assert!(!client.authenticated);
    }

    #[test]
    fn test_hello_wrong_version() {
        let (shared, mut client, _peer) = setup();
        let r = handle_message(&shared, &mut client, "(:type :hello :id 1 :version 2)").unwrap();
        assert!(r.contains("unsupported protocol version: 2"));
        assert!(!client.authenticated);
    }

    #[test]
    fn test_hello_uid_mismatch_rejected() {
        let (shared, mut client, _peer) = setup();
        client.peer_uid = Some(unsafe { libc::getuid() }.wrapping_add(1));
        let r = handle_message(&shared, &mut client, "(:type :hello :id 1 :version 1)").unwrap();
        assert!(r.contains("UID mismatch"));
        assert!(!client.authenticated);
    }

    #[test]
    fn test_hello_authenticates() {
        let (_shared, client, _peer) = authed();
        assert!(client.authenticated);
    }

    #[test]
    fn test_malformed_sexp() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :ping").unwrap();
        assert!(r.contains("malformed s-expression"));
    }

    #[test]
    fn test_unknown_and_missing_type() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :warp :id 4)").unwrap();
        assert!(r.contains("unknown message type: warp"));
        let r = handle_message(&shared, &mut client, "(:id 5)").unwrap();
        assert!(r.contains("missing :type field"));
    }

    #[test]
    fn test_ping_echoes_timestamp() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :ping :id 2 :timestamp 99)").unwrap();
        assert!(r.contains(":client-timestamp 99"));
    }

    #[test]
    fn test_settings_set_clamps_and_reports() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(
            &shared,
            &mut client,
            "(:type :settings-set :id 6 :smoothing-factor 40 :padding 120)",
        )
        .unwrap();
        assert!(r.contains(":smoothing-factor 20"), "{}", r);
        assert!(r.contains(":padding-left 120"), "{}", r);
        let s = shared.settings.snapshot();
        assert_eq!(s.smoothing_factor, 20);
        assert_eq!(s.padding, [120; 4]);
    }

    #[test]
    fn test_settings_set_requires_a_key() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :settings-set :id 7 :bogus 1)").unwrap();
        assert!(r.contains(":status :error"));
    }

    #[test]
    fn test_settings_reset() {
        let (shared, mut client, _peer) = authed();
        shared.settings.set("scroll-threshold", 80.0).unwrap();
        let r = handle_message(&shared, &mut client, "(:type :settings-reset :id 8)").unwrap();
        assert!(r.contains(":scroll-threshold 15.0"), "{}", r);
    }

    #[test]
    fn test_keyboard_messages_post_to_inbox() {
        let (shared, mut client, _peer) = authed();
        handle_message(&shared, &mut client, "(:type :keyboard-toggle :id 9)");
        assert_eq!(shared.voice.take().0, Some(VoiceCommand::ToggleKeyboard));
        handle_message(&shared, &mut client, "(:type :keyboard-hide :id 10)");
        assert_eq!(shared.voice.take().0, Some(VoiceCommand::HideKeyboard));
    }

    #[test]
    fn test_voice_transcript() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(
            &shared,
            &mut client,
            "(:type :voice-transcript :id 11 :text \"type hello\")",
        )
        .unwrap();
        assert!(r.contains(":command :type-text"), "{}", r);
        assert_eq!(
            shared.voice.take().0,
            Some(VoiceCommand::TypeText("hello".to_string()))
        );
    }

    #[test]
    fn test_voice_stop_ignores_transcripts() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :voice-stop :id 12)").unwrap();
        assert!(r.contains(":voice nil"));
        let r = handle_message(
            &shared,
            &mut client,
            "(:type :voice-transcript :id 13 :text \"show keyboard\")",
        )
        .unwrap();
        assert!(r.contains(":ignored t"));
        let r = handle_message(&shared, &mut client, "(:type :voice-start :id 14)").unwrap();
        assert!(r.contains(":voice t"));
    }

    #[test]
    fn test_voice_transcript_requires_text() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :voice-transcript :id 15)").unwrap();
        assert!(r.contains("missing :text"));
    }

    #[test]
    fn test_status_returns_published_telemetry() {
        let (shared, mut client, _peer) = authed();
        let r = handle_message(&shared, &mut client, "(:type :status :id 16)").unwrap();
        assert!(r.contains(":telemetry nil"));
        shared.status.publish("(:frames 3)".to_string());
        let r = handle_message(&shared, &mut client, "(:type :status :id 17)").unwrap();
        assert!(r.contains(":telemetry (:frames 3)"));
        assert!(lexpr::from_str(&r).is_ok());
    }
}

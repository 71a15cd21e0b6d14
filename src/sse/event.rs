use chrono::{DateTime, Local};
use serde::Serialize;

/// Event name sent once to every client right after the handshake.
pub const WELCOME_EVENT: &str = "welcome";
/// Body of the welcome event.
pub const WELCOME_DATA: &str = "Connected to OBS SSE Stream";
/// Event name used for hotkey presses and text-source updates.
pub const HOTKEY_TRIGGER_EVENT: &str = "hotkey_trigger";
/// Comment frame written by parked handlers to keep idle streams open.
pub const KEEP_ALIVE_FRAME: &[u8] = b": keep-alive\n\n";

/// A named event with a pre-serialized payload.
///
/// Events are transient: built, framed, broadcast and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub payload: String,
    pub emitted_at: DateTime<Local>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            emitted_at: Local::now(),
        }
    }

    /// The initial frame sent on connect.
    pub fn welcome() -> Self {
        Self::new(WELCOME_EVENT, WELCOME_DATA)
    }

    /// Build an event whose payload is `data` encoded as JSON.
    pub fn json<T: Serialize>(name: impl Into<String>, data: &T) -> serde_json::Result<Self> {
        Ok(Self::new(name, serde_json::to_string(data)?))
    }

    /// Encode as `event: <name>\ndata: <payload>\n\n`.
    ///
    /// Payload line breaks are split into one `data:` line each so a stray
    /// newline cannot terminate the frame early; single-line payloads are
    /// written exactly as given.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut out = String::with_capacity(self.name.len() + self.payload.len() + 16);
        out.push_str("event: ");
        out.push_str(&self.name);
        out.push('\n');
        for line in self.payload.split('\n') {
            out.push_str("data: ");
            out.push_str(line.strip_suffix('\r').unwrap_or(line));
            out.push('\n');
        }
        out.push('\n');
        out.into_bytes()
    }
}

/// JSON body of `hotkey_trigger` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerPayload {
    /// Wall-clock time of the trigger as `HH:MM:SS`.
    pub time: String,
    pub press_count: u64,
    pub message: String,
}

impl TriggerPayload {
    pub fn new(at: DateTime<Local>, press_count: u64, message: impl Into<String>) -> Self {
        Self {
            time: at.format("%H:%M:%S").to_string(),
            press_count,
            message: message.into(),
        }
    }

    pub fn into_event(self, at: DateTime<Local>) -> serde_json::Result<Event> {
        let mut event = Event::json(HOTKEY_TRIGGER_EVENT, &self)?;
        event.emitted_at = at;
        Ok(event)
    }
}

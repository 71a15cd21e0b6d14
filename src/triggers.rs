//! Events raised by the host application.
//!
//! The host detects hotkeys and text-source updates however it likes and
//! calls in here; this module only turns those calls into [`Event`]s.

use crate::sse::{Event, TriggerPayload};
use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};

/// Message carried by hotkey-press events.
pub const HOTKEY_MESSAGE: &str = "OBS Hotkey Pressed!";

/// Hotkey press counter and event factory.
#[derive(Debug, Default)]
pub struct TriggerSource {
    press_count: AtomicU64,
}

impl TriggerSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_count(&self) -> u64 {
        self.press_count.load(Ordering::Acquire)
    }

    /// Count one press and build its `hotkey_trigger` event.
    pub fn hotkey_pressed(&self) -> serde_json::Result<Event> {
        let count = self.press_count.fetch_add(1, Ordering::AcqRel) + 1;
        let now = Local::now();
        TriggerPayload::new(now, count, HOTKEY_MESSAGE).into_event(now)
    }

    /// Build the event for a text-source update. Spaces are removed from the
    /// text and the press counter is reported but not advanced.
    pub fn external_text(&self, text: &str) -> serde_json::Result<Event> {
        let message: String = text.chars().filter(|c| *c != ' ').collect();
        let now = Local::now();
        TriggerPayload::new(now, self.press_count(), message).into_event(now)
    }
}

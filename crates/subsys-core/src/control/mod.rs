//! Typed runtime-tunable controls: text boxes, sliders, radio
//! groups and checkbox lists, each with bidirectional JSON encoding, a
//! memory-map writer, and a per-control "received" notification.
//!
//! The source implementation's `observe("received", fn)` is a
//! process-global registry keyed by string event name; here every
//! control owns its own list of typed callbacks instead.

mod checkbox;
mod radio;
mod slider;
mod textbox;

pub use checkbox::CheckBoxControl;
pub use radio::RadioControl;
pub use slider::SliderControl;
pub use textbox::TextBoxControl;

use crate::error::ControlError;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// How long an unanswered control is given before the controller
/// re-publishes its default encoding.
pub const INIT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// A callback invoked whenever a control's value changes because of an
/// inbound broker message.
pub type ReceivedCallback = Box<dyn Fn() + Send + Sync>;

/// Tracks whether a control is believed to exist on the broker yet.
///
/// `None` means "never" — the control has been heard from and needs no
/// further prodding. `Some(instant)` is the point in time after which
/// the controller should assume the retained topic is missing and
/// re-publish the control's current value.
pub struct Deadline(Mutex<Option<Instant>>);

impl Deadline {
    /// A freshly created control starts in the `Unknown` state.
    pub fn new() -> Self {
        Deadline(Mutex::new(Some(Instant::now() + INIT_GRACE_PERIOD)))
    }

    /// Marks the control as confirmed present; no further re-publication
    /// is needed until the next chain join resets it.
    pub fn mark_initialized(&self) {
        *self.0.lock() = None;
    }

    /// Re-arms the grace period, e.g. on chain join or after a
    /// re-publication tick.
    pub fn reset(&self) {
        *self.0.lock() = Some(Instant::now() + INIT_GRACE_PERIOD);
    }

    /// True once `now` has passed the deadline and the control is still
    /// unconfirmed.
    pub fn is_elapsed(&self) -> bool {
        matches!(*self.0.lock(), Some(deadline) if Instant::now() >= deadline)
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new()
    }
}

/// Common behaviour shared by every control variant.
///
/// Implementations are expected to wrap their mutable state in
/// `arc_swap::ArcSwap` (atomic whole-value types like Slider/TextBox/Radio)
/// or `parking_lot::Mutex` (composite types like CheckBox).
pub trait Control: Send + Sync {
    /// Hyphenless 32-character hex identity, as published on
    /// `Controls/<uid>`.
    fn uid(&self) -> &str;

    fn label(&self) -> &str;

    /// The `type` discriminant used in the control's JSON payload.
    fn type_tag(&self) -> &'static str;

    /// Width, in bytes, this control occupies in the memory map.
    fn data_length(&self) -> usize;

    fn start_pos(&self) -> usize;

    fn set_map_range(&self, start_pos: usize);

    fn end_pos(&self) -> usize {
        self.start_pos() + self.data_length()
    }

    /// Applies an inbound broker payload. Returns `Ok(false)` (the
    /// "null" case) for an empty payload or a mismatched type
    /// tag; returns `Ok(true)` and fires the `received` callbacks on a
    /// successful decode; returns `Err` only for malformed JSON.
    fn decode(&self, payload: &[u8]) -> Result<bool, ControlError>;

    /// Serializes the control's current value as a JSON payload for
    /// publication.
    fn encode(&self) -> String;

    /// Writes the control's typed value into `buffer` at `start_pos`.
    fn write_to_map(&self, buffer: &mut [u8]) -> Result<(), ControlError> {
        let start = self.start_pos();
        let need = self.data_length();
        if buffer.len() < start + need {
            return Err(ControlError::BufferTooSmall {
                start,
                need,
                len: buffer.len(),
            });
        }
        self.write_value(&mut buffer[start..start + need]);
        Ok(())
    }

    /// Per-variant value serialization into an already-bounds-checked slot.
    fn write_value(&self, slot: &mut [u8]);

    /// Registers a callback fired after every successful [`Control::decode`].
    fn on_received(&self, callback: ReceivedCallback);

    fn deadline(&self) -> &Deadline;
}

/// Shared helper: invokes every registered callback, swallowing panics
/// from individual listeners the way the controller's top-level workers
/// swallow transport faults: a bad observer must not break control
/// delivery for the rest of the subsystem.
pub(crate) fn fire(callbacks: &Mutex<Vec<ReceivedCallback>>) {
    for cb in callbacks.lock().iter() {
        cb();
    }
}

fn json_type_matches(value: &serde_json::Value, expected: &str) -> bool {
    value
        .get("type")
        .and_then(|t| t.as_str())
        .map(|t| t == expected)
        .unwrap_or(false)
}

pub(crate) fn decode_guard(
    payload: &[u8],
    expected_type: &str,
) -> Result<Option<serde_json::Value>, ControlError> {
    if payload.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !json_type_matches(&value, expected_type) {
        return Ok(None);
    }
    Ok(Some(value))
}

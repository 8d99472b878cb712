use super::{decode_guard, fire, Control, Deadline, ReceivedCallback};
use crate::error::ControlError;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-width text field; map width is 254 bytes (1 byte shy of 256 to
/// always leave room for a terminator, matching the source's `<254s`
/// struct format).
pub const TEXTBOX_MAP_WIDTH: usize = 254;

pub struct TextBoxControl {
    uid: String,
    label: String,
    value: ArcSwap<String>,
    start_pos: AtomicUsize,
    deadline: Deadline,
    callbacks: Mutex<Vec<ReceivedCallback>>,
}

#[derive(Serialize)]
struct TextBoxJson<'a> {
    #[serde(rename = "type")]
    type_tag: &'static str,
    label: &'a str,
    value: &'a str,
}

impl TextBoxControl {
    pub fn new(uid: impl Into<String>, label: impl Into<String>, value: impl Into<String>) -> Self {
        TextBoxControl {
            uid: uid.into(),
            label: label.into(),
            value: ArcSwap::from_pointee(value.into()),
            start_pos: AtomicUsize::new(0),
            deadline: Deadline::new(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn value(&self) -> String {
        (**self.value.load()).clone()
    }
}

impl Control for TextBoxControl {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn type_tag(&self) -> &'static str {
        "TextBox"
    }

    fn data_length(&self) -> usize {
        TEXTBOX_MAP_WIDTH
    }

    fn start_pos(&self) -> usize {
        self.start_pos.load(Ordering::Acquire)
    }

    fn set_map_range(&self, start_pos: usize) {
        self.start_pos.store(start_pos, Ordering::Release);
    }

    fn decode(&self, payload: &[u8]) -> Result<bool, ControlError> {
        let Some(value) = decode_guard(payload, self.type_tag())? else {
            return Ok(false);
        };
        let incoming = value
            .get("value")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ControlError::TypeMismatch {
                expected: "string",
                found: value.to_string(),
            })?;
        self.value.store(std::sync::Arc::new(incoming.to_string()));
        self.deadline.mark_initialized();
        fire(&self.callbacks);
        Ok(true)
    }

    fn encode(&self) -> String {
        serde_json::to_string(&TextBoxJson {
            type_tag: self.type_tag(),
            label: &self.label,
            value: &self.value(),
        })
        .expect("textbox json is always serializable")
    }

    fn write_value(&self, slot: &mut [u8]) {
        let value = self.value();
        let bytes = value.as_bytes();
        let copy_len = bytes.len().min(slot.len().saturating_sub(1));
        slot.fill(0);
        slot[..copy_len].copy_from_slice(&bytes[..copy_len]);
    }

    fn on_received(&self, callback: ReceivedCallback) {
        self.callbacks.lock().push(callback);
    }

    fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_box_round_trip() {
        let ctrl = TextBoxControl::new("abc", "Name", "hello");
        assert!(ctrl
            .decode(br#"{"type":"TextBox","label":"Name","value":"world"}"#)
            .unwrap());
        assert_eq!(ctrl.value(), "world");
        assert_eq!(ctrl.data_length(), TEXTBOX_MAP_WIDTH);
    }

    #[test]
    fn text_box_write_to_map_zero_pads() {
        let ctrl = TextBoxControl::new("abc", "Name", "hi");
        ctrl.set_map_range(0);
        let mut buf = vec![0xFFu8; TEXTBOX_MAP_WIDTH];
        ctrl.write_to_map(&mut buf).unwrap();
        assert_eq!(&buf[0..2], b"hi");
        assert_eq!(buf[2], 0);
    }
}

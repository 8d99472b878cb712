use super::{decode_guard, fire, Control, Deadline, ReceivedCallback};
use crate::error::ControlError;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Value selection from a bounded range, presented as a slider.
pub struct SliderControl {
    uid: String,
    label: String,
    min: i64,
    max: i64,
    value: ArcSwap<i64>,
    start_pos: AtomicUsize,
    deadline: Deadline,
    callbacks: Mutex<Vec<ReceivedCallback>>,
}

#[derive(Serialize)]
struct SliderJson<'a> {
    #[serde(rename = "type")]
    type_tag: &'static str,
    label: &'a str,
    min: i64,
    max: i64,
    value: i64,
}

impl SliderControl {
    pub fn new(uid: impl Into<String>, label: impl Into<String>, min: i64, max: i64, value: i64) -> Self {
        SliderControl {
            uid: uid.into(),
            label: label.into(),
            min,
            max,
            value: ArcSwap::from_pointee(value.clamp(min, max)),
            start_pos: AtomicUsize::new(0),
            deadline: Deadline::new(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn value(&self) -> i64 {
        **self.value.load()
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }
}

impl Control for SliderControl {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn type_tag(&self) -> &'static str {
        "Slider"
    }

    fn data_length(&self) -> usize {
        8
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
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ControlError::TypeMismatch {
                expected: "number",
                found: value.to_string(),
            })?;
        self.value.store(std::sync::Arc::new(incoming.clamp(self.min, self.max)));
        self.deadline.mark_initialized();
        fire(&self.callbacks);
        Ok(true)
    }

    fn encode(&self) -> String {
        serde_json::to_string(&SliderJson {
            type_tag: self.type_tag(),
            label: &self.label,
            min: self.min,
            max: self.max,
            value: self.value(),
        })
        .expect("slider json is always serializable")
    }

    fn write_value(&self, slot: &mut [u8]) {
        slot.copy_from_slice(&self.value().to_le_bytes());
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
    fn slider_json_round_trip_and_memory_map_write() {
        let ctrl = SliderControl::new("abc", "X", 0, 10, 0);
        ctrl.set_map_range(16);
        assert!(ctrl
            .decode(br#"{"type":"Slider","label":"X","min":0,"max":10,"value":3}"#)
            .unwrap());
        assert_eq!(ctrl.value(), 3);
        assert_eq!(ctrl.data_length(), 8);
        let mut map = vec![0u8; 32];
        ctrl.write_to_map(&mut map).unwrap();
        assert_eq!(&map[16..24], &[3, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn received_callback_fires_exactly_once() {
        let ctrl = SliderControl::new("abc", "X", 0, 10, 0);
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counted = count.clone();
        ctrl.on_received(Box::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        ctrl.decode(br#"{"type":"Slider","label":"X","min":0,"max":10,"value":3}"#)
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_payload_is_a_noop() {
        let ctrl = SliderControl::new("abc", "X", 0, 10, 5);
        assert!(!ctrl.decode(b"").unwrap());
        assert_eq!(ctrl.value(), 5);
    }

    #[test]
    fn mismatched_type_tag_is_a_noop() {
        let ctrl = SliderControl::new("abc", "X", 0, 10, 5);
        assert!(!ctrl
            .decode(br#"{"type":"TextBox","label":"X","value":"y"}"#)
            .unwrap());
        assert_eq!(ctrl.value(), 5);
    }
}

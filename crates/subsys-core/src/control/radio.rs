use super::{decode_guard, fire, Control, Deadline, ReceivedCallback};
use crate::error::ControlError;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Clone)]
struct RadioState {
    items: Vec<String>,
    selected: usize,
}

/// Selection from an ordered list of mutually exclusive options.
pub struct RadioControl {
    uid: String,
    label: String,
    state: ArcSwap<RadioState>,
    start_pos: AtomicUsize,
    deadline: Deadline,
    callbacks: Mutex<Vec<ReceivedCallback>>,
}

#[derive(Serialize)]
struct RadioJson<'a> {
    #[serde(rename = "type")]
    type_tag: &'static str,
    label: &'a str,
    selected: usize,
    items: &'a [String],
}

impl RadioControl {
    pub fn new(uid: impl Into<String>, label: impl Into<String>, items: Vec<String>, selected: usize) -> Self {
        let selected = selected.min(items.len().saturating_sub(1));
        RadioControl {
            uid: uid.into(),
            label: label.into(),
            state: ArcSwap::from_pointee(RadioState { items, selected }),
            start_pos: AtomicUsize::new(0),
            deadline: Deadline::new(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn selected(&self) -> usize {
        self.state.load().selected
    }

    pub fn items(&self) -> Vec<String> {
        self.state.load().items.clone()
    }
}

impl Control for RadioControl {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn type_tag(&self) -> &'static str {
        "Radio"
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
        let selected = value
            .get("selected")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ControlError::TypeMismatch {
                expected: "number",
                found: value.to_string(),
            })? as usize;
        let items = match value.get("items").and_then(|v| v.as_array()) {
            Some(arr) => arr
                .iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect(),
            None => self.state.load().items.clone(),
        };
        let selected = selected.min(items.len().saturating_sub(1));
        self.state.store(std::sync::Arc::new(RadioState { items, selected }));
        self.deadline.mark_initialized();
        fire(&self.callbacks);
        Ok(true)
    }

    fn encode(&self) -> String {
        let state = self.state.load();
        serde_json::to_string(&RadioJson {
            type_tag: self.type_tag(),
            label: &self.label,
            selected: state.selected,
            items: &state.items,
        })
        .expect("radio json is always serializable")
    }

    fn write_value(&self, slot: &mut [u8]) {
        let selected = self.selected() as i64;
        slot.copy_from_slice(&selected.to_le_bytes());
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
    fn radio_round_trip() {
        let ctrl = RadioControl::new("abc", "Mode", vec!["A".into(), "B".into(), "C".into()], 0);
        assert!(ctrl
            .decode(br#"{"type":"Radio","label":"Mode","selected":2,"items":["A","B","C"]}"#)
            .unwrap());
        assert_eq!(ctrl.selected(), 2);
        let mut buf = vec![0u8; 8];
        ctrl.write_to_map(&mut buf).unwrap();
        assert_eq!(buf, 2i64.to_le_bytes());
    }
}

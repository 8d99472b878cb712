use super::{decode_guard, fire, Control, Deadline, ReceivedCallback};
use crate::error::ControlError;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One labelled toggle within a [`CheckBoxControl`].
#[derive(Clone)]
pub struct CheckBoxItem {
    pub label: String,
    pub is_checked: bool,
}

/// Ordered list of independently toggleable items; map width is one byte
/// per item (unlike the other variants, which are fixed-width).
pub struct CheckBoxControl {
    uid: String,
    label: String,
    // Composite read-modify-write target: guarded by a lock rather than
    // an atomic swap.
    items: Mutex<Vec<CheckBoxItem>>,
    start_pos: AtomicUsize,
    deadline: Deadline,
    callbacks: Mutex<Vec<ReceivedCallback>>,
}

#[derive(Serialize)]
struct CheckBoxItemJson<'a> {
    label: &'a str,
    #[serde(rename = "isChecked")]
    is_checked: bool,
}

#[derive(Serialize)]
struct CheckBoxJson<'a> {
    #[serde(rename = "type")]
    type_tag: &'static str,
    label: &'a str,
    items: Vec<CheckBoxItemJson<'a>>,
}

impl CheckBoxControl {
    pub fn new(uid: impl Into<String>, label: impl Into<String>, items: Vec<CheckBoxItem>) -> Self {
        CheckBoxControl {
            uid: uid.into(),
            label: label.into(),
            items: Mutex::new(items),
            start_pos: AtomicUsize::new(0),
            deadline: Deadline::new(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn items(&self) -> Vec<CheckBoxItem> {
        self.items.lock().clone()
    }
}

impl Control for CheckBoxControl {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn type_tag(&self) -> &'static str {
        "CheckBox"
    }

    fn data_length(&self) -> usize {
        self.items.lock().len()
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
        let raw_items = value
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ControlError::TypeMismatch {
                expected: "array",
                found: value.to_string(),
            })?;
        let mut items = Vec::with_capacity(raw_items.len());
        for item in raw_items {
            let label = item.get("label").and_then(|v| v.as_str()).unwrap_or_default();
            let is_checked = item
                .get("isChecked")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            items.push(CheckBoxItem {
                label: label.to_string(),
                is_checked,
            });
        }
        *self.items.lock() = items;
        self.deadline.mark_initialized();
        fire(&self.callbacks);
        Ok(true)
    }

    fn encode(&self) -> String {
        let items = self.items.lock();
        let json_items = items
            .iter()
            .map(|item| CheckBoxItemJson {
                label: &item.label,
                is_checked: item.is_checked,
            })
            .collect();
        serde_json::to_string(&CheckBoxJson {
            type_tag: self.type_tag(),
            label: &self.label,
            items: json_items,
        })
        .expect("checkbox json is always serializable")
    }

    fn write_value(&self, slot: &mut [u8]) {
        let items = self.items.lock();
        for (byte, item) in slot.iter_mut().zip(items.iter()) {
            *byte = item.is_checked as u8;
        }
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
    fn checkbox_round_trip_and_map_write() {
        let ctrl = CheckBoxControl::new(
            "abc",
            "Filters",
            vec![
                CheckBoxItem {
                    label: "A".into(),
                    is_checked: false,
                },
                CheckBoxItem {
                    label: "B".into(),
                    is_checked: false,
                },
            ],
        );
        assert!(ctrl
            .decode(br#"{"type":"CheckBox","label":"Filters","items":[{"label":"A","isChecked":true},{"label":"B","isChecked":false}]}"#)
            .unwrap());
        assert_eq!(ctrl.data_length(), 2);
        let mut buf = vec![0xFFu8; 2];
        ctrl.write_to_map(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 0]);
    }
}

//! YAML configuration loading: the document a host supplies
//! at process start, deserialized with `serde` + `serde_yaml`.

use crate::control::{CheckBoxControl, CheckBoxItem, Control, RadioControl, SliderControl, TextBoxControl};
use crate::data_item::DataItem;
use crate::error::ConfigError;
use crate::pipe::StreamPipe;
use crate::schema::RecordDescriptor;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct BrokerConfig {
    pub ip: String,
    pub port: u16,
    #[serde(rename = "useTls", default)]
    pub use_tls: bool,
}

#[derive(Debug, Deserialize)]
pub struct DataItemConfig {
    pub key: String,
    #[serde(rename = "dataTypes")]
    pub data_types: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ControlConfig {
    TextBox {
        uid: String,
        label: String,
        value: String,
    },
    Slider {
        uid: String,
        label: String,
        min: i64,
        max: i64,
        value: i64,
    },
    Radio {
        uid: String,
        label: String,
        items: Vec<String>,
        selected: usize,
    },
    CheckBox {
        uid: String,
        label: String,
        items: Vec<CheckBoxItemConfig>,
    },
}

impl ControlConfig {
    fn raw_uid(&self) -> &str {
        match self {
            ControlConfig::TextBox { uid, .. }
            | ControlConfig::Slider { uid, .. }
            | ControlConfig::Radio { uid, .. }
            | ControlConfig::CheckBox { uid, .. } => uid,
        }
    }

    /// Builds the live `Control` this descriptor names, normalizing its
    /// uid to the hyphenless 32-hex form used on the wire.
    fn build(&self) -> Result<Arc<dyn Control>, ConfigError> {
        let uid = normalize_uid(self.raw_uid())
            .ok_or_else(|| ConfigError::Invalid("controlSchema.uid", self.raw_uid().to_string()))?;
        Ok(match self {
            ControlConfig::TextBox { label, value, .. } => {
                Arc::new(TextBoxControl::new(uid, label, value.clone()))
            }
            ControlConfig::Slider { label, min, max, value, .. } => {
                Arc::new(SliderControl::new(uid, label, *min, *max, *value))
            }
            ControlConfig::Radio { label, items, selected, .. } => {
                Arc::new(RadioControl::new(uid, label, items.clone(), *selected))
            }
            ControlConfig::CheckBox { label, items, .. } => Arc::new(CheckBoxControl::new(
                uid,
                label,
                items
                    .iter()
                    .map(|i| CheckBoxItem {
                        label: i.label.clone(),
                        is_checked: i.is_checked,
                    })
                    .collect(),
            )),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckBoxItemConfig {
    pub label: String,
    #[serde(rename = "isChecked", default)]
    pub is_checked: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubsystemConfig {
    pub uid: String,
    pub name: String,
    pub broker: BrokerConfig,
    #[serde(rename = "dataSchema", default)]
    pub data_schema: Vec<DataItemConfig>,
    #[serde(rename = "controlSchema", default)]
    pub control_schema: Vec<ControlConfig>,
}

impl SubsystemConfig {
    /// Loads and validates the YAML document at `path`.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: SubsystemConfig = serde_yaml::from_str(yaml)?;
        config.uid = normalize_uid(&config.uid)
            .ok_or_else(|| ConfigError::Invalid("uid", config.uid.clone()))?;
        if config.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name", "must not be empty".into()));
        }
        for item in &config.data_schema {
            RecordDescriptor::parse(&item.data_types)?;
        }
        for control in &config.control_schema {
            control.build()?;
        }
        Ok(config)
    }

    /// Builds the live controls named by `controlSchema`, in declaration order.
    pub fn build_controls(&self) -> Result<Vec<Arc<dyn Control>>, ConfigError> {
        self.control_schema.iter().map(ControlConfig::build).collect()
    }

    /// Builds one `DataItem` per `dataSchema` entry, self-describing the
    /// stream this subsystem produces on that key.
    pub fn build_data_items(&self) -> Vec<Arc<DataItem>> {
        self.data_schema
            .iter()
            .map(|item| Arc::new(DataItem::new(item.key.clone(), item.data_types.clone())))
            .collect()
    }

    /// Builds one empty `StreamPipe` per `dataSchema` entry, ready for
    /// user code to push records into and the egress channel to drain.
    pub fn build_output_pipes(&self) -> Result<Vec<StreamPipe>, ConfigError> {
        self.data_schema
            .iter()
            .map(|item| {
                let descriptor = RecordDescriptor::parse(&item.data_types)?;
                Ok(StreamPipe::new(item.key.clone(), descriptor))
            })
            .collect()
    }
}

/// Strips a hyphenated UUID down to its 32 hex characters, matching the
/// wire format used for control and module uids.
fn normalize_uid(raw: &str) -> Option<String> {
    let parsed = uuid::Uuid::parse_str(raw).ok()?;
    Some(parsed.simple().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
uid: "550e8400-e29b-41d4-a716-446655440000"
name: "radar-front"
broker:
  ip: "127.0.0.1"
  port: 1883
  useTls: false
dataSchema:
  - key: "Raw"
    dataTypes: "uint64,float,float"
controlSchema:
  - type: "Slider"
    uid: "6ba7b8109dad11d180b400c04fd430c8"
    label: "Gain"
    min: 0
    max: 10
    value: 5
"#;

    #[test]
    fn parses_sample_config() {
        let config = SubsystemConfig::load_from_str(SAMPLE).unwrap();
        assert_eq!(config.uid, "550e8400e29b41d4a716446655440000");
        assert_eq!(config.name, "radar-front");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.data_schema.len(), 1);
        assert_eq!(config.control_schema.len(), 1);
        let controls = config.build_controls().unwrap();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].uid(), "6ba7b8109dad11d180b400c04fd430c8");
        let pipes = config.build_output_pipes().unwrap();
        assert_eq!(pipes.len(), 1);
        assert_eq!(pipes[0].key(), "Raw");
    }

    #[test]
    fn rejects_invalid_uid() {
        let bad = SAMPLE.replace(
            "550e8400-e29b-41d4-a716-446655440000",
            "not-a-uuid",
        );
        assert!(SubsystemConfig::load_from_str(&bad).is_err());
    }

    #[test]
    fn rejects_unknown_schema_token() {
        let bad = SAMPLE.replace("uint64,float,float", "uint64,bogus");
        assert!(SubsystemConfig::load_from_str(&bad).is_err());
    }
}

//! Data item: a producer's self-description of a stream's schema,
//! published on a `/Interpretation` topic and mirrored locally.

use crate::control::Deadline;
use crate::schema::RecordDescriptor;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataItemJson {
    pub key: String,
    #[serde(rename = "dataTypes")]
    pub data_types: String,
}

pub struct DataItem {
    key: String,
    schema: ArcSwap<String>,
    deadline: Deadline,
}

impl DataItem {
    pub fn new(key: impl Into<String>, schema: impl Into<String>) -> Self {
        DataItem {
            key: key.into(),
            schema: ArcSwap::from_pointee(schema.into()),
            deadline: Deadline::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema(&self) -> String {
        (**self.schema.load()).clone()
    }

    pub fn descriptor(&self) -> Result<RecordDescriptor, crate::error::SchemaError> {
        RecordDescriptor::parse(&self.schema())
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Applies an inbound `/Interpretation` payload. Mirrors
    /// [`crate::control::Control::decode`]'s null-on-empty-or-mismatch
    /// contract, except there is no type tag to mismatch on — only
    /// emptiness short-circuits.
    pub fn apply_interpretation(&self, payload: &[u8]) -> Result<bool, crate::error::ConfigError> {
        if payload.is_empty() {
            return Ok(false);
        }
        let incoming: DataItemJson = serde_json::from_slice(payload)
            .map_err(|e| crate::error::ConfigError::Invalid("Interpretation", e.to_string()))?;
        self.schema.store(std::sync::Arc::new(incoming.data_types));
        self.deadline.mark_initialized();
        Ok(true)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(&DataItemJson {
            key: self.key.clone(),
            data_types: self.schema(),
        })
        .expect("data item json is always serializable")
    }
}

//! Transport endpoint configuration: protocol, address, and the
//! topics an MQTT(S) endpoint subscribes to or publishes on.

use std::sync::atomic::{AtomicBool, Ordering};

/// The transport a channel is bound to. `Unknown` is the boot-time value
/// before the controller has assigned a real endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Mqtt,
    Mqtts,
    Tcp,
    Unknown,
}

impl Protocol {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "MQTT" => Protocol::Mqtt,
            "MQTTS" => Protocol::Mqtts,
            "TCP" => Protocol::Tcp,
            _ => Protocol::Unknown,
        }
    }

    pub fn is_mqtt(&self) -> bool {
        matches!(self, Protocol::Mqtt | Protocol::Mqtts)
    }
}

/// A channel's transport configuration. `is_active` is flipped by the
/// transport worker itself (connected vs. not), while every other field
/// is assigned by the controller.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub address: String,
    pub port: u16,
    pub topics: Vec<String>,
    is_active: std::sync::Arc<AtomicBool>,
}

impl Endpoint {
    pub fn new(protocol: Protocol, address: impl Into<String>, port: u16, topics: Vec<String>) -> Self {
        Endpoint {
            protocol,
            address: address.into(),
            port,
            topics,
            is_active: std::sync::Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn unknown() -> Self {
        Endpoint::new(Protocol::Unknown, "", 0, Vec::new())
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        self.is_active.store(active, Ordering::Release);
    }
}

/// Derives an egress block's key from its topic by taking the substring
/// between the last two `/` separators, e.g.
/// `Chains/c1/SubSystems/m/Data/Raw/Records` → `Raw`. Shared by both
/// transport crates and the controller, which all need to match a topic
/// back to the output pipe it was built from.
pub fn topic_key(topic: &str) -> &str {
    let slashes: Vec<usize> = topic.match_indices('/').map(|(i, _)| i).collect();
    match slashes.len() {
        0 => topic,
        1 => &topic[..slashes[0]],
        n => {
            let start = slashes[n - 2] + 1;
            let end = slashes[n - 1];
            &topic[start..end]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_key_is_second_to_last_segment() {
        assert_eq!(topic_key("Chains/c1/SubSystems/m/Data/Raw/Records"), "Raw");
    }

    #[test]
    fn topic_key_with_exactly_two_segments() {
        assert_eq!(topic_key("Data/Raw"), "Data");
    }
}

//! Topic string builders for the control-plane MQTT tree.

pub const SELECTED_CHAIN: &str = "SelectedChain";

pub fn chain_setup(chain: &str) -> String {
    format!("Chains/{chain}/Setup")
}

pub fn chain_subsystems(chain: &str) -> String {
    format!("Chains/{chain}/Setup/SubSystems")
}

fn module_prefix(chain: &str, module: &str) -> String {
    format!("Chains/{chain}/SubSystems/{module}")
}

pub fn controls_wildcard(chain: &str, module: &str) -> String {
    format!("{}/Controls/#", module_prefix(chain, module))
}

pub fn controls_prefix(chain: &str, module: &str) -> String {
    format!("{}/Controls/", module_prefix(chain, module))
}

pub fn control_topic(chain: &str, module: &str, uid: &str) -> String {
    format!("{}{uid}", controls_prefix(chain, module))
}

pub fn data_interpretation_wildcard(chain: &str, module: &str) -> String {
    format!("{}/Data/+/Interpretation", module_prefix(chain, module))
}

pub fn data_interpretation_topic(chain: &str, module: &str, key: &str) -> String {
    format!("{}/Data/{key}/Interpretation", module_prefix(chain, module))
}

pub fn data_records_topic(chain: &str, module: &str, key: &str) -> String {
    format!("{}/Data/{key}/Records", module_prefix(chain, module))
}

pub fn incoming(chain: &str, module: &str) -> String {
    format!("{}/Incoming", module_prefix(chain, module))
}

pub fn outgoing(chain: &str, module: &str) -> String {
    format!("{}/Outgoing", module_prefix(chain, module))
}

pub fn definition(module: &str) -> String {
    format!("AvailableSubSystems/{module}/Definition")
}

pub fn status(module: &str) -> String {
    format!("AvailableSubSystems/{module}/Status")
}

pub fn rates(chain: &str, module: &str) -> String {
    format!("{}/Rates", module_prefix(chain, module))
}

/// If `topic` falls under this module's `Controls/` subtree, returns the
/// trailing 32-character uid (mirrors the source's `msg.topic[-32:]`).
pub fn strip_control_uid<'a>(topic: &'a str, chain: &str, module: &str) -> Option<&'a str> {
    let prefix = controls_prefix(chain, module);
    if !topic.starts_with(&prefix) || topic.len() < 32 {
        return None;
    }
    Some(&topic[topic.len() - 32..])
}

/// If `topic` is this module's `Data/<key>/Interpretation`, returns `key`.
pub fn strip_data_interpretation<'a>(topic: &'a str, chain: &str, module: &str) -> Option<&'a str> {
    let prefix = format!("{}/Data/", module_prefix(chain, module));
    topic
        .strip_prefix(&prefix)
        .and_then(|rest| rest.strip_suffix("/Interpretation"))
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_control_uid_matches_trailing_segment() {
        let topic = "Chains/c1/SubSystems/m1/Controls/6ba7b8109dad11d180b400c04fd430c8";
        assert_eq!(
            strip_control_uid(topic, "c1", "m1"),
            Some("6ba7b8109dad11d180b400c04fd430c8")
        );
        assert_eq!(strip_control_uid(topic, "c2", "m1"), None);
    }

    #[test]
    fn strip_data_interpretation_matches_key() {
        let topic = "Chains/c1/SubSystems/m1/Data/Raw/Interpretation";
        assert_eq!(strip_data_interpretation(topic, "c1", "m1"), Some("Raw"));
        assert_eq!(
            strip_data_interpretation("Chains/c1/SubSystems/m1/Data/Raw/Records", "c1", "m1"),
            None
        );
    }
}

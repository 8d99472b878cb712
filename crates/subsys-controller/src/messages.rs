//! JSON payload shapes for the control-plane topics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SelectedChainMsg {
    pub id: String,
    #[serde(rename = "isRunning")]
    pub is_running: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetupOrigin {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetupMsg {
    pub origin: SetupOrigin,
}

/// `Chains/<c>/SubSystems/<m>/Incoming`: the upstream endpoint this
/// subsystem should read from.
#[derive(Debug, Deserialize)]
pub struct IncomingMsg {
    pub protocol: String,
    pub ip: String,
    pub port: u16,
    pub topics: Vec<String>,
    pub layout: Option<String>,
    pub source: Option<String>,
}

/// `Chains/<c>/SubSystems/<m>/Outgoing`: the downstream endpoint this
/// subsystem should publish to. Its topics are derived entirely from the
/// subsystem's own output keys, not named in the payload.
#[derive(Debug, Deserialize)]
pub struct OutgoingMsg {
    pub protocol: String,
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct DefinitionMsg<'a> {
    pub label: &'a str,
    pub streams: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct RatesMsg {
    pub total: String,
    pub errors: String,
}

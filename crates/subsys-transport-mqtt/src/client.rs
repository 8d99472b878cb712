//! Shared `rumqttc` client construction for the ingress subscriber and
//! egress publisher — same `MqttOptions` shape, different `client_id`
//! suffix so a broker never collapses the two connections onto one
//! session.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};
use subsys_core::Protocol;

use crate::tls;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Builds the `(AsyncClient, EventLoop)` pair for one role ("in" or "out")
/// of one module, talking to `address:port` over `protocol`.
pub fn build_client(
    module_uid: &str,
    role: &str,
    protocol: Protocol,
    address: &str,
    port: u16,
) -> (AsyncClient, EventLoop) {
    let client_id = format!("{module_uid}_{role}");
    let mut opts = MqttOptions::new(client_id, address, port);
    opts.set_keep_alive(KEEP_ALIVE);
    if protocol == Protocol::Mqtts {
        let config = Arc::new(tls::insecure_client_config());
        opts.set_transport(Transport::Tls(TlsConfiguration::Rustls(config)));
    }
    AsyncClient::new(opts, EVENT_QUEUE_CAPACITY)
}

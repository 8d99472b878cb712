//! MQTT(S) CSV ingress subscriber and egress publisher.

mod client;
mod egress;
mod error;
mod ingress;
mod tls;

pub use client::build_client;
pub use egress::run_egress;
pub use error::TransportError;
pub use ingress::run_ingress;

use thiserror::Error;

/// Transport-level faults for the MQTT(S) ingress subscriber and egress
/// publisher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("csv encode error: {0}")]
    Csv(#[from] csv::Error),
    #[error("record field does not match schema: {0}")]
    Schema(#[from] subsys_core::error::SchemaError),
}

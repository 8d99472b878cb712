use thiserror::Error;

/// Transport-level faults for the raw-TCP ingress sink and egress sender.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind TCP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error on TCP connection: {0}")]
    Io(#[from] std::io::Error),
}

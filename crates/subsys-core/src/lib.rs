//! Shared types for the radar subsystem runtime: the declarative record
//! schema codec, typed controls, stream pipes, and the process-wide
//! context the controller and both transport crates build on.

pub mod activity;
pub mod config;
pub mod context;
pub mod control;
pub mod data_item;
pub mod endpoint;
pub mod error;
pub mod lifecycle;
pub mod pipe;
pub mod schema;
pub mod status;
pub mod token;

pub use context::{ChannelHandle, Context, SensorOrigin};
pub use control::Control;
pub use data_item::DataItem;
pub use endpoint::{topic_key, Endpoint, Protocol};
pub use pipe::StreamPipe;
pub use schema::{FieldType, FieldValue, Record, RecordDescriptor};
pub use status::Status;
pub use token::GenerationToken;

/// Suspension intervals shared by every worker loop so the
/// constants live in exactly one place.
pub mod intervals {
    use std::time::Duration;

    pub const MQTT_SEND_INTERVAL: Duration = Duration::from_millis(250);
    pub const CANCELLATION_CHECK_INTERVAL: Duration = Duration::from_secs(1);
    pub const CONNECTION_RETRY_INTERVAL: Duration = Duration::from_secs(2);
    pub const RECHECK_DATA_IN_QUEUE_INTERVAL: Duration = Duration::from_millis(50);
    pub const FORCED_QUEUE_CLEANUP_INTERVAL: Duration = Duration::from_millis(500);
    pub const READ_INTERVAL: Duration = Duration::from_millis(100);

    /// Byte ceiling for one CSV-encoded MQTT payload.
    pub const MAX_SEND_BLOCK_BYTE_SIZE: usize = 16_384;

    /// Worker join timeout before a stop is treated as abandoned.
    pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

    /// Cap on concurrent CSV-encoding workers.
    pub const CSV_ENCODE_POOL_SIZE: usize = 8;
}

//! Raw-TCP egress sender: a single client connection that packs
//! and writes records from one pipe one at a time, reconnecting on
//! failure.

use subsys_core::context::ChannelHandle;
use subsys_core::intervals::{CONNECTION_RETRY_INTERVAL, RECHECK_DATA_IN_QUEUE_INTERVAL};
use subsys_core::schema::pack;
use subsys_core::token::Generation;
use subsys_core::StreamPipe;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::TransportError;

/// Runs the TCP egress sender until `generation` is no longer current.
/// `pipe` backs the single stream this endpoint forwards ("the
/// single configured topic").
pub async fn run_egress(handle: ChannelHandle, generation: Generation, pipe: StreamPipe) {
    let endpoint = handle.endpoint();
    let addr = format!("{}:{}", endpoint.address, endpoint.port);
    let descriptor = pipe.descriptor().clone();

    while handle.generation.is_current(generation) {
        match connect(&addr).await {
            Ok(mut stream) => {
                endpoint.set_active(true);
                tracing::info!(%addr, "tcp egress connected");
                send_until_error_or_stopped(&mut stream, &pipe, &descriptor, &handle, generation)
                    .await;
                endpoint.set_active(false);
            }
            Err(source) => {
                tracing::warn!(%addr, error = %source, "tcp egress connect failed");
            }
        }
        if handle.generation.is_current(generation) {
            tokio::time::sleep(CONNECTION_RETRY_INTERVAL).await;
        }
    }
    endpoint.set_active(false);
}

async fn connect(addr: &str) -> Result<TcpStream, TransportError> {
    TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })
}

/// Pops, packs and writes one record at a time so that a write failure
/// mid-batch loses at most the single in-flight record rather than
/// every record the pipe had queued. Records already drained and
/// written before the failure are gone for good; anything still sitting
/// in the pipe (never popped) survives for the next connection.
async fn send_until_error_or_stopped(
    stream: &mut TcpStream,
    pipe: &StreamPipe,
    descriptor: &subsys_core::RecordDescriptor,
    handle: &ChannelHandle,
    generation: Generation,
) {
    while handle.generation.is_current(generation) {
        let Some(record) = pipe.pop() else {
            tokio::select! {
                _ = tokio::time::sleep(RECHECK_DATA_IN_QUEUE_INTERVAL) => {}
                _ = handle.generation.changed() => {}
            }
            continue;
        };
        let buf = pack(descriptor, &record);
        if let Err(source) = stream
            .write_all(&buf)
            .await
            .map_err(TransportError::from)
        {
            tracing::warn!(error = %source, "tcp egress write failed, in-flight record lost");
            return;
        }
        handle.activity.record(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsys_core::endpoint::{Endpoint, Protocol};
    use subsys_core::{Context, FieldValue, RecordDescriptor, StreamPipe};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn sends_records_in_producer_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let ctx = Context::new(
            "m1",
            "front",
            Endpoint::new(Protocol::Mqtt, "127.0.0.1", 1883, vec![]),
            vec![],
            vec![],
            vec![],
        );
        ctx.egress
            .set_endpoint(Endpoint::new(Protocol::Tcp, "127.0.0.1", port, vec![]));

        let descriptor = RecordDescriptor::parse("uint32").unwrap();
        let pipe = StreamPipe::new("Raw", descriptor.clone());
        for i in 0..3u32 {
            pipe.push(vec![FieldValue::UInt32(i)]);
        }

        let generation = ctx.egress.generation.start();
        let handle = ctx.egress.clone();
        let worker = tokio::spawn(run_egress(handle.clone(), generation, pipe.clone()));

        let (mut accepted, _) = listener.accept().await.unwrap();
        let mut received = vec![0u8; 12];
        accepted.read_exact(&mut received).await.unwrap();

        let mut expected = Vec::new();
        for i in 0..3u32 {
            expected.extend_from_slice(&i.to_le_bytes());
        }
        assert_eq!(received, expected);

        handle.generation.halt();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), worker).await;
    }
}

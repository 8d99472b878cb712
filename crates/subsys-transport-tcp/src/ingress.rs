//! Raw-TCP ingress sink: binds and listens, treats every
//! connection as a concatenated sequence of fixed-size records, and
//! pushes parsed records into the ingress pipe.

use subsys_core::context::ChannelHandle;
use subsys_core::intervals::{CANCELLATION_CHECK_INTERVAL, READ_INTERVAL};
use subsys_core::schema::{unpack_all, RecordDescriptor};
use subsys_core::status::Status;
use subsys_core::token::Generation;
use subsys_core::StreamPipe;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use crate::error::TransportError;

async fn bind(addr: &str) -> Result<TcpListener, TransportError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Runs the TCP ingress sink until `generation` is no longer current on
/// `handle`. Spawned once per `start()`; failures to bind set the
/// channel's status to `Failure` and return immediately (unknown
/// protocol / fatal transport error).
pub async fn run_ingress(
    handle: ChannelHandle,
    generation: Generation,
    pipe: StreamPipe,
    descriptor: RecordDescriptor,
) {
    let endpoint = handle.endpoint();
    let addr = format!("{}:{}", endpoint.address, endpoint.port);

    let listener = match bind(&addr).await {
        Ok(listener) => listener,
        Err(source) => {
            tracing::error!(%addr, error = %source, "tcp ingress listener bind failed");
            handle.status.set(Status::Failure);
            return;
        }
    };
    tracing::info!(%addr, "tcp data sink connection listening");
    endpoint.set_active(true);

    loop {
        tokio::select! {
            biased;
            _ = handle.generation.changed() => {
                if !handle.generation.is_current(generation) {
                    break;
                }
            }
            _ = tokio::time::sleep(CANCELLATION_CHECK_INTERVAL) => {
                if !handle.generation.is_current(generation) {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!(%peer, "tcp data sink connection opened");
                        tokio::spawn(read_connection(
                            stream,
                            pipe.clone(),
                            handle.clone(),
                            generation,
                            descriptor.clone(),
                        ));
                    }
                    Err(source) => {
                        let source = TransportError::from(source);
                        tracing::error!(error = %source, "tcp ingress accept failed");
                    }
                }
            }
        }
    }

    endpoint.set_active(false);
    tracing::info!(%addr, "tcp data sink disconnecting");
}

async fn read_connection(
    mut stream: tokio::net::TcpStream,
    pipe: StreamPipe,
    handle: ChannelHandle,
    generation: Generation,
    descriptor: RecordDescriptor,
) {
    let mut carry: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];
    while handle.generation.is_current(generation) {
        let read = tokio::select! {
            biased;
            _ = tokio::time::sleep(READ_INTERVAL) => continue,
            read = stream.read(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                tracing::info!("tcp data sink connection closed by peer");
                break;
            }
            Ok(n) => {
                carry.extend_from_slice(&buf[..n]);
                let (records, rest) = unpack_all(&descriptor, &carry);
                let consumed = carry.len() - rest.len();
                let count = records.len();
                pipe.push_many(records);
                if count > 0 {
                    handle.activity.record(count);
                }
                carry.drain(..consumed);
            }
            Err(source) => {
                let source = TransportError::from(source);
                tracing::warn!(error = %source, "tcp data sink read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsys_core::endpoint::{Endpoint, Protocol};
    use subsys_core::{Context, FieldValue};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    fn ctx() -> std::sync::Arc<Context> {
        std::sync::Arc::new(Context::new(
            "m1",
            "front",
            Endpoint::new(Protocol::Mqtt, "127.0.0.1", 1883, vec![]),
            vec![],
            vec![],
            vec![],
        ))
    }

    #[tokio::test]
    async fn receives_and_unpacks_concatenated_records() {
        let ctx = ctx();
        let descriptor = RecordDescriptor::parse("uint32").unwrap();
        let pipe = StreamPipe::new("Raw", descriptor.clone());
        ctx.ingress
            .set_endpoint(Endpoint::new(Protocol::Tcp, "127.0.0.1", 0, vec![]));

        // bind an ephemeral port ourselves first so the test can learn it,
        // then hand the chosen port to run_ingress via the endpoint.
        let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);
        ctx.ingress
            .set_endpoint(Endpoint::new(Protocol::Tcp, "127.0.0.1", port, vec![]));

        let generation = ctx.ingress.generation.start();
        let handle = ctx.ingress.clone();
        let pipe_clone = pipe.clone();
        let worker = tokio::spawn(run_ingress(handle.clone(), generation, pipe_clone, descriptor));

        // give the listener a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&7u32.to_le_bytes());
        payload.extend_from_slice(&9u32.to_le_bytes());
        stream.write_all(&payload).await.unwrap();
        stream.flush().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let records = pipe.drain_up_to(10);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], FieldValue::UInt32(7));
        assert_eq!(records[1][0], FieldValue::UInt32(9));

        handle.generation.halt();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), worker).await;
    }
}

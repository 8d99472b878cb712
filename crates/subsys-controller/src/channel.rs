//! Starting, stopping, and halting the ingress/egress channel workers:
//! dispatches to the right transport crate by endpoint protocol and
//! wraps the generation token's discipline with the purge/join
//! machinery from `subsys-core`.

use std::sync::Arc;

use subsys_core::context::ChannelHandle;
use subsys_core::endpoint::Protocol;
use subsys_core::lifecycle::{join_with_timeout, spawn_purge};
use subsys_core::status::Status;
use subsys_core::{topic_key, Context, StreamPipe};
use tokio::task::JoinHandle;

/// Starts the ingress channel's worker for its currently assigned
/// endpoint. Sets status=FAILURE and returns `None` for an unknown
/// protocol, refusing to start.
pub fn start_ingress(ctx: &Arc<Context>) -> Option<JoinHandle<()>> {
    let handle = ctx.ingress.clone();
    let endpoint = handle.endpoint();
    let pipe = ctx.ingress_pipe();
    let descriptor = pipe.descriptor().clone();
    let generation = handle.generation.start();
    match endpoint.protocol {
        Protocol::Tcp => Some(tokio::spawn(subsys_transport_tcp::run_ingress(
            handle, generation, pipe, descriptor,
        ))),
        Protocol::Mqtt | Protocol::Mqtts => Some(tokio::spawn(subsys_transport_mqtt::run_ingress(
            handle, generation, pipe, descriptor,
        ))),
        Protocol::Unknown => {
            tracing::error!("ingress endpoint has unknown protocol, refusing to start");
            handle.status.set(Status::Failure);
            None
        }
    }
}

/// Starts the egress channel's worker. The TCP sender forwards a single
/// pipe, the one named by the endpoint's configured topic, found by
/// deriving its key from the endpoint's first topic; the MQTT publisher
/// is handed every output pipe and matches each to its own topic
/// internally.
pub fn start_egress(ctx: &Arc<Context>) -> Option<JoinHandle<()>> {
    let handle = ctx.egress.clone();
    let endpoint = handle.endpoint();
    let generation = handle.generation.start();
    match endpoint.protocol {
        Protocol::Tcp => {
            let pipe = endpoint
                .topics
                .first()
                .and_then(|topic| ctx.find_pipe(topic_key(topic)))
                .cloned();
            match pipe {
                Some(pipe) => Some(tokio::spawn(subsys_transport_tcp::run_egress(
                    handle, generation, pipe,
                ))),
                None => {
                    tracing::error!("tcp egress endpoint names no matching output pipe");
                    handle.status.set(Status::Failure);
                    None
                }
            }
        }
        Protocol::Mqtt | Protocol::Mqtts => {
            let pipes = ctx.output_pipes.clone();
            Some(tokio::spawn(subsys_transport_mqtt::run_egress(
                handle, generation, pipes,
            )))
        }
        Protocol::Unknown => {
            tracing::error!("egress endpoint has unknown protocol, refusing to start");
            handle.status.set(Status::Failure);
            None
        }
    }
}

/// Flags the channel's generation as halted without joining or purging;
/// used when reconfiguring the endpoint out from under a still-running
/// worker (the source's bare `halt()`, called from the `Incoming` and
/// `Outgoing` handlers).
pub fn halt(handle: &ChannelHandle) {
    handle.generation.halt();
}

/// Full stop: halts, joins the worker with a timeout, then launches a
/// background purge of every pipe the channel feeds until the next
/// start. Egress may drive several output pipes at once; ingress
/// always passes a single-element vec.
pub async fn stop(handle: &ChannelHandle, worker: JoinHandle<()>, pipes: Vec<StreamPipe>) {
    handle.generation.halt();
    join_with_timeout(worker).await;
    for pipe in pipes {
        spawn_purge(pipe, handle.clone());
    }
}

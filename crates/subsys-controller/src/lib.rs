//! The broker control-plane state machine: owns a dedicated
//! MQTT(S) client to the configured broker, subscribes through the
//! boot → chain-unknown → chain-known sequence, applies every inbound
//! control-plane message to the shared [`subsys_core::Context`], and
//! drives the 1-second tick that starts/stops the data-plane channels
//! and publishes `Definition`/`Status`/`Rates`.

mod channel;
mod handlers;
mod messages;
mod tick;
mod topics;

use std::sync::Arc;

use rumqttc::{Event, Packet, QoS};
use subsys_core::intervals::CANCELLATION_CHECK_INTERVAL;
use subsys_core::Context;

/// Runs the controller until `ctx.is_terminated()`. Does not return
/// before then; callers typically `tokio::spawn` this alongside whatever
/// host-process logic owns the `Context`'s lifetime.
pub async fn run(ctx: Arc<Context>) {
    let (client, mut eventloop) = subsys_transport_mqtt::build_client(
        &ctx.module_uid,
        "control",
        ctx.broker.protocol,
        &ctx.broker.address,
        ctx.broker.port,
    );

    tracing::info!(
        addr = %ctx.broker.address,
        port = ctx.broker.port,
        "mqtt controller connecting"
    );

    let mut workers = tick::Workers::default();
    let mut definition_tick_counter = 0u32;
    let mut ticker = tokio::time::interval(CANCELLATION_CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while !ctx.is_terminated() {
        tokio::select! {
            biased;
            _ = ticker.tick() => {
                tick::run(&ctx, &client, &mut workers, &mut definition_tick_counter).await;
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("mqtt controller connected");
                        ctx.broker.set_active(true);
                        if let Err(source) = client.subscribe(topics::SELECTED_CHAIN, QoS::AtMostOnce).await {
                            tracing::error!(error = %source, "controller failed to subscribe to SelectedChain");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        handlers::handle_message(&ctx, &client, &publish.topic, &publish.payload).await;
                    }
                    Ok(_) => {}
                    Err(source) => {
                        tracing::warn!(error = %source, "mqtt controller disconnected");
                        ctx.broker.set_active(false);
                    }
                }
            }
        }
    }

    shutdown(&ctx, &client, workers).await;
}

async fn shutdown(ctx: &Arc<Context>, client: &rumqttc::AsyncClient, mut workers: tick::Workers) {
    tracing::info!("mqtt controller shutting down");
    ctx.set_is_chain_running(false);
    if let Some(worker) = workers.ingress.take() {
        channel::stop(&ctx.ingress, worker, vec![ctx.ingress_pipe()]).await;
    }
    if let Some(worker) = workers.egress.take() {
        channel::stop(&ctx.egress, worker, ctx.output_pipes.clone()).await;
    }
    if let Err(source) = client.disconnect().await {
        tracing::warn!(error = %source, "mqtt controller disconnect failed");
    }
    ctx.broker.set_active(false);
}

//! The controller's 1-second periodic tick: channel start/stop
//! gating, the every-4th-tick `Definition`/re-init republish, and the
//! every-tick `Status`/`Rates` publications.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};
use subsys_core::endpoint::Protocol;
use subsys_core::Context;

use crate::messages::{DefinitionMsg, RatesMsg};
use crate::{channel, topics};
use tokio::task::JoinHandle;

/// Live worker handles the tick loop owns across iterations; channel.rs
/// only dispatches starts, so whatever it returns has to be kept
/// somewhere to join/stop later.
#[derive(Default)]
pub struct Workers {
    pub ingress: Option<JoinHandle<()>>,
    pub egress: Option<JoinHandle<()>>,
}

/// Every 4th controller tick.
const DEFINITION_TICK_PERIOD: u32 = 4;

/// Runs one controller tick: gates channel start/stop on `is_running`,
/// then publishes `Definition` (every 4th tick), `Status` (every tick),
/// and `Rates` (every tick while chained).
pub async fn run(ctx: &Arc<Context>, client: &AsyncClient, workers: &mut Workers, counter: &mut u32) {
    gate_channels(ctx, workers).await;

    *counter = (*counter + 1) % DEFINITION_TICK_PERIOD;
    if *counter == 0 {
        publish_definition(ctx, client).await;
        republish_stale(ctx, client).await;
    }

    publish_status(ctx, client).await;

    let chain = ctx.chain_uid();
    if !chain.is_empty() && ctx.is_subsystem_chained() {
        publish_rates(ctx, client, &chain).await;
    }
}

async fn gate_channels(ctx: &Arc<Context>, workers: &mut Workers) {
    if ctx.is_running() {
        if ctx.ingress.endpoint().protocol != Protocol::Unknown && !ctx.ingress.generation.is_started() {
            workers.ingress = channel::start_ingress(ctx);
        }
        if ctx.egress.endpoint().protocol != Protocol::Unknown && !ctx.egress.generation.is_started() {
            workers.egress = channel::start_egress(ctx);
        }
    } else {
        if ctx.ingress.generation.is_started() {
            if let Some(worker) = workers.ingress.take() {
                channel::stop(&ctx.ingress, worker, vec![ctx.ingress_pipe()]).await;
            }
        }
        if ctx.egress.generation.is_started() {
            if let Some(worker) = workers.egress.take() {
                channel::stop(&ctx.egress, worker, ctx.output_pipes.clone()).await;
            }
        }
    }
}

async fn publish_definition(ctx: &Arc<Context>, client: &AsyncClient) {
    let streams: Vec<&str> = ctx.output_pipes.iter().map(|pipe| pipe.key()).collect();
    let payload = serde_json::to_string(&DefinitionMsg {
        label: &ctx.module_name,
        streams,
    })
    .expect("definition json is always serializable");
    publish(client, &topics::definition(&ctx.module_uid), payload, true).await;
}

async fn republish_stale(ctx: &Arc<Context>, client: &AsyncClient) {
    let chain = ctx.chain_uid();
    if chain.is_empty() || !ctx.is_subsystem_chained() {
        return;
    }
    let module = &ctx.module_uid;
    for data_item in &ctx.data_items {
        if data_item.deadline().is_elapsed() {
            let topic = topics::data_interpretation_topic(&chain, module, data_item.key());
            publish(client, &topic, data_item.encode(), true).await;
        }
    }
    for control in &ctx.controls {
        if control.deadline().is_elapsed() {
            let topic = topics::control_topic(&chain, module, control.uid());
            publish(client, &topic, control.encode(), true).await;
        }
    }
}

async fn publish_status(ctx: &Arc<Context>, client: &AsyncClient) {
    let status = ctx.aggregated_status();
    publish(client, &topics::status(&ctx.module_uid), status.as_wire_str(), false).await;
}

async fn publish_rates(ctx: &Arc<Context>, client: &AsyncClient, chain: &str) {
    let (total, errors) = ctx.advance_rates_tick();
    let payload = serde_json::to_string(&RatesMsg { total, errors })
        .expect("rates json is always serializable");
    publish(client, &topics::rates(chain, &ctx.module_uid), payload, false).await;
}

async fn publish(client: &AsyncClient, topic: &str, payload: impl Into<Vec<u8>>, retain: bool) {
    if let Err(source) = client.publish(topic, QoS::AtMostOnce, retain, payload).await {
        tracing::warn!(%topic, error = %source, "controller publish failed");
    }
}

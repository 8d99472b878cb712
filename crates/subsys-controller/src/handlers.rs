//! Per-topic handlers for the control-plane state machine.
//!
//! Subscriptions evolve in three stages as the chain-join sequence plays
//! out: `SelectedChain` is the only subscription at boot; once it's
//! received, `Chains/<c>/Setup` and `Chains/<c>/Setup/SubSystems` are
//! added; once the subsystem sees itself named on the latter, the
//! per-module control, data, and channel-configuration topics follow.
//! Subscribing again is harmless (the broker just re-confirms), so this
//! module tracks no separate stage enum — it re-derives what to do from
//! `Context`'s own chain_uid/is_subsystem_chained fields, the same way
//! the source implementation did.

use std::sync::Arc;

use rumqttc::{AsyncClient, QoS};
use subsys_core::endpoint::{Endpoint, Protocol};
use subsys_core::schema::RecordDescriptor;
use subsys_core::status::Status;
use subsys_core::{Context, SensorOrigin, StreamPipe};

use crate::messages::{IncomingMsg, OutgoingMsg, SelectedChainMsg, SetupMsg};
use crate::{channel, topics};

/// Routes one inbound broker message to its handler, given the current
/// chain/module identity on `ctx`.
pub async fn handle_message(ctx: &Arc<Context>, client: &AsyncClient, topic: &str, payload: &[u8]) {
    if topic == topics::SELECTED_CHAIN {
        handle_selected_chain(ctx, client, payload).await;
        return;
    }

    let chain = ctx.chain_uid();
    if chain.is_empty() {
        return;
    }
    if topic == topics::chain_setup(&chain) {
        handle_setup(ctx, payload);
        return;
    }
    if topic == topics::chain_subsystems(&chain) {
        handle_subsystems(ctx, client, payload).await;
        return;
    }

    if !ctx.is_subsystem_chained() {
        return;
    }
    let module = ctx.module_uid.clone();
    if let Some(uid) = topics::strip_control_uid(topic, &chain, &module) {
        handle_control(ctx, client, topic, uid, payload).await;
    } else if let Some(key) = topics::strip_data_interpretation(topic, &chain, &module) {
        handle_data_interpretation(ctx, client, topic, key, payload).await;
    } else if topic == topics::incoming(&chain, &module) {
        handle_incoming(ctx, &chain, payload);
    } else if topic == topics::outgoing(&chain, &module) {
        handle_outgoing(ctx, &chain, &module, payload);
    }
}

async fn handle_selected_chain(ctx: &Arc<Context>, client: &AsyncClient, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    let msg: SelectedChainMsg = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(source) => {
            tracing::warn!(error = %source, "SelectedChain payload is not valid JSON");
            return;
        }
    };
    ctx.set_chain_uid(msg.id.clone());
    ctx.set_is_chain_running(msg.is_running);
    subscribe(client, &topics::chain_setup(&msg.id)).await;
    subscribe(client, &topics::chain_subsystems(&msg.id)).await;
}

fn handle_setup(ctx: &Arc<Context>, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }
    match serde_json::from_slice::<SetupMsg>(payload) {
        Ok(msg) => ctx.set_sensor_origin(SensorOrigin {
            latitude: msg.origin.latitude,
            longitude: msg.origin.longitude,
        }),
        Err(source) => tracing::warn!(error = %source, "Setup payload is not valid JSON"),
    }
}

async fn handle_subsystems(ctx: &Arc<Context>, client: &AsyncClient, payload: &[u8]) {
    if payload.is_empty() {
        ctx.set_is_subsystem_chained(false);
        return;
    }
    let members: Vec<String> = match serde_json::from_slice(payload) {
        Ok(members) => members,
        Err(source) => {
            tracing::warn!(error = %source, "Setup/SubSystems payload is not valid JSON");
            return;
        }
    };
    let chained = members.iter().any(|m| m == &ctx.module_uid);
    ctx.set_is_subsystem_chained(chained);
    ctx.ingress.status.set(Status::Operational);
    ctx.egress.status.set(Status::Operational);
    if !chained {
        return;
    }

    let chain = ctx.chain_uid();
    let module = &ctx.module_uid;
    subscribe(client, &topics::controls_wildcard(&chain, module)).await;
    subscribe(client, &topics::data_interpretation_wildcard(&chain, module)).await;
    subscribe(client, &topics::incoming(&chain, module)).await;
    subscribe(client, &topics::outgoing(&chain, module)).await;
    for control in &ctx.controls {
        control.deadline().reset();
    }
    for data_item in &ctx.data_items {
        data_item.deadline().reset();
    }
}

async fn handle_control(ctx: &Arc<Context>, client: &AsyncClient, topic: &str, uid: &str, payload: &[u8]) {
    match ctx.find_control(uid) {
        Some(control) => {
            if let Err(source) = control.decode(payload) {
                tracing::warn!(%uid, error = %source, "control payload decode failed");
            }
        }
        None if !payload.is_empty() => clear_retained(client, topic).await,
        None => {}
    }
}

async fn handle_data_interpretation(ctx: &Arc<Context>, client: &AsyncClient, topic: &str, key: &str, payload: &[u8]) {
    match ctx.find_data_item(key) {
        Some(data_item) => {
            if let Err(source) = data_item.apply_interpretation(payload) {
                tracing::warn!(%key, error = %source, "data item interpretation decode failed");
            }
        }
        None if !payload.is_empty() => clear_retained(client, topic).await,
        None => {}
    }
}

fn handle_incoming(ctx: &Arc<Context>, chain: &str, payload: &[u8]) {
    channel::halt(&ctx.ingress);
    if payload.is_empty() {
        ctx.ingress.set_endpoint(Endpoint::unknown());
        return;
    }
    let msg: IncomingMsg = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(source) => {
            tracing::warn!(error = %source, "Incoming payload is not valid JSON");
            return;
        }
    };
    let protocol = Protocol::from_wire(&msg.protocol);

    let mut last_key: Option<String> = None;
    let topics: Vec<String> = msg
        .topics
        .iter()
        .map(|key| {
            last_key = Some(key.clone());
            match &msg.source {
                Some(source) => topics::data_records_topic(chain, source, key),
                None => key.clone(),
            }
        })
        .collect();

    if let Some(layout) = &msg.layout {
        match RecordDescriptor::parse(layout) {
            Ok(descriptor) => {
                let key = last_key.clone().unwrap_or_default();
                ctx.set_ingress_pipe(StreamPipe::new(key, descriptor));
            }
            Err(source) => {
                tracing::error!(error = %source, "Incoming layout does not parse, keeping prior schema");
                ctx.ingress.status.set(Status::Failure);
            }
        }
    } else if let Some(key) = last_key {
        let descriptor = ctx.ingress_pipe().descriptor().clone();
        ctx.set_ingress_pipe(StreamPipe::new(key, descriptor));
    }

    ctx.ingress.set_endpoint(Endpoint::new(protocol, msg.ip, msg.port, topics));
}

fn handle_outgoing(ctx: &Arc<Context>, chain: &str, module: &str, payload: &[u8]) {
    channel::halt(&ctx.egress);
    if payload.is_empty() {
        ctx.egress.set_endpoint(Endpoint::unknown());
        return;
    }
    let msg: OutgoingMsg = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(source) => {
            tracing::warn!(error = %source, "Outgoing payload is not valid JSON");
            return;
        }
    };
    let protocol = Protocol::from_wire(&msg.protocol);
    let topics: Vec<String> = ctx
        .output_pipes
        .iter()
        .map(|pipe| topics::data_records_topic(chain, module, pipe.key()))
        .collect();
    ctx.egress.set_endpoint(Endpoint::new(protocol, msg.ip, msg.port, topics));
}

async fn subscribe(client: &AsyncClient, topic: &str) {
    if let Err(source) = client.subscribe(topic, QoS::AtMostOnce).await {
        tracing::error!(%topic, error = %source, "controller subscribe failed");
    }
}

async fn clear_retained(client: &AsyncClient, topic: &str) {
    if let Err(source) = client.publish(topic, QoS::AtMostOnce, true, "").await {
        tracing::error!(%topic, error = %source, "controller failed to clear stale retained topic");
    }
}

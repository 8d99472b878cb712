//! MQTT(S) egress publisher: CSV-encodes each pipe's queued
//! records on a bounded worker pool (the "write phase"), then publishes
//! the resulting payloads in order on the channel's own task (the
//! "send phase").

use std::collections::VecDeque;
use std::sync::Arc;

use csv::{QuoteStyle, WriterBuilder};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use tokio::sync::Semaphore;

use subsys_core::activity::ActivityQueue;
use subsys_core::context::ChannelHandle;
use subsys_core::intervals::{CSV_ENCODE_POOL_SIZE, MAX_SEND_BLOCK_BYTE_SIZE, MQTT_SEND_INTERVAL};
use subsys_core::token::Generation;
use subsys_core::{topic_key, Record, StreamPipe};

use crate::client::build_client;

/// One topic's FIFO of ready-to-publish CSV payloads, fed by the write
/// phase and drained by the send phase.
struct Block {
    topic: String,
    pipe: StreamPipe,
    payloads: Mutex<VecDeque<String>>,
}

/// Runs the MQTT egress publisher until `generation` is no longer
/// current. `pipes` is the full set of this subsystem's output pipes;
/// only those named by `endpoint.topics` (via [`topic_key`]) get a block.
pub async fn run_egress(handle: ChannelHandle, generation: Generation, pipes: Vec<StreamPipe>) {
    let endpoint = handle.endpoint();
    let (client, mut eventloop) = build_client(
        &handle.module_uid,
        "outgoing",
        endpoint.protocol,
        &endpoint.address,
        endpoint.port,
    );

    let blocks: Vec<Arc<Block>> = endpoint
        .topics
        .iter()
        .filter_map(|topic| {
            let key = topic_key(topic);
            pipes.iter().find(|p| p.key() == key).map(|pipe| {
                Arc::new(Block {
                    topic: topic.clone(),
                    pipe: pipe.clone(),
                    payloads: Mutex::new(VecDeque::new()),
                })
            })
        })
        .collect();

    tracing::info!(addr = %endpoint.address, port = endpoint.port, "mqtt publisher connecting");

    let driver_generation = generation;
    let driver_handle = handle.clone();
    let driver_endpoint = endpoint.clone();
    let driver = tokio::spawn(async move {
        while driver_handle.generation.is_current(driver_generation) {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("mqtt publisher connected");
                    driver_endpoint.set_active(true);
                }
                Ok(_) => {}
                Err(source) => {
                    tracing::warn!(error = %source, "mqtt publisher disconnected");
                    driver_endpoint.set_active(false);
                    break;
                }
            }
        }
    });

    let semaphore = Arc::new(Semaphore::new(CSV_ENCODE_POOL_SIZE));

    while handle.generation.is_current(generation) {
        let tick_deadline = tokio::time::Instant::now() + MQTT_SEND_INTERVAL;

        // Send phase: publish whatever the previous tick's write phase produced.
        for block in &blocks {
            send_block(&client, block).await;
        }

        // Write phase: encode this tick's queued records concurrently,
        // bounded by the shared CSV-encoding pool.
        let mut writers = Vec::with_capacity(blocks.len());
        for block in &blocks {
            if block.pipe.is_empty() {
                continue;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("csv encode semaphore is never closed");
            let block = block.clone();
            let activity = handle.activity.clone();
            writers.push(tokio::spawn(async move {
                let _permit = permit;
                write_block(&block, &activity);
            }));
        }
        for writer in writers {
            let _ = writer.await;
        }

        tokio::select! {
            biased;
            _ = handle.generation.changed() => {}
            _ = tokio::time::sleep_until(tick_deadline) => {}
        }
    }

    driver.abort();
    endpoint.set_active(false);
    tracing::info!("mqtt publisher disconnecting");
}

async fn send_block(client: &AsyncClient, block: &Arc<Block>) {
    let payloads: Vec<String> = block.payloads.lock().drain(..).collect();
    for payload in payloads {
        if let Err(source) = client
            .publish(block.topic.as_str(), QoS::AtMostOnce, false, payload)
            .await
        {
            tracing::warn!(topic = %block.topic, error = %source, "mqtt publish failed");
        }
    }
}

/// Encodes this tick's queued records into one or more CSV payloads,
/// chunked so each stays under `MAX_SEND_BLOCK_BYTE_SIZE` (the
/// byte-estimation heuristic: pop one entry to estimate per-entry size,
/// derive a block count from the total, then chunk contiguously).
fn write_block(block: &Block, activity: &ActivityQueue) {
    let entries = block.pipe.drain_all();
    if entries.is_empty() {
        return;
    }
    activity.record(entries.len());

    let per_entry = estimate_entry_size(&entries[0]);
    let total_size = entries.len() * per_entry;
    let num_blocks = (total_size / MAX_SEND_BLOCK_BYTE_SIZE).max(1);
    let chunk_len = (entries.len() / num_blocks).max(1);

    let mut payloads = Vec::new();
    for chunk in entries.chunks(chunk_len) {
        match encode_chunk(chunk) {
            Ok(payload) => payloads.push(payload),
            Err(source) => {
                tracing::warn!(error = %source, "mqtt csv writer terminated early, dropping chunk");
            }
        }
    }
    block.payloads.lock().extend(payloads);
}

fn estimate_entry_size(record: &Record) -> usize {
    let raw: usize = record.iter().map(|v| v.to_string().len()).sum();
    ((raw as f64) * 1.2).ceil() as usize
}

fn encode_chunk(chunk: &[Record]) -> Result<String, crate::error::TransportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .has_headers(false)
        .from_writer(Vec::new());
    for record in chunk {
        let fields: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        writer.write_record(&fields)?;
    }
    let bytes = writer
        .into_inner()
        .expect("writing CSV to an in-memory Vec<u8> never fails");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsys_core::FieldValue;

    #[test]
    fn encode_chunk_quotes_non_numeric_fields_only() {
        let chunk = vec![vec![
            FieldValue::UInt64(42),
            FieldValue::Float(1.5),
            FieldValue::Str("hi".into()),
        ]];
        let payload = encode_chunk(&chunk).unwrap();
        assert_eq!(payload, "42,1.5,\"hi\"\n");
    }

    #[test]
    fn write_block_splits_into_byte_bounded_chunks() {
        let descriptor = subsys_core::RecordDescriptor::parse("string_4000").unwrap();
        let pipe = StreamPipe::new("Raw", descriptor);
        for _ in 0..20 {
            pipe.push(vec![FieldValue::Str("x".repeat(3000))]);
        }
        let block = Block {
            topic: "t".into(),
            pipe: pipe.clone(),
            payloads: Mutex::new(VecDeque::new()),
        };
        let activity = ActivityQueue::new();
        write_block(&block, &activity);
        let payloads = block.payloads.lock();
        assert!(payloads.len() > 1, "large batch must split across multiple payloads");
        for payload in payloads.iter() {
            assert!(payload.len() <= MAX_SEND_BLOCK_BYTE_SIZE * 2);
        }
        assert_eq!(activity.drain_total(), 20);
    }
}

//! MQTT(S) ingress subscriber: subscribes to every topic on the
//! endpoint, decodes each inbound payload as newline-separated CSV rows,
//! and pushes the parsed records into the ingress pipe.

use rumqttc::{Event, Packet, QoS};
use subsys_core::context::ChannelHandle;
use subsys_core::intervals::CANCELLATION_CHECK_INTERVAL;
use subsys_core::schema::{parse_row, RecordDescriptor};
use subsys_core::token::Generation;
use subsys_core::StreamPipe;

use crate::client::build_client;

/// Runs the MQTT ingress subscriber until `generation` is no longer
/// current on `handle`. One inbound message becomes one activity sample
/// (the line count) and zero or more parsed records.
pub async fn run_ingress(
    handle: ChannelHandle,
    generation: Generation,
    pipe: StreamPipe,
    descriptor: RecordDescriptor,
) {
    let endpoint = handle.endpoint();
    let (client, mut eventloop) =
        build_client(&handle.module_uid, "incoming", endpoint.protocol, &endpoint.address, endpoint.port);

    for topic in &endpoint.topics {
        if let Err(source) = client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
            tracing::error!(%topic, error = %source, "mqtt subscriber subscribe failed");
        }
    }

    tracing::info!(addr = %endpoint.address, port = endpoint.port, "mqtt subscriber connecting");

    while handle.generation.is_current(generation) {
        let event = tokio::select! {
            biased;
            _ = handle.generation.changed() => break,
            _ = tokio::time::sleep(CANCELLATION_CHECK_INTERVAL) => continue,
            event = eventloop.poll() => event,
        };
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("mqtt subscriber connected");
                endpoint.set_active(true);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&pipe, &handle, &descriptor, &publish.payload);
            }
            Ok(_) => {}
            Err(source) => {
                tracing::warn!(error = %source, "mqtt subscriber disconnected");
                endpoint.set_active(false);
                break;
            }
        }
    }

    endpoint.set_active(false);
    tracing::info!("mqtt subscriber disconnecting");
}

fn handle_publish(pipe: &StreamPipe, handle: &ChannelHandle, descriptor: &RecordDescriptor, payload: &[u8]) {
    let Ok(text) = std::str::from_utf8(payload) else {
        tracing::warn!("mqtt subscriber dropped non-utf8 payload");
        return;
    };
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return;
    }
    handle.activity.record(lines.len());
    for line in lines {
        match parse_csv_line(descriptor, line) {
            Ok(record) => pipe.push(record),
            Err(source) => {
                tracing::warn!(%line, error = %source, "mqtt subscriber dropped unparsable row");
            }
        }
    }
}

fn parse_csv_line(
    descriptor: &RecordDescriptor,
    line: &str,
) -> Result<subsys_core::schema::Record, crate::error::TransportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    let mut records = reader.records();
    let row = match records.next() {
        Some(row) => row?,
        None => csv::StringRecord::new(),
    };
    parse_row(descriptor, row.iter()).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_line_splits_quoted_and_numeric_fields() {
        let descriptor = RecordDescriptor::parse("uint64,float,string_8").unwrap();
        let record = parse_csv_line(&descriptor, r#"42,1.5,"hi there""#).unwrap();
        assert_eq!(
            record,
            vec![
                subsys_core::FieldValue::UInt64(42),
                subsys_core::FieldValue::Float(1.5),
                subsys_core::FieldValue::Str("hi there".into()),
            ]
        );
    }
}

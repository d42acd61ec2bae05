//! Remote commands against a simulated device

#![allow(clippy::disallowed_methods)]

mod support;

use edgelink_codec::{CommandTable, RegisterCommand, ValueType};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use acqsrv::{AcqConfig, AcqService, ChannelTransport, CommandHandler, SampleValue};
use support::{measurement, scheduler, SimDevice};

fn handler(device: Arc<SimDevice>) -> CommandHandler {
    let mut table = CommandTable::new();
    table.insert(
        "SERIAL",
        RegisterCommand::new(100, ValueType::String)
            .with_count(2)
            .with_uom("text"),
    );
    let reference = vec![measurement(json!({
        "SENSOR_TYPE": "UNLOCK", "REGISTER_NUMBER": 9, "OPERATION": "WRITE", "VALUE": 1
    }))];
    CommandHandler::new(scheduler(device).with_commands(Arc::new(table)), "PUMP")
        .with_reference(reference)
}

#[tokio::test]
async fn test_modbus_read_command() {
    let device = SimDevice::new();
    device.set(1, 21);
    let reply = handler(device)
        .handle(r#"{"PROTOCOL": "MODBUS", "REGISTER_NUMBER": 1}"#)
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.payloads.len(), 1);
    let payload = &reply.payloads[0];
    assert_eq!(payload.name, "REGISTER_1");
    assert_eq!(payload.machine_type, "PUMP");
    assert_eq!(payload.value, SampleValue::Scalar(21.0));
}

#[tokio::test]
async fn test_raw_command_uses_table_entry() {
    let device = SimDevice::new();
    device.set(100, 0x4142);
    device.set(101, 0x3132);
    let reply = handler(device)
        .handle(r#"{"PROTOCOL": "DEVICE", "COMMAND": "SERIAL"}"#)
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.payloads[0].name, "SERIAL");
    assert_eq!(reply.payloads[0].value, SampleValue::Text("AB12".into()));
    assert_eq!(reply.payloads[0].uom.as_deref(), Some("text"));
}

#[tokio::test]
async fn test_write_command_with_configured_interlock() {
    let device = SimDevice::new();
    let reply = handler(device.clone())
        .handle(
            r#"{
                "PROTOCOL": "MODBUS",
                "REGISTER_NUMBER": 60,
                "VALUE_TYPE": "INT16",
                "OPERATION": "WRITE",
                "VALUE": -5,
                "PRE_WRITE_COMMAND": "UNLOCK"
            }"#,
        )
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(device.writes(), vec![(9, vec![1]), (60, vec![0xFFFB])]);
    assert_eq!(reply.payloads[0].value, SampleValue::Scalar(-5.0));
}

#[tokio::test]
async fn test_batch_reports_every_sample_and_tolerates_failures() {
    let device = SimDevice::new();
    device.set(1, 3);
    device.fail_reads_at(2);
    let body = json!({
        "PROTOCOL": "MODBUS",
        "COMMANDS": [
            {"SENSOR_TYPE": "A", "REGISTER_NUMBER": 1},
            {"SENSOR_TYPE": "B", "REGISTER_NUMBER": 2},
            {"SENSOR_TYPE": "C", "REGISTER_NUMBER": 1}
        ]
    });
    let reply = handler(device).handle(&body.to_string()).await;

    assert_eq!(reply.status, 200);
    let names: Vec<&str> = reply.payloads.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C"]);

    let wire = serde_json::to_value(&reply).unwrap();
    assert_eq!(wire["status"], 200);
    assert!(wire.get("error").is_none());
}

#[tokio::test]
async fn test_commands_are_served_while_acquisition_runs() {
    let config = AcqConfig {
        machine_type: "PUMP".into(),
        measurements: vec![json!({"SENSOR_TYPE": "CONSTANT", "FUNCTION": "2 + 2"})],
        ..AcqConfig::default()
    };
    let (transport, mut batches) = ChannelTransport::channel(8);
    let (transport, client) = transport.with_command_channel(4);
    let service = AcqService::build(&config, Arc::new(transport)).await.unwrap();

    let shutdown = CancellationToken::new();
    let running = tokio::spawn(service.run(shutdown.clone()));

    let batch = tokio::time::timeout(Duration::from_secs(5), batches.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.payloads[0].name, "CONSTANT");

    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        client.send(r#"{"SENSOR_TYPE": "ANSWER", "FUNCTION": "6 * 7"}"#),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.payloads[0].name, "ANSWER");
    assert_eq!(reply.payloads[0].machine_type, "PUMP");
    assert_eq!(reply.payloads[0].value, SampleValue::Scalar(42.0));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

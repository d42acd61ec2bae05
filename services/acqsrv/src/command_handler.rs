//! Remote command handling
//!
//! A command is one measurement descriptor, or `{"COMMANDS": [...]}` where
//! every other top-level key is shared by the listed commands. Commands run
//! as ad hoc measurements through one full cycle and answer with the
//! payloads of that cycle.

use chrono::Utc;
use errors::{AcqError, AcqResult, ErrorInfo};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::measurement::descriptor::merge_defaults;
use crate::measurement::{Measurement, MeasurementDescriptor, Payload};
use crate::scheduler::Scheduler;

/// Reply returned to the command's sender
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReply {
    pub status: u16,
    pub payloads: Vec<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl CommandReply {
    fn ok(payloads: Vec<Payload>) -> Self {
        Self {
            status: 200,
            payloads,
            error: None,
        }
    }

    /// Anything that fails before the cycle runs is the sender's fault
    fn malformed(error: &AcqError) -> Self {
        Self {
            status: 400,
            payloads: Vec::new(),
            error: Some(error.to_error_info().with_code(400)),
        }
    }
}

pub struct CommandHandler {
    scheduler: Scheduler,
    machine_type: String,
    /// Configured measurements, available as interlock companions
    reference: Vec<Measurement>,
}

impl CommandHandler {
    pub fn new(scheduler: Scheduler, machine_type: impl Into<String>) -> Self {
        Self {
            scheduler,
            machine_type: machine_type.into(),
            reference: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: Vec<Measurement>) -> Self {
        self.reference = reference;
        self
    }

    pub async fn handle(&self, body: &str) -> CommandReply {
        let mut measurements = match self.parse(body) {
            Ok(measurements) => measurements,
            Err(e) => {
                warn!("Rejected remote command: {}", e);
                return CommandReply::malformed(&e);
            },
        };

        let outcome = self
            .scheduler
            .run_cycle(&mut measurements, &self.reference, Utc::now())
            .await;
        let payloads: Vec<Payload> = outcome
            .accepted
            .iter()
            .filter_map(|&i| measurements.get_mut(i).map(|m| m.materialize_payloads(true)))
            .flatten()
            .collect();

        info!(
            "Remote command: {} measurements, {} payloads, {} failed",
            measurements.len(),
            payloads.len(),
            outcome.failed
        );
        CommandReply::ok(payloads)
    }

    fn parse(&self, body: &str) -> AcqResult<Vec<Measurement>> {
        let Value::Object(mut root) = serde_json::from_str::<Value>(body)? else {
            return Err(AcqError::configuration("command must be a JSON object"));
        };

        let (shared, commands) = match root.remove("COMMANDS") {
            Some(Value::Array(commands)) => (root, commands),
            Some(other) => {
                return Err(AcqError::configuration(format!(
                    "COMMANDS must be a list, got {}",
                    other
                )))
            },
            None => (Map::new(), vec![Value::Object(root)]),
        };

        commands
            .iter()
            .map(|raw| {
                let Value::Object(mut fields) = merge_defaults(&shared, raw)? else {
                    return Err(AcqError::configuration("command must be a JSON object"));
                };
                normalize(&mut fields);
                MeasurementDescriptor::from_value(&Map::new(), &Value::Object(fields))?
                    .build(&self.machine_type, self.scheduler.commands())
            })
            .collect()
    }
}

/// Ad hoc defaults: every sample is reported, the kind comes from `PROTOCOL`
/// and a missing name is derived from the kind
fn normalize(fields: &mut Map<String, Value>) {
    fields.insert("SKIP_SAME_VALUE".into(), Value::Bool(false));

    let protocol = match fields
        .get("PROTOCOL")
        .and_then(Value::as_str)
        .map(str::to_uppercase)
        .as_deref()
    {
        Some("MODBUS") => "MODBUS",
        None | Some("FUNCTION") => "FUNCTION",
        Some("QUERY") => "QUERY",
        Some("BITMASK") => "BITMASK",
        Some(_) => "RAW",
    };
    fields.insert("PROTOCOL".into(), Value::String(protocol.into()));

    if fields.contains_key("SENSOR_TYPE") || fields.contains_key("NAME") {
        return;
    }
    let name = match protocol {
        "MODBUS" => format!(
            "REGISTER_{}",
            fields.get("REGISTER_NUMBER").unwrap_or(&Value::Null)
        ),
        "RAW" => fields
            .get("COMMAND")
            .and_then(Value::as_str)
            .unwrap_or("RAW")
            .to_string(),
        other => other.to_string(),
    };
    fields.insert("SENSOR_TYPE".into(), Value::String(name));
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::measurement::SampleValue;
    use edgelink_codec::RegisterCodec;

    fn handler() -> CommandHandler {
        CommandHandler::new(Scheduler::new("commands", RegisterCodec::default()), "PUMP")
    }

    #[tokio::test]
    async fn test_formula_command() {
        let reply = handler().handle(r#"{"FUNCTION": "1 + 2", "UOM": "kW"}"#).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.payloads.len(), 1);
        assert_eq!(reply.payloads[0].name, "FUNCTION");
        assert_eq!(reply.payloads[0].value, SampleValue::Scalar(3.0));
        assert_eq!(reply.payloads[0].uom.as_deref(), Some("kW"));
    }

    #[tokio::test]
    async fn test_shared_keys_merge_into_each_command() {
        let body = r#"{
            "MACHINE_TYPE": "FAN",
            "COMMANDS": [
                {"SENSOR_TYPE": "A", "FUNCTION": "2 * 3"},
                {"SENSOR_TYPE": "B", "FUNCTION": "$A + 1"}
            ]
        }"#;
        let reply = handler().handle(body).await;
        assert_eq!(reply.status, 200);
        let values: Vec<(&str, &str, SampleValue)> = reply
            .payloads
            .iter()
            .map(|p| (p.name.as_str(), p.machine_type.as_str(), p.value.clone()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("A", "FAN", SampleValue::Scalar(6.0)),
                ("B", "FAN", SampleValue::Scalar(7.0)),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_commands_are_400() {
        for body in [
            "{not json",
            "[1, 2]",
            r#"{"COMMANDS": 3}"#,
            r#"{"FUNCTION": "2 +"}"#,
            r#"{"PROTOCOL": "CANBUS", "COMMAND": "MISSING"}"#,
        ] {
            let reply = handler().handle(body).await;
            assert_eq!(reply.status, 400, "{}", body);
            assert_eq!(reply.error.map(|e| e.code), Some(400));
        }
    }

    #[test]
    fn test_default_names() {
        let mut fields = Map::new();
        fields.insert("PROTOCOL".into(), Value::String("modbus".into()));
        fields.insert("REGISTER_NUMBER".into(), Value::from(40));
        normalize(&mut fields);
        assert_eq!(fields["SENSOR_TYPE"], Value::String("REGISTER_40".into()));
        assert_eq!(fields["SKIP_SAME_VALUE"], Value::Bool(false));

        let mut fields = Map::new();
        fields.insert("PROTOCOL".into(), Value::String("SERIAL".into()));
        fields.insert("COMMAND".into(), Value::String("READ_SN".into()));
        normalize(&mut fields);
        assert_eq!(fields["PROTOCOL"], Value::String("RAW".into()));
        assert_eq!(fields["SENSOR_TYPE"], Value::String("READ_SN".into()));
    }
}

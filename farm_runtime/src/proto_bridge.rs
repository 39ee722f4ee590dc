//! Proto ↔ Kernel conversion bridge.
//!
//! Converts between the protobuf log record (proto_types.rs) and the
//! kernel's ActionEnvelope. The action crosses as its JSON wire form,
//! so anything the kernel can parse, the log can carry.

use farm_engine::actions::{Action, ActionEnvelope};
use serde_json::{Map, Value};

use crate::proto_types::ProtoActionRecord;

/// Convert a kernel envelope to a protobuf record for the log.
pub fn envelope_to_proto(envelope: &ActionEnvelope) -> ProtoActionRecord {
    let wire = envelope.action.to_value();
    let payload_json = match wire.get("payload") {
        Some(payload) => payload.to_string(),
        None => String::new(),
    };
    ProtoActionRecord {
        sequence: envelope.sequence,
        now: envelope.now,
        seed: envelope.seed,
        action_type: envelope.action.action_type().to_string(),
        payload_json,
    }
}

/// Convert a protobuf record back to the kernel's envelope.
///
/// Fails only if the stored payload is not JSON at all; a payload the
/// kernel does not understand still decodes, as an unrecognized action.
pub fn proto_to_envelope(record: &ProtoActionRecord) -> Result<ActionEnvelope, serde_json::Error> {
    let mut wire = Map::new();
    wire.insert("type".to_string(), Value::String(record.action_type.clone()));
    if !record.payload_json.is_empty() {
        wire.insert("payload".to_string(), serde_json::from_str(&record.payload_json)?);
    }

    Ok(ActionEnvelope {
        sequence: record.sequence,
        now: record.now,
        seed: record.seed,
        action: Action::from_value(&Value::Object(wire)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_engine::domain::RankKind;

    fn envelope(action: Action) -> ActionEnvelope {
        ActionEnvelope {
            sequence: 3,
            now: 120_000,
            seed: 99,
            action,
        }
    }

    #[test]
    fn test_payload_actions_cross_unchanged() {
        let original = envelope(Action::UpgradeCountryRank {
            country_id: "usa".to_string(),
            rank: RankKind::EconomicLevel,
        });
        let record = envelope_to_proto(&original);
        assert_eq!(record.action_type, "UPGRADE_COUNTRY_RANK");
        assert_eq!(proto_to_envelope(&record).unwrap(), original);
    }

    #[test]
    fn test_unit_actions_have_empty_payload() {
        let original = envelope(Action::HarvestAll);
        let record = envelope_to_proto(&original);
        assert!(record.payload_json.is_empty());
        assert_eq!(proto_to_envelope(&record).unwrap(), original);
    }

    #[test]
    fn test_unrecognized_survives_by_name() {
        let original = envelope(Action::Unrecognized {
            action_type: "SUMMON_RAIN".to_string(),
        });
        let back = proto_to_envelope(&envelope_to_proto(&original)).unwrap();
        assert_eq!(back.action.action_type(), "SUMMON_RAIN");
    }

    #[test]
    fn test_garbage_payload_is_an_error() {
        let record = ProtoActionRecord {
            sequence: 1,
            action_type: "PLANT_ALL".to_string(),
            payload_json: "{not json".to_string(),
            ..Default::default()
        };
        assert!(proto_to_envelope(&record).is_err());
    }
}

/// Resource and operation types, with the payload shape each pair expects
use super::placeholder::{Placeholder, PLACEHOLDER_PREFIX};
use crate::error::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Logical entity type a queued intent targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Patient,
    Appointment,
    VitalSign,
    SupportContact,
    Medication,
}

impl Resource {
    /// All known resources
    pub const ALL: [Resource; 5] = [
        Self::Patient,
        Self::Appointment,
        Self::VitalSign,
        Self::SupportContact,
        Self::Medication,
    ];

    /// Wire name (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Appointment => "appointment",
            Self::VitalSign => "vitalSign",
            Self::SupportContact => "supportContact",
            Self::Medication => "medication",
        }
    }

    /// Fields a `create` payload must carry
    pub fn required_create_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Patient => &["nombre"],
            Self::Appointment | Self::VitalSign => &["id_paciente"],
            Self::SupportContact | Self::Medication => &["id_paciente", "nombre"],
        }
    }

    /// Fields holding identifiers of other records; these may be placeholders
    pub fn reference_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Patient => &["id"],
            Self::Appointment | Self::VitalSign | Self::SupportContact | Self::Medication => {
                &["id", "id_paciente"]
            }
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClinicError::UnknownResource(s.to_string()))
    }
}

/// Operation to perform against the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(ClinicError::UnknownOperation(s.to_string())),
        }
    }
}

/// Check a payload against the shape its `(resource, operation)` expects
///
/// Runs at enqueue time so a malformed intent is refused up front instead
/// of wedging the queue later.
pub fn validate_payload(resource: Resource, operation: Operation, payload: &Value) -> Result<()> {
    let invalid = |reason: String| ClinicError::InvalidPayload {
        resource: resource.to_string(),
        operation: operation.to_string(),
        reason,
    };

    let Some(fields) = payload.as_object() else {
        return Err(invalid("payload must be a JSON object".into()));
    };

    let required: &[&str] = match operation {
        Operation::Create => resource.required_create_fields(),
        Operation::Update | Operation::Delete => &["id"],
    };

    for field in required {
        match fields.get(*field) {
            None | Some(Value::Null) => {
                return Err(invalid(format!("missing required field `{}`", field)));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(invalid(format!("field `{}` must not be empty", field)));
            }
            Some(_) => {}
        }
    }

    for field in resource.reference_fields() {
        let Some(value) = fields.get(*field) else {
            continue;
        };
        match value {
            Value::Null => {}
            Value::Number(n) if n.is_i64() || n.is_u64() => {}
            Value::String(s) if s.starts_with(PLACEHOLDER_PREFIX) => {
                if Placeholder::parse(s).is_none() {
                    return Err(invalid(format!(
                        "field `{}` holds a malformed placeholder `{}`",
                        field, s
                    )));
                }
            }
            Value::String(s) if !s.is_empty() => {}
            other => {
                return Err(invalid(format!(
                    "field `{}` must be an identifier, got {}",
                    field, other
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_round_trip_names() {
        for r in Resource::ALL {
            assert_eq!(r.as_str().parse::<Resource>().unwrap(), r);
            assert_eq!(serde_json::to_value(r).unwrap(), json!(r.as_str()));
        }
        assert!("invoice".parse::<Resource>().is_err());
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("CREATE".parse::<Operation>().unwrap(), Operation::Create);
        assert!("upsert".parse::<Operation>().is_err());
    }

    fn check(resource: Resource, operation: Operation, payload: Value) -> Result<()> {
        validate_payload(resource, operation, &payload)
    }

    #[test]
    fn test_create_requires_resource_fields() {
        assert!(check(Resource::Patient, Operation::Create, json!({"nombre": "Ana"})).is_ok());

        let err =
            check(Resource::Patient, Operation::Create, json!({"apellido": "Ruiz"})).unwrap_err();
        assert!(err.to_string().contains("nombre"));

        assert!(check(
            Resource::Appointment,
            Operation::Create,
            json!({"id_paciente": "temp:Q1", "motivo": "control"})
        )
        .is_ok());
        assert!(check(
            Resource::Appointment,
            Operation::Create,
            json!({"id_paciente": "   "})
        )
        .is_err());
    }

    #[test]
    fn test_update_and_delete_require_target_id() {
        assert!(check(
            Resource::Patient,
            Operation::Update,
            json!({"id": 77, "nombre": "Ana"})
        )
        .is_ok());
        assert!(check(Resource::Patient, Operation::Delete, json!({"id": "temp:Q1"})).is_ok());
        assert!(check(Resource::Patient, Operation::Delete, json!({})).is_err());
    }

    #[test]
    fn test_reference_fields_must_be_identifiers() {
        assert!(check(
            Resource::VitalSign,
            Operation::Create,
            json!({"id_paciente": {"nested": true}})
        )
        .is_err());
        assert!(
            check(Resource::VitalSign, Operation::Create, json!({"id_paciente": 1.5})).is_err()
        );
        assert!(
            check(Resource::VitalSign, Operation::Create, json!({"id_paciente": "temp:"})).is_err()
        );
    }

    #[test]
    fn test_payload_must_be_object() {
        assert!(check(Resource::Patient, Operation::Create, json!(["Ana"])).is_err());
    }
}

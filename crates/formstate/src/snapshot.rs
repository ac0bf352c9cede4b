use record::Value;
use serde::{Deserialize, Serialize};

use crate::error::{FormError, FormResult};
use crate::tainted::TaintedFields;
use crate::validation_errors::ValidationErrors;

/// Validation payload exchanged with a server: the record plus everything
/// the form displays about it. `constraints`, `message` and `meta` are
/// opaque to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(default)]
    pub errors: ValidationErrors,
    #[serde(default = "Value::object")]
    pub data: Value,
    pub empty: bool,
    #[serde(default = "empty_json_object")]
    pub constraints: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

fn empty_json_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Validation {
    /// Payload for a form that has not been validated yet.
    pub fn empty_form(data: Value) -> Self {
        Self {
            valid: false,
            errors: ValidationErrors::empty(),
            data,
            empty: true,
            constraints: empty_json_object(),
            message: None,
            id: None,
            meta: None,
        }
    }

    /// `None` if `json` does not look like a validation payload, otherwise
    /// the payload's id (which may itself be absent).
    pub fn probe(json: &serde_json::Value) -> Option<Option<&str>> {
        let object = json.as_object()?;
        if !object.get("valid").is_some_and(serde_json::Value::is_boolean) || !object.contains_key("empty") {
            return None;
        }
        Some(object.get("id").and_then(serde_json::Value::as_str))
    }

    /// Decodes a payload that [`probe`](Self::probe) accepted.
    pub fn from_json(json: serde_json::Value) -> FormResult<Self> {
        if Self::probe(&json).is_none() {
            return Err(FormError::NotAValidationObject(json.to_string()));
        }
        serde_json::from_value(json.clone())
            .map_err(|e| FormError::NotAValidationObject(format!("{e}: {json}")))
    }

    pub fn to_json(&self) -> FormResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Immutable capture of a form's full state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    #[serde(flatten)]
    pub validation: Validation,
    #[serde(default)]
    pub tainted: Option<TaintedFields>,
}

impl FormSnapshot {
    pub fn to_json_string(&self) -> FormResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(text: &str) -> FormResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_requires_valid_and_empty() {
        assert_eq!(
            Validation::probe(&json!({"valid": true, "empty": false, "id": "a"})),
            Some(Some("a"))
        );
        assert_eq!(Validation::probe(&json!({"valid": true, "empty": false})), Some(None));
        assert_eq!(Validation::probe(&json!({"valid": "yes", "empty": false})), None);
        assert_eq!(Validation::probe(&json!({"name": "x"})), None);
        assert_eq!(Validation::probe(&json!("x")), None);
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = Validation::from_json(json!({"valid": true, "empty": false, "errors": 5}));
        assert!(matches!(err, Err(FormError::NotAValidationObject(_))));
    }

    #[test]
    fn payload_defaults_fill_missing_fields() {
        let v = Validation::from_json(json!({"valid": false, "empty": true})).unwrap();
        assert_eq!(v, Validation::empty_form(Value::object()));
    }
}

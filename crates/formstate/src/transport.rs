//! Submission transport seam and the action results it produces.

use futures::future::BoxFuture;
use record::Value;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{FormResult, TransportError};
use crate::options::DataType;
use crate::snapshot::Validation;

/// Outcome of a posted form, as reported by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionResult {
    Success {
        status: u16,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    Failure {
        status: u16,
        #[serde(default)]
        data: Option<serde_json::Value>,
    },
    Redirect {
        status: u16,
        location: String,
    },
    Error {
        #[serde(default)]
        status: Option<u16>,
        error: serde_json::Value,
    },
}

impl ActionResult {
    pub fn status(&self) -> Option<u16> {
        match self {
            ActionResult::Success { status, .. }
            | ActionResult::Failure { status, .. }
            | ActionResult::Redirect { status, .. } => Some(*status),
            ActionResult::Error { status, .. } => *status,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error { .. })
    }

    /// Wraps a validation payload the way form actions return it.
    pub fn with_form(status: u16, form: &Validation) -> FormResult<Self> {
        let data = Some(serde_json::json!({ "form": form.to_json()? }));
        Ok(if (200..300).contains(&status) {
            ActionResult::Success { status, data }
        } else {
            ActionResult::Failure { status, data }
        })
    }

    /// The human-readable part of an error result.
    pub fn error_text(&self) -> Option<String> {
        let ActionResult::Error { error, .. } = self else {
            return None;
        };
        Some(match error {
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Object(map) => match map.get("message") {
                Some(serde_json::Value::String(text)) => text.clone(),
                _ => error.to_string(),
            },
            other => other.to_string(),
        })
    }
}

/// Every validation payload found among the values of a result's data map.
pub fn find_forms(data: &serde_json::Value) -> FormResult<Vec<Validation>> {
    let Some(object) = data.as_object() else {
        return Ok(Vec::new());
    };
    object
        .values()
        .filter(|v| Validation::probe(v).is_some())
        .map(|v| Validation::from_json(v.clone()))
        .collect()
}

/// What a transport receives for one submission.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitRequest {
    pub form_id: Option<String>,
    pub data_type: DataType,
    pub data: Value,
    /// Serialized record split into chunks; only filled for [`DataType::Json`].
    pub json_chunks: Vec<String>,
}

impl SubmitRequest {
    /// The chunks joined back into the serialized record.
    pub fn json(&self) -> String {
        self.json_chunks.concat()
    }
}

/// Splits `text` into pieces of at most `size` characters.
pub fn chunk_str(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Posts a submission. The token fires when a newer submission supersedes
/// this one; implementations should stop and return
/// [`TransportError::Aborted`].
pub trait Transport: Send + Sync {
    fn submit(
        &self,
        request: SubmitRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<ActionResult, TransportError>>;
}

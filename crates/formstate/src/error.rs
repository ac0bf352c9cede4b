use record::FieldPath;
use thiserror::Error;

/// Configuration and protocol errors. Validation failures are never errors;
/// they live in the error tree.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("form id given both as init argument ({init:?}) and in options ({options:?})")]
    ConflictingId { init: String, options: String },

    #[error("not a validation object: {0}")]
    NotAValidationObject(String),

    #[error("object found in form field {0:?}; nested data needs data_type = json")]
    NestedData(String),

    #[error("no validator entry resolves for path {0}")]
    UnresolvableValidatorPath(FieldPath),

    #[error("value cannot be written at {0}")]
    UnwritablePath(FieldPath),

    #[error("on_error is set to apply; no on_error handlers can be added")]
    ConflictingErrorHandler,

    #[error("error results cannot be applied as a form update")]
    ErrorResultApplied,

    #[error("non-object validation data returned from action result")]
    NonObjectResultData,

    #[error("no form data found in action result")]
    NoFormsInResult,

    #[error("options: {0}")]
    Options(#[from] ron::error::SpannedError),

    #[error("options: {0}")]
    OptionsEncode(#[from] ron::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FormResult<T> = Result<T, FormError>;

/// Failures of the submit transport itself (not failed validations).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Failed(String),

    #[error("request aborted")]
    Aborted,
}

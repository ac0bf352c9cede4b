//! Form configuration.
//!
//! [`FormOptions`] deserializes from RON with every field optional. A RON
//! delta can be layered over existing options through [`OptionsContent`],
//! which carries only the fields the delta actually sets.

use ron::extensions::Extensions;
use serde::{Deserialize, Serialize};

use crate::error::FormResult;

/// RON reader shared by full options and deltas. Optional fields may be
/// written bare (`delay_ms: 50`, `id: "login"`) as well as `Some(..)`.
fn ron_reader() -> ron::Options {
    ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMethod {
    /// Validate on blur, or on input once the field is tainted and has shown an error.
    #[default]
    Auto,
    OnInput,
    OnBlur,
    SubmitOnly,
}

/// What happens when a field has no validator of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValidator {
    #[default]
    Keep,
    Clear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearOnSubmit {
    Errors,
    Message,
    #[default]
    ErrorsAndMessage,
    None,
}

impl ClearOnSubmit {
    pub fn clears_errors(self) -> bool {
        matches!(self, ClearOnSubmit::Errors | ClearOnSubmit::ErrorsAndMessage)
    }

    pub fn clears_message(self) -> bool {
        matches!(self, ClearOnSubmit::Message | ClearOnSubmit::ErrorsAndMessage)
    }
}

/// Policy for a submit attempt while another one is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultipleSubmits {
    #[default]
    Prevent,
    Allow,
    Abort,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Flat fields only; nested objects are rejected at construction.
    #[default]
    Form,
    /// The whole record travels as chunked JSON.
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollToError {
    Auto,
    #[default]
    Smooth,
    Off,
}

/// Routing of `Error` action results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnErrorPolicy {
    /// Registered `on_error` handlers run; without any, a warning is logged.
    #[default]
    Handlers,
    /// The error text is written into the message store.
    Apply,
}

/// Single-page mode: results are synthesized locally instead of posted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaOptions {
    /// Status of the synthetic failure produced by client-side validation.
    pub fail_status: Option<u16>,
}

pub const DEFAULT_TAINTED_MESSAGE: &str =
    "Do you want to leave this page? Changes you made may not be saved.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub id: Option<String>,
    pub reset_form: bool,
    pub scroll_to_error: ScrollToError,
    pub tainted_message: Option<String>,
    pub spa: Option<SpaOptions>,
    pub on_error: OnErrorPolicy,
    pub data_type: DataType,
    pub json_chunk_size: usize,
    pub validation_method: ValidationMethod,
    pub default_validator: DefaultValidator,
    pub clear_on_submit: ClearOnSubmit,
    pub delay_ms: u64,
    pub timeout_ms: u64,
    pub multiple_submits: MultipleSubmits,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            id: None,
            reset_form: false,
            scroll_to_error: ScrollToError::Smooth,
            tainted_message: Some(DEFAULT_TAINTED_MESSAGE.to_string()),
            spa: None,
            on_error: OnErrorPolicy::Handlers,
            data_type: DataType::Form,
            json_chunk_size: 500_000,
            validation_method: ValidationMethod::Auto,
            default_validator: DefaultValidator::Keep,
            clear_on_submit: ClearOnSubmit::ErrorsAndMessage,
            delay_ms: 500,
            timeout_ms: 8000,
            multiple_submits: MultipleSubmits::Prevent,
        }
    }
}

impl FormOptions {
    /// Parses options from RON; missing fields keep their defaults.
    pub fn from_ron(text: &str) -> FormResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(ron_reader().from_str(text)?)
    }

    /// These options with a RON delta applied on top.
    pub fn layered(&self, delta: &str) -> FormResult<Self> {
        let mut merged = self.clone();
        merged.merge_from(&OptionsContent::from_ron(delta)?);
        Ok(merged)
    }

    pub fn to_ron(&self) -> FormResult<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn merge_from(&mut self, content: &OptionsContent) {
        macro_rules! take {
            ($target:expr, $source:expr; $($field:ident),+ $(,)?) => {
                $(
                    if let Some(value) = &$source.$field {
                        $target.$field = value.clone();
                    }
                )+
            };
        }
        take!(
            self, content;
            id,
            reset_form,
            scroll_to_error,
            tainted_message,
            spa,
            on_error,
            data_type,
            json_chunk_size,
            validation_method,
            default_validator,
            clear_on_submit,
            delay_ms,
            timeout_ms,
            multiple_submits,
        );
    }

    /// Status of the synthetic failure produced by client-side validation.
    pub fn fail_status(&self) -> u16 {
        self.spa
            .as_ref()
            .and_then(|spa| spa.fail_status)
            .unwrap_or(400)
    }
}

/// Sparse form of [`FormOptions`]: only the fields a delta sets are `Some`.
///
/// Optional fields of [`FormOptions`] are doubly wrapped so a delta can
/// explicitly unset them (`tainted_message: Some(None)`); a bare value
/// such as `timeout_ms: 200` sets a field.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptionsContent {
    pub id: Option<Option<String>>,
    pub reset_form: Option<bool>,
    pub scroll_to_error: Option<ScrollToError>,
    pub tainted_message: Option<Option<String>>,
    pub spa: Option<Option<SpaOptions>>,
    pub on_error: Option<OnErrorPolicy>,
    pub data_type: Option<DataType>,
    pub json_chunk_size: Option<usize>,
    pub validation_method: Option<ValidationMethod>,
    pub default_validator: Option<DefaultValidator>,
    pub clear_on_submit: Option<ClearOnSubmit>,
    pub delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub multiple_submits: Option<MultipleSubmits>,
}

impl OptionsContent {
    pub fn from_ron(text: &str) -> FormResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(ron_reader().from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_the_documented_values() {
        let o = FormOptions::default();
        assert_eq!(o.delay_ms, 500);
        assert_eq!(o.timeout_ms, 8000);
        assert_eq!(o.multiple_submits, MultipleSubmits::Prevent);
        assert_eq!(o.default_validator, DefaultValidator::Keep);
        assert_eq!(o.clear_on_submit, ClearOnSubmit::ErrorsAndMessage);
        assert_eq!(o.json_chunk_size, 500_000);
        assert_eq!(o.fail_status(), 400);
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let o = FormOptions::from_ron("(delay_ms: 50, multiple_submits: Abort)").unwrap();
        assert_eq!(o.delay_ms, 50);
        assert_eq!(o.multiple_submits, MultipleSubmits::Abort);
        assert_eq!(o.timeout_ms, 8000);
    }

    #[test]
    fn layering_only_touches_set_fields() {
        let base = FormOptions::from_ron("(data_type: Json, timeout_ms: 100)").unwrap();
        let layered = base
            .layered("(timeout_ms: 200, spa: (fail_status: 422), tainted_message: Some(None))")
            .unwrap();
        assert_eq!(layered.data_type, DataType::Json);
        assert_eq!(layered.timeout_ms, 200);
        assert_eq!(layered.fail_status(), 422);
        assert_eq!(layered.tainted_message, None);
        assert_eq!(layered.delay_ms, 500);
    }

    #[test]
    fn explicit_some_still_parses() {
        let o = FormOptions::default()
            .layered("(id: Some(Some(\"signup\")), spa: Some(Some((fail_status: Some(409)))))")
            .unwrap();
        assert_eq!(o.id.as_deref(), Some("signup"));
        assert_eq!(o.fail_status(), 409);
        assert_eq!(FormOptions::from_ron("(id: \"login\")").unwrap().id.as_deref(), Some("login"));
    }

    #[test]
    fn ron_round_trip() {
        let mut o = FormOptions::default();
        o.validation_method = ValidationMethod::OnBlur;
        o.id = Some("login".into());
        let text = o.to_ron().unwrap();
        assert_eq!(FormOptions::from_ron(&text).unwrap(), o);
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(FormOptions::from_ron("(delay_ms: \"soon\")").is_err());
    }
}

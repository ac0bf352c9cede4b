//! Per-field validation pipeline and the input/blur triggers.

use parking_lot::Mutex;
use record::{for_each_path_async, walk, write_at, Control, FieldPath, Value};
use tracing::{debug, trace, warn};

use crate::error::{FormError, FormResult};
use crate::form::SuperForm;
use crate::options::{DefaultValidator, ValidationMethod};
use crate::tainted::TaintOption;
use crate::validation_errors::ValidationErrors;
use crate::validator::{Messages, ValidatorNode, Validators};

/// Which stores a validation call writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidateUpdate {
    #[default]
    All,
    ErrorsOnly,
    ValueOnly,
    Neither,
}

impl ValidateUpdate {
    fn writes_errors(self) -> bool {
        matches!(self, ValidateUpdate::All | ValidateUpdate::ErrorsOnly)
    }

    fn writes_value(self) -> bool {
        matches!(self, ValidateUpdate::All | ValidateUpdate::ValueOnly)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidateOptions {
    /// Validate this value instead of the one currently in the record.
    pub value: Option<Value>,
    pub update: ValidateUpdate,
    /// Taint mode for writing `value` into the record.
    pub taint: TaintOption,
    /// Shown instead of the validator's own messages when the field fails.
    pub errors: Option<Vec<String>>,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            value: None,
            update: ValidateUpdate::All,
            taint: TaintOption::Silent,
            errors: None,
        }
    }
}

impl ValidateOptions {
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

impl SuperForm {
    /// Validates one field and returns its messages (`None` when valid).
    ///
    /// With a schema, a field that can be checked in isolation is checked
    /// alone; otherwise the whole record is validated and the outcome is
    /// spread to other tainted fields as well. A result that arrives after a
    /// newer validation of the same path started is returned but not written.
    pub async fn validate(
        &self,
        path: impl Into<FieldPath>,
        options: ValidateOptions,
    ) -> FormResult<Messages> {
        let path = path.into();
        let write_errors = options.update.writes_errors();

        let mut live = true;
        let value = match options.value {
            Some(value) if options.update.writes_value() => {
                if !self.set_path(&path, value.clone(), options.taint) {
                    warn!(%path, "value does not fit the record; not validated");
                    return Err(FormError::UnwritablePath(path));
                }
                value
            }
            Some(value) => {
                live = false;
                value
            }
            None => self.value_at(&path).unwrap_or(Value::Null),
        };
        let generation = self.begin_validation(&path);

        match &self.inner.validators {
            None => Ok(self.default_validate(&path, write_errors)),

            Some(Validators::Map(root)) => {
                let node = walk(root, &path.without_indices())
                    .ok_or_else(|| FormError::UnresolvableValidatorPath(path.clone()))?;
                let Some(check) = node.value.and_then(ValidatorNode::as_check).cloned() else {
                    return Ok(self.default_validate(&path, write_errors));
                };
                let messages = check.check(&value).await;
                if !self.is_latest(&path, generation) {
                    return Ok(messages);
                }
                let messages = messages.map(|own| options.errors.unwrap_or(own));
                Ok(self.write_field(&path, messages, write_errors))
            }

            Some(Validators::Schema {
                schema,
                has_effects,
            }) => {
                let narrow = if *has_effects {
                    None
                } else {
                    schema.field_validator(&path.without_indices())
                };

                if let Some(check) = narrow {
                    trace!(%path, "validating field in isolation");
                    let messages = check.check(&value).await;
                    if !self.is_latest(&path, generation) {
                        return Ok(messages);
                    }
                    return Ok(self.write_field(&path, messages, write_errors));
                }

                trace!(%path, "validating whole record");
                let mut record = self.data();
                if !live {
                    write_at(&mut record, &path, value);
                }
                let outcome = schema.validate(&record).await;
                let own = match &outcome {
                    Ok(()) => None,
                    Err(errors) => errors.messages_at(&path).map(<[String]>::to_vec),
                };
                if !self.is_latest(&path, generation) {
                    return Ok(own);
                }

                match outcome {
                    Err(found) => {
                        if write_errors {
                            self.spread_to_tainted(&path, &found);
                        }
                        let messages = options.errors.or(own);
                        Ok(self.write_field(&path, messages, write_errors))
                    }
                    Ok(()) => {
                        if write_errors {
                            self.inner.errors.update(|errors| {
                                errors.clear_all();
                                errors.set_messages(&path, None);
                            });
                        }
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Validates the whole record. `None` when it passes.
    pub async fn validate_all(&self) -> Option<ValidationErrors> {
        let record = self.data();
        self.validate_record(&record).await
    }

    pub(crate) async fn validate_record(&self, record: &Value) -> Option<ValidationErrors> {
        match &self.inner.validators {
            None => None,
            Some(Validators::Schema { schema, .. }) => schema.validate(record).await.err(),
            Some(Validators::Map(root)) => {
                let found = Mutex::new(Vec::new());
                let sink = &found;
                for_each_path_async(record, move |node| {
                    let check = walk(root, &node.path.without_indices())
                        .and_then(|n| n.value)
                        .and_then(ValidatorNode::as_check)
                        .cloned();
                    async move {
                        let (Some(check), Some(value)) = (check, node.value) else {
                            return Control::Continue;
                        };
                        match value {
                            Value::Array(items) => {
                                for (index, item) in items.iter().enumerate() {
                                    if let Some(messages) = check.check(item).await {
                                        sink.lock().push((node.path.join(index), messages));
                                    }
                                }
                            }
                            _ => {
                                if let Some(messages) = check.check(value).await {
                                    sink.lock().push((node.path.clone(), messages));
                                }
                            }
                        }
                        Control::Continue
                    }
                })
                .await;

                let found = found.into_inner();
                if found.is_empty() {
                    return None;
                }
                let mut errors = ValidationErrors::empty();
                for (path, messages) in found {
                    errors.set_messages(&path, Some(messages));
                }
                Some(errors)
            }
        }
    }

    /// Reacts to an input event on the fields changed since the last blur.
    pub async fn on_input(&self) -> FormResult<()> {
        let method = self.inner.options.validation_method;
        if matches!(method, ValidationMethod::OnBlur | ValidationMethod::SubmitOnly) {
            return Ok(());
        }
        for change in self.last_changes() {
            let shown_before = self.is_path_tainted(&change)
                && self.inner.errors.with(|errors| errors.has_entry(&change));
            if method == ValidationMethod::OnInput || shown_before {
                self.validate(change, ValidateOptions::default()).await?;
            }
        }
        Ok(())
    }

    /// Validates every field changed since the last blur, then forgets them.
    pub async fn on_blur(&self) -> FormResult<()> {
        let method = self.inner.options.validation_method;
        if matches!(method, ValidationMethod::OnInput | ValidationMethod::SubmitOnly) {
            return Ok(());
        }
        let changes = self.inner.taint.lock().take_last_changes();
        debug!(count = changes.len(), "validating on blur");
        for change in changes {
            self.validate(change, ValidateOptions::default()).await?;
        }
        Ok(())
    }

    fn default_validate(&self, path: &FieldPath, write_errors: bool) -> Messages {
        if self.inner.options.default_validator == DefaultValidator::Clear {
            self.write_field(path, None, write_errors);
        }
        None
    }

    fn write_field(&self, path: &FieldPath, messages: Messages, write_errors: bool) -> Messages {
        if write_errors {
            let stored = messages.clone();
            self.inner
                .errors
                .update(|errors| errors.set_messages(path, stored));
        }
        messages
    }

    /// Carries a whole-record outcome over to the other tainted fields:
    /// new errors appear and errors that disappeared are cleared.
    fn spread_to_tainted(&self, trigger: &FieldPath, found: &ValidationErrors) {
        let Some(tainted) = self.inner.tainted.get() else {
            return;
        };
        let touched = |path: &FieldPath| path != trigger && tainted.is_path_tainted(path);

        self.inner.errors.update(|current| {
            for path in found.leaf_paths().into_iter().filter(|p| touched(p)) {
                let messages = found.messages_at(&path);
                if current.messages_at(&path) != messages {
                    current.set_messages(&path, messages.map(<[String]>::to_vec));
                }
            }
            for path in current.leaf_paths().into_iter().filter(|p| touched(p)) {
                if found.messages_at(&path).is_none() {
                    current.set_messages(&path, None);
                }
            }
        });
    }

    fn begin_validation(&self, path: &FieldPath) -> u64 {
        let mut generations = self.inner.generations.lock();
        let generation = generations.entry(path.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_latest(&self, path: &FieldPath, generation: u64) -> bool {
        let latest = self.inner.generations.lock().get(path) == Some(&generation);
        if !latest {
            warn!(%path, generation, "dropping stale validation result");
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormInit;
    use crate::options::FormOptions;
    use crate::validator::{FieldCheck, RuleSchema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn required() -> FieldCheck {
        FieldCheck::new(|v| match v.as_str() {
            Some("") | None => Some(vec!["required".into()]),
            Some(_) => None,
        })
    }

    fn map_form(options: FormOptions) -> SuperForm {
        SuperForm::builder(FormInit::Data(Value::from(json!({"name": "", "note": ""}))))
            .options(options)
            .validators(Validators::map(ValidatorNode::fields().with("name", required())))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn map_check_writes_the_error() {
        let f = map_form(FormOptions::default());
        let messages = f.validate(FieldPath::parse("name"), ValidateOptions::default()).await.unwrap();
        assert_eq!(messages, Some(vec!["required".to_string()]));
        assert_eq!(
            f.errors().with(|e| e.messages_at(&FieldPath::parse("name")).map(<[String]>::to_vec)),
            Some(vec!["required".to_string()])
        );
    }

    #[tokio::test]
    async fn custom_errors_replace_failure_messages() {
        let f = map_form(FormOptions::default());
        let options = ValidateOptions {
            errors: Some(vec!["please fill in".into()]),
            ..ValidateOptions::default()
        };
        let messages = f.validate(FieldPath::parse("name"), options).await.unwrap();
        assert_eq!(messages, Some(vec!["please fill in".to_string()]));
    }

    #[tokio::test]
    async fn missing_check_uses_the_default_validator() {
        let f = map_form(FormOptions::default());
        f.errors().update(|e| {
            e.set_messages(&FieldPath::parse("note"), Some(vec!["old".into()]));
        });
        f.validate(FieldPath::parse("note"), ValidateOptions::default()).await.unwrap();
        assert!(f.errors().with(|e| e.messages_at(&FieldPath::parse("note")).is_some()));

        let clearing = map_form(FormOptions {
            default_validator: DefaultValidator::Clear,
            ..FormOptions::default()
        });
        clearing.errors().update(|e| {
            e.set_messages(&FieldPath::parse("note"), Some(vec!["old".into()]));
        });
        clearing.validate(FieldPath::parse("note"), ValidateOptions::default()).await.unwrap();
        assert!(clearing.errors().with(|e| e.messages_at(&FieldPath::parse("note")).is_none()));
    }

    #[tokio::test]
    async fn unresolvable_map_path_is_an_error() {
        let f = map_form(FormOptions::default());
        let err = f
            .validate(FieldPath::parse("address.city"), ValidateOptions::default())
            .await
            .err();
        assert!(matches!(err, Some(FormError::UnresolvableValidatorPath(_))));
    }

    #[tokio::test]
    async fn unwritable_value_is_rejected_before_validation() {
        let f = SuperForm::builder(FormInit::Data(Value::from(json!({"tags": ["a"]}))))
            .validators(Validators::map(ValidatorNode::fields().with("tags", required())))
            .build()
            .unwrap();
        let err = f
            .validate(FieldPath::parse("tags.name"), ValidateOptions::with_value(""))
            .await
            .err();
        assert!(matches!(err, Some(FormError::UnwritablePath(_))));
        assert_eq!(f.data(), Value::from(json!({"tags": ["a"]})));
        assert!(f.errors().with(ValidationErrors::is_clear));
    }

    #[tokio::test]
    async fn value_only_update_leaves_errors_alone() {
        let f = map_form(FormOptions::default());
        let options = ValidateOptions {
            update: ValidateUpdate::ValueOnly,
            taint: TaintOption::Taint,
            ..ValidateOptions::with_value("")
        };
        let messages = f.validate(FieldPath::parse("name"), options).await.unwrap();
        assert!(messages.is_some());
        assert!(f.errors().with(ValidationErrors::is_clear));
    }

    #[tokio::test]
    async fn neither_update_validates_a_candidate_value() {
        let f = map_form(FormOptions::default());
        let options = ValidateOptions {
            update: ValidateUpdate::Neither,
            ..ValidateOptions::with_value("Ada")
        };
        let messages = f.validate(FieldPath::parse("name"), options).await.unwrap();
        assert_eq!(messages, None);
        assert_eq!(f.value_at(&FieldPath::parse("name")), Some(Value::from("")));
    }

    #[tokio::test]
    async fn record_validation_checks_each_sequence_element() {
        let f = SuperForm::builder(FormInit::Data(Value::from(json!({"tags": ["a", ""]}))))
            .validators(Validators::map(ValidatorNode::fields().with("tags", required())))
            .build()
            .unwrap();
        let errors = f.validate_all().await.unwrap();
        assert_eq!(
            errors.messages_at(&FieldPath::parse("tags.1")),
            Some(&["required".to_string()][..])
        );
        assert_eq!(errors.messages_at(&FieldPath::parse("tags.0")), None);
    }

    #[tokio::test]
    async fn schema_without_effects_checks_the_field_alone() {
        let schema = RuleSchema::new().field("name", required()).field("note", required());
        let f = SuperForm::builder(FormInit::Data(Value::from(json!({"name": "", "note": ""}))))
            .validators(Validators::schema(schema))
            .build()
            .unwrap();
        f.validate(FieldPath::parse("name"), ValidateOptions::default()).await.unwrap();
        assert!(f.errors().with(|e| e.messages_at(&FieldPath::parse("name")).is_some()));
        assert!(f.errors().with(|e| e.messages_at(&FieldPath::parse("note")).is_none()));
    }
}

//! The form engine: live record, error tree and tainted map behind
//! observable stores, plus the write operations that keep them consistent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use record::{walk, write_at, FieldPath, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FormError, FormResult};
use crate::hooks::{
    ErrorEvent, ErrorFocus, FormEvents, ResultEvent, SubmitEvent, UpdateEvent, UpdatedEvent,
};
use crate::lifecycle::SubmitLifecycle;
use crate::options::{DataType, FormOptions, OnErrorPolicy};
use crate::snapshot::{FormSnapshot, Validation};
use crate::store::Store;
use crate::tainted::{TaintOption, TaintTracker, TaintedFields};
use crate::validation_errors::{FieldError, ValidationErrors};
use crate::validator::Validators;

/// What a form starts from.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FormInit {
    #[default]
    Empty,
    /// Only an id; the record starts empty.
    Id(String),
    /// Plain data, not validated yet.
    Data(Value),
    Validation(Validation),
}

impl FormInit {
    /// Classifies a JSON payload: `null`, an id string, a validation
    /// payload (an object with `valid` and `empty`) or plain data.
    pub fn from_json(json: serde_json::Value) -> FormResult<Self> {
        let looks_validated = json.get("valid").is_some() && json.get("empty").is_some();
        match json {
            serde_json::Value::Null => Ok(FormInit::Empty),
            serde_json::Value::String(id) => Ok(FormInit::Id(id)),
            serde_json::Value::Object(_) if looks_validated => {
                Ok(FormInit::Validation(Validation::from_json(json)?))
            }
            serde_json::Value::Object(_) => Ok(FormInit::Data(Value::from(json))),
            other => Err(FormError::NotAValidationObject(other.to_string())),
        }
    }
}

/// How a rebind treats the tainted map.
#[derive(Clone, Debug, PartialEq)]
pub enum RebindTaint {
    /// Diff the new record against the baseline and taint what changed.
    Keep,
    /// Forget all taint; the new record becomes the baseline.
    ClearAll,
    /// Install this tainted map; the new record becomes the baseline.
    Restore(Option<TaintedFields>),
}

pub(crate) struct FormInner {
    pub(crate) options: FormOptions,
    pub(crate) validators: Option<Validators>,
    pub(crate) initial: Validation,

    pub(crate) data: Store<Value>,
    pub(crate) errors: Store<ValidationErrors>,
    pub(crate) tainted: Store<Option<TaintedFields>>,
    pub(crate) valid: Store<bool>,
    pub(crate) empty: Store<bool>,
    pub(crate) message: Store<Option<serde_json::Value>>,
    pub(crate) constraints: Store<serde_json::Value>,
    pub(crate) meta: Store<Option<serde_json::Value>>,
    pub(crate) id: Store<Option<String>>,

    pub(crate) taint: Mutex<TaintTracker>,
    pub(crate) lifecycle: SubmitLifecycle,
    pub(crate) events: Mutex<FormEvents>,
    pub(crate) generations: Mutex<HashMap<FieldPath, u64>>,
    pub(crate) current_request: Mutex<Option<CancellationToken>>,
    pub(crate) error_focus: Option<Arc<dyn ErrorFocus>>,
}

/// Handle to one form instance. Clones share the same state.
#[derive(Clone)]
pub struct SuperForm {
    pub(crate) inner: Arc<FormInner>,
}

pub struct SuperFormBuilder {
    init: FormInit,
    options: FormOptions,
    validators: Option<Validators>,
    error_focus: Option<Arc<dyn ErrorFocus>>,
    events: FormEvents,
}

impl SuperFormBuilder {
    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validators(mut self, validators: Validators) -> Self {
        self.validators = Some(validators);
        self
    }

    pub fn error_focus(mut self, focus: impl ErrorFocus + 'static) -> Self {
        self.error_focus = Some(Arc::new(focus));
        self
    }

    pub fn on_submit(mut self, hook: impl Fn(&mut SubmitEvent) + Send + Sync + 'static) -> Self {
        self.events.on_submit.push(Arc::new(hook));
        self
    }

    pub fn on_result(
        mut self,
        hook: impl Fn(&mut ResultEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.events.on_result.push(Arc::new(hook));
        self
    }

    pub fn on_update(
        mut self,
        hook: impl Fn(&mut UpdateEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.events.on_update.push(Arc::new(hook));
        self
    }

    pub fn on_updated(mut self, hook: impl Fn(&UpdatedEvent<'_>) + Send + Sync + 'static) -> Self {
        self.events.on_updated.push(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&ErrorEvent<'_>) + Send + Sync + 'static) -> Self {
        self.events.on_error.push(Arc::new(hook));
        self
    }

    pub fn build(self) -> FormResult<SuperForm> {
        let options = self.options;

        if let (FormInit::Id(init), Some(from_options)) = (&self.init, &options.id) {
            return Err(FormError::ConflictingId {
                init: init.clone(),
                options: from_options.clone(),
            });
        }
        if options.on_error == OnErrorPolicy::Apply && !self.events.on_error.is_empty() {
            return Err(FormError::ConflictingErrorHandler);
        }

        let explicit_id = match &self.init {
            FormInit::Id(id) => Some(id.clone()),
            _ => options.id.clone(),
        };
        let mut initial = match self.init {
            FormInit::Empty | FormInit::Id(_) => Validation::empty_form(Value::object()),
            FormInit::Data(data) => Validation::empty_form(data),
            FormInit::Validation(validation) => validation,
        };
        initial.id = explicit_id.or(initial.id);

        if options.data_type != DataType::Json {
            check_flat(&initial.data)?;
        }
        if options.spa.is_some() && self.validators.is_none() {
            warn!("single-page mode without validators; submissions are never checked locally");
        }

        let lifecycle = SubmitLifecycle::new(
            Duration::from_millis(options.delay_ms),
            Duration::from_millis(options.timeout_ms),
        );
        debug!(id = ?initial.id, "form created");

        let inner = FormInner {
            data: Store::new(initial.data.clone()),
            errors: Store::new(initial.errors.clone()),
            tainted: Store::new(None),
            valid: Store::new(initial.valid),
            empty: Store::new(initial.empty),
            message: Store::new(initial.message.clone()),
            constraints: Store::new(initial.constraints.clone()),
            meta: Store::new(initial.meta.clone()),
            id: Store::new(initial.id.clone()),
            taint: Mutex::new(TaintTracker::new(initial.data.clone())),
            lifecycle,
            events: Mutex::new(self.events),
            generations: Mutex::new(HashMap::new()),
            current_request: Mutex::new(None),
            error_focus: self.error_focus,
            validators: self.validators,
            initial,
            options,
        };
        Ok(SuperForm {
            inner: Arc::new(inner),
        })
    }
}

/// Rejects nested objects in top-level fields. Sequences are judged by
/// their first element; dates count as plain values.
fn check_flat(data: &Value) -> FormResult<()> {
    fn check_field(key: &str, value: &Value) -> FormResult<()> {
        match value {
            Value::Object(_) => Err(FormError::NestedData(key.to_string())),
            Value::Array(items) => match items.first() {
                Some(first) => check_field(key, first),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    if let Some(fields) = data.as_object() {
        for (key, value) in fields {
            check_field(key, value)?;
        }
    }
    Ok(())
}

impl SuperForm {
    pub fn builder(init: FormInit) -> SuperFormBuilder {
        SuperFormBuilder {
            init,
            options: FormOptions::default(),
            validators: None,
            error_focus: None,
            events: FormEvents::default(),
        }
    }

    pub fn new(init: FormInit, options: FormOptions) -> FormResult<Self> {
        Self::builder(init).options(options).build()
    }

    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    pub fn validators(&self) -> Option<&Validators> {
        self.inner.validators.as_ref()
    }

    // Observables

    pub fn form(&self) -> &Store<Value> {
        &self.inner.data
    }

    pub fn errors(&self) -> &Store<ValidationErrors> {
        &self.inner.errors
    }

    pub fn tainted(&self) -> &Store<Option<TaintedFields>> {
        &self.inner.tainted
    }

    pub fn valid(&self) -> &Store<bool> {
        &self.inner.valid
    }

    pub fn empty(&self) -> &Store<bool> {
        &self.inner.empty
    }

    pub fn message(&self) -> &Store<Option<serde_json::Value>> {
        &self.inner.message
    }

    pub fn constraints(&self) -> &Store<serde_json::Value> {
        &self.inner.constraints
    }

    pub fn meta(&self) -> &Store<Option<serde_json::Value>> {
        &self.inner.meta
    }

    pub fn submitting(&self) -> &Store<bool> {
        &self.inner.lifecycle.submitting
    }

    pub fn delayed(&self) -> &Store<bool> {
        &self.inner.lifecycle.delayed
    }

    pub fn timed_out(&self) -> &Store<bool> {
        &self.inner.lifecycle.timeout
    }

    pub fn lifecycle(&self) -> &SubmitLifecycle {
        &self.inner.lifecycle
    }

    pub fn form_id(&self) -> Option<String> {
        self.inner.id.get()
    }

    // Record access and writes

    pub fn data(&self) -> Value {
        self.inner.data.get()
    }

    pub fn value_at(&self, path: &FieldPath) -> Option<Value> {
        self.inner
            .data
            .with(|data| walk(data, path).and_then(|n| n.value.cloned()))
    }

    /// Replaces the record. The tainted map is updated before the record
    /// store notifies.
    pub fn set_data(&self, value: Value, taint: TaintOption) {
        let update = self.inner.taint.lock().check(&value, taint);
        self.inner.tainted.update(|tainted| update.apply(tainted));
        self.inner.data.set(value);
    }

    pub fn update_data(&self, mutate: impl FnOnce(&mut Value), taint: TaintOption) {
        let mut next = self.data();
        mutate(&mut next);
        self.set_data(next, taint);
    }

    /// Writes one value, creating missing containers on the way.
    pub fn set_path(&self, path: &FieldPath, value: Value, taint: TaintOption) -> bool {
        let mut next = self.data();
        if !write_at(&mut next, path, value) {
            return false;
        }
        self.set_data(next, taint);
        true
    }

    pub fn is_tainted(&self) -> bool {
        self.inner
            .tainted
            .with(|t| t.as_ref().is_some_and(TaintedFields::any))
    }

    pub fn is_path_tainted(&self, path: &FieldPath) -> bool {
        self.inner
            .tainted
            .with(|t| t.as_ref().is_some_and(|t| t.is_path_tainted(path)))
    }

    /// Paths changed by the latest tainting write, until a blur consumes them.
    pub fn last_changes(&self) -> Vec<FieldPath> {
        self.inner.taint.lock().last_changes().to_vec()
    }

    pub fn all_errors(&self) -> Vec<FieldError> {
        self.inner.errors.with(ValidationErrors::all_errors)
    }

    pub fn first_error(&self) -> Option<FieldError> {
        self.inner.errors.with(ValidationErrors::first_error)
    }

    // Snapshots and rebinding

    pub fn capture(&self) -> FormSnapshot {
        FormSnapshot {
            validation: Validation {
                valid: self.inner.valid.get(),
                errors: self.inner.errors.get(),
                data: self.data(),
                empty: self.inner.empty.get(),
                constraints: self.inner.constraints.get(),
                message: self.inner.message.get(),
                id: self.form_id(),
                meta: self.inner.meta.get(),
            },
            tainted: self.inner.tainted.get(),
        }
    }

    /// Restores a capture. A capture without a tainted map untaints all.
    pub fn restore(&self, snapshot: FormSnapshot) {
        let taint = match snapshot.tainted {
            Some(tainted) => RebindTaint::Restore(Some(tainted)),
            None => RebindTaint::ClearAll,
        };
        self.rebind(snapshot.validation, taint, None);
    }

    /// Replaces record, errors and status fields wholesale from `form`.
    pub fn rebind(&self, form: Validation, taint: RebindTaint, message: Option<serde_json::Value>) {
        match taint {
            RebindTaint::Keep => {}
            RebindTaint::ClearAll => {
                self.inner.tainted.set(None);
                self.inner.taint.lock().rebase(&form.data);
            }
            RebindTaint::Restore(tainted) => {
                self.inner.tainted.set(tainted);
                self.inner.taint.lock().rebase(&form.data);
            }
        }

        let message = message.or(form.message);
        self.set_data(form.data, TaintOption::Taint);
        self.inner.message.set(message);
        self.inner.empty.set(form.empty);
        self.inner.valid.set(form.valid);
        self.inner.errors.set(form.errors);
        self.inner.constraints.set(form.constraints);
        self.inner.meta.set(form.meta);
        if form.id.is_some() {
            self.inner.id.set(form.id);
        }
    }

    /// Back to the initial payload with all taint cleared.
    pub fn reset(&self, keep_message: bool) {
        let message = if keep_message {
            self.inner.message.get()
        } else {
            None
        };
        self.reset_with(message);
    }

    pub(crate) fn reset_with(&self, message: Option<serde_json::Value>) {
        debug!(id = ?self.form_id(), "form reset");
        self.rebind(self.inner.initial.clone(), RebindTaint::ClearAll, message);
    }

    /// Message to confirm before navigating away, if there are unsaved edits.
    pub fn navigation_prompt(&self) -> Option<String> {
        let message = self.inner.options.tainted_message.as_ref()?;
        if self.inner.lifecycle.is_submitting() || !self.is_tainted() {
            return None;
        }
        Some(message.clone())
    }

    // Hook registration after construction

    pub fn on_submit(&self, hook: impl Fn(&mut SubmitEvent) + Send + Sync + 'static) {
        self.inner.events.lock().on_submit.push(Arc::new(hook));
    }

    pub fn on_result(&self, hook: impl Fn(&mut ResultEvent<'_>) + Send + Sync + 'static) {
        self.inner.events.lock().on_result.push(Arc::new(hook));
    }

    pub fn on_update(&self, hook: impl Fn(&mut UpdateEvent<'_>) + Send + Sync + 'static) {
        self.inner.events.lock().on_update.push(Arc::new(hook));
    }

    pub fn on_updated(&self, hook: impl Fn(&UpdatedEvent<'_>) + Send + Sync + 'static) {
        self.inner.events.lock().on_updated.push(Arc::new(hook));
    }

    pub fn on_error(
        &self,
        hook: impl Fn(&ErrorEvent<'_>) + Send + Sync + 'static,
    ) -> FormResult<()> {
        if self.inner.options.on_error == OnErrorPolicy::Apply {
            return Err(FormError::ConflictingErrorHandler);
        }
        self.inner.events.lock().on_error.push(Arc::new(hook));
        Ok(())
    }

    /// Handlers are cloned out so none runs under the events lock.
    pub(crate) fn events(&self) -> FormEvents {
        self.inner.events.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn form(data: serde_json::Value) -> SuperForm {
        SuperForm::new(FormInit::Data(Value::from(data)), FormOptions::default()).unwrap()
    }

    #[test]
    fn id_from_two_channels_conflicts() {
        let options = FormOptions {
            id: Some("b".into()),
            ..FormOptions::default()
        };
        let err = SuperForm::new(FormInit::Id("a".into()), options).err();
        assert!(matches!(err, Some(FormError::ConflictingId { .. })));
    }

    #[test]
    fn id_comes_from_options_when_init_has_none() {
        let options = FormOptions {
            id: Some("login".into()),
            ..FormOptions::default()
        };
        let f = SuperForm::new(FormInit::Empty, options).unwrap();
        assert_eq!(f.form_id().as_deref(), Some("login"));
        assert!(f.empty().get());
        assert!(!f.valid().get());
    }

    #[test]
    fn nested_data_needs_json_data_type() {
        let nested = Value::from(json!({"address": {"city": "Oslo"}}));
        let err = SuperForm::new(FormInit::Data(nested.clone()), FormOptions::default()).err();
        assert!(matches!(err, Some(FormError::NestedData(field)) if field == "address"));

        let options = FormOptions {
            data_type: DataType::Json,
            ..FormOptions::default()
        };
        assert!(SuperForm::new(FormInit::Data(nested), options).is_ok());

        let list_of_objects = Value::from(json!({"tags": [{"id": 1}]}));
        assert!(SuperForm::new(FormInit::Data(list_of_objects), FormOptions::default()).is_err());
        assert!(SuperForm::new(
            FormInit::Data(Value::from(json!({"tags": ["a", "b"]}))),
            FormOptions::default()
        )
        .is_ok());
    }

    #[test]
    fn from_json_classifies_payloads() {
        assert_eq!(FormInit::from_json(json!(null)).unwrap(), FormInit::Empty);
        assert_eq!(
            FormInit::from_json(json!("signup")).unwrap(),
            FormInit::Id("signup".into())
        );
        assert!(matches!(
            FormInit::from_json(json!({"name": "x"})).unwrap(),
            FormInit::Data(_)
        ));
        assert!(matches!(
            FormInit::from_json(json!({"valid": true, "empty": false})).unwrap(),
            FormInit::Validation(_)
        ));
        assert!(FormInit::from_json(json!({"valid": "nope", "empty": false})).is_err());
        assert!(FormInit::from_json(json!(42)).is_err());
    }

    #[test]
    fn apply_policy_rejects_error_handlers() {
        let options = FormOptions {
            on_error: OnErrorPolicy::Apply,
            ..FormOptions::default()
        };
        let built = SuperForm::builder(FormInit::Empty)
            .options(options.clone())
            .on_error(|_| {})
            .build();
        assert!(matches!(built.err(), Some(FormError::ConflictingErrorHandler)));

        let f = SuperForm::new(FormInit::Empty, options).unwrap();
        assert!(f.on_error(|_| {}).is_err());
    }

    #[test]
    fn taint_is_committed_before_the_record_notifies() {
        let f = form(json!({"name": ""}));
        let observer = f.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.form().subscribe(move |_| {
            sink.lock()
                .push(observer.is_path_tainted(&FieldPath::parse("name")));
        });

        f.set_path(&FieldPath::parse("name"), Value::from("Ada"), TaintOption::Taint);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn silent_writes_do_not_taint() {
        let f = form(json!({"name": ""}));
        f.set_path(&FieldPath::parse("name"), Value::from("x"), TaintOption::Silent);
        assert!(!f.is_tainted());
        assert_eq!(f.value_at(&FieldPath::parse("name")), Some(Value::from("x")));
    }

    #[test]
    fn capture_and_restore_round_trip() {
        let f = form(json!({"name": "", "age": 1}));
        f.set_path(&FieldPath::parse("name"), Value::from("Ada"), TaintOption::Taint);
        f.errors().update(|e| {
            e.set_messages(&FieldPath::parse("age"), Some(vec!["too young".into()]));
        });
        f.message().set(Some(json!("draft")));
        let snapshot = f.capture();

        f.reset(false);
        assert!(!f.is_tainted());
        assert_eq!(f.message().get(), None);

        f.restore(snapshot.clone());
        assert_eq!(f.capture(), snapshot);
        assert!(f.is_path_tainted(&FieldPath::parse("name")));
    }

    #[test]
    fn navigation_prompt_needs_taint() {
        let f = form(json!({"name": ""}));
        assert_eq!(f.navigation_prompt(), None);
        f.set_path(&FieldPath::parse("name"), Value::from("x"), TaintOption::Taint);
        assert_eq!(
            f.navigation_prompt().as_deref(),
            Some(crate::options::DEFAULT_TAINTED_MESSAGE)
        );
    }

    #[test]
    fn reset_can_keep_the_message() {
        let f = form(json!({"name": ""}));
        f.message().set(Some(json!("saved")));
        f.set_path(&FieldPath::parse("name"), Value::from("x"), TaintOption::Taint);
        f.reset(true);
        assert_eq!(f.message().get(), Some(json!("saved")));
        assert_eq!(f.value_at(&FieldPath::parse("name")), Some(Value::from("")));
        assert!(!f.is_tainted());
    }
}

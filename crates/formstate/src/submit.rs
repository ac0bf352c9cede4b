//! Submission flow and application of action results.

use record::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FormError, FormResult, TransportError};
use crate::form::{RebindTaint, SuperForm};
use crate::hooks::{ErrorEvent, FormEvents, ResultEvent, SubmitEvent, UpdateEvent, UpdatedEvent};
use crate::options::{DataType, MultipleSubmits, OnErrorPolicy, ScrollToError};
use crate::snapshot::Validation;
use crate::transport::{chunk_str, find_forms, ActionResult, SubmitRequest, Transport};
use crate::validation_errors::ValidationErrors;

/// How one call to [`SuperForm::submit`] ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Stopped before anything was sent, by policy or by an `on_submit` hook.
    Cancelled,
    /// Superseded by a newer submission while in flight.
    Aborted,
    /// Client-side validation failed; carries the synthetic failure result.
    Invalid(ActionResult),
    Completed(ActionResult),
}

impl SuperForm {
    /// Runs one submission attempt through `transport`.
    ///
    /// Returns `Err` only for protocol errors in the result; failing
    /// validation and transport failures are part of the outcome.
    pub async fn submit<T>(&self, transport: &T) -> FormResult<SubmitOutcome>
    where
        T: Transport + ?Sized,
    {
        let options = &self.inner.options;
        match options.multiple_submits {
            MultipleSubmits::Prevent if self.inner.lifecycle.is_submitting() => {
                debug!("submission already in flight; new attempt cancelled");
                return Ok(SubmitOutcome::Cancelled);
            }
            MultipleSubmits::Abort => {
                if let Some(previous) = self.inner.current_request.lock().take() {
                    debug!("aborting previous submission");
                    previous.cancel();
                }
            }
            _ => {}
        }

        let events = self.events();
        let mut event = SubmitEvent::new(self.data());
        for hook in &events.on_submit {
            hook(&mut event);
        }
        if event.is_cancelled() {
            info!("submission cancelled by on_submit hook");
            return Ok(SubmitOutcome::Cancelled);
        }
        let record = event.data;

        if let Some(errors) = self.validate_record(&record).await {
            info!(count = errors.all_errors().len(), "client-side validation failed");
            let form = self.outgoing(record, false, errors);
            let result = ActionResult::with_form(options.fail_status(), &form)?;
            self.process_result(&result, &events)?;
            return Ok(SubmitOutcome::Invalid(result));
        }

        let prepared = match &options.spa {
            Some(_) => {
                let form = self.outgoing(record, true, ValidationErrors::empty());
                Prepared::Local(ActionResult::with_form(200, &form)?)
            }
            None => {
                let json_chunks = match options.data_type {
                    DataType::Json => {
                        chunk_str(&serde_json::to_string(&record)?, options.json_chunk_size)
                    }
                    DataType::Form => Vec::new(),
                };
                Prepared::Remote(SubmitRequest {
                    form_id: self.form_id(),
                    data_type: options.data_type,
                    data: record,
                    json_chunks,
                })
            }
        };

        if options.clear_on_submit.clears_errors() {
            self.inner.errors.update(ValidationErrors::clear_all);
        }
        if options.clear_on_submit.clears_message() {
            self.inner.message.set(None);
        }
        self.inner.lifecycle.submitting();

        let result = match prepared {
            Prepared::Local(result) => result,
            Prepared::Remote(request) => {
                let token = CancellationToken::new();
                *self.inner.current_request.lock() = Some(token.clone());
                info!(id = ?request.form_id, "submitting form");

                let sent = tokio::select! {
                    sent = transport.submit(request, token.clone()) => sent,
                    _ = token.cancelled() => Err(TransportError::Aborted),
                };
                match sent {
                    Ok(result) => result,
                    Err(TransportError::Aborted) => {
                        debug!("submission aborted");
                        return Ok(SubmitOutcome::Aborted);
                    }
                    Err(TransportError::Failed(reason)) => {
                        warn!(%reason, "transport failed");
                        ActionResult::Error {
                            status: None,
                            error: serde_json::Value::String(reason),
                        }
                    }
                }
            }
        };

        self.process_result(&result, &events)?;
        Ok(SubmitOutcome::Completed(result))
    }

    /// Applies a success or failure result to the form.
    ///
    /// `untaint` defaults to whether the status is in 200..300. Every
    /// validation payload in the result whose id matches this form is
    /// committed, unless an `on_update` hook cancels it.
    pub fn update_from_result(&self, result: &ActionResult, untaint: Option<bool>) -> FormResult<()> {
        let events = self.events();
        self.apply_result(result, untaint, &events)
    }

    fn apply_result(
        &self,
        result: &ActionResult,
        untaint: Option<bool>,
        events: &FormEvents,
    ) -> FormResult<()> {
        let (status, data) = match result {
            ActionResult::Error { .. } => return Err(FormError::ErrorResultApplied),
            ActionResult::Redirect { location, .. } => {
                debug!(%location, "redirect result");
                if self.inner.options.reset_form {
                    self.reset(false);
                }
                return Ok(());
            }
            ActionResult::Success { status, data } | ActionResult::Failure { status, data } => {
                (*status, data)
            }
        };

        let Some(data) = data.as_ref().filter(|d| d.is_object()) else {
            return Err(FormError::NonObjectResultData);
        };
        let forms = find_forms(data)?;
        if forms.is_empty() {
            return Err(FormError::NoFormsInResult);
        }

        let untaint = untaint.unwrap_or((200..300).contains(&status));
        let id = self.form_id();
        for mut form in forms.into_iter().filter(|f| f.id == id) {
            let cancelled = {
                let mut event = UpdateEvent::new(&mut form);
                for hook in &events.on_update {
                    hook(&mut event);
                }
                event.is_cancelled()
            };
            if cancelled {
                debug!("update cancelled by on_update hook");
                continue;
            }

            if form.valid && self.inner.options.reset_form {
                self.reset_with(form.message.clone());
            } else {
                let taint = if untaint {
                    RebindTaint::ClearAll
                } else {
                    RebindTaint::Keep
                };
                self.rebind(form.clone(), taint, None);
            }

            let updated = UpdatedEvent { form: &form };
            for hook in &events.on_updated {
                hook(&updated);
            }
        }
        Ok(())
    }

    /// Result handling shared by every submission path. The lifecycle is
    /// completed even when applying the result fails.
    fn process_result(&self, result: &ActionResult, events: &FormEvents) -> FormResult<()> {
        self.inner.current_request.lock().take();

        let mut event = ResultEvent::new(result);
        for hook in &events.on_result {
            hook(&mut event);
        }
        let cancelled = event.is_cancelled();

        let applied = if cancelled {
            debug!("result cancelled by on_result hook");
            Ok(())
        } else if result.is_error() {
            self.route_error(result, events);
            Ok(())
        } else {
            self.apply_result(result, None, events)
        };

        self.inner.lifecycle.completed();
        if !cancelled {
            self.focus_first_error();
        }
        applied
    }

    fn route_error(&self, result: &ActionResult, events: &FormEvents) {
        let ActionResult::Error { status, error } = result else {
            return;
        };
        if self.inner.options.on_error == OnErrorPolicy::Apply {
            self.inner
                .message
                .set(result.error_text().map(serde_json::Value::String));
            return;
        }
        if events.on_error.is_empty() {
            warn!(?status, %error, "error result with no on_error handler");
            return;
        }
        let event = ErrorEvent {
            status: *status,
            error,
            message: &self.inner.message,
        };
        for hook in &events.on_error {
            hook(&event);
        }
    }

    fn focus_first_error(&self) {
        let behavior = self.inner.options.scroll_to_error;
        if behavior == ScrollToError::Off {
            return;
        }
        let Some(focus) = &self.inner.error_focus else {
            return;
        };
        if let Some(first) = self.first_error() {
            focus.focus_first_error(&first, behavior);
        }
    }

    /// Validation payload describing `record` as this form would post it.
    fn outgoing(&self, record: Value, valid: bool, errors: ValidationErrors) -> Validation {
        Validation {
            valid,
            errors,
            data: record,
            empty: false,
            constraints: self.inner.constraints.get(),
            message: None,
            id: self.form_id(),
            meta: self.inner.meta.get(),
        }
    }
}

enum Prepared {
    Local(ActionResult),
    Remote(SubmitRequest),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormInit;
    use crate::options::FormOptions;
    use serde_json::json;

    fn form_with(options: FormOptions) -> SuperForm {
        SuperForm::new(
            FormInit::Data(Value::from(json!({"name": "Ada"}))),
            FormOptions {
                id: Some("profile".into()),
                ..options
            },
        )
        .unwrap()
    }

    fn payload(id: &str, name: &str, valid: bool) -> serde_json::Value {
        json!({"form": {"valid": valid, "empty": false, "id": id, "data": {"name": name}}})
    }

    #[test]
    fn error_results_cannot_be_applied() {
        let f = form_with(FormOptions::default());
        let err = f.update_from_result(
            &ActionResult::Error {
                status: Some(500),
                error: json!("boom"),
            },
            None,
        );
        assert!(matches!(err, Err(FormError::ErrorResultApplied)));
    }

    #[test]
    fn result_data_must_hold_a_form() {
        let f = form_with(FormOptions::default());
        let non_object = ActionResult::Success {
            status: 200,
            data: Some(json!([1, 2])),
        };
        assert!(matches!(
            f.update_from_result(&non_object, None),
            Err(FormError::NonObjectResultData)
        ));

        let no_forms = ActionResult::Success {
            status: 200,
            data: Some(json!({"user": {"name": "x"}})),
        };
        assert!(matches!(
            f.update_from_result(&no_forms, None),
            Err(FormError::NoFormsInResult)
        ));
    }

    #[test]
    fn only_matching_ids_are_applied() {
        let f = form_with(FormOptions::default());
        let other = ActionResult::Success {
            status: 200,
            data: Some(payload("other", "Grace", true)),
        };
        f.update_from_result(&other, None).unwrap();
        assert_eq!(f.value_at(&"name".into()), Some(Value::from("Ada")));

        let mine = ActionResult::Success {
            status: 200,
            data: Some(payload("profile", "Grace", true)),
        };
        f.update_from_result(&mine, None).unwrap();
        assert_eq!(f.value_at(&"name".into()), Some(Value::from("Grace")));
        assert!(f.valid().get());
        assert!(!f.is_tainted());
    }

    #[test]
    fn failure_results_keep_taint() {
        let f = form_with(FormOptions::default());
        let failure = ActionResult::Failure {
            status: 400,
            data: Some(payload("profile", "Grace", false)),
        };
        f.update_from_result(&failure, None).unwrap();
        assert!(f.is_path_tainted(&"name".into()));
        assert!(!f.valid().get());
    }

    #[test]
    fn on_update_can_cancel_and_edit() {
        let f = form_with(FormOptions::default());
        f.on_update(|event| {
            if event.form.data.get("name").and_then(Value::as_str) == Some("Mallory") {
                event.cancel();
            } else {
                event.form.message = Some(json!("saved"));
            }
        });

        let blocked = ActionResult::Success {
            status: 200,
            data: Some(payload("profile", "Mallory", true)),
        };
        f.update_from_result(&blocked, None).unwrap();
        assert_eq!(f.value_at(&"name".into()), Some(Value::from("Ada")));

        let allowed = ActionResult::Success {
            status: 200,
            data: Some(payload("profile", "Grace", true)),
        };
        f.update_from_result(&allowed, None).unwrap();
        assert_eq!(f.message().get(), Some(json!("saved")));
    }

    #[test]
    fn redirect_resets_only_when_configured() {
        let f = form_with(FormOptions::default());
        f.set_path(&"name".into(), Value::from("Grace"), crate::TaintOption::Taint);
        let redirect = ActionResult::Redirect {
            status: 303,
            location: "/done".into(),
        };
        f.update_from_result(&redirect, None).unwrap();
        assert!(f.is_tainted());

        let resetting = form_with(FormOptions {
            reset_form: true,
            ..FormOptions::default()
        });
        resetting.set_path(&"name".into(), Value::from("Grace"), crate::TaintOption::Taint);
        resetting.update_from_result(&redirect, None).unwrap();
        assert!(!resetting.is_tainted());
        assert_eq!(resetting.value_at(&"name".into()), Some(Value::from("Ada")));
    }
}

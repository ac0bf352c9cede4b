//! Lifecycle hooks, run in registration order:
//! `on_submit` → `on_result` → `on_update` → `on_updated`, with `on_error`
//! taking the place of the update hooks for error results.

use std::sync::Arc;

use record::Value;

use crate::options::ScrollToError;
use crate::snapshot::Validation;
use crate::store::Store;
use crate::transport::ActionResult;
use crate::validation_errors::FieldError;

/// Before anything is validated or sent.
#[derive(Debug)]
pub struct SubmitEvent {
    pub data: Value,
    cancelled: bool,
}

impl SubmitEvent {
    pub(crate) fn new(data: Value) -> Self {
        Self {
            data,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// After a raw result arrived. Cancelling skips applying it.
#[derive(Debug)]
pub struct ResultEvent<'a> {
    pub result: &'a ActionResult,
    cancelled: bool,
}

impl<'a> ResultEvent<'a> {
    pub(crate) fn new(result: &'a ActionResult) -> Self {
        Self {
            result,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Before a payload is committed; the payload may be edited in place.
#[derive(Debug)]
pub struct UpdateEvent<'a> {
    pub form: &'a mut Validation,
    cancelled: bool,
}

impl<'a> UpdateEvent<'a> {
    pub(crate) fn new(form: &'a mut Validation) -> Self {
        Self {
            form,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// After a payload was committed.
#[derive(Debug)]
pub struct UpdatedEvent<'a> {
    pub form: &'a Validation,
}

/// An `Error` result reached the form.
pub struct ErrorEvent<'a> {
    pub status: Option<u16>,
    pub error: &'a serde_json::Value,
    /// Handlers may replace the displayed message.
    pub message: &'a Store<Option<serde_json::Value>>,
}

pub type OnSubmit = Arc<dyn Fn(&mut SubmitEvent) + Send + Sync>;
pub type OnResult = Arc<dyn Fn(&mut ResultEvent<'_>) + Send + Sync>;
pub type OnUpdate = Arc<dyn Fn(&mut UpdateEvent<'_>) + Send + Sync>;
pub type OnUpdated = Arc<dyn Fn(&UpdatedEvent<'_>) + Send + Sync>;
pub type OnError = Arc<dyn Fn(&ErrorEvent<'_>) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct FormEvents {
    pub(crate) on_submit: Vec<OnSubmit>,
    pub(crate) on_result: Vec<OnResult>,
    pub(crate) on_update: Vec<OnUpdate>,
    pub(crate) on_updated: Vec<OnUpdated>,
    pub(crate) on_error: Vec<OnError>,
}

/// Host collaborator that brings the first error into view once a
/// submission settles.
pub trait ErrorFocus: Send + Sync {
    fn focus_first_error(&self, error: &FieldError, behavior: ScrollToError);
}

//! Client-side form engine.
//!
//! A [`SuperForm`] keeps a live record together with its error tree, tainted
//! map and submission status, each behind an observable [`Store`]. Writes go
//! through the form so tainting and validation stay consistent; server
//! results come back through [`SuperForm::submit`] or
//! [`SuperForm::update_from_result`].

mod error;
mod form;
mod hooks;
mod lifecycle;
mod options;
mod snapshot;
mod store;
mod submit;
mod tainted;
mod transport;
mod validate;
mod validation_errors;
mod validator;

pub use error::{FormError, FormResult, TransportError};
pub use form::{FormInit, RebindTaint, SuperForm, SuperFormBuilder};
pub use hooks::{
    ErrorEvent, ErrorFocus, OnError, OnResult, OnSubmit, OnUpdate, OnUpdated, ResultEvent,
    SubmitEvent, UpdateEvent, UpdatedEvent,
};
pub use lifecycle::{FetchStatus, SubmitLifecycle};
pub use options::{
    ClearOnSubmit, DataType, DefaultValidator, FormOptions, MultipleSubmits, OnErrorPolicy,
    OptionsContent, ScrollToError, SpaOptions, ValidationMethod, DEFAULT_TAINTED_MESSAGE,
};
pub use snapshot::{FormSnapshot, Validation};
pub use store::{Store, SubscriptionId};
pub use submit::SubmitOutcome;
pub use tainted::{TaintOption, TaintTracker, TaintUpdate, TaintedFields};
pub use transport::{chunk_str, find_forms, ActionResult, SubmitRequest, Transport};
pub use validate::{ValidateOptions, ValidateUpdate};
pub use validation_errors::{FieldError, ValidationErrors};
pub use validator::{FieldCheck, Messages, RuleSchema, Schema, ValidatorNode, Validators};

pub use record;

//! Validator registration: a whole-record schema or a per-field check map.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use record::{for_each_path, Control, FieldPath, PathKey, Tree, Value};

use crate::validation_errors::ValidationErrors;

/// Field check outcome: `None` when the value passes.
pub type Messages = Option<Vec<String>>;

type SyncCheck = dyn Fn(&Value) -> Messages + Send + Sync;
type AsyncCheck = dyn Fn(Value) -> BoxFuture<'static, Messages> + Send + Sync;

/// One field's check, sync or async. Cheap to clone.
#[derive(Clone)]
pub struct FieldCheck {
    inner: CheckFn,
}

#[derive(Clone)]
enum CheckFn {
    Sync(Arc<SyncCheck>),
    Async(Arc<AsyncCheck>),
}

impl FieldCheck {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Messages + Send + Sync + 'static,
    {
        Self {
            inner: CheckFn::Sync(Arc::new(check)),
        }
    }

    pub fn new_async<F, Fut>(check: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Messages> + Send + 'static,
    {
        Self {
            inner: CheckFn::Async(Arc::new(move |value| check(value).boxed())),
        }
    }

    /// Runs the check. An empty message list counts as a pass.
    pub async fn check(&self, value: &Value) -> Messages {
        let messages = match &self.inner {
            CheckFn::Sync(check) => check(value),
            CheckFn::Async(check) => check(value.clone()).await,
        };
        messages.filter(|m| !m.is_empty())
    }
}

impl fmt::Debug for FieldCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            CheckFn::Sync(_) => "sync",
            CheckFn::Async(_) => "async",
        };
        f.debug_struct("FieldCheck").field("kind", &kind).finish()
    }
}

/// A validator for the entire record.
pub trait Schema: Send + Sync {
    /// Validates the whole record. `Err` carries the full error tree.
    fn validate<'a>(&'a self, record: &'a Value) -> BoxFuture<'a, Result<(), ValidationErrors>>;

    /// A check for one index-stripped field path, or `None` when the field
    /// cannot be validated in isolation.
    fn field_validator(&self, path: &FieldPath) -> Option<FieldCheck>;

    /// Whether any cross-field effect exists anywhere in the schema.
    fn has_effects(&self) -> bool;
}

/// Node of a per-field validator map. The map mirrors the record's shape
/// with sequence indices left out.
#[derive(Clone, Debug)]
pub enum ValidatorNode {
    Check(FieldCheck),
    Fields(IndexMap<PathKey, ValidatorNode>),
}

impl ValidatorNode {
    pub fn fields() -> Self {
        ValidatorNode::Fields(IndexMap::new())
    }

    /// Adds a check at `path`, creating intermediate nodes.
    pub fn with(mut self, path: &str, check: FieldCheck) -> Self {
        record::write_at(&mut self, &FieldPath::parse(path), ValidatorNode::Check(check));
        self
    }

    pub fn as_check(&self) -> Option<&FieldCheck> {
        match self {
            ValidatorNode::Check(check) => Some(check),
            ValidatorNode::Fields(_) => None,
        }
    }
}

impl Tree for ValidatorNode {
    fn is_branch(&self) -> bool {
        matches!(self, ValidatorNode::Fields(_))
    }

    fn child(&self, key: &PathKey) -> Option<&Self> {
        match self {
            ValidatorNode::Fields(map) => map.get(key),
            ValidatorNode::Check(_) => None,
        }
    }

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut Self> {
        match self {
            ValidatorNode::Fields(map) => map.get_mut(key),
            ValidatorNode::Check(_) => None,
        }
    }

    fn set_child(&mut self, key: PathKey, child: Self) -> bool {
        match self {
            ValidatorNode::Fields(map) => {
                map.insert(key, child);
                true
            }
            ValidatorNode::Check(_) => false,
        }
    }

    fn entries(&self) -> Vec<(PathKey, &Self)> {
        match self {
            ValidatorNode::Fields(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            ValidatorNode::Check(_) => Vec::new(),
        }
    }

    fn entries_mut(&mut self) -> Vec<(PathKey, &mut Self)> {
        match self {
            ValidatorNode::Fields(map) => map.iter_mut().map(|(k, v)| (k.clone(), v)).collect(),
            ValidatorNode::Check(_) => Vec::new(),
        }
    }

    fn empty_branch() -> Self {
        ValidatorNode::fields()
    }
}

/// Validator registered with a form.
#[derive(Clone)]
pub enum Validators {
    /// `has_effects` is computed once, at registration.
    Schema {
        schema: Arc<dyn Schema>,
        has_effects: bool,
    },
    Map(ValidatorNode),
}

impl Validators {
    pub fn schema(schema: impl Schema + 'static) -> Self {
        let has_effects = schema.has_effects();
        Validators::Schema {
            schema: Arc::new(schema),
            has_effects,
        }
    }

    pub fn map(root: ValidatorNode) -> Self {
        Validators::Map(root)
    }
}

impl fmt::Debug for Validators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validators::Schema { has_effects, .. } => f
                .debug_struct("Schema")
                .field("has_effects", has_effects)
                .finish_non_exhaustive(),
            Validators::Map(root) => f.debug_tuple("Map").field(root).finish(),
        }
    }
}

type Refinement = Arc<dyn Fn(&Value) -> Messages + Send + Sync>;

/// A small declarative schema: per-field rules plus cross-field refinements.
///
/// Field rules are keyed by index-stripped paths and run against every
/// matching node. A refinement sees the whole record and reports at a fixed
/// target path; registering one marks the schema as having effects.
#[derive(Clone, Default)]
pub struct RuleSchema {
    rules: IndexMap<FieldPath, FieldCheck>,
    refinements: Vec<(FieldPath, Refinement)>,
}

impl RuleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: &str, check: FieldCheck) -> Self {
        self.rules.insert(FieldPath::parse(path).without_indices(), check);
        self
    }

    pub fn refine<F>(mut self, target: &str, check: F) -> Self
    where
        F: Fn(&Value) -> Messages + Send + Sync + 'static,
    {
        self.refinements.push((FieldPath::parse(target), Arc::new(check)));
        self
    }
}

impl Schema for RuleSchema {
    fn validate<'a>(&'a self, record: &'a Value) -> BoxFuture<'a, Result<(), ValidationErrors>> {
        async move {
            let mut pending = Vec::new();
            for_each_path(record, |node| {
                if let (Some(check), Some(value)) =
                    (self.rules.get(&node.path.without_indices()), node.value)
                {
                    pending.push((node.path.clone(), check.clone(), value));
                }
                Control::Continue
            });

            let mut errors = ValidationErrors::empty();
            let mut failed = false;
            for (path, check, value) in pending {
                if let Some(messages) = check.check(value).await {
                    errors.set_messages(&path, Some(messages));
                    failed = true;
                }
            }
            for (target, refinement) in &self.refinements {
                if let Some(messages) = refinement(record).filter(|m| !m.is_empty()) {
                    errors.set_messages(target, Some(messages));
                    failed = true;
                }
            }

            if failed {
                Err(errors)
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn field_validator(&self, path: &FieldPath) -> Option<FieldCheck> {
        self.rules.get(path).cloned()
    }

    fn has_effects(&self) -> bool {
        !self.refinements.is_empty()
    }
}

//! Error tree mirroring the record's shape.
//!
//! A cleared leaf stays in the tree as `Leaf(None)` so "has this path ever
//! shown an error" can still be answered after the error went away.

use indexmap::IndexMap;
use record::{for_each_path, for_each_path_mut, walk, walk_with, Control, FieldPath, PathKey, Tree, Visit};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationErrors {
    /// Messages for one field; `None` once cleared.
    Leaf(Option<Vec<String>>),
    Nested {
        /// Object-level messages for the container itself.
        #[serde(rename = "_errors", default, skip_serializing_if = "Option::is_none")]
        errors: Option<Vec<String>>,
        #[serde(flatten)]
        fields: IndexMap<PathKey, ValidationErrors>,
    },
}

/// One flattened message, as produced by [`ValidationErrors::all_errors`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: FieldPath,
    pub message: String,
}

impl Default for ValidationErrors {
    fn default() -> Self {
        Self::empty()
    }
}

impl ValidationErrors {
    pub fn empty() -> Self {
        ValidationErrors::Nested {
            errors: None,
            fields: IndexMap::new(),
        }
    }

    pub fn leaf(messages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ValidationErrors::Leaf(Some(messages.into_iter().map(Into::into).collect()))
    }

    /// True when no message is set anywhere in the tree.
    pub fn is_clear(&self) -> bool {
        self.all_errors().is_empty()
    }

    /// Messages stored at `path`, for a field or a container.
    pub fn messages_at(&self, path: &FieldPath) -> Option<&[String]> {
        let node = if path.is_empty() {
            Some(self)
        } else {
            walk(self, path).and_then(|n| n.value)
        };
        node.and_then(ValidationErrors::own_messages)
    }

    fn own_messages(&self) -> Option<&[String]> {
        match self {
            ValidationErrors::Leaf(messages) => messages.as_deref(),
            ValidationErrors::Nested { errors, .. } => errors.as_deref(),
        }
    }

    /// True once `path` has held an entry, even if it is cleared now.
    pub fn has_entry(&self, path: &FieldPath) -> bool {
        walk(self, path).is_some_and(|n| n.exists())
    }

    /// Writes `messages` at `path`, creating intermediate containers.
    ///
    /// A container at `path` keeps its children and gets the messages as
    /// object-level errors. `None` clears without removing the key.
    pub fn set_messages(&mut self, path: &FieldPath, messages: Option<Vec<String>>) -> bool {
        if path.is_empty() {
            return self.set_own(messages);
        }
        if !self.is_branch() {
            *self = ValidationErrors::empty();
        }
        // A leaf turning into a container keeps its messages as object-level errors.
        let node = walk_with(self, path, |_, existing| match existing {
            Some(ValidationErrors::Leaf(messages)) => Visit::Replace(ValidationErrors::Nested {
                errors: messages.clone(),
                fields: IndexMap::new(),
            }),
            Some(ValidationErrors::Nested { .. }) => Visit::Descend,
            None => Visit::Replace(ValidationErrors::empty()),
        });
        let Some(mut node) = node else {
            return false;
        };
        match node.value_mut() {
            Some(existing @ ValidationErrors::Nested { .. }) => existing.set_own(messages),
            _ => node.set(ValidationErrors::Leaf(messages)),
        }
    }

    fn set_own(&mut self, messages: Option<Vec<String>>) -> bool {
        match self {
            ValidationErrors::Leaf(current) => *current = messages,
            ValidationErrors::Nested { errors, .. } => *errors = messages,
        }
        true
    }

    /// Clears every message while keeping every key.
    pub fn clear_all(&mut self) {
        self.set_own(None);
        for_each_path_mut(self, |_, node| {
            node.set_own(None);
            Control::Continue
        });
    }

    /// Every message in tree order. Object-level messages are reported at
    /// the container's path, before its children.
    pub fn all_errors(&self) -> Vec<FieldError> {
        let mut out = Vec::new();
        push_messages(&mut out, &FieldPath::root(), self.own_messages());
        for_each_path(self, |node| {
            if let Some(value) = node.value {
                push_messages(&mut out, &node.path, value.own_messages());
            }
            Control::Continue
        });
        out
    }

    pub fn first_error(&self) -> Option<FieldError> {
        self.all_errors().into_iter().next()
    }

    /// Paths holding field-level messages.
    pub fn leaf_paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        for_each_path(self, |node| {
            if let Some(ValidationErrors::Leaf(Some(_))) = node.value {
                out.push(node.path.clone());
            }
            Control::Continue
        });
        out
    }
}

fn push_messages(out: &mut Vec<FieldError>, path: &FieldPath, messages: Option<&[String]>) {
    for message in messages.unwrap_or_default() {
        out.push(FieldError {
            path: path.clone(),
            message: message.clone(),
        });
    }
}

impl Tree for ValidationErrors {
    fn is_branch(&self) -> bool {
        matches!(self, ValidationErrors::Nested { .. })
    }

    fn child(&self, key: &PathKey) -> Option<&Self> {
        match self {
            ValidationErrors::Nested { fields, .. } => fields.get(key),
            ValidationErrors::Leaf(_) => None,
        }
    }

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut Self> {
        match self {
            ValidationErrors::Nested { fields, .. } => fields.get_mut(key),
            ValidationErrors::Leaf(_) => None,
        }
    }

    fn set_child(&mut self, key: PathKey, child: Self) -> bool {
        match self {
            ValidationErrors::Nested { fields, .. } => {
                fields.insert(key, child);
                true
            }
            ValidationErrors::Leaf(_) => false,
        }
    }

    fn entries(&self) -> Vec<(PathKey, &Self)> {
        match self {
            ValidationErrors::Nested { fields, .. } => {
                fields.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            ValidationErrors::Leaf(_) => Vec::new(),
        }
    }

    fn entries_mut(&mut self) -> Vec<(PathKey, &mut Self)> {
        match self {
            ValidationErrors::Nested { fields, .. } => {
                fields.iter_mut().map(|(k, v)| (k.clone(), v)).collect()
            }
            ValidationErrors::Leaf(_) => Vec::new(),
        }
    }

    fn empty_branch() -> Self {
        ValidationErrors::empty()
    }
}

//! Tainted map and the diff-driven tracker that maintains it.

use indexmap::IndexMap;
use record::{diff_paths, for_each_path, walk, write_paths, Control, FieldPath, PathKey, Tree, Value};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Mirrors the record's shape. `Leaf(true)` marks an edited field; `false`
/// marks one that was explicitly untainted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaintedFields {
    Leaf(bool),
    Nested(IndexMap<PathKey, TaintedFields>),
}

impl TaintedFields {
    pub fn new() -> Self {
        TaintedFields::Nested(IndexMap::new())
    }

    /// True if any leaf is tainted.
    pub fn any(&self) -> bool {
        if let TaintedFields::Leaf(flag) = self {
            return *flag;
        }
        for_each_path(self, |node| match node.value {
            Some(TaintedFields::Leaf(true)) => Control::Abort,
            _ => Control::Continue,
        }) == Control::Abort
    }

    pub fn is_path_tainted(&self, path: &FieldPath) -> bool {
        matches!(
            walk(self, path).and_then(|n| n.value),
            Some(TaintedFields::Leaf(true))
        )
    }

    /// Tainted leaf paths in tree order.
    pub fn paths(&self) -> Vec<FieldPath> {
        let mut out = Vec::new();
        for_each_path(self, |node| {
            if let Some(TaintedFields::Leaf(true)) = node.value {
                out.push(node.path.clone());
            }
            Control::Continue
        });
        out
    }
}

impl Default for TaintedFields {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree for TaintedFields {
    fn is_branch(&self) -> bool {
        matches!(self, TaintedFields::Nested(_))
    }

    fn child(&self, key: &PathKey) -> Option<&Self> {
        match self {
            TaintedFields::Nested(map) => map.get(key),
            TaintedFields::Leaf(_) => None,
        }
    }

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut Self> {
        match self {
            TaintedFields::Nested(map) => map.get_mut(key),
            TaintedFields::Leaf(_) => None,
        }
    }

    fn set_child(&mut self, key: PathKey, child: Self) -> bool {
        match self {
            TaintedFields::Nested(map) => {
                map.insert(key, child);
                true
            }
            TaintedFields::Leaf(_) => false,
        }
    }

    fn entries(&self) -> Vec<(PathKey, &Self)> {
        match self {
            TaintedFields::Nested(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            TaintedFields::Leaf(_) => Vec::new(),
        }
    }

    fn entries_mut(&mut self) -> Vec<(PathKey, &mut Self)> {
        match self {
            TaintedFields::Nested(map) => map.iter_mut().map(|(k, v)| (k.clone(), v)).collect(),
            TaintedFields::Leaf(_) => Vec::new(),
        }
    }

    fn empty_branch() -> Self {
        TaintedFields::new()
    }
}

/// How a record write affects the tainted map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaintOption {
    /// Programmatic write that leaves taint state alone.
    Silent,
    #[default]
    Taint,
    Untaint,
    UntaintAll,
}

/// Change to apply to the tainted map after a write.
#[derive(Clone, Debug, PartialEq)]
pub enum TaintUpdate {
    Unchanged,
    ClearAll,
    Mark(Vec<FieldPath>),
    Unmark(Vec<FieldPath>),
}

impl TaintUpdate {
    /// Applies the update; returns whether the map changed.
    pub fn apply(&self, tainted: &mut Option<TaintedFields>) -> bool {
        match self {
            TaintUpdate::Unchanged => false,
            TaintUpdate::ClearAll => tainted.take().is_some(),
            TaintUpdate::Mark(paths) => {
                let map = tainted.get_or_insert_with(TaintedFields::new);
                write_paths(map, paths, |_| TaintedFields::Leaf(true)) > 0
            }
            TaintUpdate::Unmark(paths) => match tainted {
                Some(map) => write_paths(map, paths, |_| TaintedFields::Leaf(false)) > 0,
                None => false,
            },
        }
    }
}

/// Holds the last committed record and the paths changed by the latest
/// tainting write.
#[derive(Clone, Debug, Default)]
pub struct TaintTracker {
    baseline: Value,
    last_changes: Vec<FieldPath>,
}

impl TaintTracker {
    pub fn new(baseline: Value) -> Self {
        Self {
            baseline,
            last_changes: Vec::new(),
        }
    }

    pub fn baseline(&self) -> &Value {
        &self.baseline
    }

    /// Diffs `new` against the baseline and rebases onto a clone of `new`,
    /// whatever `option` says.
    pub fn check(&mut self, new: &Value, option: TaintOption) -> TaintUpdate {
        let update = match option {
            TaintOption::Silent => TaintUpdate::Unchanged,
            TaintOption::UntaintAll => TaintUpdate::ClearAll,
            TaintOption::Taint | TaintOption::Untaint => {
                let paths = diff_paths(new, &self.baseline);
                trace!(changed = paths.len(), ?option, "taint check");
                if option == TaintOption::Taint {
                    self.last_changes = paths.clone();
                }
                if paths.is_empty() {
                    TaintUpdate::Unchanged
                } else if option == TaintOption::Taint {
                    TaintUpdate::Mark(paths)
                } else {
                    TaintUpdate::Unmark(paths)
                }
            }
        };
        self.baseline = new.clone();
        update
    }

    /// Replaces the baseline without diffing.
    pub fn rebase(&mut self, value: &Value) {
        self.baseline = value.clone();
    }

    pub fn last_changes(&self) -> &[FieldPath] {
        &self.last_changes
    }

    pub fn take_last_changes(&mut self) -> Vec<FieldPath> {
        std::mem::take(&mut self.last_changes)
    }
}

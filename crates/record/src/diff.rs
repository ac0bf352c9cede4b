use indexmap::IndexSet;
use tracing::trace;

use crate::path::FieldPath;
use crate::traverse::{for_each_path, walk, Control};
use crate::value::Value;

/// Leaf paths that differ between `new` and `old`.
///
/// Both records are swept, so keys that exist on only one side (an element
/// appended to or removed from a sequence) are reported as well as changed
/// values. Paths come back in first-seen order without duplicates.
pub fn diff_paths(new: &Value, old: &Value) -> Vec<FieldPath> {
    let mut changed = IndexSet::new();
    sweep(new, old, &mut changed);
    sweep(old, new, &mut changed);
    trace!(count = changed.len(), "diffed records");
    changed.into_iter().collect()
}

/// True when no leaf differs.
pub fn same_leaves(a: &Value, b: &Value) -> bool {
    diff_paths(a, b).is_empty()
}

fn sweep(from: &Value, other: &Value, changed: &mut IndexSet<FieldPath>) {
    for_each_path(from, |node| {
        let Some(value) = node.value else {
            return Control::Continue;
        };
        if value.is_container() {
            return Control::Continue;
        }
        let counterpart = walk(other, &node.path).and_then(|n| n.value);
        match counterpart {
            Some(theirs) if value.same_leaf(theirs) => {}
            _ => {
                changed.insert(node.path.clone());
            }
        }
        Control::Continue
    });
}

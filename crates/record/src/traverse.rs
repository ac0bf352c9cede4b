//! Path walks and whole-tree traversal over any [`Tree`].
//!
//! Read walks never extend a tree. Writers opt into creating intermediate
//! containers through [`walk_with`] or [`write_at`].

use std::future::Future;

use tracing::trace;

use crate::path::{FieldPath, PathKey};
use crate::tree::Tree;

/// What a traversal visitor wants to happen next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Do not descend into the current node.
    Skip,
    /// Stop the whole traversal.
    Abort,
}

/// Decision of a [`walk_with`] visitor for one intermediate position.
#[derive(Clone, Debug, PartialEq)]
pub enum Visit<T> {
    /// Keep the existing value and descend into it.
    Descend,
    /// Put this value at the position first, then descend into it.
    Replace(T),
    /// Give up on the walk.
    Stop,
}

/// One resolved position in a tree.
///
/// `parent.child(key)` is always `value`. `value` is `None` only for walks
/// whose terminal key is missing from an otherwise resolvable parent;
/// traversal visitors always see a present value.
#[derive(Debug)]
pub struct PathNode<'a, T> {
    pub parent: &'a T,
    pub key: PathKey,
    pub value: Option<&'a T>,
    pub path: FieldPath,
}

impl<'a, T: Tree> PathNode<'a, T> {
    /// Absent values and non-containers are leaves.
    pub fn is_leaf(&self) -> bool {
        self.value.map_or(true, |v| !v.is_branch())
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }
}

/// Mutable counterpart of [`PathNode`], produced by write-oriented walks.
#[derive(Debug)]
pub struct PathNodeMut<'a, T> {
    pub parent: &'a mut T,
    pub key: PathKey,
    pub path: FieldPath,
}

impl<'a, T: Tree> PathNodeMut<'a, T> {
    pub fn value(&self) -> Option<&T> {
        self.parent.child(&self.key)
    }

    pub fn value_mut(&mut self) -> Option<&mut T> {
        self.parent.child_mut(&self.key)
    }

    pub fn is_leaf(&self) -> bool {
        self.value().map_or(true, |v| !v.is_branch())
    }

    /// Assigns at the terminal key. `false` if the parent cannot hold it.
    pub fn set(self, value: T) -> bool {
        self.parent.set_child(self.key, value)
    }
}

/// Resolves `path` against `root` without touching it.
///
/// Returns `None` for the empty path and when any intermediate node is
/// missing or not a container. The terminal value itself may be absent.
pub fn walk<'a, T: Tree>(root: &'a T, path: &FieldPath) -> Option<PathNode<'a, T>> {
    let (last, init) = path.keys().split_last()?;
    let mut parent = root;
    for key in init {
        parent = parent.child(key).filter(|next| next.is_branch())?;
    }
    if !parent.is_branch() {
        return None;
    }
    Some(PathNode {
        parent,
        key: last.clone(),
        value: parent.child(last),
        path: path.clone(),
    })
}

/// Like [`walk`], but `on_visit` sees every intermediate position first and
/// may replace it, which is how writers create missing containers.
pub fn walk_with<'a, T, F>(
    root: &'a mut T,
    path: &FieldPath,
    mut on_visit: F,
) -> Option<PathNodeMut<'a, T>>
where
    T: Tree,
    F: FnMut(&FieldPath, Option<&T>) -> Visit<T>,
{
    let (last, init) = path.keys().split_last()?;
    let mut current = root;
    let mut at = FieldPath::root();
    for key in init {
        at.push(key.clone());
        match on_visit(&at, current.child(key)) {
            Visit::Descend => {}
            Visit::Replace(value) => {
                if !current.set_child(key.clone(), value) {
                    return None;
                }
            }
            Visit::Stop => return None,
        }
        current = match current.child_mut(key) {
            Some(next) if next.is_branch() => next,
            _ => return None,
        };
    }
    if !current.is_branch() {
        return None;
    }
    Some(PathNodeMut {
        parent: current,
        key: last.clone(),
        path: path.clone(),
    })
}

/// Async flavour of [`walk_with`]. The visitor receives an owned copy of the
/// current position so it can hold it across suspension points.
pub async fn walk_async<'a, T, F, Fut>(
    root: &'a mut T,
    path: &FieldPath,
    mut on_visit: F,
) -> Option<PathNodeMut<'a, T>>
where
    T: Tree + Clone,
    F: FnMut(FieldPath, Option<T>) -> Fut,
    Fut: Future<Output = Visit<T>>,
{
    let (last, init) = path.keys().split_last()?;
    let mut current = root;
    let mut at = FieldPath::root();
    for key in init {
        at.push(key.clone());
        let existing = current.child(key).cloned();
        match on_visit(at.clone(), existing).await {
            Visit::Descend => {}
            Visit::Replace(value) => {
                if !current.set_child(key.clone(), value) {
                    return None;
                }
            }
            Visit::Stop => return None,
        }
        current = match current.child_mut(key) {
            Some(next) if next.is_branch() => next,
            _ => return None,
        };
    }
    if !current.is_branch() {
        return None;
    }
    Some(PathNodeMut {
        parent: current,
        key: last.clone(),
        path: path.clone(),
    })
}

/// The node at `path`, if it holds a value accepted by `predicate`.
pub fn path_exists<'a, T, P>(root: &'a T, path: &FieldPath, predicate: P) -> Option<PathNode<'a, T>>
where
    T: Tree,
    P: FnOnce(&T) -> bool,
{
    let node = walk(root, path)?;
    match node.value {
        Some(value) if predicate(value) => Some(node),
        _ => None,
    }
}

/// Pre-order traversal over every node below `root`.
///
/// Returns [`Control::Abort`] if the visitor aborted, [`Control::Continue`]
/// otherwise.
pub fn for_each_path<'a, T, F>(root: &'a T, mut visitor: F) -> Control
where
    T: Tree,
    F: FnMut(&PathNode<'a, T>) -> Control,
{
    visit_children(root, &FieldPath::root(), &mut visitor)
}

/// [`for_each_path`] over a subtree, reporting paths prefixed with `base`.
pub fn for_each_path_from<'a, T, F>(subtree: &'a T, base: &FieldPath, mut visitor: F) -> Control
where
    T: Tree,
    F: FnMut(&PathNode<'a, T>) -> Control,
{
    visit_children(subtree, base, &mut visitor)
}

fn visit_children<'a, T, F>(parent: &'a T, base: &FieldPath, visitor: &mut F) -> Control
where
    T: Tree,
    F: FnMut(&PathNode<'a, T>) -> Control,
{
    for (key, value) in parent.entries() {
        let node = PathNode {
            parent,
            path: base.join(key.clone()),
            key,
            value: Some(value),
        };
        match visitor(&node) {
            Control::Abort => return Control::Abort,
            Control::Skip => continue,
            Control::Continue => {}
        }
        if value.is_branch() && visit_children(value, &node.path, visitor) == Control::Abort {
            return Control::Abort;
        }
    }
    Control::Continue
}

/// Pre-order traversal handing out mutable access to every node.
pub fn for_each_path_mut<T, F>(root: &mut T, mut visitor: F) -> Control
where
    T: Tree,
    F: FnMut(&FieldPath, &mut T) -> Control,
{
    visit_children_mut(root, &FieldPath::root(), &mut visitor)
}

fn visit_children_mut<T, F>(parent: &mut T, base: &FieldPath, visitor: &mut F) -> Control
where
    T: Tree,
    F: FnMut(&FieldPath, &mut T) -> Control,
{
    for (key, value) in parent.entries_mut() {
        let path = base.join(key);
        match visitor(&path, value) {
            Control::Abort => return Control::Abort,
            Control::Skip => continue,
            Control::Continue => {}
        }
        if value.is_branch() && visit_children_mut(value, &path, visitor) == Control::Abort {
            return Control::Abort;
        }
    }
    Control::Continue
}

/// Async pre-order traversal; the visitor is awaited once per node.
///
/// `Skip` and `Abort` mean the same here as in [`for_each_path`].
pub async fn for_each_path_async<'a, T, F, Fut>(root: &'a T, mut visitor: F) -> Control
where
    T: Tree,
    F: FnMut(PathNode<'a, T>) -> Fut,
    Fut: Future<Output = Control>,
{
    let mut pending: Vec<(&'a T, PathKey, &'a T, FieldPath)> = Vec::new();
    push_children(&mut pending, root, &FieldPath::root());

    while let Some((parent, key, value, path)) = pending.pop() {
        let node = PathNode {
            parent,
            key,
            value: Some(value),
            path: path.clone(),
        };
        match visitor(node).await {
            Control::Abort => {
                trace!(%path, "async traversal aborted");
                return Control::Abort;
            }
            Control::Skip => continue,
            Control::Continue => {}
        }
        if value.is_branch() {
            push_children(&mut pending, value, &path);
        }
    }
    Control::Continue
}

// Children go on the stack in reverse so they pop in key order.
fn push_children<'a, T: Tree>(
    pending: &mut Vec<(&'a T, PathKey, &'a T, FieldPath)>,
    parent: &'a T,
    base: &FieldPath,
) {
    for (key, value) in parent.entries().into_iter().rev() {
        let path = base.join(key.clone());
        pending.push((parent, key, value, path));
    }
}

/// Assigns `value` at `path`, creating empty containers wherever an
/// intermediate position is missing or holds a leaf.
///
/// The empty path replaces the root. Returns `false` when a sequence is
/// addressed by a field name.
pub fn write_at<T: Tree>(root: &mut T, path: &FieldPath, value: T) -> bool {
    if path.is_empty() {
        *root = value;
        return true;
    }
    if !root.is_branch() {
        *root = T::empty_branch();
    }
    let node = walk_with(root, path, |_, existing| match existing {
        Some(current) if current.is_branch() => Visit::Descend,
        _ => Visit::Replace(T::empty_branch()),
    });
    match node {
        Some(node) => node.set(value),
        None => false,
    }
}

/// Applies [`write_at`] for every path, computing each value from its path.
/// Returns how many assignments landed.
pub fn write_paths<'p, T, I, F>(root: &mut T, paths: I, mut value: F) -> usize
where
    T: Tree,
    I: IntoIterator<Item = &'p FieldPath>,
    F: FnMut(&FieldPath) -> T,
{
    let mut written = 0;
    for path in paths {
        if write_at(root, path, value(path)) {
            written += 1;
        }
    }
    written
}

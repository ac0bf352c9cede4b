use crate::path::PathKey;

/// Container seam shared by every tree the engine walks: the record itself,
/// the tainted map and the error tree all mirror the same shape, so they all
/// go through the same traversal code.
pub trait Tree: Sized {
    /// True for nodes that hold children (objects and sequences).
    fn is_branch(&self) -> bool;

    fn child(&self, key: &PathKey) -> Option<&Self>;

    fn child_mut(&mut self, key: &PathKey) -> Option<&mut Self>;

    /// Assigns `child` at `key`. Returns `false` when this node cannot hold
    /// the key (it is a leaf, or a sequence addressed by field name).
    fn set_child(&mut self, key: PathKey, child: Self) -> bool;

    /// Children in iteration order.
    fn entries(&self) -> Vec<(PathKey, &Self)>;

    fn entries_mut(&mut self) -> Vec<(PathKey, &mut Self)>;

    /// The container created for missing intermediate nodes on writes.
    fn empty_branch() -> Self;

    fn has_child(&self, key: &PathKey) -> bool {
        self.child(key).is_some()
    }
}

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::label::LabelSet;

struct Root<C> {
    instance: Arc<C>,
    // Whether a handle to the unlabeled instance has been handed out since it was last replaced.
    claimed: bool,
}

/// Storage shared by every metric type: an unlabeled root instance plus one instance per
/// [`LabelSet`], created lazily.
///
/// The empty `LabelSet` always addresses the root.  Unregistering the root swaps in a fresh one,
/// leaving the labeled instances alone.  Labeled instances are kept in creation order.
pub(crate) struct Family<C> {
    name: String,
    root: RwLock<Root<C>>,
    dimensions: RwLock<IndexMap<LabelSet, Arc<C>>>,
}

impl<C> Family<C> {
    pub fn new(name: &str, root: C) -> Self {
        Family {
            name: name.to_owned(),
            root: RwLock::new(Root { instance: Arc::new(root), claimed: false }),
            dimensions: RwLock::new(IndexMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the current root instance.
    pub fn root(&self) -> Arc<C> {
        Arc::clone(&self.root.read().instance)
    }

    /// Gets the instance for `labels`, if it exists.
    pub fn get(&self, labels: &LabelSet) -> Option<Arc<C>> {
        if labels.is_empty() {
            return Some(self.root());
        }

        self.dimensions.read().get(labels).cloned()
    }

    /// Gets the instance for `labels`, creating it with `init` if it does not already exist.
    ///
    /// At most one instance is ever created per `LabelSet`, even when several callers race to
    /// create the same one.  Asking for the root marks it as claimed.
    pub fn get_or_create<F>(&self, labels: &LabelSet, init: F) -> Arc<C>
    where
        F: FnOnce() -> C,
    {
        if labels.is_empty() {
            let mut root = self.root.write();
            root.claimed = true;
            return Arc::clone(&root.instance);
        }

        // Try and get the instance if it exists.
        let dimensions = self.dimensions.read();
        if let Some(instance) = dimensions.get(labels) {
            return Arc::clone(instance);
        }

        // Switch to the write guard, and check again, since another caller may have inserted it
        // between us dropping the read guard and acquiring the write guard.
        drop(dimensions);
        let mut dimensions = self.dimensions.write();
        if let Some(instance) = dimensions.get(labels) {
            return Arc::clone(instance);
        }

        let instance = Arc::new(init());
        dimensions.insert(labels.clone(), Arc::clone(&instance));
        tracing::debug!(name = %self.name, labels = %labels, "created metric dimension");
        instance
    }

    /// Removes the instance stored for `labels`, but only if it is `instance` itself.
    ///
    /// Returns `true` if the instance was removed.  The root is never removed this way; see
    /// [`replace_root`](Family::replace_root).
    pub fn remove(&self, labels: &LabelSet, instance: &Arc<C>) -> bool {
        if labels.is_empty() {
            return false;
        }

        let mut dimensions = self.dimensions.write();
        match dimensions.get(labels) {
            Some(current) if Arc::ptr_eq(current, instance) => {
                dimensions.shift_remove(labels);
                true
            }
            _ => false,
        }
    }

    /// Replaces the root with `fresh`, but only if the current root is `instance` itself.
    ///
    /// Returns `true` if the root was replaced.  The new root is unclaimed.
    pub fn replace_root(&self, instance: &Arc<C>, fresh: C) -> bool {
        let mut root = self.root.write();
        if !Arc::ptr_eq(&root.instance, instance) {
            return false;
        }

        *root = Root { instance: Arc::new(fresh), claimed: false };
        true
    }

    /// Whether no handle can reach this family anymore: the root is unclaimed and there are no
    /// labeled instances.
    pub fn is_vacant(&self) -> bool {
        !self.root.read().claimed && self.dimensions.read().is_empty()
    }

    /// Gets a point-in-time copy of the labeled instances, in creation order.
    pub fn children(&self) -> Vec<(LabelSet, Arc<C>)> {
        self.dimensions
            .read()
            .iter()
            .map(|(labels, instance)| (labels.clone(), Arc::clone(instance)))
            .collect()
    }
}

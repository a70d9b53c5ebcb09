//! Listener capabilities and the fan-out list used to dispatch them.
//!
//! Listeners are registered during setup and read on every notification.
//! Dispatch iterates a snapshot of the list, so no lock is held while a
//! listener runs and a listener may call back into the component that
//! notified it.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::resource::Resource;

/// Receives edge-triggered availability and enablement transitions.
pub trait AvailabilityListener: Send + Sync {
    /// Reachability flipped.
    fn availability_changed(&self, resource: &Resource, available: bool);

    /// Administrative flag flipped.
    fn enablement_changed(&self, _resource: &Resource, _enabled: bool) {}
}

/// Receives in-flight build count changes.
///
/// Counts are delivered after the resource's record is unlocked, so two
/// concurrent changes to one resource may arrive out of order. Listeners
/// that keep the latest count should compare revisions.
pub trait UsageListener: Send + Sync {
    /// The number of builds counted against the resource changed.
    fn usage_changed(&self, resource: &Resource, count: usize);

    /// Same as [`UsageListener::usage_changed`], with the record's revision,
    /// which grows with every change to that resource's count.
    fn usage_revised(&self, resource: &Resource, count: usize, _revision: u64) {
        self.usage_changed(resource, count);
    }
}

/// Ordered list of listeners of one capability.
pub struct ListenerSet<L: ?Sized> {
    listeners: RwLock<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Append a listener; notification order follows registration order.
    pub fn add(&self, listener: Arc<L>) {
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invoke `f` on every listener.
    pub fn notify(&self, mut f: impl FnMut(&L)) {
        let snapshot: Vec<Arc<L>> = self.listeners.read().clone();
        for listener in &snapshot {
            f(listener.as_ref());
        }
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

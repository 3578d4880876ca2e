// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable capabilities consumed by the expression helper.
//!
//! The helper does not own a value. It talks to three collaborators:
//!
//! - the owning [`ObservableValue`], which is the source handed to every
//!   listener callback;
//! - an optional [`PeerObservable`] whose notifications are mirrored into the
//!   owner's listeners;
//! - a [`ListenerErrorSink`] that receives listener panics.
//!
//! [`Owner`] bundles the first and the last. It holds the observable weakly so
//! that a helper stored inside its owner does not keep the owner alive.

use core::fmt;
use std::sync::{Arc, Weak};

use crate::listener::{
    ChangeListener, InvalidationListener, ListenerKind, SubChangeListener,
    SubInvalidationListener,
};
use crate::sink::{ListenerErrorSink, isolate};

/// Bounds required of property values.
///
/// Values are compared with [`PartialEq`] to decide whether a change listener
/// fires, and cloned into each delivery snapshot.
pub trait PropertyValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> PropertyValue for T {}

/// A value that can be observed.
///
/// This is the event source passed to listener callbacks.
pub trait ObservableValue<T>: Send + Sync {
    /// Returns the current value.
    fn value(&self) -> T;
}

/// An observable that other helpers may mirror.
///
/// Implementations serialize registration and firing on their own; the helper
/// only ever calls these methods to attach or detach its proxy listeners.
pub trait PeerObservable<T>: ObservableValue<T> {
    /// Registers an invalidation listener.
    fn add_invalidation_listener(&self, listener: InvalidationListener<T>);
    /// Removes the first registration equal to `listener`.
    fn remove_invalidation_listener(&self, listener: &InvalidationListener<T>);
    /// Registers a sub-invalidation listener.
    fn add_sub_invalidation_listener(&self, listener: SubInvalidationListener<T>);
    /// Removes the first registration equal to `listener`.
    fn remove_sub_invalidation_listener(&self, listener: &SubInvalidationListener<T>);
    /// Registers a change listener.
    fn add_change_listener(&self, listener: ChangeListener<T>);
    /// Removes the first registration equal to `listener`.
    fn remove_change_listener(&self, listener: &ChangeListener<T>);
    /// Registers a sub-change listener.
    fn add_sub_change_listener(&self, listener: SubChangeListener<T>);
    /// Removes the first registration equal to `listener`.
    fn remove_sub_change_listener(&self, listener: &SubChangeListener<T>);

    /// Returns the observable this one mirrors in turn, if any.
    ///
    /// Used to reject peer chains that lead back to their start.
    fn peer(&self) -> Option<Arc<dyn PeerObservable<T>>> {
        None
    }
}

/// Returns `true` if `a` and `b` are the same observable object.
#[must_use]
pub fn same_observable<T>(a: &dyn ObservableValue<T>, b: &dyn ObservableValue<T>) -> bool {
    core::ptr::addr_eq(core::ptr::from_ref(a), core::ptr::from_ref(b))
}

/// The owning side of an expression helper.
pub struct Owner<T> {
    observable: Weak<dyn ObservableValue<T>>,
    sink: Arc<dyn ListenerErrorSink>,
}

impl<T: 'static> Owner<T> {
    /// Creates an owner from a weak reference to the observable.
    #[must_use]
    pub fn new(observable: Weak<dyn ObservableValue<T>>, sink: Arc<dyn ListenerErrorSink>) -> Self {
        Self { observable, sink }
    }

    /// Creates an owner for an observable that is already shared.
    #[must_use]
    pub fn from_arc<O>(observable: &Arc<O>, sink: Arc<dyn ListenerErrorSink>) -> Self
    where
        O: ObservableValue<T> + 'static,
    {
        let observable: Weak<O> = Arc::downgrade(observable);
        Self { observable, sink }
    }

    /// Returns the observable, unless it has been dropped.
    #[must_use]
    pub fn observable(&self) -> Option<Arc<dyn ObservableValue<T>>> {
        self.observable.upgrade()
    }

    /// Returns `true` while the observable is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.observable.strong_count() > 0
    }

    /// Returns the observable's current value, unless it has been dropped.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.observable().map(|observable| observable.value())
    }

    /// Returns the sink that receives listener panics.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn ListenerErrorSink> {
        &self.sink
    }

    /// Runs `notify` with the owner as event source, isolating panics.
    ///
    /// Does nothing once the observable has been dropped.
    pub(crate) fn notify(&self, kind: ListenerKind, notify: impl FnOnce(&dyn ObservableValue<T>)) {
        if let Some(source) = self.observable() {
            isolate(kind, &*self.sink, || notify(&*source));
        }
    }
}

impl<T> Clone for Owner<T> {
    fn clone(&self) -> Self {
        Self {
            observable: Weak::clone(&self.observable),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<T> fmt::Debug for Owner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("alive", &(self.observable.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

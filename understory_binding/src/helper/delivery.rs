// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delivery snapshots.
//!
//! Preparing a delivery captures the listeners to call and the old/new pair to
//! report; running it happens later, after the caller has released any lock it
//! holds on the helper. Listener lists are shared copy-on-write, so a snapshot
//! is a reference count bump and a listener that mutates the helper during the
//! pass only ever changes the helper's copy.

use core::{fmt, mem, slice};
use std::sync::Arc;

use crate::listener::{
    ChangeListener, InvalidationListener, ListenerKind, SubChangeListener,
    SubInvalidationListener,
};
use crate::observable::{Owner, PropertyValue};
use crate::sink::isolate;

/// The listeners of one kind captured for a delivery.
pub(crate) enum Batch<L> {
    Empty,
    One(L),
    Many(Arc<Vec<L>>),
}

impl<L> Batch<L> {
    pub(crate) fn shared(listeners: &Arc<Vec<L>>) -> Self {
        if listeners.is_empty() {
            Self::Empty
        } else {
            Self::Many(Arc::clone(listeners))
        }
    }

    fn as_slice(&self) -> &[L] {
        match self {
            Self::Empty => &[],
            Self::One(listener) => slice::from_ref(listener),
            Self::Many(listeners) => listeners.as_slice(),
        }
    }

    fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

/// A prepared, not yet run, notification pass.
///
/// Obtained from [`ExpressionHelper::prepare_value_changed`] or
/// [`ExpressionHelper::replace_peer`]; run it with [`Delivery::deliver`].
///
/// [`ExpressionHelper::prepare_value_changed`]: crate::ExpressionHelper::prepare_value_changed
/// [`ExpressionHelper::replace_peer`]: crate::ExpressionHelper::replace_peer
#[must_use = "a delivery does nothing until `deliver` is called"]
pub struct Delivery<T> {
    owner: Owner<T>,
    sub_change: bool,
    pub(crate) invalidation: Batch<InvalidationListener<T>>,
    pub(crate) sub_invalidation: Batch<SubInvalidationListener<T>>,
    pub(crate) change: Batch<ChangeListener<T>>,
    pub(crate) sub_change_listeners: Batch<SubChangeListener<T>>,
    values: Option<(T, T)>,
}

impl<T: PropertyValue> Delivery<T> {
    pub(crate) fn new(owner: Owner<T>, sub_change: bool) -> Self {
        Self {
            owner,
            sub_change,
            invalidation: Batch::Empty,
            sub_invalidation: Batch::Empty,
            change: Batch::Empty,
            sub_change_listeners: Batch::Empty,
            values: None,
        }
    }

    /// Swaps `new_value` into `tracked` and records the old/new pair if the
    /// change-kind listeners should hear about it.
    ///
    /// A non-sub change that leaves the value equal reports nothing, so neither
    /// change nor sub-change listeners run for it.
    pub(crate) fn track(&mut self, tracked: &mut T, new_value: T) {
        let old_value = mem::replace(tracked, new_value.clone());
        if self.sub_change || old_value != new_value {
            self.values = Some((old_value, new_value));
        }
    }

    /// Returns `true` if running this delivery would call no listener.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let no_values = self.values.is_none()
            || (self.change.is_empty() && self.sub_change_listeners.is_empty());
        self.invalidation.is_empty() && self.sub_invalidation.is_empty() && no_values
    }

    /// Returns `true` if this delivery reports a sub change.
    #[must_use]
    pub fn is_sub_change(&self) -> bool {
        self.sub_change
    }

    /// Runs the delivery.
    ///
    /// Order is fixed: invalidation, sub-invalidation, change, sub-change, each
    /// in registration order. A panicking listener is reported to the owner's
    /// sink and the pass continues with the next listener. Nothing runs if the
    /// owner has been dropped.
    pub fn deliver(self) {
        let Some(source) = self.owner.observable() else {
            return;
        };
        let source = &*source;
        let sink = &**self.owner.sink();
        let sub_change = self.sub_change;

        for listener in self.invalidation.as_slice() {
            isolate(ListenerKind::Invalidation, sink, || {
                listener.invalidated(source);
            });
        }
        for listener in self.sub_invalidation.as_slice() {
            isolate(ListenerKind::SubInvalidation, sink, || {
                listener.invalidated(source, sub_change);
            });
        }

        let Some((old_value, new_value)) = &self.values else {
            return;
        };
        for listener in self.change.as_slice() {
            isolate(ListenerKind::Change, sink, || {
                listener.changed(source, old_value, new_value);
            });
        }
        for listener in self.sub_change_listeners.as_slice() {
            isolate(ListenerKind::SubChange, sink, || {
                listener.changed(source, old_value, new_value, sub_change);
            });
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Delivery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("sub_change", &self.sub_change)
            .field("invalidation", &self.invalidation.as_slice().len())
            .field("sub_invalidation", &self.sub_invalidation.as_slice().len())
            .field("change", &self.change.as_slice().len())
            .field("sub_change_listeners", &self.sub_change_listeners.as_slice().len())
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

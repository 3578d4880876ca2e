// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener kinds.
//!
//! A property distinguishes four independent kinds of listener:
//!
//! | Kind | Callback | Delivered when |
//! |------|----------|----------------|
//! | [`InvalidationListener`] | `(source)` | non-sub changes |
//! | [`SubInvalidationListener`] | `(source, sub_change)` | every change |
//! | [`ChangeListener`] | `(source, old, new)` | non-sub changes with `old != new` |
//! | [`SubChangeListener`] | `(source, old, new, sub_change)` | `sub_change \|\| old != new` |
//!
//! Every listener is a cheap handle around a shared callback. Cloning a
//! listener yields a handle that compares equal to the original; two listeners
//! built from separate closures never compare equal, even if the closures are
//! identical. Removal uses this equality.

use core::fmt;
use std::sync::Arc;

use crate::observable::{ObservableValue, PeerObservable};

type InvalidationFn<T> = dyn Fn(&dyn ObservableValue<T>) + Send + Sync;
type SubInvalidationFn<T> = dyn Fn(&dyn ObservableValue<T>, bool) + Send + Sync;
type ChangeFn<T> = dyn Fn(&dyn ObservableValue<T>, &T, &T) + Send + Sync;
type SubChangeFn<T> = dyn Fn(&dyn ObservableValue<T>, &T, &T, bool) + Send + Sync;

/// Implements identity equality and `Debug` for a listener handle.
macro_rules! listener_handle {
    ($name:ident) => {
        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.callback, &other.callback)
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("callback", &Arc::as_ptr(&self.callback).cast::<()>())
                    .finish_non_exhaustive()
            }
        }
    };
}

/// Notified when the value becomes invalid because of a non-sub change.
pub struct InvalidationListener<T> {
    callback: Arc<InvalidationFn<T>>,
}

impl<T> InvalidationListener<T> {
    /// Wraps `callback` into a listener handle.
    pub fn new(callback: impl Fn(&dyn ObservableValue<T>) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Invokes the listener.
    #[inline]
    pub fn invalidated(&self, source: &dyn ObservableValue<T>) {
        (self.callback)(source);
    }
}

impl<T> Clone for InvalidationListener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

listener_handle!(InvalidationListener);

/// Notified on every change, including sub (nested) changes.
pub struct SubInvalidationListener<T> {
    callback: Arc<SubInvalidationFn<T>>,
}

impl<T> SubInvalidationListener<T> {
    /// Wraps `callback` into a listener handle.
    pub fn new(callback: impl Fn(&dyn ObservableValue<T>, bool) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Invokes the listener.
    #[inline]
    pub fn invalidated(&self, source: &dyn ObservableValue<T>, sub_change: bool) {
        (self.callback)(source, sub_change);
    }
}

impl<T> Clone for SubInvalidationListener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

listener_handle!(SubInvalidationListener);

/// Notified with the old and new value when a non-sub change alters the value.
pub struct ChangeListener<T> {
    callback: Arc<ChangeFn<T>>,
    bidirectional: bool,
}

impl<T> ChangeListener<T> {
    /// Wraps `callback` into a listener handle.
    pub fn new(callback: impl Fn(&dyn ObservableValue<T>, &T, &T) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
            bidirectional: false,
        }
    }

    /// Wraps `callback` into a listener tagged as a bidirectional binding endpoint.
    ///
    /// See [`crate::ExpressionHelper::contains_bidirectional_binding_endpoints`].
    pub fn bidirectional(
        callback: impl Fn(&dyn ObservableValue<T>, &T, &T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(callback),
            bidirectional: true,
        }
    }

    /// Returns `true` if this listener is one end of a bidirectional binding.
    #[must_use]
    #[inline]
    pub fn is_bidirectional_marker(&self) -> bool {
        self.bidirectional
    }

    /// Invokes the listener.
    #[inline]
    pub fn changed(&self, source: &dyn ObservableValue<T>, old_value: &T, new_value: &T) {
        (self.callback)(source, old_value, new_value);
    }
}

impl<T> Clone for ChangeListener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            bidirectional: self.bidirectional,
        }
    }
}

listener_handle!(ChangeListener);

/// Notified with the old and new value on every change that is either a sub
/// change or alters the value.
pub struct SubChangeListener<T> {
    callback: Arc<SubChangeFn<T>>,
}

impl<T> SubChangeListener<T> {
    /// Wraps `callback` into a listener handle.
    pub fn new(
        callback: impl Fn(&dyn ObservableValue<T>, &T, &T, bool) + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Invokes the listener.
    #[inline]
    pub fn changed(
        &self,
        source: &dyn ObservableValue<T>,
        old_value: &T,
        new_value: &T,
        sub_change: bool,
    ) {
        (self.callback)(source, old_value, new_value, sub_change);
    }
}

impl<T> Clone for SubChangeListener<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

listener_handle!(SubChangeListener);

/// The kind of a listener, without the listener itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// [`InvalidationListener`].
    Invalidation,
    /// [`SubInvalidationListener`].
    SubInvalidation,
    /// [`ChangeListener`].
    Change,
    /// [`SubChangeListener`].
    SubChange,
}

impl ListenerKind {
    /// All kinds, in delivery order.
    pub const ALL: [Self; 4] = [
        Self::Invalidation,
        Self::SubInvalidation,
        Self::Change,
        Self::SubChange,
    ];

    /// Returns `true` for the kinds that need the previous value to decide
    /// whether to deliver.
    #[must_use]
    pub const fn tracks_value(self) -> bool {
        matches!(self, Self::Change | Self::SubChange)
    }

    /// Converts this kind into a single-element [`ListenerKinds`].
    #[must_use]
    pub const fn into_set(self) -> ListenerKinds {
        match self {
            Self::Invalidation => ListenerKinds::INVALIDATION,
            Self::SubInvalidation => ListenerKinds::SUB_INVALIDATION,
            Self::Change => ListenerKinds::CHANGE,
            Self::SubChange => ListenerKinds::SUB_CHANGE,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Invalidation => 0,
            Self::SubInvalidation => 1,
            Self::Change => 2,
            Self::SubChange => 3,
        }
    }
}

bitflags::bitflags! {
    /// A set of [`ListenerKind`]s.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ListenerKinds: u8 {
        /// [`ListenerKind::Invalidation`].
        const INVALIDATION = 1;
        /// [`ListenerKind::SubInvalidation`].
        const SUB_INVALIDATION = 1 << 1;
        /// [`ListenerKind::Change`].
        const CHANGE = 1 << 2;
        /// [`ListenerKind::SubChange`].
        const SUB_CHANGE = 1 << 3;
    }
}

impl From<ListenerKind> for ListenerKinds {
    fn from(kind: ListenerKind) -> Self {
        kind.into_set()
    }
}

/// A listener of any kind.
pub enum AnyListener<T> {
    /// An invalidation listener.
    Invalidation(InvalidationListener<T>),
    /// A sub-invalidation listener.
    SubInvalidation(SubInvalidationListener<T>),
    /// A change listener.
    Change(ChangeListener<T>),
    /// A sub-change listener.
    SubChange(SubChangeListener<T>),
}

impl<T> AnyListener<T> {
    /// Returns the kind of the wrapped listener.
    #[must_use]
    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::Invalidation(_) => ListenerKind::Invalidation,
            Self::SubInvalidation(_) => ListenerKind::SubInvalidation,
            Self::Change(_) => ListenerKind::Change,
            Self::SubChange(_) => ListenerKind::SubChange,
        }
    }

    /// Returns `true` if this is a change listener tagged as a bidirectional
    /// binding endpoint.
    #[must_use]
    pub fn is_bidirectional_marker(&self) -> bool {
        matches!(self, Self::Change(listener) if listener.is_bidirectional_marker())
    }

    pub(crate) fn attach_to(&self, peer: &dyn PeerObservable<T>) {
        match self {
            Self::Invalidation(l) => peer.add_invalidation_listener(l.clone()),
            Self::SubInvalidation(l) => peer.add_sub_invalidation_listener(l.clone()),
            Self::Change(l) => peer.add_change_listener(l.clone()),
            Self::SubChange(l) => peer.add_sub_change_listener(l.clone()),
        }
    }

    pub(crate) fn detach_from(&self, peer: &dyn PeerObservable<T>) {
        match self {
            Self::Invalidation(l) => peer.remove_invalidation_listener(l),
            Self::SubInvalidation(l) => peer.remove_sub_invalidation_listener(l),
            Self::Change(l) => peer.remove_change_listener(l),
            Self::SubChange(l) => peer.remove_sub_change_listener(l),
        }
    }
}

impl<T> Clone for AnyListener<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Invalidation(l) => Self::Invalidation(l.clone()),
            Self::SubInvalidation(l) => Self::SubInvalidation(l.clone()),
            Self::Change(l) => Self::Change(l.clone()),
            Self::SubChange(l) => Self::SubChange(l.clone()),
        }
    }
}

impl<T> PartialEq for AnyListener<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Invalidation(a), Self::Invalidation(b)) => a == b,
            (Self::SubInvalidation(a), Self::SubInvalidation(b)) => a == b,
            (Self::Change(a), Self::Change(b)) => a == b,
            (Self::SubChange(a), Self::SubChange(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> Eq for AnyListener<T> {}

impl<T> fmt::Debug for AnyListener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalidation(l) => l.fmt(f),
            Self::SubInvalidation(l) => l.fmt(f),
            Self::Change(l) => l.fmt(f),
            Self::SubChange(l) => l.fmt(f),
        }
    }
}

impl<T> From<InvalidationListener<T>> for AnyListener<T> {
    fn from(listener: InvalidationListener<T>) -> Self {
        Self::Invalidation(listener)
    }
}

impl<T> From<SubInvalidationListener<T>> for AnyListener<T> {
    fn from(listener: SubInvalidationListener<T>) -> Self {
        Self::SubInvalidation(listener)
    }
}

impl<T> From<ChangeListener<T>> for AnyListener<T> {
    fn from(listener: ChangeListener<T>) -> Self {
        Self::Change(listener)
    }
}

impl<T> From<SubChangeListener<T>> for AnyListener<T> {
    fn from(listener: SubChangeListener<T>) -> Self {
        Self::SubChange(listener)
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-listener helper state.

use core::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::delivery::{Batch, Delivery};
use super::single::Single;
use crate::listener::{
    AnyListener, ChangeListener, InvalidationListener, ListenerKind, ListenerKinds,
    SubChangeListener, SubInvalidationListener,
};
use crate::observable::{Owner, PeerObservable, PropertyValue};

/// Per-kind listener sequences.
///
/// Each sequence is shared copy-on-write: a delivery in progress holds a clone
/// of the `Arc`, so a mutation made while it runs copies the vector instead of
/// touching what the delivery iterates.
struct Lists<T> {
    invalidation: Arc<Vec<InvalidationListener<T>>>,
    sub_invalidation: Arc<Vec<SubInvalidationListener<T>>>,
    change: Arc<Vec<ChangeListener<T>>>,
    sub_change: Arc<Vec<SubChangeListener<T>>>,
}

impl<T> Lists<T> {
    fn new() -> Self {
        Self {
            invalidation: Arc::default(),
            sub_invalidation: Arc::default(),
            change: Arc::default(),
            sub_change: Arc::default(),
        }
    }

    fn len(&self, kind: ListenerKind) -> usize {
        match kind {
            ListenerKind::Invalidation => self.invalidation.len(),
            ListenerKind::SubInvalidation => self.sub_invalidation.len(),
            ListenerKind::Change => self.change.len(),
            ListenerKind::SubChange => self.sub_change.len(),
        }
    }

    fn total(&self) -> usize {
        ListenerKind::ALL.iter().map(|&kind| self.len(kind)).sum()
    }

    fn kinds(&self) -> ListenerKinds {
        ListenerKind::ALL
            .into_iter()
            .filter(|&kind| self.len(kind) > 0)
            .fold(ListenerKinds::empty(), |kinds, kind| kinds | kind.into_set())
    }

    fn push(&mut self, listener: AnyListener<T>) {
        match listener {
            AnyListener::Invalidation(l) => Arc::make_mut(&mut self.invalidation).push(l),
            AnyListener::SubInvalidation(l) => Arc::make_mut(&mut self.sub_invalidation).push(l),
            AnyListener::Change(l) => Arc::make_mut(&mut self.change).push(l),
            AnyListener::SubChange(l) => Arc::make_mut(&mut self.sub_change).push(l),
        }
    }

    /// Removes the first registration equal to `listener`.
    fn remove(&mut self, listener: &AnyListener<T>) -> bool {
        match listener {
            AnyListener::Invalidation(l) => remove_first(&mut self.invalidation, l),
            AnyListener::SubInvalidation(l) => remove_first(&mut self.sub_invalidation, l),
            AnyListener::Change(l) => remove_first(&mut self.change, l),
            AnyListener::SubChange(l) => remove_first(&mut self.sub_change, l),
        }
    }

    /// Returns the only registered listener, if exactly one remains.
    fn only(&self) -> Option<AnyListener<T>> {
        if self.total() != 1 {
            return None;
        }
        self.invalidation
            .first()
            .map(|l| AnyListener::Invalidation(l.clone()))
            .or_else(|| {
                self.sub_invalidation
                    .first()
                    .map(|l| AnyListener::SubInvalidation(l.clone()))
            })
            .or_else(|| self.change.first().map(|l| AnyListener::Change(l.clone())))
            .or_else(|| {
                self.sub_change
                    .first()
                    .map(|l| AnyListener::SubChange(l.clone()))
            })
    }
}

fn remove_first<L: Clone + PartialEq>(list: &mut Arc<Vec<L>>, listener: &L) -> bool {
    match list.iter().position(|candidate| candidate == listener) {
        Some(index) => {
            Arc::make_mut(list).remove(index);
            true
        }
        None => false,
    }
}

/// What a removal left behind.
pub(crate) enum Removal<T> {
    /// The listener was not registered; the helper is unchanged.
    NotFound(Generic<T>),
    /// The listener was removed and two or more remain.
    Kept(Generic<T>),
    /// The listener was removed and exactly one remains.
    Collapsed(Single<T>),
}

/// A helper holding any number of listeners of any kinds.
///
/// At most one peer listener per kind is registered on the peer. It fans out
/// to whatever listeners of that kind are registered when the peer fires, with
/// the owner as source.
pub struct Generic<T> {
    owner: Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    lists: Arc<Mutex<Lists<T>>>,
    peer_listeners: [Option<AnyListener<T>>; 4],
    current_value: T,
}

impl<T: PropertyValue> Generic<T> {
    pub(crate) fn new(
        owner: Owner<T>,
        peer: Option<Arc<dyn PeerObservable<T>>>,
        current_value: T,
    ) -> Self {
        Self {
            owner,
            peer,
            lists: Arc::new(Mutex::new(Lists::new())),
            peer_listeners: [None, None, None, None],
            current_value,
        }
    }

    /// Returns the number of registered listeners of `kind`.
    #[must_use]
    pub fn len(&self, kind: ListenerKind) -> usize {
        self.lists.lock().len(kind)
    }

    /// Returns the total number of registered listeners.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lists.lock().total()
    }

    /// Returns the kinds that have at least one listener.
    #[must_use]
    pub fn kinds(&self) -> ListenerKinds {
        self.lists.lock().kinds()
    }

    /// Returns the kinds whose fan-out listener is registered on the peer.
    #[must_use]
    pub fn peer_kinds(&self) -> ListenerKinds {
        ListenerKind::ALL
            .into_iter()
            .filter(|kind| self.peer_listeners[kind.index()].is_some())
            .fold(ListenerKinds::empty(), |kinds, kind| kinds | kind.into_set())
    }

    pub(crate) fn peer(&self) -> Option<&Arc<dyn PeerObservable<T>>> {
        self.peer.as_ref()
    }

    pub(crate) fn add(&mut self, listener: AnyListener<T>, current_value: T) {
        let kind = listener.kind();
        let first_of_kind = {
            let mut lists = self.lists.lock();
            lists.push(listener);
            lists.len(kind) == 1
        };
        if first_of_kind {
            if kind.tracks_value() {
                self.current_value = current_value;
            }
            self.ensure_peer_listener(kind);
        }
    }

    pub(crate) fn remove(mut self, listener: &AnyListener<T>) -> Removal<T> {
        let kind = listener.kind();
        let (kind_emptied, only) = {
            let mut lists = self.lists.lock();
            if !lists.remove(listener) {
                drop(lists);
                return Removal::NotFound(self);
            }
            (lists.len(kind) == 0, lists.only())
        };

        // A generic helper holds two or more listeners, so one remains at least.
        match only {
            Some(only) => {
                self.detach_peer();
                tracing::trace!(kind = ?only.kind(), "collapsing generic helper");
                Removal::Collapsed(Single::new(self.owner, self.peer, self.current_value, only))
            }
            None => {
                if kind_emptied {
                    self.release_peer_listener(kind);
                }
                Removal::Kept(self)
            }
        }
    }

    pub(crate) fn validates_value(&self) -> bool {
        let lists = self.lists.lock();
        !lists.change.is_empty() || !lists.sub_change.is_empty()
    }

    pub(crate) fn contains_bidirectional_binding_endpoints(&self) -> bool {
        self.lists
            .lock()
            .change
            .iter()
            .any(ChangeListener::is_bidirectional_marker)
    }

    pub(crate) fn prepare(&mut self, new_value: T, sub_change: bool) -> Delivery<T> {
        let mut delivery = Delivery::new(self.owner.clone(), sub_change);
        let tracks_value = {
            let lists = self.lists.lock();
            if !sub_change {
                delivery.invalidation = Batch::shared(&lists.invalidation);
                delivery.change = Batch::shared(&lists.change);
            }
            delivery.sub_invalidation = Batch::shared(&lists.sub_invalidation);
            delivery.sub_change_listeners = Batch::shared(&lists.sub_change);
            !lists.change.is_empty() || !lists.sub_change.is_empty()
        };
        if tracks_value {
            delivery.track(&mut self.current_value, new_value);
        }
        delivery
    }

    pub(crate) fn replace_peer(&mut self, peer: Option<Arc<dyn PeerObservable<T>>>) -> Delivery<T> {
        self.detach_peer();
        self.peer = peer;
        let kinds = self.kinds();
        for kind in ListenerKind::ALL {
            if kinds.contains(kind.into_set()) {
                self.ensure_peer_listener(kind);
            }
        }
        match self.owner.value() {
            Some(value) => self.prepare(value, false),
            None => Delivery::new(self.owner.clone(), false),
        }
    }

    /// Deregisters every fan-out listener from the peer.
    pub(crate) fn detach_peer(&mut self) {
        for kind in ListenerKind::ALL {
            self.release_peer_listener(kind);
        }
    }

    fn ensure_peer_listener(&mut self, kind: ListenerKind) {
        let Some(peer) = &self.peer else {
            return;
        };
        let slot = &mut self.peer_listeners[kind.index()];
        if slot.is_none() {
            let listener = fan_out(kind, Arc::downgrade(&self.lists), self.owner.clone());
            listener.attach_to(&**peer);
            *slot = Some(listener);
        }
    }

    fn release_peer_listener(&mut self, kind: ListenerKind) {
        if let Some(listener) = self.peer_listeners[kind.index()].take()
            && let Some(peer) = &self.peer
        {
            listener.detach_from(&**peer);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Generic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lists = self.lists.lock();
        f.debug_struct("Generic")
            .field("invalidation", &lists.invalidation.len())
            .field("sub_invalidation", &lists.sub_invalidation.len())
            .field("change", &lists.change.len())
            .field("sub_change", &lists.sub_change.len())
            .field("has_peer", &self.peer.is_some())
            .field("current_value", &self.current_value)
            .finish_non_exhaustive()
    }
}

/// Builds the peer listener for `kind`.
///
/// The listener snapshots the current sequence of its kind, releases the lock
/// and notifies each listener in turn with the owner as source.
fn fan_out<T: PropertyValue>(
    kind: ListenerKind,
    lists: Weak<Mutex<Lists<T>>>,
    owner: Owner<T>,
) -> AnyListener<T> {
    match kind {
        ListenerKind::Invalidation => InvalidationListener::new(move |_peer| {
            let Some(lists) = lists.upgrade() else {
                return;
            };
            let snapshot = Arc::clone(&lists.lock().invalidation);
            for listener in snapshot.iter() {
                owner.notify(kind, |source| listener.invalidated(source));
            }
        })
        .into(),
        ListenerKind::SubInvalidation => SubInvalidationListener::new(move |_peer, sub_change| {
            let Some(lists) = lists.upgrade() else {
                return;
            };
            let snapshot = Arc::clone(&lists.lock().sub_invalidation);
            for listener in snapshot.iter() {
                owner.notify(kind, |source| listener.invalidated(source, sub_change));
            }
        })
        .into(),
        ListenerKind::Change => ChangeListener::new(move |_peer, old_value: &T, new_value: &T| {
            let Some(lists) = lists.upgrade() else {
                return;
            };
            let snapshot = Arc::clone(&lists.lock().change);
            for listener in snapshot.iter() {
                owner.notify(kind, |source| listener.changed(source, old_value, new_value));
            }
        })
        .into(),
        ListenerKind::SubChange => SubChangeListener::new(
            move |_peer, old_value: &T, new_value: &T, sub_change| {
                let Some(lists) = lists.upgrade() else {
                    return;
                };
                let snapshot = Arc::clone(&lists.lock().sub_change);
                for listener in snapshot.iter() {
                    owner.notify(kind, |source| {
                        listener.changed(source, old_value, new_value, sub_change);
                    });
                }
            },
        )
        .into(),
    }
}

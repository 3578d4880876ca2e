// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-listener helper state.

use core::fmt;
use std::sync::Arc;

use super::delivery::{Batch, Delivery};
use super::generic::Generic;
use crate::listener::{
    AnyListener, ChangeListener, InvalidationListener, ListenerKind, SubChangeListener,
    SubInvalidationListener,
};
use crate::observable::{Owner, PeerObservable, PropertyValue};

/// A helper holding exactly one listener.
///
/// While a peer is set, a proxy of the listener is registered on it. The proxy
/// re-targets every notification so the listener sees the owner, never the peer,
/// as its source.
pub struct Single<T> {
    owner: Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    listener: AnyListener<T>,
    peer_listener: AnyListener<T>,
    current_value: T,
}

impl<T: PropertyValue> Single<T> {
    pub(crate) fn new(
        owner: Owner<T>,
        peer: Option<Arc<dyn PeerObservable<T>>>,
        current_value: T,
        listener: AnyListener<T>,
    ) -> Self {
        let peer_listener = proxy(&listener, &owner);
        let single = Self {
            owner,
            peer,
            listener,
            peer_listener,
            current_value,
        };
        single.attach_peer();
        single
    }

    /// Returns the stored listener.
    #[must_use]
    pub fn listener(&self) -> &AnyListener<T> {
        &self.listener
    }

    /// Returns the kind of the stored listener.
    #[must_use]
    pub fn kind(&self) -> ListenerKind {
        self.listener.kind()
    }

    pub(crate) fn peer(&self) -> Option<&Arc<dyn PeerObservable<T>>> {
        self.peer.as_ref()
    }

    /// Hands the stored listener and `listener` over to a generic helper.
    pub(crate) fn promote(self, listener: AnyListener<T>, current_value: T) -> Generic<T> {
        self.detach_peer();
        tracing::trace!(
            from = ?self.listener.kind(),
            added = ?listener.kind(),
            "promoting single-listener helper"
        );
        let mut generic = Generic::new(self.owner, self.peer, current_value.clone());
        generic.add(self.listener, current_value.clone());
        generic.add(listener, current_value);
        generic
    }

    /// Returns `None` if `listener` is the stored listener, `Some(self)` otherwise.
    pub(crate) fn remove(self, listener: &AnyListener<T>) -> Option<Self> {
        if self.listener == *listener {
            self.detach_peer();
            None
        } else {
            Some(self)
        }
    }

    pub(crate) fn validates_value(&self) -> bool {
        self.kind().tracks_value()
    }

    pub(crate) fn contains_bidirectional_binding_endpoints(&self) -> bool {
        self.listener.is_bidirectional_marker()
    }

    pub(crate) fn prepare(&mut self, new_value: T, sub_change: bool) -> Delivery<T> {
        let mut delivery = Delivery::new(self.owner.clone(), sub_change);
        match &self.listener {
            AnyListener::Invalidation(listener) => {
                if !sub_change {
                    delivery.invalidation = Batch::One(listener.clone());
                }
            }
            AnyListener::SubInvalidation(listener) => {
                delivery.sub_invalidation = Batch::One(listener.clone());
            }
            AnyListener::Change(listener) => {
                if !sub_change {
                    delivery.change = Batch::One(listener.clone());
                    delivery.track(&mut self.current_value, new_value);
                }
            }
            AnyListener::SubChange(listener) => {
                delivery.sub_change_listeners = Batch::One(listener.clone());
                delivery.track(&mut self.current_value, new_value);
            }
        }
        delivery
    }

    pub(crate) fn replace_peer(&mut self, peer: Option<Arc<dyn PeerObservable<T>>>) -> Delivery<T> {
        self.detach_peer();
        self.peer = peer;
        self.attach_peer();
        match self.owner.value() {
            Some(value) => self.prepare(value, false),
            None => Delivery::new(self.owner.clone(), false),
        }
    }

    pub(crate) fn detach_peer(&self) {
        if let Some(peer) = &self.peer {
            self.peer_listener.detach_from(&**peer);
        }
    }

    fn attach_peer(&self) {
        if let Some(peer) = &self.peer {
            self.peer_listener.attach_to(&**peer);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Single<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Single")
            .field("listener", &self.listener)
            .field("has_peer", &self.peer.is_some())
            .field("current_value", &self.current_value)
            .finish_non_exhaustive()
    }
}

/// Builds the listener registered on the peer on behalf of `listener`.
fn proxy<T: PropertyValue>(listener: &AnyListener<T>, owner: &Owner<T>) -> AnyListener<T> {
    let owner = owner.clone();
    match listener.clone() {
        AnyListener::Invalidation(listener) => {
            InvalidationListener::new(move |_peer| {
                owner.notify(ListenerKind::Invalidation, |source| {
                    listener.invalidated(source);
                });
            })
            .into()
        }
        AnyListener::SubInvalidation(listener) => {
            SubInvalidationListener::new(move |_peer, sub_change| {
                owner.notify(ListenerKind::SubInvalidation, |source| {
                    listener.invalidated(source, sub_change);
                });
            })
            .into()
        }
        AnyListener::Change(listener) => {
            ChangeListener::new(move |_peer, old_value: &T, new_value: &T| {
                owner.notify(ListenerKind::Change, |source| {
                    listener.changed(source, old_value, new_value);
                });
            })
            .into()
        }
        AnyListener::SubChange(listener) => {
            SubChangeListener::new(move |_peer, old_value: &T, new_value: &T, sub_change| {
                owner.notify(ListenerKind::SubChange, |source| {
                    listener.changed(source, old_value, new_value, sub_change);
                });
            })
            .into()
        }
    }
}

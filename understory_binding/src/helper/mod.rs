// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener storage and fan-out for one observable.
//!
//! An observable keeps an `Option<ExpressionHelper<T>>`. The helper always has
//! the smallest shape that fits its listeners:
//!
//! - no listeners: `None`;
//! - one listener: the `Single*` variant for its kind;
//! - two or more listeners: [`ExpressionHelper::Generic`].
//!
//! The free functions in this module are the entry points owners use. They take
//! the owner's helper slot and update it in place, building a `Single*` variant
//! on first registration and collapsing back as listeners are removed.
//!
//! # Peers
//!
//! A helper may mirror a [`PeerObservable`]. Listeners registered on the helper
//! then also hear the peer's notifications, with the helper's owner as source.
//! [`set_peer`] swaps the peer and synthesizes one notification from the
//! owner's current value so listeners can catch up with the new source.
//!
//! # Threading
//!
//! The helper takes no locks of its own around mutation: its owner must
//! serialize `add`, `remove`, `fire` and `set_peer`. Only the per-kind listener
//! sequences of the generic variant are shared with the peer's thread, and
//! those are read under a short lock and then iterated from a snapshot.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use understory_binding::{helper, ChangeListener, ObservableValue, Owner, TracingSink};
//!
//! struct Constant;
//!
//! impl ObservableValue<i32> for Constant {
//!     fn value(&self) -> i32 {
//!         5
//!     }
//! }
//!
//! let observable = Arc::new(Constant);
//! let owner = Owner::from_arc(&observable, Arc::new(TracingSink));
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let mut slot = None;
//! let log = Arc::clone(&seen);
//! helper::add_change_listener(
//!     &mut slot,
//!     &owner,
//!     None,
//!     5,
//!     ChangeListener::new(move |_, old: &i32, new: &i32| log.lock().unwrap().push((*old, *new))),
//! )
//! .unwrap();
//!
//! helper::fire_value_changed_event(slot.as_mut(), 5, false);
//! helper::fire_value_changed_event(slot.as_mut(), 7, false);
//! assert_eq!(*seen.lock().unwrap(), [(5, 7)]);
//! ```

mod delivery;
mod generic;
mod single;

use core::fmt;
use std::sync::Arc;

pub use delivery::Delivery;
pub use generic::Generic;
pub use single::Single;

use generic::Removal;

use crate::error::BindingError;
use crate::listener::{
    AnyListener, ChangeListener, InvalidationListener, ListenerKind, ListenerKinds,
    SubChangeListener, SubInvalidationListener,
};
use crate::observable::{Owner, PeerObservable, PropertyValue};

/// The structural form of a helper.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HelperShape {
    /// One invalidation listener.
    SingleInvalidation,
    /// One sub-invalidation listener.
    SingleSubInvalidation,
    /// One change listener.
    SingleChange,
    /// One sub-change listener.
    SingleSubChange,
    /// Two or more listeners.
    Generic,
}

/// Listener storage attached to one observable.
pub enum ExpressionHelper<T> {
    /// Exactly one invalidation listener.
    SingleInvalidation(Single<T>),
    /// Exactly one sub-invalidation listener.
    SingleSubInvalidation(Single<T>),
    /// Exactly one change listener.
    SingleChange(Single<T>),
    /// Exactly one sub-change listener.
    SingleSubChange(Single<T>),
    /// Two or more listeners, of any kinds.
    Generic(Generic<T>),
}

impl<T: PropertyValue> ExpressionHelper<T> {
    fn from_single(single: Single<T>) -> Self {
        match single.kind() {
            ListenerKind::Invalidation => Self::SingleInvalidation(single),
            ListenerKind::SubInvalidation => Self::SingleSubInvalidation(single),
            ListenerKind::Change => Self::SingleChange(single),
            ListenerKind::SubChange => Self::SingleSubChange(single),
        }
    }

    fn into_single(self) -> Result<Single<T>, Generic<T>> {
        match self {
            Self::SingleInvalidation(single)
            | Self::SingleSubInvalidation(single)
            | Self::SingleChange(single)
            | Self::SingleSubChange(single) => Ok(single),
            Self::Generic(generic) => Err(generic),
        }
    }

    fn as_single(&self) -> Option<&Single<T>> {
        match self {
            Self::SingleInvalidation(single)
            | Self::SingleSubInvalidation(single)
            | Self::SingleChange(single)
            | Self::SingleSubChange(single) => Some(single),
            Self::Generic(_) => None,
        }
    }

    /// Returns the structural form of this helper.
    #[must_use]
    pub fn shape(&self) -> HelperShape {
        match self {
            Self::SingleInvalidation(_) => HelperShape::SingleInvalidation,
            Self::SingleSubInvalidation(_) => HelperShape::SingleSubInvalidation,
            Self::SingleChange(_) => HelperShape::SingleChange,
            Self::SingleSubChange(_) => HelperShape::SingleSubChange,
            Self::Generic(_) => HelperShape::Generic,
        }
    }

    /// Returns the number of registered listeners across all kinds.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        match self {
            Self::Generic(generic) => generic.total(),
            _ => 1,
        }
    }

    /// Returns the kinds that have at least one listener.
    #[must_use]
    pub fn listener_kinds(&self) -> ListenerKinds {
        match self {
            Self::Generic(generic) => generic.kinds(),
            single => single.as_single().map_or(ListenerKinds::empty(), |s| s.kind().into_set()),
        }
    }

    /// Returns the peer this helper mirrors, if any.
    #[must_use]
    pub fn peer(&self) -> Option<&Arc<dyn PeerObservable<T>>> {
        match self {
            Self::Generic(generic) => generic.peer(),
            single => single.as_single().and_then(Single::peer),
        }
    }

    /// Adds `listener`, promoting a single-listener helper to [`Self::Generic`].
    ///
    /// Adding a listener that is already registered registers it again; it will
    /// then be notified twice per qualifying event.
    #[must_use]
    pub fn add_listener(self, listener: AnyListener<T>, current_value: T) -> Self {
        match self.into_single() {
            Ok(single) => Self::Generic(single.promote(listener, current_value)),
            Err(mut generic) => {
                generic.add(listener, current_value);
                Self::Generic(generic)
            }
        }
    }

    /// Removes the first registration equal to `listener`.
    ///
    /// Returns `None` once no listener remains. Removing a listener that is not
    /// registered returns the helper unchanged.
    #[must_use]
    pub fn remove_listener(self, listener: &AnyListener<T>) -> Option<Self> {
        match self.into_single() {
            Ok(single) => single.remove(listener).map(Self::from_single),
            Err(generic) => Some(match generic.remove(listener) {
                Removal::NotFound(generic) | Removal::Kept(generic) => Self::Generic(generic),
                Removal::Collapsed(single) => Self::from_single(single),
            }),
        }
    }

    /// Returns `true` if this helper tracks the current value to detect changes.
    ///
    /// This is the case whenever a change or sub-change listener is registered.
    #[must_use]
    pub fn validates_value(&self) -> bool {
        match self {
            Self::Generic(generic) => generic.validates_value(),
            single => single.as_single().is_some_and(Single::validates_value),
        }
    }

    /// Returns `true` if a change listener tagged as a bidirectional binding
    /// endpoint is registered.
    #[must_use]
    pub fn contains_bidirectional_binding_endpoints(&self) -> bool {
        match self {
            Self::Generic(generic) => generic.contains_bidirectional_binding_endpoints(),
            single => single
                .as_single()
                .is_some_and(Single::contains_bidirectional_binding_endpoints),
        }
    }

    /// Records `new_value` and captures the notifications it causes.
    ///
    /// The returned [`Delivery`] must be run by the caller, typically after
    /// releasing whatever lock guards this helper.
    pub fn prepare_value_changed(&mut self, new_value: T, sub_change: bool) -> Delivery<T> {
        match self {
            Self::Generic(generic) => generic.prepare(new_value, sub_change),
            Self::SingleInvalidation(single)
            | Self::SingleSubInvalidation(single)
            | Self::SingleChange(single)
            | Self::SingleSubChange(single) => single.prepare(new_value, sub_change),
        }
    }

    /// Notifies listeners of a new value.
    ///
    /// See [`Delivery::deliver`] for ordering and failure handling.
    pub fn fire_value_changed_event(&mut self, new_value: T, sub_change: bool) {
        self.prepare_value_changed(new_value, sub_change).deliver();
    }

    /// Moves the peer registrations to `peer` and captures the catch-up
    /// notification built from the owner's current value.
    pub fn replace_peer(&mut self, peer: Option<Arc<dyn PeerObservable<T>>>) -> Delivery<T> {
        match self {
            Self::Generic(generic) => generic.replace_peer(peer),
            Self::SingleInvalidation(single)
            | Self::SingleSubInvalidation(single)
            | Self::SingleChange(single)
            | Self::SingleSubChange(single) => single.replace_peer(peer),
        }
    }

    /// Moves the peer registrations to `peer` and notifies listeners with the
    /// owner's current value.
    pub fn set_peer(&mut self, peer: Option<Arc<dyn PeerObservable<T>>>) {
        self.replace_peer(peer).deliver();
    }

    /// Tears the helper down, deregistering everything it put on the peer.
    pub fn detach(self) {
        match self.into_single() {
            Ok(single) => single.detach_peer(),
            Err(mut generic) => generic.detach_peer(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ExpressionHelper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleInvalidation(single) => {
                f.debug_tuple("SingleInvalidation").field(single).finish()
            }
            Self::SingleSubInvalidation(single) => {
                f.debug_tuple("SingleSubInvalidation").field(single).finish()
            }
            Self::SingleChange(single) => f.debug_tuple("SingleChange").field(single).finish(),
            Self::SingleSubChange(single) => {
                f.debug_tuple("SingleSubChange").field(single).finish()
            }
            Self::Generic(generic) => f.debug_tuple("Generic").field(generic).finish(),
        }
    }
}

/// Adds `listener` to the helper in `slot`, creating the helper if needed.
///
/// `peer` and `current_value` seed a newly created helper; an existing helper
/// keeps its own peer. Fails with [`BindingError::ObservableDropped`] if the
/// owner is gone, leaving `slot` untouched.
pub fn add_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    owner: &Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    current_value: T,
    listener: AnyListener<T>,
) -> Result<(), BindingError> {
    if !owner.is_alive() {
        return Err(BindingError::ObservableDropped);
    }
    *slot = Some(match slot.take() {
        None => ExpressionHelper::from_single(Single::new(
            owner.clone(),
            peer,
            current_value,
            listener,
        )),
        Some(helper) => helper.add_listener(listener, current_value),
    });
    Ok(())
}

/// Removes the first registration equal to `listener` from the helper in `slot`.
///
/// Clears `slot` once no listener remains.
pub fn remove_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    listener: &AnyListener<T>,
) {
    *slot = slot
        .take()
        .and_then(|helper| helper.remove_listener(listener));
}

/// Adds an invalidation listener. See [`add_listener`].
pub fn add_invalidation_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    owner: &Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    current_value: T,
    listener: InvalidationListener<T>,
) -> Result<(), BindingError> {
    add_listener(slot, owner, peer, current_value, listener.into())
}

/// Removes an invalidation listener. See [`remove_listener`].
pub fn remove_invalidation_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    listener: &InvalidationListener<T>,
) {
    remove_listener(slot, &AnyListener::Invalidation(listener.clone()));
}

/// Adds a sub-invalidation listener. See [`add_listener`].
pub fn add_sub_invalidation_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    owner: &Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    current_value: T,
    listener: SubInvalidationListener<T>,
) -> Result<(), BindingError> {
    add_listener(slot, owner, peer, current_value, listener.into())
}

/// Removes a sub-invalidation listener. See [`remove_listener`].
pub fn remove_sub_invalidation_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    listener: &SubInvalidationListener<T>,
) {
    remove_listener(slot, &AnyListener::SubInvalidation(listener.clone()));
}

/// Adds a change listener. See [`add_listener`].
pub fn add_change_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    owner: &Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    current_value: T,
    listener: ChangeListener<T>,
) -> Result<(), BindingError> {
    add_listener(slot, owner, peer, current_value, listener.into())
}

/// Removes a change listener. See [`remove_listener`].
pub fn remove_change_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    listener: &ChangeListener<T>,
) {
    remove_listener(slot, &AnyListener::Change(listener.clone()));
}

/// Adds a sub-change listener. See [`add_listener`].
pub fn add_sub_change_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    owner: &Owner<T>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
    current_value: T,
    listener: SubChangeListener<T>,
) -> Result<(), BindingError> {
    add_listener(slot, owner, peer, current_value, listener.into())
}

/// Removes a sub-change listener. See [`remove_listener`].
pub fn remove_sub_change_listener<T: PropertyValue>(
    slot: &mut Option<ExpressionHelper<T>>,
    listener: &SubChangeListener<T>,
) {
    remove_listener(slot, &AnyListener::SubChange(listener.clone()));
}

/// Returns `false` for an empty slot, otherwise [`ExpressionHelper::validates_value`].
#[must_use]
pub fn validates_value<T: PropertyValue>(helper: Option<&ExpressionHelper<T>>) -> bool {
    helper.is_some_and(ExpressionHelper::validates_value)
}

/// Returns `false` for an empty slot, otherwise
/// [`ExpressionHelper::contains_bidirectional_binding_endpoints`].
#[must_use]
pub fn contains_bidirectional_binding_endpoints<T: PropertyValue>(
    helper: Option<&ExpressionHelper<T>>,
) -> bool {
    helper.is_some_and(ExpressionHelper::contains_bidirectional_binding_endpoints)
}

/// Notifies the listeners of `helper`, if any.
pub fn fire_value_changed_event<T: PropertyValue>(
    helper: Option<&mut ExpressionHelper<T>>,
    new_value: T,
    sub_change: bool,
) {
    if let Some(helper) = helper {
        helper.fire_value_changed_event(new_value, sub_change);
    }
}

/// Moves the peer of `helper`, if any. See [`ExpressionHelper::set_peer`].
pub fn set_peer<T: PropertyValue>(
    helper: Option<&mut ExpressionHelper<T>>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
) {
    if let Some(helper) = helper {
        helper.set_peer(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ObservableValue;
    use crate::sink::{ListenerFailure, TracingSink};
    use parking_lot::Mutex;

    struct Source(Mutex<i32>);

    impl ObservableValue<i32> for Source {
        fn value(&self) -> i32 {
            *self.0.lock()
        }
    }

    fn source(value: i32) -> (Arc<Source>, Owner<i32>) {
        let source = Arc::new(Source(Mutex::new(value)));
        let owner = Owner::from_arc(&source, Arc::new(TracingSink));
        (source, owner)
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(String) + Clone + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = {
            let log = Arc::clone(&log);
            move |entry: String| log.lock().push(entry)
        };
        (log, push)
    }

    #[test]
    fn first_listener_creates_matching_single_variant() {
        let (_source, owner) = source(0);
        let cases: [(AnyListener<i32>, HelperShape); 4] = [
            (InvalidationListener::new(|_| {}).into(), HelperShape::SingleInvalidation),
            (
                SubInvalidationListener::new(|_, _| {}).into(),
                HelperShape::SingleSubInvalidation,
            ),
            (ChangeListener::new(|_, _, _| {}).into(), HelperShape::SingleChange),
            (
                SubChangeListener::new(|_, _, _, _| {}).into(),
                HelperShape::SingleSubChange,
            ),
        ];
        for (listener, shape) in cases {
            let mut slot = None;
            add_listener(&mut slot, &owner, None, 0, listener.clone()).unwrap();
            assert_eq!(slot.as_ref().map(ExpressionHelper::shape), Some(shape));
            remove_listener(&mut slot, &listener);
            assert!(slot.is_none());
        }
    }

    #[test]
    fn dropped_owner_is_rejected_without_touching_slot() {
        let (source, owner) = source(0);
        let mut slot = None;
        let first = InvalidationListener::new(|_| {});
        add_invalidation_listener(&mut slot, &owner, None, 0, first).unwrap();
        drop(source);

        let result = add_invalidation_listener(
            &mut slot,
            &owner,
            None,
            0,
            InvalidationListener::new(|_| {}),
        );
        assert_eq!(result, Err(BindingError::ObservableDropped));
        assert_eq!(
            slot.as_ref().map(ExpressionHelper::shape),
            Some(HelperShape::SingleInvalidation)
        );
    }

    #[test]
    fn removing_unknown_listener_is_a_noop() {
        let (_source, owner) = source(0);
        let mut slot = None;
        add_change_listener(&mut slot, &owner, None, 0, ChangeListener::new(|_, _, _| {}))
            .unwrap();
        remove_change_listener(&mut slot, &ChangeListener::new(|_, _, _| {}));
        remove_invalidation_listener(&mut slot, &InvalidationListener::new(|_| {}));
        assert_eq!(
            slot.as_ref().map(ExpressionHelper::shape),
            Some(HelperShape::SingleChange)
        );
    }

    #[test]
    fn single_invalidation_ignores_sub_changes() {
        let (_source, owner) = source(0);
        let (log, push) = recorder();
        let mut slot = None;
        add_invalidation_listener(
            &mut slot,
            &owner,
            None,
            0,
            InvalidationListener::<i32>::new(move |source| {
                push(format!("inv {}", source.value()));
            }),
        )
        .unwrap();

        fire_value_changed_event(slot.as_mut(), 1, true);
        fire_value_changed_event(slot.as_mut(), 1, false);
        assert_eq!(*log.lock(), ["inv 0"]);
    }

    #[test]
    fn single_sub_invalidation_passes_flag() {
        let (_source, owner) = source(0);
        let (log, push) = recorder();
        let mut slot = None;
        add_sub_invalidation_listener(
            &mut slot,
            &owner,
            None,
            0,
            SubInvalidationListener::new(move |_, sub| push(format!("sub-inv {sub}"))),
        )
        .unwrap();

        fire_value_changed_event(slot.as_mut(), 0, true);
        fire_value_changed_event(slot.as_mut(), 0, false);
        assert_eq!(*log.lock(), ["sub-inv true", "sub-inv false"]);
    }

    #[test]
    fn change_listener_fires_only_on_differing_non_sub_changes() {
        let (_source, owner) = source(5);
        let (log, push) = recorder();
        let mut slot = None;
        add_change_listener(
            &mut slot,
            &owner,
            None,
            5,
            ChangeListener::new(move |_, old: &i32, new: &i32| push(format!("{old}->{new}"))),
        )
        .unwrap();

        fire_value_changed_event(slot.as_mut(), 5, false);
        fire_value_changed_event(slot.as_mut(), 7, false);
        fire_value_changed_event(slot.as_mut(), 7, true);
        fire_value_changed_event(slot.as_mut(), 9, true);
        // The sub change above was ignored entirely, so 7 is still tracked.
        fire_value_changed_event(slot.as_mut(), 8, false);
        assert_eq!(*log.lock(), ["5->7", "7->8"]);
    }

    #[test]
    fn sub_change_listener_fires_on_sub_changes_with_equal_values() {
        let (_source, owner) = source(5);
        let (log, push) = recorder();
        let mut slot = None;
        add_sub_change_listener(
            &mut slot,
            &owner,
            None,
            5,
            SubChangeListener::new(move |_, old: &i32, new: &i32, sub| {
                push(format!("{old}->{new} {sub}"));
            }),
        )
        .unwrap();

        fire_value_changed_event(slot.as_mut(), 5, false);
        fire_value_changed_event(slot.as_mut(), 7, false);
        fire_value_changed_event(slot.as_mut(), 7, true);
        assert_eq!(*log.lock(), ["5->7 false", "7->7 true"]);
    }

    #[test]
    fn validates_value_tracks_change_kinds() {
        let (_source, owner) = source(0);
        let mut slot = None;
        assert!(!validates_value(slot.as_ref()));

        let inv = InvalidationListener::new(|_| {});
        add_invalidation_listener(&mut slot, &owner, None, 0, inv.clone()).unwrap();
        assert!(!validates_value(slot.as_ref()));

        let sub = SubChangeListener::new(|_, _, _, _| {});
        add_sub_change_listener(&mut slot, &owner, None, 0, sub.clone()).unwrap();
        assert!(validates_value(slot.as_ref()));

        remove_sub_change_listener(&mut slot, &sub);
        assert!(!validates_value(slot.as_ref()));
        remove_invalidation_listener(&mut slot, &inv);
        assert!(!validates_value(slot.as_ref()));
    }

    #[test]
    fn bidirectional_markers_are_detected() {
        let (_source, owner) = source(0);
        let mut slot = None;
        assert!(!contains_bidirectional_binding_endpoints(slot.as_ref()));

        let plain = ChangeListener::new(|_, _, _| {});
        add_change_listener(&mut slot, &owner, None, 0, plain).unwrap();
        assert!(!contains_bidirectional_binding_endpoints(slot.as_ref()));

        let marker = ChangeListener::bidirectional(|_, _, _| {});
        add_change_listener(&mut slot, &owner, None, 0, marker.clone()).unwrap();
        assert!(contains_bidirectional_binding_endpoints(slot.as_ref()));

        remove_change_listener(&mut slot, &marker);
        assert!(!contains_bidirectional_binding_endpoints(slot.as_ref()));

        let mut single = None;
        add_change_listener(&mut single, &owner, None, 0, marker).unwrap();
        assert!(contains_bidirectional_binding_endpoints(single.as_ref()));
    }

    #[test]
    fn failures_reach_the_owner_sink() {
        let source = Arc::new(Source(Mutex::new(0)));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let failures = Arc::clone(&failures);
            move |failure: ListenerFailure| failures.lock().push(failure.kind)
        };
        let owner = Owner::from_arc(&source, Arc::new(sink));
        let mut slot = None;
        add_sub_invalidation_listener(
            &mut slot,
            &owner,
            None,
            0,
            SubInvalidationListener::new(|_, _| panic!("listener failure")),
        )
        .unwrap();

        fire_value_changed_event(slot.as_mut(), 1, false);
        assert_eq!(*failures.lock(), [ListenerKind::SubInvalidation]);
    }

    #[test]
    fn dropped_owner_suppresses_delivery() {
        let (source, owner) = source(0);
        let (log, push) = recorder();
        let mut slot = None;
        add_invalidation_listener(
            &mut slot,
            &owner,
            None,
            0,
            InvalidationListener::new(move |_| push("inv".to_owned())),
        )
        .unwrap();
        drop(source);
        fire_value_changed_event(slot.as_mut(), 1, false);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn prepared_delivery_reports_whether_any_listener_would_run() {
        let (_source, owner) = source(0);
        let mut slot = None;
        add_change_listener(&mut slot, &owner, None, 0, ChangeListener::new(|_, _, _| {}))
            .unwrap();
        let helper = slot.as_mut().unwrap();

        let unchanged = helper.prepare_value_changed(0, false);
        assert!(unchanged.is_empty());
        assert!(!unchanged.is_sub_change());
        unchanged.deliver();

        let changed = helper.prepare_value_changed(1, false);
        assert!(!changed.is_empty());
        changed.deliver();

        // Change listeners ignore sub changes.
        let nested = helper.prepare_value_changed(1, true);
        assert!(nested.is_sub_change());
        assert!(nested.is_empty());
        nested.deliver();

        add_sub_invalidation_listener(
            &mut slot,
            &owner,
            None,
            1,
            SubInvalidationListener::new(|_, _| {}),
        )
        .unwrap();
        let helper = slot.as_mut().unwrap();
        let unchanged = helper.prepare_value_changed(1, false);
        assert!(!unchanged.is_empty());
        unchanged.deliver();
    }
}

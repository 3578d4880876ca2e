// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A shared property that owns an expression helper.
//!
//! [`AsyncProperty`] is the reference owner of an [`ExpressionHelper`]: it
//! stores a value, applies its [`PropertyMetadata`], and notifies listeners
//! registered through the helper. It can mirror another property through
//! [`AsyncProperty::set_peer`] and can itself serve as a peer.
//!
//! ## Locking
//!
//! The value and the helper live behind separate locks. Every operation
//! prepares its notifications while holding them and delivers after releasing
//! them, so listeners may read the property, write it, or add and remove
//! listeners from inside a callback. Nested writes deliver their own
//! notifications before the outer pass continues.
//!
//! Peer chains must not loop: [`AsyncProperty::set_peer`] refuses a peer
//! whose own chain of peers leads back to the property.
//!
//! ## Ordering
//!
//! Deliveries of concurrent writes from different threads may interleave, so a
//! listener can see a later change before an earlier one. Route writes through
//! [`AsyncProperty::set_async`] with a dispatcher that runs tasks on one thread
//! when listeners rely on ordering.

use core::fmt;
use core::mem;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::BindingError;
use crate::helper::{self, Delivery, ExpressionHelper, HelperShape};
use crate::listener::{
    AnyListener, ChangeListener, InvalidationListener, ListenerKinds, SubChangeListener,
    SubInvalidationListener,
};
use crate::metadata::PropertyMetadata;
use crate::observable::{ObservableValue, Owner, PeerObservable, PropertyValue, same_observable};

struct State<T> {
    helper: Option<ExpressionHelper<T>>,
    peer: Option<Arc<dyn PeerObservable<T>>>,
}

/// An observable value shared across threads.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use understory_binding::{AsyncProperty, ChangeListener, PropertyMetadataBuilder};
///
/// let width = AsyncProperty::new(
///     PropertyMetadataBuilder::new(10_u32)
///         .name("width")
///         .coerce(|w| w.min(100))
///         .build(),
/// );
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = Arc::clone(&seen);
/// width
///     .add_change_listener(ChangeListener::new(move |_, old: &u32, new: &u32| {
///         log.lock().unwrap().push((*old, *new));
///     }))
///     .unwrap();
///
/// width.set(40);
/// width.set(40);
/// width.set(500);
/// assert_eq!(width.get(), 100);
/// assert_eq!(*seen.lock().unwrap(), [(10, 40), (40, 100)]);
/// ```
pub struct AsyncProperty<T: PropertyValue> {
    metadata: PropertyMetadata<T>,
    value: RwLock<T>,
    state: Mutex<State<T>>,
    owner: Owner<T>,
    this: Weak<Self>,
}

impl<T: PropertyValue> AsyncProperty<T> {
    /// Creates a property holding the coerced initial value of `metadata`.
    #[must_use]
    pub fn new(metadata: PropertyMetadata<T>) -> Arc<Self> {
        let initial = metadata.coerce(metadata.initial_value().clone());
        Arc::new_cyclic(|this: &Weak<Self>| {
            let observable: Weak<dyn ObservableValue<T>> = this.clone();
            let owner = Owner::new(observable, Arc::clone(metadata.sink()));
            Self {
                metadata,
                value: RwLock::new(initial),
                state: Mutex::new(State {
                    helper: None,
                    peer: None,
                }),
                owner,
                this: this.clone(),
            }
        })
    }

    /// Returns the metadata this property was created with.
    #[must_use]
    pub fn metadata(&self) -> &PropertyMetadata<T> {
        &self.metadata
    }

    /// Returns the diagnostic name of this property.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Stores `value` after coercion.
    ///
    /// Fires a regular (non-sub) change if the stored value differs from the
    /// previous one. Listeners run on the calling thread after all locks have
    /// been released.
    ///
    /// Writes from several threads are stored in lock order but delivered
    /// without any ordering between threads. Use [`set_async`](Self::set_async)
    /// with a single-threaded [`Dispatcher`](crate::Dispatcher) to keep
    /// deliveries in write order.
    pub fn set(&self, value: T) {
        let value = self.metadata.coerce(value);
        let (old_value, delivery) = {
            let mut state = self.state.lock();
            let old_value = {
                let mut current = self.value.write();
                if *current == value {
                    return;
                }
                mem::replace(&mut *current, value.clone())
            };
            let delivery = state
                .helper
                .as_mut()
                .map(|helper| helper.prepare_value_changed(value.clone(), false));
            (old_value, delivery)
        };
        tracing::trace!(property = self.name(), "value set");
        self.finish(&old_value, &value, delivery);
    }

    /// Mutates the value in place and fires a sub change.
    ///
    /// Use this for changes nested inside the value (an element of a
    /// collection, a field of a struct) that listeners should hear about even
    /// when the result compares equal. The result is coerced.
    ///
    /// `mutate` runs while the property is locked and must not access it.
    pub fn update(&self, mutate: impl FnOnce(&mut T)) {
        let (old_value, new_value, delivery) = {
            let mut state = self.state.lock();
            let (old_value, new_value) = {
                let mut current = self.value.write();
                let mut next = current.clone();
                mutate(&mut next);
                let next = self.metadata.coerce(next);
                (mem::replace(&mut *current, next.clone()), next)
            };
            let delivery = state
                .helper
                .as_mut()
                .map(|helper| helper.prepare_value_changed(new_value.clone(), true));
            (old_value, new_value, delivery)
        };
        tracing::trace!(property = self.name(), "value updated");
        self.finish(&old_value, &new_value, delivery);
    }

    /// Hands a [`set`](Self::set) to the metadata dispatcher.
    ///
    /// The write is dropped if the property is gone by the time the task runs.
    pub fn set_async(&self, value: T) -> Result<(), BindingError> {
        let this = Weak::clone(&self.this);
        self.metadata.dispatcher().dispatch(Box::new(move || {
            if let Some(property) = this.upgrade() {
                property.set(value);
            }
        }))
    }

    fn finish(&self, old_value: &T, new_value: &T, delivery: Option<Delivery<T>>) {
        self.metadata.on_changed(old_value, new_value);
        if let Some(delivery) = delivery {
            delivery.deliver();
        }
    }

    fn insert_listener(&self, listener: AnyListener<T>) -> Result<(), BindingError> {
        let mut state = self.state.lock();
        let State { helper, peer } = &mut *state;
        let current_value = self.value.read().clone();
        helper::add_listener(helper, &self.owner, peer.clone(), current_value, listener)
    }

    fn remove_any(&self, listener: &AnyListener<T>) {
        let mut state = self.state.lock();
        helper::remove_listener(&mut state.helper, listener);
    }

    /// Registers an invalidation listener.
    pub fn add_invalidation_listener(
        &self,
        listener: InvalidationListener<T>,
    ) -> Result<(), BindingError> {
        self.insert_listener(listener.into())
    }

    /// Removes the first registration of an invalidation listener.
    pub fn remove_invalidation_listener(&self, listener: &InvalidationListener<T>) {
        self.remove_any(&AnyListener::Invalidation(listener.clone()));
    }

    /// Registers a sub-invalidation listener.
    pub fn add_sub_invalidation_listener(
        &self,
        listener: SubInvalidationListener<T>,
    ) -> Result<(), BindingError> {
        self.insert_listener(listener.into())
    }

    /// Removes the first registration of a sub-invalidation listener.
    pub fn remove_sub_invalidation_listener(&self, listener: &SubInvalidationListener<T>) {
        self.remove_any(&AnyListener::SubInvalidation(listener.clone()));
    }

    /// Registers a change listener.
    pub fn add_change_listener(&self, listener: ChangeListener<T>) -> Result<(), BindingError> {
        self.insert_listener(listener.into())
    }

    /// Removes the first registration of a change listener.
    pub fn remove_change_listener(&self, listener: &ChangeListener<T>) {
        self.remove_any(&AnyListener::Change(listener.clone()));
    }

    /// Registers a sub-change listener.
    pub fn add_sub_change_listener(
        &self,
        listener: SubChangeListener<T>,
    ) -> Result<(), BindingError> {
        self.insert_listener(listener.into())
    }

    /// Removes the first registration of a sub-change listener.
    pub fn remove_sub_change_listener(&self, listener: &SubChangeListener<T>) {
        self.remove_any(&AnyListener::SubChange(listener.clone()));
    }

    /// Returns the peer this property mirrors.
    #[must_use]
    pub fn peer(&self) -> Option<Arc<dyn PeerObservable<T>>> {
        self.state.lock().peer.clone()
    }

    /// Mirrors `peer`, or stops mirroring with `None`.
    ///
    /// Listeners of this property then also hear the peer's notifications, with
    /// this property as source. If any listener is registered, one notification
    /// built from this property's current value is delivered right away.
    ///
    /// Returns [`BindingError::SelfBinding`] if `peer` is this property or
    /// mirrors it, directly or through further peers.
    pub fn set_peer(&self, peer: Option<Arc<dyn PeerObservable<T>>>) -> Result<(), BindingError> {
        if let Some(peer) = &peer
            && self.is_reachable_from(peer)
        {
            tracing::debug!(property = self.name(), "peer cycle rejected");
            return Err(BindingError::SelfBinding);
        }
        let delivery = {
            let mut state = self.state.lock();
            state.peer.clone_from(&peer);
            state
                .helper
                .as_mut()
                .map(|helper| helper.replace_peer(peer))
        };
        tracing::debug!(property = self.name(), "peer replaced");
        if let Some(delivery) = delivery {
            delivery.deliver();
        }
        Ok(())
    }

    /// Follows the peer chain starting at `peer`, looking for this property.
    ///
    /// Called without holding any lock of this property, since each step locks
    /// the visited peer.
    fn is_reachable_from(&self, peer: &Arc<dyn PeerObservable<T>>) -> bool {
        let mut visited: Vec<Arc<dyn PeerObservable<T>>> = Vec::new();
        let mut next = Some(Arc::clone(peer));
        while let Some(candidate) = next {
            if same_observable::<T>(&*candidate, self) {
                return true;
            }
            if visited.iter().any(|seen| same_observable::<T>(&**seen, &*candidate)) {
                return false;
            }
            next = candidate.peer();
            visited.push(candidate);
        }
        false
    }

    /// Returns `true` if a change or sub-change listener is registered.
    #[must_use]
    pub fn validates_value(&self) -> bool {
        helper::validates_value(self.state.lock().helper.as_ref())
    }

    /// Returns `true` if this property is an endpoint of a bidirectional binding.
    #[must_use]
    pub fn contains_bidirectional_binding_endpoints(&self) -> bool {
        helper::contains_bidirectional_binding_endpoints(self.state.lock().helper.as_ref())
    }

    /// Returns the shape of the helper, or `None` without listeners.
    #[must_use]
    pub fn shape(&self) -> Option<HelperShape> {
        self.state.lock().helper.as_ref().map(ExpressionHelper::shape)
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state
            .lock()
            .helper
            .as_ref()
            .map_or(0, ExpressionHelper::listener_count)
    }

    /// Returns the kinds that have at least one listener.
    #[must_use]
    pub fn listener_kinds(&self) -> ListenerKinds {
        self.state
            .lock()
            .helper
            .as_ref()
            .map_or(ListenerKinds::empty(), ExpressionHelper::listener_kinds)
    }
}

impl<T: PropertyValue> Drop for AsyncProperty<T> {
    fn drop(&mut self) {
        if let Some(helper) = self.state.get_mut().helper.take() {
            helper.detach();
        }
    }
}

impl<T: PropertyValue> ObservableValue<T> for AsyncProperty<T> {
    fn value(&self) -> T {
        self.get()
    }
}

impl<T: PropertyValue> PeerObservable<T> for AsyncProperty<T> {
    fn add_invalidation_listener(&self, listener: InvalidationListener<T>) {
        self.attach(listener.into());
    }

    fn remove_invalidation_listener(&self, listener: &InvalidationListener<T>) {
        Self::remove_invalidation_listener(self, listener);
    }

    fn add_sub_invalidation_listener(&self, listener: SubInvalidationListener<T>) {
        self.attach(listener.into());
    }

    fn remove_sub_invalidation_listener(&self, listener: &SubInvalidationListener<T>) {
        Self::remove_sub_invalidation_listener(self, listener);
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) {
        self.attach(listener.into());
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) {
        Self::remove_change_listener(self, listener);
    }

    fn add_sub_change_listener(&self, listener: SubChangeListener<T>) {
        self.attach(listener.into());
    }

    fn remove_sub_change_listener(&self, listener: &SubChangeListener<T>) {
        Self::remove_sub_change_listener(self, listener);
    }

    fn peer(&self) -> Option<Arc<dyn PeerObservable<T>>> {
        Self::peer(self)
    }
}

impl<T: PropertyValue> AsyncProperty<T> {
    fn attach(&self, listener: AnyListener<T>) {
        let kind = listener.kind();
        if let Err(error) = self.insert_listener(listener) {
            tracing::warn!(property = self.name(), ?kind, %error, "peer listener not attached");
        }
    }
}

impl<T: PropertyValue + fmt::Debug> fmt::Debug for AsyncProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncProperty")
            .field("name", &self.name())
            .field("value", &*self.value.read())
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PropertyMetadataBuilder;

    fn property(value: i32) -> Arc<AsyncProperty<i32>> {
        AsyncProperty::new(PropertyMetadata::new(value))
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn initial_value_is_coerced() {
        let property = AsyncProperty::new(
            PropertyMetadataBuilder::new(-4_i32)
                .coerce(|v| v.max(0))
                .build(),
        );
        assert_eq!(property.get(), 0);
        assert_eq!(property.shape(), None);
    }

    #[test]
    fn equal_set_fires_nothing() {
        let property = property(1);
        let seen = log();
        let inv_log = Arc::clone(&seen);
        property
            .add_invalidation_listener(InvalidationListener::new(move |_| {
                inv_log.lock().push("inv".to_owned());
            }))
            .unwrap();

        property.set(1);
        assert!(seen.lock().is_empty());
        property.set(2);
        assert_eq!(*seen.lock(), ["inv"]);
    }

    #[test]
    fn update_fires_sub_change_even_when_equal() {
        let property = property(3);
        let seen = log();
        let sub_log = Arc::clone(&seen);
        property
            .add_sub_change_listener(SubChangeListener::new(
                move |_, old: &i32, new: &i32, sub| {
                    sub_log.lock().push(format!("{old}->{new} {sub}"));
                },
            ))
            .unwrap();
        let change_log = Arc::clone(&seen);
        property
            .add_change_listener(ChangeListener::new(move |_, old: &i32, new: &i32| {
                change_log.lock().push(format!("change {old}->{new}"));
            }))
            .unwrap();

        property.update(|_| {});
        property.update(|v| *v += 1);
        assert_eq!(*seen.lock(), ["3->3 true", "3->4 true"]);
        assert_eq!(property.get(), 4);
    }

    #[test]
    fn changed_callback_runs_before_listeners() {
        let seen = log();
        let callback_log = Arc::clone(&seen);
        let property = AsyncProperty::new(
            PropertyMetadataBuilder::new(0_i32)
                .on_changed(move |old, new| callback_log.lock().push(format!("cb {old}->{new}")))
                .build(),
        );
        let listener_log = Arc::clone(&seen);
        property
            .add_change_listener(ChangeListener::new(move |_, old: &i32, new: &i32| {
                listener_log.lock().push(format!("listener {old}->{new}"));
            }))
            .unwrap();

        property.set(9);
        assert_eq!(*seen.lock(), ["cb 0->9", "listener 0->9"]);
    }

    #[test]
    fn listeners_see_the_property_as_source() {
        let property = property(0);
        let seen = log();
        let source_log = Arc::clone(&seen);
        property
            .add_invalidation_listener(InvalidationListener::new(move |source| {
                source_log.lock().push(format!("value {}", source.value()));
            }))
            .unwrap();
        property.set(12);
        assert_eq!(*seen.lock(), ["value 12"]);
    }

    #[test]
    fn peering_with_self_is_rejected() {
        let property = property(0);
        let as_peer: Arc<dyn PeerObservable<i32>> = property.clone();
        assert_eq!(
            property.set_peer(Some(as_peer)),
            Err(BindingError::SelfBinding)
        );
        assert!(property.peer().is_none());
    }

    #[test]
    fn peer_chain_back_to_self_is_rejected() {
        let a = property(0);
        let b = property(0);
        b.set_peer(Some(a.clone() as Arc<dyn PeerObservable<i32>>)).unwrap();
        assert!(a.is_reachable_from(&(b.clone() as Arc<dyn PeerObservable<i32>>)));
        assert_eq!(
            a.set_peer(Some(b.clone() as Arc<dyn PeerObservable<i32>>)),
            Err(BindingError::SelfBinding)
        );
        assert!(a.peer().is_none());
        assert!(!b.is_reachable_from(&(a.clone() as Arc<dyn PeerObservable<i32>>)));
    }

    #[test]
    fn drop_detaches_from_peer() {
        let upstream = property(0);
        let downstream = property(0);
        downstream
            .set_peer(Some(upstream.clone() as Arc<dyn PeerObservable<i32>>))
            .unwrap();
        downstream
            .add_change_listener(ChangeListener::new(|_, _, _| {}))
            .unwrap();
        assert_eq!(upstream.listener_count(), 1);

        drop(downstream);
        assert_eq!(upstream.listener_count(), 0);
    }

    #[test]
    fn set_async_with_immediate_dispatcher_sets_inline() {
        let property = property(0);
        property.set_async(5).unwrap();
        assert_eq!(property.get(), 5);
    }

    #[test]
    fn listener_may_write_back_into_the_property() {
        let property = property(0);
        let weak = Arc::downgrade(&property);
        property
            .add_change_listener(ChangeListener::new(move |_, _, new: &i32| {
                if *new > 10
                    && let Some(property) = weak.upgrade()
                {
                    property.set(10);
                }
            }))
            .unwrap();

        property.set(25);
        assert_eq!(property.get(), 10);
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-way synchronization of a pair of properties.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::BindingError;
use crate::listener::ChangeListener;
use crate::observable::PropertyValue;
use crate::property::AsyncProperty;

/// Keeps two properties equal until [`unbind`](Self::unbind) is called.
///
/// Created by [`bind_bidirectional`]. The binding only holds weak references:
/// once either property is dropped, it does nothing.
#[must_use = "the binding stays active until `unbind` is called"]
pub struct BidirectionalBinding<T: PropertyValue> {
    first: Weak<AsyncProperty<T>>,
    second: Weak<AsyncProperty<T>>,
    first_listener: ChangeListener<T>,
    second_listener: ChangeListener<T>,
}

impl<T: PropertyValue> BidirectionalBinding<T> {
    /// Returns `true` while both properties are alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.first.strong_count() > 0 && self.second.strong_count() > 0
    }

    /// Removes the binding's listeners from both properties.
    pub fn unbind(self) {
        if let Some(first) = self.first.upgrade() {
            first.remove_change_listener(&self.first_listener);
        }
        if let Some(second) = self.second.upgrade() {
            second.remove_change_listener(&self.second_listener);
        }
    }
}

impl<T: PropertyValue> fmt::Debug for BidirectionalBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidirectionalBinding")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Binds `first` and `second` to each other.
///
/// `first` takes the value of `second`; from then on a change to either is
/// written to the other. A write caused by the binding is not echoed back.
///
/// Returns [`BindingError::SelfBinding`] if both arguments are the same
/// property.
///
/// ```rust
/// use understory_binding::{AsyncProperty, PropertyMetadata, bind_bidirectional};
///
/// let a = AsyncProperty::new(PropertyMetadata::new(1));
/// let b = AsyncProperty::new(PropertyMetadata::new(2));
/// let binding = bind_bidirectional(&a, &b).unwrap();
/// assert_eq!(a.get(), 2);
///
/// a.set(7);
/// assert_eq!(b.get(), 7);
///
/// binding.unbind();
/// b.set(3);
/// assert_eq!(a.get(), 7);
/// ```
pub fn bind_bidirectional<T: PropertyValue>(
    first: &Arc<AsyncProperty<T>>,
    second: &Arc<AsyncProperty<T>>,
) -> Result<BidirectionalBinding<T>, BindingError> {
    if Arc::ptr_eq(first, second) {
        return Err(BindingError::SelfBinding);
    }
    first.set(second.get());

    let updating = Arc::new(AtomicBool::new(false));
    let first_listener = mirror(Arc::downgrade(second), Arc::clone(&updating));
    let second_listener = mirror(Arc::downgrade(first), updating);

    first.add_change_listener(first_listener.clone())?;
    if let Err(error) = second.add_change_listener(second_listener.clone()) {
        first.remove_change_listener(&first_listener);
        return Err(error);
    }
    tracing::debug!(
        first = first.name(),
        second = second.name(),
        "bidirectional binding established"
    );

    Ok(BidirectionalBinding {
        first: Arc::downgrade(first),
        second: Arc::downgrade(second),
        first_listener,
        second_listener,
    })
}

/// Builds a marked change listener that writes every new value into `target`.
fn mirror<T: PropertyValue>(
    target: Weak<AsyncProperty<T>>,
    updating: Arc<AtomicBool>,
) -> ChangeListener<T> {
    ChangeListener::bidirectional(move |_, _, new_value: &T| {
        let Some(target) = target.upgrade() else {
            return;
        };
        if updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let _reset = Reset(&updating);
        target.set(new_value.clone());
    })
}

struct Reset<'a>(&'a AtomicBool);

impl Drop for Reset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

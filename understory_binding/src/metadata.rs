// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property metadata definitions.
//!
//! This module provides [`PropertyMetadata`] for storing the configuration of an
//! [`AsyncProperty`](crate::AsyncProperty) and [`PropertyMetadataBuilder`] for
//! ergonomic construction.

use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use crate::dispatch::{Dispatcher, ImmediateDispatcher};
use crate::sink::{ListenerErrorSink, TracingSink};

/// Callback invoked after a property value changed, before listeners run.
///
/// The callback receives the old and the new value.
pub type PropertyChangedCallback<T> = Box<dyn Fn(&T, &T) + Send + Sync>;

/// Callback for coercing a property value before it's stored.
///
/// This can be used to clamp values, validate ranges, etc.
/// The callback receives the proposed value and returns the coerced value.
pub type CoerceValueCallback<T> = Box<dyn Fn(T) -> T + Send + Sync>;

/// Configuration of a property.
///
/// # Example
///
/// ```rust
/// use understory_binding::PropertyMetadataBuilder;
///
/// let metadata = PropertyMetadataBuilder::new(100.0_f64)
///     .name("opacity")
///     .coerce(|v| v.clamp(0.0, 1.0))
///     .build();
///
/// assert_eq!(metadata.initial_value(), &100.0);
/// assert_eq!(metadata.name(), "opacity");
/// assert_eq!(metadata.coerce(3.0), 1.0);
/// ```
pub struct PropertyMetadata<T: 'static> {
    initial_value: T,
    name: Cow<'static, str>,
    sink: Arc<dyn ListenerErrorSink>,
    dispatcher: Arc<dyn Dispatcher>,
    changed_callback: Option<PropertyChangedCallback<T>>,
    coerce_callback: Option<CoerceValueCallback<T>>,
}

impl<T: 'static> PropertyMetadata<T> {
    /// Creates new property metadata with the given initial value.
    ///
    /// All other fields use their defaults:
    /// - `name`: empty
    /// - `sink`: [`TracingSink`]
    /// - `dispatcher`: [`ImmediateDispatcher`]
    /// - `changed_callback`: `None`
    /// - `coerce_callback`: `None`
    #[must_use]
    pub fn new(initial_value: T) -> Self {
        PropertyMetadataBuilder::new(initial_value).build()
    }

    /// Returns a reference to the initial value.
    #[must_use]
    #[inline]
    pub fn initial_value(&self) -> &T {
        &self.initial_value
    }

    /// Returns the diagnostic name of the property.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sink that receives listener panics.
    #[must_use]
    #[inline]
    pub fn sink(&self) -> &Arc<dyn ListenerErrorSink> {
        &self.sink
    }

    /// Returns the dispatcher used by
    /// [`AsyncProperty::set_async`](crate::AsyncProperty::set_async).
    #[must_use]
    #[inline]
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.dispatcher
    }

    /// Invokes the changed callback if one is set.
    #[inline]
    pub fn on_changed(&self, old_value: &T, new_value: &T) {
        if let Some(callback) = &self.changed_callback {
            callback(old_value, new_value);
        }
    }

    /// Coerces a value using the coerce callback if one is set.
    #[inline]
    pub fn coerce(&self, value: T) -> T {
        if let Some(callback) = &self.coerce_callback {
            callback(value)
        } else {
            value
        }
    }

    /// Returns whether a changed callback is set.
    #[must_use]
    #[inline]
    pub fn has_changed_callback(&self) -> bool {
        self.changed_callback.is_some()
    }

    /// Returns whether a coerce callback is set.
    #[must_use]
    #[inline]
    pub fn has_coerce_callback(&self) -> bool {
        self.coerce_callback.is_some()
    }
}

// Manual Debug impl since callbacks aren't Debug
impl<T: fmt::Debug + 'static> fmt::Debug for PropertyMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadata")
            .field("initial_value", &self.initial_value)
            .field("name", &self.name)
            .field("has_changed_callback", &self.changed_callback.is_some())
            .field("has_coerce_callback", &self.coerce_callback.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PropertyMetadata`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use understory_binding::{ImmediateDispatcher, ListenerFailure, PropertyMetadataBuilder};
///
/// let metadata = PropertyMetadataBuilder::new(0_u32)
///     .name("retries")
///     .sink(Arc::new(|failure: ListenerFailure| eprintln!("{failure}")))
///     .dispatcher(Arc::new(ImmediateDispatcher))
///     .coerce(|v| v.min(5))
///     .build();
///
/// assert_eq!(metadata.coerce(9), 5);
/// ```
pub struct PropertyMetadataBuilder<T: 'static> {
    initial_value: T,
    name: Cow<'static, str>,
    sink: Option<Arc<dyn ListenerErrorSink>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    changed_callback: Option<PropertyChangedCallback<T>>,
    coerce_callback: Option<CoerceValueCallback<T>>,
}

// Manual Debug impl since callbacks aren't Debug
impl<T: fmt::Debug + 'static> fmt::Debug for PropertyMetadataBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMetadataBuilder")
            .field("initial_value", &self.initial_value)
            .field("name", &self.name)
            .field("has_sink", &self.sink.is_some())
            .field("has_dispatcher", &self.dispatcher.is_some())
            .field("has_changed_callback", &self.changed_callback.is_some())
            .field("has_coerce_callback", &self.coerce_callback.is_some())
            .finish()
    }
}

impl<T: 'static> PropertyMetadataBuilder<T> {
    /// Creates a new builder with the given initial value.
    #[must_use]
    pub fn new(initial_value: T) -> Self {
        Self {
            initial_value,
            name: Cow::Borrowed(""),
            sink: None,
            dispatcher: None,
            changed_callback: None,
            coerce_callback: None,
        }
    }

    /// Sets the name reported in traces.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the sink that receives listener panics.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ListenerErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the dispatcher used for asynchronous writes.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets a callback to be invoked when the property value changes.
    #[must_use]
    pub fn on_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.changed_callback = Some(Box::new(callback));
        self
    }

    /// Sets a callback to coerce values before they are stored.
    ///
    /// This is useful for clamping values, validation, etc.
    #[must_use]
    pub fn coerce<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.coerce_callback = Some(Box::new(callback));
        self
    }

    /// Builds the [`PropertyMetadata`].
    #[must_use]
    pub fn build(self) -> PropertyMetadata<T> {
        PropertyMetadata {
            initial_value: self.initial_value,
            name: self.name,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            dispatcher: self
                .dispatcher
                .unwrap_or_else(|| Arc::new(ImmediateDispatcher)),
            changed_callback: self.changed_callback,
            coerce_callback: self.coerce_callback,
        }
    }
}

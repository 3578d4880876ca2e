// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for binding operations.

use core::fmt;

/// Errors reported at the boundary of the binding runtime.
///
/// Listener panics are not errors in this sense: they are routed to a
/// [`ListenerErrorSink`](crate::ListenerErrorSink) and delivery continues.
/// Removing a listener that was never added is a no-op, not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindingError {
    /// The owning observable was dropped before a listener could be attached.
    ObservableDropped,
    /// An observable was bound or peered to itself.
    SelfBinding,
    /// A dispatcher refused work because its execution context has shut down.
    DispatcherClosed,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObservableDropped => f.write_str("the owning observable has been dropped"),
            Self::SelfBinding => f.write_str("an observable cannot be bound to itself"),
            Self::DispatcherClosed => f.write_str("the dispatcher is no longer accepting work"),
        }
    }
}

impl core::error::Error for BindingError {}

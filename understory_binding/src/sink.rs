// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reporting of listener failures.
//!
//! A panic inside a listener never aborts delivery. It is caught, turned into a
//! [`ListenerFailure`] and handed to the [`ListenerErrorSink`] of the property
//! that was delivering; the next listener then runs as if nothing happened.

use core::fmt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};

use crate::listener::ListenerKind;

/// A listener that panicked during delivery.
#[derive(Clone, Debug)]
pub struct ListenerFailure {
    /// Kind of the listener that panicked.
    pub kind: ListenerKind,
    /// Thread on which the delivery was running.
    pub thread_id: ThreadId,
    /// Name of that thread, if it has one.
    pub thread_name: Option<String>,
    /// The panic message, or a placeholder for non-string payloads.
    pub message: String,
}

impl ListenerFailure {
    fn from_panic(kind: ListenerKind, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        let current = thread::current();
        Self {
            kind,
            thread_id: current.id(),
            thread_name: current.name().map(ToOwned::to_owned),
            message,
        }
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} listener panicked on thread {}: {}",
            self.kind,
            self.thread_name.as_deref().unwrap_or("<unnamed>"),
            self.message
        )
    }
}

/// Receives listener panics.
///
/// Closures taking a [`ListenerFailure`] implement this trait.
pub trait ListenerErrorSink: Send + Sync {
    /// Called once per panicking listener invocation.
    fn listener_failed(&self, failure: ListenerFailure);
}

impl<F> ListenerErrorSink for F
where
    F: Fn(ListenerFailure) + Send + Sync,
{
    #[inline]
    fn listener_failed(&self, failure: ListenerFailure) {
        self(failure);
    }
}

/// Default sink: reports failures through `tracing` at error level.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

impl ListenerErrorSink for TracingSink {
    fn listener_failed(&self, failure: ListenerFailure) {
        tracing::error!(
            kind = ?failure.kind,
            thread = ?failure.thread_id,
            thread_name = failure.thread_name.as_deref().unwrap_or("<unnamed>"),
            "listener panicked: {}",
            failure.message
        );
    }
}

/// Runs one listener invocation, routing a panic to `sink`.
pub(crate) fn isolate(kind: ListenerKind, sink: &dyn ListenerErrorSink, invoke: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(invoke)) {
        sink.listener_failed(ListenerFailure::from_panic(kind, &*payload));
    }
}

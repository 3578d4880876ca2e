// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Marshalling work onto the context that owns a property.
//!
//! The runtime never spawns threads. A property that must be written from its
//! owning context hands the write to a [`Dispatcher`], which decides where and
//! when it runs.

use crate::error::BindingError;

/// A unit of work handed to a [`Dispatcher`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks in the execution context of a property.
///
/// Closures of the form `Fn(Task) -> Result<(), BindingError>` implement this
/// trait, which makes forwarding into a channel a one-liner:
///
/// ```rust
/// use std::sync::mpsc;
/// use understory_binding::{BindingError, Dispatcher, Task};
///
/// let (sender, receiver) = mpsc::channel::<Task>();
/// let dispatcher =
///     move |task: Task| sender.send(task).map_err(|_| BindingError::DispatcherClosed);
///
/// dispatcher.dispatch(Box::new(|| {})).unwrap();
/// assert!(receiver.try_recv().is_ok());
/// ```
pub trait Dispatcher: Send + Sync {
    /// Schedules `task`.
    ///
    /// Returns [`BindingError::DispatcherClosed`] if the target context no
    /// longer accepts work.
    fn dispatch(&self, task: Task) -> Result<(), BindingError>;
}

impl<F> Dispatcher for F
where
    F: Fn(Task) -> Result<(), BindingError> + Send + Sync,
{
    #[inline]
    fn dispatch(&self, task: Task) -> Result<(), BindingError> {
        self(task)
    }
}

/// Runs every task inline on the calling thread.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    #[inline]
    fn dispatch(&self, task: Task) -> Result<(), BindingError> {
        task();
        Ok(())
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Asynchronous writes through a dispatcher backed by a worker thread.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use parking_lot::Mutex;
use understory_binding::{
    AsyncProperty, BindingError, ChangeListener, PropertyMetadataBuilder, Task,
};

/// Spawns a named worker that runs dispatched tasks until every sender is gone.
fn worker() -> (mpsc::Sender<Task>, thread::JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel::<Task>();
    let handle = thread::Builder::new()
        .name("property-worker".to_owned())
        .spawn(move || {
            for task in receiver {
                task();
            }
        })
        .unwrap();
    (sender, handle)
}

#[test]
fn set_async_runs_listeners_on_the_dispatcher_thread() {
    let (sender, handle) = worker();
    let dispatcher =
        move |task: Task| sender.send(task).map_err(|_| BindingError::DispatcherClosed);
    let property = AsyncProperty::new(
        PropertyMetadataBuilder::new(0_u64)
            .name("counter")
            .dispatcher(Arc::new(dispatcher))
            .build(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    property
        .add_change_listener(ChangeListener::new(move |_, _, new: &u64| {
            let name = thread::current().name().map(ToOwned::to_owned);
            log.lock().push((name, *new));
        }))
        .unwrap();

    property.set_async(1).unwrap();
    property.set_async(2).unwrap();

    // Dropping the property drops the dispatcher and with it the only sender,
    // which ends the worker once the queue is drained. Queued writes keep the
    // property alive only weakly, so wait for them before dropping it.
    let (done_sender, done_receiver) = mpsc::channel();
    property
        .metadata()
        .dispatcher()
        .dispatch(Box::new(move || done_sender.send(()).unwrap()))
        .unwrap();
    done_receiver.recv().unwrap();
    assert_eq!(property.get(), 2);
    drop(property);
    handle.join().unwrap();

    let worker = Some("property-worker".to_owned());
    assert_eq!(*seen.lock(), [(worker.clone(), 1), (worker, 2)]);
}

#[test]
fn closed_dispatcher_is_reported() {
    let (sender, receiver) = mpsc::channel::<Task>();
    drop(receiver);
    let dispatcher =
        move |task: Task| sender.send(task).map_err(|_| BindingError::DispatcherClosed);
    let property = AsyncProperty::new(
        PropertyMetadataBuilder::new(String::from("idle"))
            .dispatcher(Arc::new(dispatcher))
            .build(),
    );

    assert_eq!(
        property.set_async(String::from("busy")),
        Err(BindingError::DispatcherClosed)
    );
    assert_eq!(property.get(), "idle");
}

#[test]
fn write_is_dropped_when_property_is_gone() {
    let queue = Arc::new(Mutex::new(Vec::<Task>::new()));
    let pending = Arc::clone(&queue);
    let dispatcher = move |task: Task| -> Result<(), BindingError> {
        pending.lock().push(task);
        Ok(())
    };
    let property = AsyncProperty::new(
        PropertyMetadataBuilder::new(0)
            .dispatcher(Arc::new(dispatcher))
            .build(),
    );

    property.set_async(5).unwrap();
    assert_eq!(property.get(), 0);
    drop(property);

    for task in queue.lock().drain(..) {
        task();
    }
}

#[test]
fn writes_from_many_threads_are_delivered_in_order_through_one_worker() {
    let (sender, handle) = worker();
    let dispatcher =
        move |task: Task| sender.send(task).map_err(|_| BindingError::DispatcherClosed);
    let property = AsyncProperty::new(
        PropertyMetadataBuilder::new(0_u64)
            .dispatcher(Arc::new(dispatcher))
            .build(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    property
        .add_change_listener(ChangeListener::new(move |_, old: &u64, new: &u64| {
            log.lock().push((*old, *new));
        }))
        .unwrap();

    thread::scope(|scope| {
        for writer in 0..4_u64 {
            let property = &property;
            scope.spawn(move || {
                for step in 1..=25 {
                    property.set_async(writer * 100 + step).unwrap();
                }
            });
        }
    });

    let (done_sender, done_receiver) = mpsc::channel();
    property
        .metadata()
        .dispatcher()
        .dispatch(Box::new(move || done_sender.send(()).unwrap()))
        .unwrap();
    done_receiver.recv().unwrap();
    let last = property.get();
    drop(property);
    handle.join().unwrap();

    // Each delivery starts from the value the previous one ended with.
    let seen = seen.lock();
    assert_eq!(seen.len(), 100);
    assert_eq!(seen[0].0, 0);
    for pair in seen.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    assert_eq!(seen[seen.len() - 1].1, last);
}

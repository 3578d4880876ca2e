// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Binding: observable properties with proxied listener fan-out.
//!
//! This crate provides the listener bookkeeping behind observable properties
//! that are shared across threads, plus a reference property built on it.
//!
//! ## Core Concepts
//!
//! ### Listener kinds
//!
//! Four independent kinds of listener can be registered on an observable:
//!
//! | Kind | Delivered when |
//! |------|----------------|
//! | [`InvalidationListener`] | regular (non-sub) changes |
//! | [`SubInvalidationListener`] | every change, with the sub-change flag |
//! | [`ChangeListener`] | regular changes that alter the value |
//! | [`SubChangeListener`] | sub changes, and regular changes that alter the value |
//!
//! A *sub change* is a mutation nested inside the value, such as an element of a
//! collection. It is reported even when the value compares equal afterwards.
//!
//! ### Expression helper
//!
//! [`ExpressionHelper`] stores the listeners of one observable in the smallest
//! shape that fits: nothing, one listener of a given kind, or a generic
//! multi-listener form. The free functions in [`helper`] create, grow, shrink
//! and fire it in place.
//!
//! ### Peers
//!
//! A helper may mirror a [`PeerObservable`]. Listeners registered on the helper
//! then also hear the peer's notifications, always with the helper's owner as
//! event source. Replacing the peer moves the registrations and delivers one
//! catch-up notification.
//!
//! ### Failures
//!
//! A panicking listener never stops delivery. The panic is turned into a
//! [`ListenerFailure`] and reported to the owner's [`ListenerErrorSink`]; the
//! default [`TracingSink`] logs it with `tracing`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use understory_binding::{
//!     AsyncProperty, ChangeListener, InvalidationListener, PeerObservable,
//!     PropertyMetadataBuilder,
//! };
//!
//! let upstream = AsyncProperty::new(PropertyMetadataBuilder::new(1_i32).name("upstream").build());
//! let mirror = AsyncProperty::new(PropertyMetadataBuilder::new(0_i32).name("mirror").build());
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let changes = Arc::clone(&log);
//! mirror
//!     .add_change_listener(ChangeListener::new(move |_, old: &i32, new: &i32| {
//!         changes.lock().unwrap().push(format!("{old}->{new}"));
//!     }))
//!     .unwrap();
//! let invalidations = Arc::clone(&log);
//! mirror
//!     .add_invalidation_listener(InvalidationListener::new(move |_| {
//!         invalidations.lock().unwrap().push("invalidated".to_owned());
//!     }))
//!     .unwrap();
//!
//! // Setting a peer delivers one catch-up notification from the mirror's own
//! // value; it is unchanged, so only the invalidation listener runs.
//! mirror.set_peer(Some(upstream.clone() as Arc<dyn PeerObservable<i32>>)).unwrap();
//! assert_eq!(*log.lock().unwrap(), ["invalidated"]);
//! log.lock().unwrap().clear();
//!
//! // Notifications of the peer reach the mirror's listeners.
//! upstream.set(2);
//! assert_eq!(*log.lock().unwrap(), ["invalidated", "1->2"]);
//! ```
//!
//! ## Threading
//!
//! Listeners run synchronously on the thread that changed the value, after the
//! owning property has released its locks. Work that has to happen in a
//! particular context goes through a [`Dispatcher`].

mod bidirectional;
mod dispatch;
mod error;
pub mod helper;
mod listener;
mod metadata;
mod observable;
mod property;
mod sink;

pub use bidirectional::{BidirectionalBinding, bind_bidirectional};
pub use dispatch::{Dispatcher, ImmediateDispatcher, Task};
pub use error::BindingError;
pub use helper::{Delivery, ExpressionHelper, Generic, HelperShape, Single};
pub use listener::{
    AnyListener, ChangeListener, InvalidationListener, ListenerKind, ListenerKinds,
    SubChangeListener, SubInvalidationListener,
};
pub use metadata::{
    CoerceValueCallback, PropertyChangedCallback, PropertyMetadata, PropertyMetadataBuilder,
};
pub use observable::{ObservableValue, Owner, PeerObservable, PropertyValue, same_observable};
pub use property::AsyncProperty;
pub use sink::{ListenerErrorSink, ListenerFailure, TracingSink};

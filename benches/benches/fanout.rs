// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_binding` listener delivery.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use understory_binding::{
    AsyncProperty, ChangeListener, InvalidationListener, ObservableValue, Owner, PeerObservable,
    PropertyMetadata, SubChangeListener, TracingSink, helper,
};

struct Fixed(u64);

impl ObservableValue<u64> for Fixed {
    fn value(&self) -> u64 {
        self.0
    }
}

fn counting_change(counter: &Arc<AtomicU64>) -> ChangeListener<u64> {
    let counter = Arc::clone(counter);
    ChangeListener::new(move |_, _, new: &u64| {
        counter.fetch_add(*new & 1, Ordering::Relaxed);
    })
}

fn bench_fanout(c: &mut Criterion) {
    let counter = Arc::new(AtomicU64::new(0));

    let mut group = c.benchmark_group("binding/fire");
    for listeners in [1_usize, 2, 8, 64] {
        group.bench_function(BenchmarkId::new("change", listeners), |b| {
            let observable = Arc::new(Fixed(0));
            let owner = Owner::from_arc(&observable, Arc::new(TracingSink));
            let mut slot = None;
            for _ in 0..listeners {
                helper::add_change_listener(&mut slot, &owner, None, 0, counting_change(&counter))
                    .unwrap();
            }
            let mut value = 0_u64;
            b.iter(|| {
                value += 1;
                helper::fire_value_changed_event(slot.as_mut(), black_box(value), false);
            });
        });
    }

    group.bench_function("unchanged_value", |b| {
        let observable = Arc::new(Fixed(0));
        let owner = Owner::from_arc(&observable, Arc::new(TracingSink));
        let mut slot = None;
        helper::add_change_listener(&mut slot, &owner, None, 0, counting_change(&counter))
            .unwrap();
        helper::add_sub_change_listener(
            &mut slot,
            &owner,
            None,
            0,
            SubChangeListener::new(|_, _, _, _| {}),
        )
        .unwrap();
        b.iter(|| helper::fire_value_changed_event(slot.as_mut(), black_box(0), false));
    });
    group.finish();

    let mut group = c.benchmark_group("binding/registration");
    group.bench_function("grow_and_collapse_8", |b| {
        let observable = Arc::new(Fixed(0));
        let owner = Owner::from_arc(&observable, Arc::new(TracingSink));
        b.iter_batched(
            || {
                (0..8)
                    .map(|_| InvalidationListener::new(|_| {}))
                    .collect::<Vec<_>>()
            },
            |listeners| {
                let mut slot = None;
                for listener in &listeners {
                    helper::add_invalidation_listener(&mut slot, &owner, None, 0, listener.clone())
                        .unwrap();
                }
                for listener in &listeners {
                    helper::remove_invalidation_listener(&mut slot, listener);
                }
                black_box(slot.is_none())
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();

    let mut group = c.benchmark_group("binding/property");
    group.bench_function("set_through_peer", |b| {
        let upstream = AsyncProperty::new(PropertyMetadata::new(0_u64));
        let mirror = AsyncProperty::new(PropertyMetadata::new(0_u64));
        mirror
            .set_peer(Some(upstream.clone() as Arc<dyn PeerObservable<u64>>))
            .unwrap();
        for _ in 0..4 {
            mirror.add_change_listener(counting_change(&counter)).unwrap();
        }
        let mut value = 0_u64;
        b.iter(|| {
            value += 1;
            upstream.set(black_box(value));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_fanout);
criterion_main!(benches);

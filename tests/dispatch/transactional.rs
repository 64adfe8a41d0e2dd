//! Asynchronous invocation overlap and transactional serialization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use topic_bus::{args, Args, Dispatcher};

use crate::support::{Recorder, Span};

fn timed_handler(spans: Recorder<Span>, hold: Duration) -> impl Fn() + Send + Sync + 'static {
    move || {
        let start = Instant::now();
        thread::sleep(hold);
        spans.push(Span {
            start,
            end: Instant::now(),
        });
    }
}

#[test]
fn transactional_invocations_never_overlap() {
    let bus = Dispatcher::new();
    let spans = Recorder::new();

    bus.subscribe_async(
        "ledger",
        timed_handler(spans.clone(), Duration::from_millis(40)),
        true,
    )
    .unwrap();

    bus.publish("ledger", Args::new()).unwrap();
    bus.publish("ledger", Args::new()).unwrap();
    bus.publish("ledger", Args::new()).unwrap();
    bus.wait_async().unwrap();

    let spans = spans.entries();
    assert_eq!(spans.len(), 3);
    for pair in spans.windows(2) {
        assert!(!pair[0].overlaps(&pair[1]));
        assert!(pair[0].end <= pair[1].start);
    }
}

#[test]
fn non_transactional_invocations_may_overlap() {
    let bus = Dispatcher::new();
    let spans = Recorder::new();

    bus.subscribe_async(
        "metrics",
        timed_handler(spans.clone(), Duration::from_millis(150)),
        false,
    )
    .unwrap();

    bus.publish("metrics", Args::new()).unwrap();
    bus.publish("metrics", Args::new()).unwrap();
    bus.wait_async().unwrap();

    let spans = spans.entries();
    assert_eq!(spans.len(), 2);
    assert!(spans[0].overlaps(&spans[1]));
}

#[test]
fn transactional_runs_in_publish_order() {
    let bus = Dispatcher::new();
    let seen = Recorder::new();

    let sink = seen.clone();
    bus.subscribe_async(
        "sequence",
        move |n: u32| {
            // later invocations are quicker, so any overlap would reorder them
            thread::sleep(Duration::from_millis(u64::from(20 - n)));
            sink.push(n);
        },
        true,
    )
    .unwrap();

    for n in 0..10 {
        bus.publish("sequence", args![n]).unwrap();
    }
    bus.wait_async().unwrap();

    assert_eq!(seen.entries(), (0..10).collect::<Vec<u32>>());
}

#[test]
fn transactional_is_exclusive_across_publisher_threads() {
    let bus = Dispatcher::new();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    {
        let (active, peak, calls) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&calls));
        bus.subscribe_async(
            "exclusive",
            move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            },
            true,
        )
        .unwrap();
    }

    let publishers = 4;
    let start = Arc::new(Barrier::new(publishers));
    let handles: Vec<_> = (0..publishers)
        .map(|_| {
            let bus = bus.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..5 {
                    bus.publish("exclusive", Args::new()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    bus.wait_async().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 20);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn other_records_are_not_held_back_by_a_busy_transactional_record() {
    let bus = Dispatcher::new();
    let quick_done = Arc::new(AtomicUsize::new(0));

    bus.subscribe_async(
        "slow",
        || thread::sleep(Duration::from_millis(200)),
        true,
    )
    .unwrap();
    let done = Arc::clone(&quick_done);
    bus.subscribe("fast", move || {
        done.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    bus.publish("slow", Args::new()).unwrap();

    let started = Instant::now();
    bus.publish("fast", Args::new()).unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(quick_done.load(Ordering::SeqCst), 1);

    bus.wait_async().unwrap();
}

#[test]
fn faulting_transactional_handler_releases_its_lock() {
    let bus = Dispatcher::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    bus.subscribe_async(
        "unstable",
        move |fail: bool| {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                panic!("transaction aborted");
            }
        },
        true,
    )
    .unwrap();

    bus.publish("unstable", args![true]).unwrap();
    bus.publish("unstable", args![false]).unwrap();
    bus.publish("unstable", args![true]).unwrap();
    bus.wait_async().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(bus.pending_async().unwrap(), 0);
}

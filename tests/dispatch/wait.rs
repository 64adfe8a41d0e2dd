//! The `wait_async` drain barrier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use topic_bus::{args, Args, Dispatcher};

#[test]
fn wait_async_returns_immediately_when_idle() {
    let bus = Dispatcher::new();
    bus.subscribe("sync-only", || {}).unwrap();
    bus.publish("sync-only", Args::new()).unwrap();

    let started = Instant::now();
    bus.wait_async().unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn wait_async_waits_for_every_async_handler() {
    let bus = Dispatcher::new();
    let completed = Arc::new(AtomicUsize::new(0));
    let handlers = 10;

    for n in 0..handlers {
        let done = Arc::clone(&completed);
        bus.subscribe_async(
            "batch",
            move |delay: u64| {
                thread::sleep(Duration::from_millis(delay + n as u64 * 3));
                done.fetch_add(1, Ordering::SeqCst);
            },
            n % 2 == 0,
        )
        .unwrap();
    }

    assert_eq!(bus.publish("batch", args![20]).unwrap(), handlers);
    bus.wait_async().unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), handlers);
    assert_eq!(bus.pending_async().unwrap(), 0);
}

#[test]
fn wait_async_spans_all_topics() {
    let bus = Dispatcher::new();
    let completed = Arc::new(AtomicUsize::new(0));

    for topic in ["a", "b", "c"] {
        let done = Arc::clone(&completed);
        bus.subscribe_async(
            topic,
            move || {
                thread::sleep(Duration::from_millis(30));
                done.fetch_add(1, Ordering::SeqCst);
            },
            false,
        )
        .unwrap();
    }

    for topic in ["a", "b", "c"] {
        bus.publish(topic, Args::new()).unwrap();
    }
    bus.wait_async().unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[test]
fn wait_async_survives_faulting_handlers() {
    let bus = Dispatcher::new();
    bus.subscribe_async("broken", |_: u8| panic!("async failure"), false)
        .unwrap();
    bus.subscribe_async("broken", |_: u8| {}, true).unwrap();

    // wrong arity for both handlers
    bus.publish("broken", Args::new()).unwrap();
    bus.publish("broken", args![1]).unwrap();
    bus.wait_async().unwrap();

    assert_eq!(bus.pending_async().unwrap(), 0);
}

#[cfg(feature = "tokio")]
#[tokio::test]
async fn drain_awaits_pending_work() {
    let bus = Dispatcher::new();
    let completed = Arc::new(AtomicUsize::new(0));

    let done = Arc::clone(&completed);
    bus.subscribe_async(
        "jobs",
        move || {
            thread::sleep(Duration::from_millis(30));
            done.fetch_add(1, Ordering::SeqCst);
        },
        false,
    )
    .unwrap();

    bus.publish("jobs", Args::new()).unwrap();
    bus.publish("jobs", Args::new()).unwrap();
    bus.drain().await.unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 2);
}

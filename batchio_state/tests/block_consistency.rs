//! Data block consistency tests
//!
//! Readers sampling while a writer commits must only ever see slot values
//! of a single committed version. Abandoned writes must leave no trace.

use batchio_common::data::Direction;
use batchio_common::event::Event;
use batchio_state::{DataArray, DataBlock, PendingEventList};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::SystemTime;

#[derive(Clone, Default)]
struct Status {
    error: Option<i32>,
    cycle: u64,
}

#[derive(Clone, Default)]
struct Point {
    value: u64,
    label: String,
}

#[test]
fn test_readers_never_observe_mixed_versions() {
    let mut array = DataArray::new();
    let status = array.add(Status::default());
    let left = array.add(Point::default());
    let right = array.add(Point::default());
    let block = Arc::new(DataBlock::new("consistency"));
    block.create(array);

    let running = Arc::new(AtomicBool::new(true));
    let samples = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let block = Arc::clone(&block);
            let running = Arc::clone(&running);
            let samples = Arc::clone(&samples);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut last_version = 0;
                while running.load(Ordering::Acquire) {
                    let snapshot = block.snapshot();
                    let cycle = snapshot.get(status).map(|s| s.cycle).unwrap();
                    let l = snapshot.get(left).unwrap();
                    let r = snapshot.get(right).unwrap();

                    assert_eq!(l.value, cycle, "left slot from another version");
                    assert_eq!(r.value, cycle, "right slot from another version");
                    assert_eq!(l.label, r.label);
                    assert_eq!(snapshot.version(), cycle * 2);
                    assert!(snapshot.version() >= last_version, "version went backwards");
                    last_version = snapshot.version();
                    samples.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    barrier.wait();
    let mut events = PendingEventList::new();
    for cycle in 1..=2_000u64 {
        let mut sentinel = block.open();
        sentinel.get_mut(status).cycle = cycle;
        sentinel.get_mut(status).error = (cycle % 7 == 0).then_some(5);
        let l = sentinel.get_mut(left);
        l.value = cycle;
        l.label = format!("cycle-{cycle}");
        let r = sentinel.get_mut(right);
        r.value = cycle;
        r.label = format!("cycle-{cycle}");
        sentinel.commit(SystemTime::now(), &mut events);
    }
    running.store(false, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(samples.load(Ordering::Relaxed) > 0);
    assert_eq!(block.version(), 4_000);
}

#[test]
fn test_abandoned_write_keeps_committed_state() {
    let mut array = DataArray::new();
    let status = array.add(Status::default());
    let point = array.add(Point::default());
    let block = DataBlock::new("abandon");
    block.create(array);

    let ok = Event::new("readOk", Direction::Input);
    let changed = Event::new("changed", Direction::Input);
    let mut events = PendingEventList::with_capacity(2);

    let mut sentinel = block.open();
    sentinel.get_mut(point).value = 1;
    events.push(&changed);
    sentinel.commit(SystemTime::now(), &mut events);
    let committed = block.snapshot();
    assert_eq!(changed.fire_count(), 1);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut sentinel = block.open();
        sentinel.get_mut(status).error = Some(3);
        sentinel.get_mut(point).value = 2;
        events.push(&ok);
        events.push(&changed);
        panic!("update failed mid-cycle");
    }));
    assert!(result.is_err());

    assert_eq!(block.version(), committed.version());
    let current = block.snapshot();
    assert_eq!(current.get(status).map(|s| s.error), Some(None));
    assert_eq!(current.get(point).map(|p| p.value), Some(1));
    assert_eq!(ok.fire_count(), 0);
    assert_eq!(changed.fire_count(), 1);

    // Staged events of the abandoned cycle are the caller's to discard.
    events.clear();
    let sentinel = block.open();
    sentinel.commit(SystemTime::now(), &mut events);
    assert_eq!(ok.fire_count(), 0);
    assert_eq!(block.version(), committed.version() + 2);
}

#[test]
fn test_commit_fires_each_event_once_in_order() {
    let mut array = DataArray::new();
    let point = array.add(Point::default());
    let block = DataBlock::new("events");
    block.create(array);

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let make = |name: &'static str| {
        let event = Event::new(name, Direction::Output);
        let sink = Arc::clone(&order);
        event.subscribe(move |notice| sink.lock().push(notice.name));
        event
    };
    let error = make("writeError");
    let written = make("written");
    let ok = make("writeOk");

    let mut events = PendingEventList::with_capacity(3);
    let mut sentinel = block.open();
    sentinel.get_mut(point).value = 9;
    events.push(&ok);
    events.push(&written);
    events.push(&ok);
    events.push(&error);
    events.push(&written);
    sentinel.commit(SystemTime::now(), &mut events);

    assert_eq!(*order.lock(), ["writeOk", "written", "writeError"]);
    assert!(events.is_empty());
}

//! Shared handles cloned and dropped across threads.
//!
//! Each worker receives clones over a channel, clones them again and
//! drops everything. The payload must be dropped exactly once, after the
//! last handle anywhere goes away.

use std::thread;

use crossbeam_channel::unbounded;
use wisp_ptr::{CowShared, Shared};
use wisp_test_utils::{Counted, DropCounter};

const WORKERS: usize = 8;
const CLONES_PER_WORKER: usize = 200;

#[test]
fn payload_dropped_once_after_concurrent_clones() {
    let drops = DropCounter::new();
    let root: Shared<Counted> = Shared::new(drops.track(7));
    let (tx, rx) = unbounded::<Shared<Counted>>();

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let rx = rx.clone();
            thread::spawn(move || {
                let mut seen = 0;
                while let Ok(handle) = rx.recv() {
                    let local: Vec<_> = (0..CLONES_PER_WORKER).map(|_| handle.clone()).collect();
                    assert!(local.iter().all(|h| h.id == 7));
                    seen += 1;
                }
                seen
            })
        })
        .collect();

    for _ in 0..WORKERS * 4 {
        tx.send(root.clone()).unwrap();
    }
    drop(tx);

    let received: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(received, WORKERS * 4);
    assert_eq!(root.strong_count(), 1);
    assert_eq!(drops.dropped(), 0);

    drop(root);
    assert_eq!(drops.dropped(), 1);
}

#[test]
fn last_owner_on_another_thread_frees() {
    let drops = DropCounter::new();
    let root: Shared<Counted> = Shared::new(drops.track(1));
    let moved = root.clone();
    drop(root);

    thread::spawn(move || {
        assert_eq!(moved.strong_count(), 1);
        drop(moved);
    })
    .join()
    .unwrap();

    assert_eq!(drops.dropped(), 1);
}

#[test]
fn many_independent_groups() {
    let drops = DropCounter::new();
    let groups: Vec<Shared<Counted>> = (0..64).map(|i| Shared::new(drops.track(i))).collect();
    let (tx, rx) = unbounded::<Vec<Shared<Counted>>>();

    let worker = thread::spawn(move || {
        let mut total = 0u32;
        while let Ok(batch) = rx.recv() {
            total += batch.iter().map(|h| h.id).sum::<u32>();
        }
        total
    });

    for _ in 0..4 {
        tx.send(groups.clone()).unwrap();
    }
    drop(tx);

    let expected: u32 = (0..64).sum::<u32>() * 4;
    assert_eq!(worker.join().unwrap(), expected);
    assert!(groups.iter().all(|h| h.strong_count() == 1));
    drop(groups);
    assert_eq!(drops.dropped(), 64);
}

#[test]
fn copy_on_write_detaches_per_thread() {
    let base: CowShared<Vec<u32>> = CowShared::new(vec![0; 16]);

    let workers: Vec<_> = (0..4u32)
        .map(|n| {
            let mut mine = base.clone();
            thread::spawn(move || {
                mine.make_mut()[0] = n + 1;
                mine[0]
            })
        })
        .collect();

    let mut firsts: Vec<u32> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    firsts.sort_unstable();
    assert_eq!(firsts, vec![1, 2, 3, 4]);
    assert_eq!(base[0], 0);
    assert!(!base.is_shared());
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use zimo_wire::protocol::{PacketBuilder, marshal, unmarshal};
use zimo_wire::transport::BufferPool;

#[test]
fn writers_share_a_small_pool() {
    let pool = BufferPool::new(32, 2);
    let in_use = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let decoded = Arc::new(Mutex::new(0usize));

    thread::scope(|scope| {
        for sender in 0..6u16 {
            let pool = pool.clone();
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            let decoded = Arc::clone(&decoded);
            scope.spawn(move || {
                let builder = PacketBuilder::new(sender);
                for nid in 0..20 {
                    let mut buffer = pool.acquire();
                    let now = in_use.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    let packet = builder.loco_state(nid);
                    let written = marshal(&packet, buffer.as_mut_slice()).unwrap();
                    buffer.set_len(written);
                    assert_eq!(unmarshal(buffer.as_slice()).unwrap(), packet);
                    *decoded.lock().unwrap() += 1;

                    in_use.fetch_sub(1, Ordering::SeqCst);
                    buffer.release();
                }
            });
        }
    });

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(*decoded.lock().unwrap(), 120);
    assert_eq!(pool.leased(), 0);
    assert!(pool.pooled() <= 2);
}

#[test]
fn blocked_acquire_wakes_on_release() {
    let pool = BufferPool::new(8, 1);
    let held = pool.acquire();
    let woke = Arc::new(AtomicUsize::new(0));

    let waiter = {
        let pool = pool.clone();
        let woke = Arc::clone(&woke);
        thread::spawn(move || {
            let _buffer = pool.acquire();
            woke.store(1, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(woke.load(Ordering::SeqCst), 0);
    held.release();
    waiter.join().unwrap();
    assert_eq!(woke.load(Ordering::SeqCst), 1);
}

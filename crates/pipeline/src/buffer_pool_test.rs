//! Tests for the lock-free buffer pool

use crate::buffer_pool::{BufferPool, BufferPoolMetrics};
use bytes::BytesMut;
use std::sync::Arc;
use std::thread;

#[test]
fn test_new_pool_is_empty() {
    let pool = BufferPool::new(10, 1024);

    assert_eq!(pool.capacity(), 10);
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.buffer_capacity(), 1024);
    assert!(pool.is_empty());
    assert!(!pool.is_full());
}

#[test]
fn test_prefilled_pool() {
    let pool = BufferPool::prefilled(10, 1024);

    assert_eq!(pool.available(), 10);
    assert!(pool.is_full());
}

#[test]
fn test_fill_bounded_by_room() {
    let pool = BufferPool::new(4, 64);

    assert_eq!(pool.fill(2), 2);
    assert_eq!(pool.available(), 2);

    // Only two slots left
    assert_eq!(pool.fill(10), 2);
    assert_eq!(pool.available(), 4);

    assert_eq!(pool.fill(1), 0);
}

#[test]
fn test_zero_size_pool_retains_one() {
    let pool = BufferPool::new(0, 64);
    assert_eq!(pool.capacity(), 1);
}

#[test]
fn test_get_returns_buffer_with_capacity() {
    let pool = BufferPool::prefilled(5, 4096);

    let buf = pool.get();
    assert!(buf.capacity() >= 4096);
    assert!(buf.is_empty());
    assert_eq!(pool.available(), 4);
}

#[test]
fn test_get_from_empty_pool_allocates() {
    let pool = BufferPool::prefilled(2, 1024);

    // Drain the pool
    let _b1 = pool.get();
    let _b2 = pool.get();
    assert!(pool.is_empty());

    // Should still get a buffer (newly allocated)
    let b3 = pool.get();
    assert!(b3.capacity() >= 1024);

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.hits, 2);
    assert_eq!(snapshot.misses, 1);
}

#[test]
fn test_put_returns_buffer_to_pool() {
    let pool = BufferPool::prefilled(5, 1024);

    let buf = pool.get();
    assert_eq!(pool.available(), 4);

    pool.put(buf);
    assert_eq!(pool.available(), 5);

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.returns, 1);
}

#[test]
fn test_put_clears_buffer() {
    let pool = BufferPool::prefilled(5, 1024);

    let mut buf = pool.get();
    buf.extend_from_slice(b"hello world");
    assert!(!buf.is_empty());

    pool.put(buf);

    // Get the buffer back and verify it's cleared
    let buf2 = pool.get();
    assert!(buf2.is_empty());
}

#[test]
fn test_put_drops_when_pool_full() {
    let pool = BufferPool::prefilled(2, 1024);
    assert!(pool.is_full());

    // A foreign buffer is accepted on the same terms
    pool.put(BytesMut::with_capacity(1024));

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.drops, 1);
    assert_eq!(pool.available(), 2);
}

#[test]
fn test_put_drops_small_buffers() {
    let pool = BufferPool::new(5, 1024);

    pool.put(BytesMut::with_capacity(100));

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.drops, 1);
    assert_eq!(pool.available(), 0);
}

#[test]
fn test_put_accepts_foreign_buffer_with_room() {
    let pool = BufferPool::new(2, 64);

    pool.put(BytesMut::with_capacity(128));
    assert_eq!(pool.available(), 1);

    let buf = pool.get();
    assert!(buf.capacity() >= 64);
}

/// Pool of four 8-byte buffers: the fifth get allocates, the fifth put is
/// dropped, and four more gets are served without allocating.
#[test]
fn test_pool_basics_scenario() {
    let pool = BufferPool::new(4, 8);

    let mut bufs: Vec<BytesMut> = (0..4).map(|_| pool.get()).collect();
    for (i, buf) in bufs.iter_mut().enumerate() {
        buf.extend_from_slice(&[i as u8]);
    }
    let firsts: Vec<u8> = bufs.iter().map(|b| b[0]).collect();
    assert_eq!(firsts, vec![0, 1, 2, 3]);

    let fifth = pool.get();
    assert!(fifth.capacity() >= 8);
    assert_eq!(pool.metrics().snapshot().misses, 5);
    bufs.push(fifth);

    for buf in bufs {
        pool.put(buf);
    }
    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.returns, 4);
    assert_eq!(snapshot.drops, 1);
    assert_eq!(pool.available(), 4);

    for _ in 0..4 {
        let buf = pool.get();
        assert!(buf.capacity() >= 8);
    }
    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.misses, 5);
    assert_eq!(snapshot.hits, 4);
}

#[test]
fn test_pooled_buffer_returns_on_drop() {
    let pool = Arc::new(BufferPool::new(2, 256));

    {
        let mut buf = pool.get_pooled();
        buf.extend_from_slice(&[0x00, 0x05]);
        assert_eq!(buf[1], 0x05);
        assert_eq!(buf.as_ref(), &[0x00, 0x05]);
        assert!(Arc::ptr_eq(buf.pool(), &pool));
        assert_eq!(pool.available(), 0);
    }

    assert_eq!(pool.available(), 1);
    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.taken(), 1);
    assert_eq!(snapshot.given_back(), 1);
    assert_eq!(snapshot.outstanding(), 0);
}

#[test]
fn test_pooled_buffer_returns_during_unwind() {
    let pool = Arc::new(BufferPool::new(2, 256));
    let pool_clone = Arc::clone(&pool);

    let result = thread::spawn(move || {
        let _buf = pool_clone.get_pooled();
        panic!("handler failure");
    })
    .join();

    assert!(result.is_err());
    assert_eq!(pool.available(), 1);
    assert_eq!(pool.metrics().snapshot().outstanding(), 0);
}

#[test]
fn test_metrics_hit_rate() {
    let pool = BufferPool::prefilled(2, 1024);

    // 2 hits
    let _b1 = pool.get();
    let _b2 = pool.get();

    // 1 miss
    let _b3 = pool.get();

    let rate = pool.metrics().hit_rate();
    assert!((rate - 0.666).abs() < 0.01);
}

#[test]
fn test_metrics_snapshot() {
    let pool = BufferPool::prefilled(3, 1024);

    let b1 = pool.get(); // hit
    let _b2 = pool.get(); // hit
    let _b3 = pool.get(); // hit
    let _b4 = pool.get(); // miss

    pool.put(b1); // return

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.hits, 3);
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.returns, 1);
    assert_eq!(snapshot.drops, 0);
    assert_eq!(snapshot.outstanding(), 3);
}

#[test]
fn test_concurrent_access() {
    let pool = Arc::new(BufferPool::prefilled(100, 1024));
    let mut handles = vec![];

    // Spawn 10 threads, each doing 100 get/put cycles
    for _ in 0..10 {
        let pool = Arc::clone(&pool);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                let buf = pool.get_pooled();
                std::hint::black_box(&buf);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.taken(), 1000);
    assert_eq!(snapshot.given_back(), 1000);
    assert!(pool.available() <= 100);
}

#[test]
fn test_empty_pool_metrics() {
    let metrics = BufferPoolMetrics::new();

    // No operations yet - hit rate should be 1.0 (not NaN or panic)
    assert_eq!(metrics.hit_rate(), 1.0);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.hit_rate(), 1.0);
}

#[test]
fn test_multiple_get_put_cycles() {
    let pool = BufferPool::prefilled(3, 1024);

    for _ in 0..100 {
        let buf = pool.get();
        pool.put(buf);
    }

    assert_eq!(pool.available(), 3);

    let snapshot = pool.metrics().snapshot();
    assert_eq!(snapshot.hits, 100);
    assert_eq!(snapshot.returns, 100);
    assert_eq!(snapshot.misses, 0);
    assert_eq!(snapshot.drops, 0);
}

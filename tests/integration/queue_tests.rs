//! Integration tests for the awaitable multi-producer queue

use crate::common::init_tracing;
use batchpipe_rs::AsyncQueue;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_mpmc_delivers_every_item_exactly_once() {
    init_tracing();
    let queue = Arc::new(AsyncQueue::new());
    let collected = Arc::new(Mutex::new(Vec::new()));
    let cancel = CancellationToken::new();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let collected = Arc::clone(&collected);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                while let Some(item) = queue.dequeue(&cancel).await.unwrap() {
                    collected.lock().unwrap().push(item);
                }
            })
        })
        .collect();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    queue.enqueue((p * PER_PRODUCER + i) as u64);
                }
            })
        })
        .collect();

    join_all(producers).await;

    // Wait until the consumers have drained everything, then release them.
    let total = PRODUCERS * PER_PRODUCER;
    while collected.lock().unwrap().len() < total {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    queue.close();
    join_all(consumers).await;

    let mut items = collected.lock().unwrap().clone();
    items.sort_unstable();
    let expected: Vec<u64> = (0..total as u64).collect();
    assert_eq!(items, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_many_wakes_a_burst_of_waiters() {
    let queue = Arc::new(AsyncQueue::new());
    let cancel = CancellationToken::new();

    let waiters: Vec<_> = (0..5)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await.unwrap() })
        })
        .collect();

    // Give every waiter time to park before the burst becomes visible.
    tokio::time::sleep(Duration::from_millis(30)).await;
    queue.enqueue_many(0..5u64);

    let mut received: Vec<u64> = join_all(waiters)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    received.sort_unstable();
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_one_waiter_leaves_others_untouched() {
    let queue = Arc::new(AsyncQueue::new());
    let cancel_a = CancellationToken::new();
    let cancel_b = CancellationToken::new();

    let waiter_a = {
        let queue = Arc::clone(&queue);
        let cancel = cancel_a.clone();
        tokio::spawn(async move { queue.dequeue(&cancel).await })
    };
    let waiter_b = {
        let queue = Arc::clone(&queue);
        let cancel = cancel_b.clone();
        tokio::spawn(async move { queue.dequeue(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel_a.cancel();

    let err = waiter_a.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    // The surviving waiter still receives the next item.
    queue.enqueue(99u64);
    assert_eq!(waiter_b.await.unwrap().unwrap(), Some(99));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_releases_every_suspended_waiter() {
    let queue = Arc::new(AsyncQueue::<u64>::new());
    let cancel = CancellationToken::new();

    let waiters: Vec<_> = (0..10)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.dequeue(&cancel).await.unwrap() })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(30)).await;
    queue.close();

    for result in join_all(waiters).await {
        assert_eq!(result.unwrap(), None);
    }
}

#[tokio::test]
async fn test_len_tracks_enqueued_minus_dequeued() {
    let queue = AsyncQueue::new();
    let cancel = CancellationToken::new();

    queue.enqueue_many(0..100u64);
    assert_eq!(queue.len(), 100);

    for _ in 0..40 {
        assert_ok!(queue.dequeue(&cancel).await);
    }
    assert_eq!(queue.len(), 60);
}

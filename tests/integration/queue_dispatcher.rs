//! Integration tests for the generation queue dispatcher
//!
//! Tests cover:
//! - FIFO start order under a single concurrency slot
//! - Position reporting while jobs drain
//! - Concurrency cap with several slots
//! - Admission limit and shutdown

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taleforge::error::{DispatchError, PipelineError};
use taleforge::provider::RawText;
use taleforge::queue::{QueueConfig, QueueDispatcher};
use tokio::sync::oneshot;

fn dispatcher(max_concurrent: usize) -> QueueDispatcher {
    QueueDispatcher::new(QueueConfig {
        max_concurrent,
        max_queue_depth: None,
    })
}

#[tokio::test]
async fn jobs_start_in_submission_order() {
    let queue = dispatcher(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..5 {
        let order = Arc::clone(&order);
        let handle = queue
            .enqueue(format!("user-{}", i), move || async move {
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(RawText::new(format!("{{\"n\":{}}}", i)))
            })
            .unwrap();
        handles.push(handle);
    }
    queue.start().unwrap();

    for (i, handle) in handles.into_iter().enumerate() {
        let raw = handle.await.unwrap();
        assert_eq!(raw.content, format!("{{\"n\":{}}}", i));
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(queue.stats().completed, 5);
}

#[tokio::test]
async fn positions_decrease_as_jobs_finish() {
    let queue = dispatcher(1);
    let mut gates = Vec::new();
    let mut handles = Vec::new();

    for user in ["u1", "u2", "u3"] {
        let (tx, rx) = oneshot::channel::<()>();
        gates.push(tx);
        handles.push(
            queue
                .enqueue(user, move || async move {
                    let _ = rx.await;
                    Ok(RawText::new("{}"))
                })
                .unwrap(),
        );
    }

    // Nothing started yet: positions are raw FIFO indexes
    assert_eq!(queue.status("u1").user_position, 0);
    assert_eq!(queue.status("u3").user_position, 2);
    assert_eq!(queue.status("u3").queue_length, 3);

    queue.start().unwrap();
    wait_for(|| queue.status("u1").is_processing).await;

    let snapshot = queue.status("u3");
    assert_eq!(snapshot.queue_length, 3);
    assert_eq!(snapshot.user_position, 1);

    let mut gates = gates.into_iter();
    let mut handles = handles.into_iter();

    gates.next().unwrap().send(()).unwrap();
    handles.next().unwrap().await.unwrap();
    wait_for(|| queue.status("u3").user_position == 0).await;
    assert_eq!(queue.status("u3").queue_length, 2);

    for (gate, handle) in gates.zip(handles) {
        gate.send(()).unwrap();
        handle.await.unwrap();
    }
    queue.wait_idle(Some(Duration::from_secs(2))).await.unwrap();
    assert_eq!(queue.status("u3").queue_length, 0);
    assert!(!queue.status("u3").is_processing);
}

#[tokio::test]
async fn concurrency_never_exceeds_cap() {
    let queue = dispatcher(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    queue.start().unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(
            queue
                .enqueue(format!("user-{}", i), move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(RawText::new("{}"))
                })
                .unwrap(),
        );
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn admission_limit_rejects_overflow() {
    let queue = QueueDispatcher::new(QueueConfig {
        max_concurrent: 1,
        max_queue_depth: Some(2),
    });

    let _first = queue.enqueue("u1", || async { Ok(RawText::new("{}")) }).unwrap();
    let _second = queue.enqueue("u2", || async { Ok(RawText::new("{}")) }).unwrap();
    let rejected = queue.enqueue("u3", || async { Ok(RawText::new("{}")) });

    assert!(matches!(rejected, Err(DispatchError::QueueFull { depth: 2 })));
}

#[tokio::test]
async fn stop_fails_waiting_jobs_and_refuses_new_ones() {
    let queue = dispatcher(1);
    let handle = queue
        .enqueue("u1", || async { Ok(RawText::new("{}")) })
        .unwrap();

    queue.stop().await;

    let outcome = handle.await;
    assert!(matches!(
        outcome,
        Err(PipelineError::Dispatch(DispatchError::Closed))
    ));
    assert!(matches!(
        queue.enqueue("u2", || async { Ok(RawText::new("{}")) }),
        Err(DispatchError::Closed)
    ));
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

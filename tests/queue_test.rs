use std::collections::HashMap;
use tempfile::TempDir;
use tracklet::domain::{Record, RecordId, RecordKind};
use tracklet::queue::{DeliveryState, PersistentQueue, QueueConfig};

fn open_queue(dir: &TempDir, max_entries: usize) -> PersistentQueue {
    PersistentQueue::open(QueueConfig {
        storage_dir: dir.path().to_path_buf(),
        max_entries,
        write_retries: 3,
    })
    .unwrap()
}

fn event_record(queue: &PersistentQueue, token: &str) -> Record {
    let mut payload = HashMap::new();
    payload.insert("event_token".to_string(), token.to_string());
    Record::new(
        RecordId {
            device_id: "device-1".to_string(),
            sequence: queue.allocate_sequence(),
        },
        RecordKind::Event,
        payload,
    )
}

#[test]
fn peek_returns_oldest_pending_in_fifo_order() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, 100);

    for token in ["a", "b", "c", "d"] {
        let record = event_record(&queue, token);
        queue.enqueue(record).unwrap();
    }

    let batch = queue.peek_batch(3);
    assert_eq!(batch.len(), 3);
    let sequences: Vec<u64> = batch.iter().map(|e| e.record().id().sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert!(batch.iter().all(|e| e.state() == DeliveryState::InFlight));

    // The in-flight prefix is not handed out again.
    let next = queue.peek_batch(3);
    assert_eq!(next.len(), 1);
    assert_eq!(next[0].record().id().sequence, 3);
}

#[test]
fn acknowledge_removes_entry_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, 100);

    queue.enqueue(event_record(&queue, "a")).unwrap();
    queue.enqueue(event_record(&queue, "b")).unwrap();

    let batch = queue.peek_batch(1);
    let id = batch[0].entry_id();

    queue.acknowledge(id);
    assert_eq!(queue.len(), 1);

    // Second acknowledgment of the same id is a no-op, not an error.
    queue.acknowledge(id);
    assert_eq!(queue.len(), 1);

    let stats = queue.stats();
    assert_eq!(stats.delivered, 1);
}

#[test]
fn acknowledge_unknown_id_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, 100);

    queue.enqueue(event_record(&queue, "a")).unwrap();
    queue.acknowledge(999);
    assert_eq!(queue.len(), 1);
}

#[test]
fn requeue_returns_entry_to_pending_with_bumped_retry() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, 100);

    queue.enqueue(event_record(&queue, "a")).unwrap();

    let batch = queue.peek_batch(1);
    let id = batch[0].entry_id();
    assert_eq!(batch[0].retry_count(), 0);

    queue.requeue(id);

    let snapshot = queue.snapshot();
    assert_eq!(snapshot[0].state(), DeliveryState::Pending);
    assert_eq!(snapshot[0].retry_count(), 1);

    // Requeued entry is delivered again on the next peek.
    let retried = queue.peek_batch(1);
    assert_eq!(retried[0].entry_id(), id);
    assert_eq!(retried[0].retry_count(), 1);
}

#[test]
fn in_flight_entries_recover_to_pending_on_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let queue = open_queue(&dir, 100);
        queue.enqueue(event_record(&queue, "a")).unwrap();
        queue.enqueue(event_record(&queue, "b")).unwrap();
        let batch = queue.peek_batch(1);
        assert_eq!(batch[0].state(), DeliveryState::InFlight);
        // Queue dropped here with one entry stuck in flight.
    }

    let reopened = open_queue(&dir, 100);
    assert_eq!(reopened.len(), 2);

    let snapshot = reopened.snapshot();
    assert!(snapshot.iter().all(|e| e.state() == DeliveryState::Pending));

    let batch = reopened.peek_batch(2);
    let sequences: Vec<u64> = batch.iter().map(|e| e.record().id().sequence).collect();
    assert_eq!(sequences, vec![0, 1]);
}

#[test]
fn sequences_stay_monotonic_across_reopen() {
    let dir = TempDir::new().unwrap();

    let high_water = {
        let queue = open_queue(&dir, 100);
        queue.allocate_sequence();
        queue.allocate_sequence();
        queue.allocate_sequence()
    };

    let reopened = open_queue(&dir, 100);
    assert!(reopened.allocate_sequence() > high_water);
}

#[test]
fn capacity_overflow_evicts_oldest_pending() {
    let dir = TempDir::new().unwrap();
    let queue = open_queue(&dir, 3);

    for token in ["a", "b", "c", "d"] {
        let record = event_record(&queue, token);
        queue.enqueue(record).unwrap();
    }

    assert_eq!(queue.len(), 3);
    let stats = queue.stats();
    assert_eq!(stats.evicted, 1);

    // The oldest record was the victim; the remainder kept their order.
    let sequences: Vec<u64> = queue
        .snapshot()
        .iter()
        .map(|e| e.record().id().sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn delivered_entries_do_not_reappear_after_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let queue = open_queue(&dir, 100);
        queue.enqueue(event_record(&queue, "a")).unwrap();
        queue.enqueue(event_record(&queue, "b")).unwrap();
        let batch = queue.peek_batch(1);
        queue.acknowledge(batch[0].entry_id());
    }

    let reopened = open_queue(&dir, 100);
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.snapshot()[0].record().id().sequence, 1);
}

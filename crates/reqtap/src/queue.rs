//! ✉️ The BoundedQueue: a fixed-size waiting room between the request path and the sink.
//!
//! Producers (every in-flight request) knock once with [`BoundedQueue::try_enqueue`].
//! If there's a seat, they sit. If not, they leave. Nobody waits in the hallway.
//! The consumer (one ingestion worker) calls [`BoundedQueue::dequeue`] and naps until
//! somebody shows up.
//!
//! Built on `async_channel::bounded`, same plumbing the rest of the pipeline has always
//! used. It's MPMC under the hood; we only ever hand the receiving end to one worker.

use async_channel::{Receiver, Sender, TrySendError};

use crate::record::RequestRecord;

/// 📬 Fixed-capacity FIFO of [`RequestRecord`]s. Cheap to clone: clones share the channel.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    tx: Sender<RequestRecord>,
    rx: Receiver<RequestRecord>,
}

impl BoundedQueue {
    /// 🏗️ A fresh queue with room for exactly `capacity` records. Forever. No resizing.
    ///
    /// # Panics
    /// `async_channel::bounded` panics on zero. Config validation refuses zero long before
    /// we get here.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// 🚪 Offer a record without waiting. `true` if it got a seat, `false` if the room is
    /// full (or closed for the night). Never blocks, never yields, never retries.
    pub fn try_enqueue(&self, record: RequestRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// 😴 Wait for the next record, in arrival order.
    ///
    /// Returns `None` only after [`BoundedQueue::close`] has been called *and* every
    /// queued record has been handed out. Until then it just waits. Patiently. Forever.
    pub async fn dequeue(&self) -> Option<RequestRecord> {
        self.rx.recv().await.ok()
    }

    /// 🔒 Stop accepting new records. Whatever is already queued stays dequeueable.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        // -- 📏 bounded channels always know their capacity. unbounded ones don't exist here.
        self.tx.capacity().unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample_record;
    use std::time::Duration;

    #[test]
    fn the_one_where_the_room_fills_up_and_the_door_stays_shut() {
        let queue = BoundedQueue::new(2);
        assert!(queue.try_enqueue(sample_record("/a")));
        assert!(queue.try_enqueue(sample_record("/b")));
        assert!(!queue.try_enqueue(sample_record("/c")), "third wheel should be turned away");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);
    }

    #[tokio::test]
    async fn the_one_where_first_in_is_first_out() {
        let queue = BoundedQueue::new(8);
        for path in ["/1", "/2", "/3"] {
            assert!(queue.try_enqueue(sample_record(path)));
        }
        let drained: Vec<String> = vec![
            queue.dequeue().await.unwrap().path,
            queue.dequeue().await.unwrap().path,
            queue.dequeue().await.unwrap().path,
        ];
        assert_eq!(drained, vec!["/1", "/2", "/3"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_dequeue_naps_until_someone_shows_up() {
        let queue = BoundedQueue::new(1);
        let consumer = queue.clone();
        let waiter = tokio::spawn(async move { consumer.dequeue().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "dequeue should still be waiting on an empty queue");

        assert!(queue.try_enqueue(sample_record("/late")));
        let record = waiter.await.unwrap().expect("💀 the record should have arrived");
        assert_eq!(record.path, "/late");
    }

    #[tokio::test]
    async fn the_one_where_closing_lets_the_stragglers_out_first() {
        let queue = BoundedQueue::new(4);
        assert!(queue.try_enqueue(sample_record("/straggler")));
        assert!(queue.close());

        assert!(queue.is_closed());
        assert!(!queue.try_enqueue(sample_record("/too-late")));
        assert_eq!(queue.dequeue().await.map(|r| r.path).as_deref(), Some("/straggler"));
        assert!(queue.dequeue().await.is_none());
    }
}

//! Single-producer/single-consumer pump between the transport and the
//! session: a bounded, lossless queue of raw inbound frames plus one
//! dedicated worker task that drains it in order.

use std::future::Future;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::buffer_pool::BufferRegion;

/// One inbound frame, still undecoded, tagged with where it came from.
pub struct DispatchItem {
    pub source_id: String,
    pub region: BufferRegion,
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("dispatcher has been stopped")]
    Closed,
}

/// Owns the producer half of the queue and the worker's join handle.
/// `start` and `stop` are explicit; `stop` drops the sender so the worker
/// drains whatever is already queued, then joins it — no in-flight item is
/// dropped.
pub struct RingDispatcher {
    tx: Mutex<Option<mpsc::Sender<DispatchItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RingDispatcher {
    /// Builds the dispatcher and returns the consumer half, which the
    /// caller passes to `start` once its sink is ready to be built (the
    /// sink usually closes over the very session this dispatcher feeds).
    pub fn new(capacity: usize) -> (std::sync::Arc<Self>, mpsc::Receiver<DispatchItem>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            std::sync::Arc::new(Self {
                tx: Mutex::new(Some(tx)),
                worker: Mutex::new(None),
            }),
            rx,
        )
    }

    /// Spawns the worker task. `sink` runs once per queued item, in order.
    pub fn start<F, Fut>(&self, mut rx: mpsc::Receiver<DispatchItem>, sink: F)
    where
        F: Fn(DispatchItem) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                sink(item).await;
            }
        });
        *self.worker.lock().expect("dispatcher lock poisoned") = Some(handle);
    }

    /// Enqueues an item, blocking the caller while the queue is full.
    pub async fn push(&self, item: DispatchItem) -> Result<(), DispatcherError> {
        let tx = self
            .tx
            .lock()
            .expect("dispatcher lock poisoned")
            .clone()
            .ok_or(DispatcherError::Closed)?;
        tx.send(item).await.map_err(|_| DispatcherError::Closed)
    }

    /// Closes the queue to new producers, waits for the worker to drain
    /// what's already queued, then joins it. Idempotent.
    pub async fn stop(&self) {
        let tx = self.tx.lock().expect("dispatcher lock poisoned").take();
        drop(tx);
        let handle = self.worker.lock().expect("dispatcher lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn dispatcher_delivers_items_in_order() {
        let (dispatcher, rx) = RingDispatcher::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = seen.clone();
        dispatcher.start(rx, move |item: DispatchItem| {
            let seen_sink = seen_sink.clone();
            async move {
                seen_sink.lock().unwrap().push(item.source_id);
            }
        });

        let pool = BufferPool::new();
        for i in 0..5 {
            dispatcher
                .push(DispatchItem {
                    source_id: i.to_string(),
                    region: pool.acquire(8),
                })
                .await
                .unwrap();
        }
        dispatcher.stop().await;

        assert_eq!(*seen.lock().unwrap(), vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn push_after_stop_fails() {
        let (dispatcher, rx) = RingDispatcher::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        dispatcher.start(rx, move |_item: DispatchItem| {
            c.fetch_add(1, Ordering::SeqCst);
            async move {}
        });
        dispatcher.stop().await;

        let pool = BufferPool::new();
        let err = dispatcher
            .push(DispatchItem {
                source_id: "late".to_owned(),
                region: pool.acquire(8),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::Closed));
    }
}

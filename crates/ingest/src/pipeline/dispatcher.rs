//! Bounded, cancellation-aware work queue between the producer and the
//! persistence workers

use super::batcher::Batch;
use crate::error::{IngestError, IngestResult};
use crate::types::JobKind;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Create a dispatcher holding at most `capacity` batches
#[must_use]
pub fn channel<R>(
    kind: JobKind,
    capacity: usize,
    cancel: CancellationToken,
) -> (BatchSender<R>, BatchReceiver<R>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BatchSender {
            kind,
            tx,
            cancel: cancel.clone(),
        },
        BatchReceiver {
            rx: Arc::new(Mutex::new(rx)),
            cancel,
        },
    )
}

/// Producer side; dropping it (or calling [`BatchSender::close`]) closes the
/// queue
#[derive(Debug)]
pub struct BatchSender<R> {
    kind: JobKind,
    tx: mpsc::Sender<Batch<R>>,
    cancel: CancellationToken,
}

impl<R> BatchSender<R> {
    /// Push a batch, waiting while the queue is full
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the job is cancelled while waiting, or a
    /// pipeline error if every worker has gone away.
    pub async fn push(&self, batch: Batch<R>) -> IngestResult<()> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(IngestError::Cancelled { kind: self.kind }),
            sent = self.tx.send(batch) => sent.map_err(|_| {
                IngestError::pipeline("dispatch", "queue closed before all batches were pushed")
            }),
        }
    }

    /// Batches currently queued
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Signal that no more batches follow
    pub fn close(self) {
        drop(self);
    }
}

/// Consumer side, shared by every worker
#[derive(Debug)]
pub struct BatchReceiver<R> {
    rx: Arc<Mutex<mpsc::Receiver<Batch<R>>>>,
    cancel: CancellationToken,
}

impl<R> Clone for BatchReceiver<R> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R> BatchReceiver<R> {
    /// Next batch; `None` once the queue is closed and drained, or the job
    /// is cancelled.
    ///
    /// Batches still queued at cancellation are dropped here; the tracker
    /// counts their rows as failed when the job is marked failed.
    pub async fn pop(&self) -> Option<Batch<R>> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            batch = async { self.rx.lock().await.recv().await } => batch,
        }
    }

    /// Whether the job has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::batcher::Batcher;
    use std::time::Duration;

    fn batch(values: &[u32]) -> Option<Batch<u32>> {
        let mut batcher = Batcher::new(values.len());
        values.iter().find_map(|v| batcher.push(*v))
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() -> IngestResult<()> {
        let (tx, rx) = channel(JobKind::Pipeline, 4, CancellationToken::new());
        for values in [&[1, 2][..], &[3][..]] {
            if let Some(b) = batch(values) {
                tx.push(b).await?;
            }
        }
        assert_eq!(tx.depth(), 2);
        tx.close();

        assert_eq!(rx.pop().await.map(|b| b.len()), Some(2));
        assert_eq!(rx.pop().await.map(|b| b.len()), Some(1));
        assert!(rx.pop().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() -> IngestResult<()> {
        let (tx, rx) = channel(JobKind::Pipeline, 1, CancellationToken::new());
        if let Some(b) = batch(&[1]) {
            tx.push(b).await?;
        }

        let second = batch(&[2]).ok_or_else(|| IngestError::internal("empty batch"))?;
        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.push(second)).await;
        assert!(blocked.is_err(), "push should wait while the queue is full");

        assert!(rx.pop().await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_unblocks_push_and_pop() {
        let cancel = CancellationToken::new();
        let (tx, rx) = channel::<u32>(JobKind::BalanceDrop, 1, cancel.clone());
        if let Some(b) = batch(&[1]) {
            assert!(tx.push(b).await.is_ok());
        }

        cancel.cancel();
        if let Some(b) = batch(&[2]) {
            assert!(matches!(
                tx.push(b).await,
                Err(IngestError::Cancelled {
                    kind: JobKind::BalanceDrop
                })
            ));
        }
        assert!(rx.pop().await.is_none());
        assert!(rx.is_cancelled());
    }
}

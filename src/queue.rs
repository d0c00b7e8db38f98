//! FIFO hand-off between webhook handlers (many producers) and the trading
//! engine (single consumer).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::signal::Directive;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("signal queue is closed")]
pub struct QueueClosed;

/// Result of a bounded wait on the queue
#[derive(Debug)]
pub enum Dequeued {
    Directive(Directive),
    /// Nothing arrived before the timeout
    Empty,
    /// Every producer is gone
    Closed,
}

/// Producer half. Cheap to clone; one per request handler is fine.
#[derive(Clone)]
pub struct SignalQueue {
    tx: mpsc::UnboundedSender<Directive>,
    pending: Arc<AtomicUsize>,
}

/// Consumer half, owned by the engine.
pub struct SignalConsumer {
    rx: mpsc::UnboundedReceiver<Directive>,
    pending: Arc<AtomicUsize>,
}

impl SignalQueue {
    pub fn unbounded() -> (SignalQueue, SignalConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        (
            SignalQueue {
                tx,
                pending: pending.clone(),
            },
            SignalConsumer { rx, pending },
        )
    }

    /// Never blocks and never drops while the consumer is alive.
    pub fn enqueue(&self, directive: Directive) -> Result<(), QueueClosed> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.tx.send(directive).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            QueueClosed
        })
    }

    /// Directives waiting to be processed (approximate under concurrency)
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalConsumer {
    pub async fn dequeue_timeout(&mut self, timeout: Duration) -> Dequeued {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(directive)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Dequeued::Directive(directive)
            }
            Ok(None) => Dequeued::Closed,
            Err(_elapsed) => Dequeued::Empty,
        }
    }

    pub fn backlog(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

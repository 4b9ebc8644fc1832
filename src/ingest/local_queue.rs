//! In-process notification queue
//!
//! Backs single-node deployments: the API's notify endpoint pushes raw
//! notification bodies, the consumer loop drains them. Received messages
//! move to an in-flight set and leave it only on delete, mirroring the
//! receive/acknowledge shape of an external queue.

use crate::ingest::{IngestError, IngestResult, NotificationQueue, QueueMessage};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct Inner {
    queue: VecDeque<QueueMessage>,
    inflight: HashMap<String, QueueMessage>,
}

/// In-memory [`NotificationQueue`]
#[derive(Default)]
pub struct LocalQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl LocalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw notification body, returning the assigned message id.
    pub fn push(&self, body: String) -> IngestResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut inner = self.lock()?;
            inner.queue.push_back(QueueMessage {
                id: id.clone(),
                body,
            });
        }
        self.notify.notify_waiters();
        Ok(id)
    }

    /// Messages received but not yet deleted (tests).
    pub fn inflight_len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.inflight.len())
            .unwrap_or(0)
    }

    pub fn queued_len(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.queue.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> IngestResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| IngestError::Queue(format!("queue lock poisoned: {}", e)))
    }
}

#[async_trait]
impl NotificationQueue for LocalQueue {
    async fn receive(&self, max: usize, wait: Duration) -> IngestResult<Vec<QueueMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut inner = self.lock()?;
                if !inner.queue.is_empty() {
                    let n = max.min(inner.queue.len());
                    let batch: Vec<QueueMessage> = inner.queue.drain(..n).collect();
                    for msg in &batch {
                        inner.inflight.insert(msg.id.clone(), msg.clone());
                    }
                    return Ok(batch);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            // Wake on push or give up at the deadline.
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }
    }

    async fn delete(&self, message_id: &str) -> IngestResult<()> {
        let mut inner = self.lock()?;
        inner.inflight.remove(message_id);
        Ok(())
    }
}

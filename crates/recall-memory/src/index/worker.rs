// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background embedding of freshly indexed chunks.
//!
//! `index` hands each new chunk to [`EmbeddingQueue::enqueue`] and returns
//! immediately. A spawned task embeds chunks in arrival order and writes the
//! vector back. Failures are logged and dropped: the chunk stays searchable
//! through the lexical proxy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use recall_core::EmbeddingAdapter;
use recall_storage::{map_tr_err, vec_to_blob, Database};
use rusqlite::params;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn, Instrument};

struct Job {
    id: String,
    content: String,
}

/// Handle to the embedding task. Dropping it stops the task once the
/// queue drains.
pub struct EmbeddingQueue {
    tx: mpsc::Sender<Job>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl EmbeddingQueue {
    /// Spawn the worker on the current tokio runtime. The task runs inside
    /// the caller's span.
    pub fn spawn(db: Arc<Database>, embedder: Arc<dyn EmbeddingAdapter>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let task_pending = Arc::clone(&pending);
        let task_idle = Arc::clone(&idle);
        let task = async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = embed_one(&db, embedder.as_ref(), &job).await {
                    warn!(chunk_id = %job.id, error = %e, "chunk embedding failed");
                }
                finish(&task_pending, &task_idle);
            }
            debug!("embedding worker stopped");
        };
        tokio::spawn(task.instrument(tracing::Span::current()));

        Self { tx, pending, idle }
    }

    /// Queue a chunk without waiting. A full queue drops the job.
    pub fn enqueue(&self, id: String, content: String) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.try_send(Job { id, content }) {
            let id = match e {
                mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) => {
                    job.id
                }
            };
            warn!(chunk_id = %id, "embedding queue unavailable, chunk left unembedded");
            finish(&self.pending, &self.idle);
        }
    }

    /// Jobs queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolve once every queued job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

fn finish(pending: &AtomicUsize, idle: &Notify) {
    if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        idle.notify_waiters();
    }
}

async fn embed_one(
    db: &Database,
    embedder: &dyn EmbeddingAdapter,
    job: &Job,
) -> Result<(), recall_core::RecallError> {
    let vector = embedder.embed(&job.content).await?;
    let blob = vec_to_blob(&vector);
    let id = job.id.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE index_entries SET embedding = ?2 WHERE id = ?1",
                params![id, blob],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    debug!(chunk_id = %job.id, dims = vector.len(), "chunk embedded");
    Ok(())
}

// src/store/persister.rs — Bounded background persistence queue
//
// Results are handed to a single worker so persisting never holds up the
// fetch path, but every outcome is still observable through `finish()`.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::DocumentStore;
use crate::infra::errors::HarvestError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistFailure {
    pub collection: String,
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistReport {
    pub written: usize,
    pub failures: Vec<PersistFailure>,
}

struct PersistJob {
    collection: String,
    id: String,
    document: Value,
}

pub struct Persister {
    tx: mpsc::Sender<PersistJob>,
    worker: JoinHandle<PersistReport>,
    rejected: Vec<PersistFailure>,
}

impl Persister {
    pub fn spawn(store: Arc<dyn DocumentStore>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<PersistJob>(capacity.max(1));

        let worker = tokio::spawn(async move {
            let mut report = PersistReport::default();
            while let Some(job) = rx.recv().await {
                match store.upsert(&job.collection, &job.id, &job.document).await {
                    Ok(()) => {
                        report.written += 1;
                        debug!(collection = %job.collection, id = %job.id, "Document persisted");
                    }
                    Err(e) => {
                        let err = HarvestError::PersistenceFailed {
                            collection: job.collection.clone(),
                            id: job.id.clone(),
                            message: e.to_string(),
                        };
                        warn!(error = %err, "Persist failed");
                        report.failures.push(PersistFailure {
                            collection: job.collection,
                            id: job.id,
                            message: e.to_string(),
                        });
                    }
                }
            }
            report
        });

        Self {
            tx,
            worker,
            rejected: Vec::new(),
        }
    }

    /// Queue a document. Waits while the queue is full.
    pub async fn submit(&mut self, collection: &str, id: &str, document: Value) {
        let job = PersistJob {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        };
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job).await {
            warn!(id = %job.id, "Persistence worker stopped, document dropped");
            self.rejected.push(PersistFailure {
                collection: job.collection,
                id: job.id,
                message: "persistence worker stopped".into(),
            });
        }
    }

    /// Close the queue and wait for every queued document to be handled.
    pub async fn finish(self) -> PersistReport {
        let Persister {
            tx,
            worker,
            mut rejected,
        } = self;
        drop(tx);

        let mut report = match worker.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Persistence worker panicked");
                PersistReport::default()
            }
        };
        report.failures.append(&mut rejected);
        report
    }
}

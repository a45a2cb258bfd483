//! Chunked, bounded-concurrency batch processing over the `LookupEngine`,
//! with per-request failure isolation and cooperative cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

use crate::engine::Engine;
use crate::types::MatchResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchExamInput {
    pub exam_name: String,
    #[serde(default)]
    pub modality_code: String,
    #[serde(default)]
    pub data_source: String,
    /// Caller-supplied identifier carried through untouched; `standardize_exam`
    /// has no use for it, but batch callers use it to correlate results back
    /// to their own row keys.
    #[serde(default)]
    pub exam_code: Option<String>,
}

/// One slot in a batch result set: either the engine's `MatchResult`, or
/// an error record that does not abort the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchResultEntry {
    Ok(MatchResult),
    Err { input: String, error_message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Done,
    Cancelled,
    Error,
}

/// The shape a completed batch is persisted under at `batches/{job_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBatchResult {
    pub job_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub retriever: String,
    pub reranker: String,
    pub results: Vec<BatchResultEntry>,
}

impl PersistedBatchResult {
    pub fn new(job_id: String, retriever: String, reranker: String, results: Vec<BatchResultEntry>) -> Self {
        Self {
            job_id,
            created_at: chrono::Utc::now(),
            retriever,
            reranker,
            results,
        }
    }
}

/// Progress and cancellation handle shared between the orchestrator task
/// and the HTTP layer polling `/batch_progress/{job_id}`.
pub struct BatchHandle {
    pub job_id: String,
    total: usize,
    completed: AtomicUsize,
    cancel: AtomicBool,
    status: std::sync::RwLock<BatchStatus>,
}

impl BatchHandle {
    pub fn new(job_id: String, total: usize) -> Self {
        Self {
            job_id,
            total,
            completed: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
            status: std::sync::RwLock::new(BatchStatus::Running),
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn status(&self) -> BatchStatus {
        *self.status.read().expect("batch status lock poisoned")
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn set_status(&self, status: BatchStatus) {
        *self.status.write().expect("batch status lock poisoned") = status;
    }
}

pub struct BatchOrchestrator {
    engine: Arc<Engine>,
    chunk_size: usize,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(engine: Arc<Engine>, chunk_size: usize, max_concurrency: usize) -> Self {
        Self {
            engine,
            chunk_size: chunk_size.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Spawns the batch as a background task and returns a handle
    /// immediately; the caller polls `handle.completed()`/`status()`.
    #[instrument(skip(self, exams), fields(count = exams.len()))]
    pub fn process_batch(&self, job_id: String, exams: Vec<BatchExamInput>) -> (Arc<BatchHandle>, tokio::task::JoinHandle<Vec<BatchResultEntry>>) {
        let handle = Arc::new(BatchHandle::new(job_id, exams.len()));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let engine = self.engine.clone();
        let chunk_size = self.chunk_size;
        let handle_for_task = handle.clone();

        let join = tokio::spawn(async move {
            let chunks: Vec<Vec<BatchExamInput>> = exams
                .chunks(chunk_size)
                .map(|c| c.to_vec())
                .collect();

            let mut tasks = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let permit_semaphore = semaphore.clone();
                let chunk_engine = engine.clone();
                let chunk_handle = handle_for_task.clone();
                tasks.push(tokio::spawn(async move {
                    if chunk_handle.is_cancelled() {
                        return Vec::new();
                    }
                    let _permit = permit_semaphore
                        .acquire()
                        .await
                        .expect("semaphore never closed");
                    process_chunk(&chunk_engine, &chunk_handle, chunk).await
                }));
            }

            let mut results = Vec::new();
            for task in tasks {
                match task.await {
                    Ok(chunk_results) => results.extend(chunk_results),
                    Err(e) => warn!(error = %e, "batch chunk task panicked"),
                }
            }

            if handle_for_task.is_cancelled() {
                handle_for_task.set_status(BatchStatus::Cancelled);
            } else {
                handle_for_task.set_status(BatchStatus::Done);
            }

            results
        });

        (handle, join)
    }
}

async fn process_chunk(
    engine: &Arc<Engine>,
    handle: &Arc<BatchHandle>,
    chunk: Vec<BatchExamInput>,
) -> Vec<BatchResultEntry> {
    let mut out = Vec::with_capacity(chunk.len());
    for exam in chunk {
        if handle.is_cancelled() {
            break;
        }
        let entry = match engine
            .standardize_exam(&exam.exam_name, &exam.modality_code, &exam.data_source)
            .await
        {
            Ok(result) => BatchResultEntry::Ok(result),
            Err(e) => {
                warn!(exam = %exam.exam_name, error = %e, "batch request failed");
                BatchResultEntry::Err {
                    input: exam.exam_name.clone(),
                    error_message: e.to_string(),
                }
            }
        };
        out.push(entry);
        handle.completed.fetch_add(1, Ordering::Relaxed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_handle_tracks_progress() {
        let handle = BatchHandle::new("job-1".into(), 10);
        assert_eq!(handle.completed(), 0);
        handle.completed.fetch_add(3, Ordering::Relaxed);
        assert_eq!(handle.completed(), 3);
        assert_eq!(handle.total(), 10);
    }

    #[test]
    fn batch_handle_starts_running_and_respects_cancel() {
        let handle = BatchHandle::new("job-2".into(), 5);
        assert_eq!(handle.status(), BatchStatus::Running);
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn persisted_batch_result_round_trips_through_json() {
        let persisted = PersistedBatchResult::new(
            "job-3".into(),
            "bge-small".into(),
            "cross-encoder".into(),
            vec![BatchResultEntry::Err {
                input: "bad exam".into(),
                error_message: "remote dependency failed".into(),
            }],
        );
        let bytes = serde_json::to_vec(&persisted).unwrap();
        let roundtripped: PersistedBatchResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(roundtripped.job_id, "job-3");
        assert_eq!(roundtripped.results.len(), 1);
    }
}

//! Human-in-the-loop validation overlay: approved mappings short-circuit
//! the pipeline, rejected mappings are excluded from future candidates.
//!
//! Reload is atomic: a new snapshot is built off the critical path, then
//! swapped in under a write lock. Readers clone the `Arc` under a read
//! lock and never hold the lock across a remote call.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::blob_store::BlobStore;
use crate::types::ReferenceEntry;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ApprovedEntryRow {
    mapping: ReferenceEntry,
}

struct Snapshot {
    approved: HashMap<String, ReferenceEntry>,
    rejected: HashMap<String, HashSet<String>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            approved: HashMap::new(),
            rejected: HashMap::new(),
        }
    }
}

pub struct ValidationCache {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }
}

impl ValidationCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Looks up an approved mapping for `request_key`, returning a clone
    /// so the caller never holds the read lock past this call.
    pub fn approved(&self, request_key: &str) -> Option<ReferenceEntry> {
        let snapshot = self.snapshot.read().expect("validation cache lock poisoned");
        snapshot.approved.get(request_key).cloned()
    }

    /// The set of entry/concept ids excluded for `request_key`, empty if
    /// none were ever rejected.
    pub fn rejected(&self, request_key: &str) -> HashSet<String> {
        let snapshot = self.snapshot.read().expect("validation cache lock poisoned");
        snapshot.rejected.get(request_key).cloned().unwrap_or_default()
    }

    /// Loads approved/rejected dictionaries from the blob store and
    /// atomically swaps them in. Missing blobs are treated as empty
    /// dictionaries, not errors; malformed blobs are logged as warnings
    /// and also treated as empty (a `ValidationFault`, non-fatal).
    #[instrument(skip(self, blob_store))]
    pub async fn reload(
        &self,
        blob_store: &dyn BlobStore,
        approved_key: &str,
        rejected_key: &str,
    ) -> (usize, usize) {
        let approved = load_approved(blob_store, approved_key).await;
        let rejected = load_rejected(blob_store, rejected_key).await;

        let approved_count = approved.len();
        let rejected_count = rejected.len();

        let new_snapshot = Arc::new(Snapshot { approved, rejected });
        let mut guard = self.snapshot.write().expect("validation cache lock poisoned");
        *guard = new_snapshot;

        (approved_count, rejected_count)
    }
}

async fn load_approved(blob_store: &dyn BlobStore, key: &str) -> HashMap<String, ReferenceEntry> {
    match blob_store.get(key).await {
        Ok(bytes) => match serde_json::from_slice::<HashMap<String, ApprovedEntryRow>>(&bytes) {
            Ok(map) => map.into_iter().map(|(k, v)| (k, v.mapping)).collect(),
            Err(e) => {
                warn!(error = %e, "malformed approved-mappings cache, treating as empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}

async fn load_rejected(blob_store: &dyn BlobStore, key: &str) -> HashMap<String, HashSet<String>> {
    match blob_store.get(key).await {
        Ok(bytes) => match serde_json::from_slice::<HashMap<String, HashSet<String>>>(&bytes) {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "malformed rejected-mappings cache, treating as empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::LocalFsBlobStore;
    use crate::types::ParsedExam;

    fn sample_entry() -> ReferenceEntry {
        ReferenceEntry {
            id: "1".into(),
            snomed_concept_id: "169069000".into(),
            snomed_fsn: "Computed tomography of chest".into(),
            clean_name: "CT Chest".into(),
            parsed: ParsedExam::default(),
            embedding: vec![],
        }
    }

    #[tokio::test]
    async fn missing_blobs_yield_empty_dictionaries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());
        let cache = ValidationCache::empty();
        let (approved, rejected) = cache
            .reload(&store, "validation/approved_mappings_cache.json", "validation/rejected_mappings.json")
            .await;
        assert_eq!(approved, 0);
        assert_eq!(rejected, 0);
        assert!(cache.approved("anything").is_none());
    }

    #[tokio::test]
    async fn reload_swaps_in_new_approved_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());
        let mut approved = HashMap::new();
        approved.insert(
            "key-1".to_string(),
            ApprovedEntryRow {
                mapping: sample_entry(),
            },
        );
        store
            .put(
                "validation/approved_mappings_cache.json",
                serde_json::to_string(&approved).unwrap().as_bytes(),
            )
            .await
            .unwrap();

        let cache = ValidationCache::empty();
        let (approved_count, _) = cache
            .reload(&store, "validation/approved_mappings_cache.json", "validation/rejected_mappings.json")
            .await;
        assert_eq!(approved_count, 1);
        assert!(cache.approved("key-1").is_some());
        assert!(cache.approved("key-2").is_none());
    }

    #[tokio::test]
    async fn malformed_blob_degrades_to_empty_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());
        store
            .put("validation/approved_mappings_cache.json", b"not json")
            .await
            .unwrap();
        let cache = ValidationCache::empty();
        let (approved_count, _) = cache
            .reload(&store, "validation/approved_mappings_cache.json", "validation/rejected_mappings.json")
            .await;
        assert_eq!(approved_count, 0);
    }
}

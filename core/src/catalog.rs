//! The authoritative reference catalog, pre-parsed through the same
//! `SemanticParser` instance used for incoming requests.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::blob_store::BlobStore;
use crate::config::InterventionalEvidenceConfig;
use crate::error::CatalogError;
use crate::parser::SemanticParser;
use crate::types::ReferenceEntry;

/// One row of the catalog fixture as it is persisted: the fields the
/// catalog carries directly, before parsing is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntryRaw {
    pub id: String,
    pub snomed_concept_id: String,
    pub snomed_fsn: String,
    pub clean_name: String,
    #[serde(default)]
    pub modality_hint: String,
}

pub struct ReferenceCatalog {
    entries: Vec<ReferenceEntry>,
    by_id: HashMap<String, usize>,
    content_hash: String,
}

impl ReferenceCatalog {
    /// Parses every raw entry through `parser` (over `snomed_fsn` followed
    /// by `clean_name`, matching `ReferenceEntry::embedding_text`'s
    /// ordering contract) and indexes by id.
    pub fn from_raw_entries(
        raw: Vec<CatalogEntryRaw>,
        parser: &SemanticParser,
        evidence: &InterventionalEvidenceConfig,
    ) -> Result<Self, CatalogError> {
        if raw.is_empty() {
            return Err(CatalogError::Empty);
        }

        let content_hash = hash_raw_entries(&raw);

        let mut entries = Vec::with_capacity(raw.len());
        let mut by_id = HashMap::with_capacity(raw.len());
        for row in raw {
            let text_to_parse = format!("{} {}", row.snomed_fsn, row.clean_name);
            let parsed = parser.parse(&text_to_parse, &row.modality_hint, evidence);
            by_id.insert(row.id.clone(), entries.len());
            entries.push(ReferenceEntry {
                id: row.id,
                snomed_concept_id: row.snomed_concept_id,
                snomed_fsn: row.snomed_fsn,
                clean_name: row.clean_name,
                parsed,
                embedding: Vec::new(),
            });
        }

        Ok(Self {
            entries,
            by_id,
            content_hash,
        })
    }

    #[instrument(skip(blob_store, parser, evidence))]
    pub async fn load(
        blob_store: &dyn BlobStore,
        key: &str,
        parser: &SemanticParser,
        evidence: &InterventionalEvidenceConfig,
    ) -> Result<Self, CatalogError> {
        let bytes = blob_store
            .get(key)
            .await
            .map_err(|e| CatalogError::Read(e.to_string()))?;
        let raw: Vec<CatalogEntryRaw> = serde_json::from_slice(&bytes)?;
        Self::from_raw_entries(raw, parser, evidence)
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content hash over the raw catalog rows, used as one input to the
    /// index fingerprint so catalog edits force a rebuild.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Bulk accessor for indexing: the pre-parsed entries in stable order.
    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Attaches embeddings (e.g. loaded from a `VectorIndex`) back onto the
    /// in-memory entries, keyed by id, for candidate materialization.
    pub fn with_embeddings(self: Arc<Self>, embeddings: &HashMap<String, Vec<f32>>) -> Arc<Self> {
        let mut entries = self.entries.clone();
        for entry in &mut entries {
            if let Some(vector) = embeddings.get(&entry.id) {
                entry.embedding = vector.clone();
            }
        }
        Arc::new(Self {
            entries,
            by_id: self.by_id.clone(),
            content_hash: self.content_hash.clone(),
        })
    }
}

fn hash_raw_entries(raw: &[CatalogEntryRaw]) -> String {
    let mut hasher = Sha256::new();
    for row in raw {
        hasher.update(row.id.as_bytes());
        hasher.update(row.snomed_concept_id.as_bytes());
        hasher.update(row.snomed_fsn.as_bytes());
        hasher.update(row.clean_name.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> Vec<CatalogEntryRaw> {
        vec![
            CatalogEntryRaw {
                id: "1".into(),
                snomed_concept_id: "169069000".into(),
                snomed_fsn: "Computed tomography of chest".into(),
                clean_name: "CT Chest".into(),
                modality_hint: "CT".into(),
            },
            CatalogEntryRaw {
                id: "2".into(),
                snomed_concept_id: "241617002".into(),
                snomed_fsn: "Magnetic resonance imaging of lumbar spine".into(),
                clean_name: "MRI Lumbar Spine".into(),
                modality_hint: "MR".into(),
            },
        ]
    }

    #[test]
    fn parses_every_entry_with_shared_parser() {
        let parser = SemanticParser::new();
        let evidence = InterventionalEvidenceConfig::default();
        let catalog = ReferenceCatalog::from_raw_entries(sample_raw(), &parser, &evidence).unwrap();
        assert_eq!(catalog.len(), 2);
        let ct = catalog.get("1").unwrap();
        assert_eq!(ct.parsed.modality, "CT");
        assert!(ct.parsed.anatomy.contains(&"chest".to_string()));
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let parser = SemanticParser::new();
        let evidence = InterventionalEvidenceConfig::default();
        let result = ReferenceCatalog::from_raw_entries(vec![], &parser, &evidence);
        assert!(matches!(result, Err(CatalogError::Empty)));
    }

    #[test]
    fn content_hash_is_deterministic() {
        let parser = SemanticParser::new();
        let evidence = InterventionalEvidenceConfig::default();
        let a = ReferenceCatalog::from_raw_entries(sample_raw(), &parser, &evidence).unwrap();
        let b = ReferenceCatalog::from_raw_entries(sample_raw(), &parser, &evidence).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn lookup_by_id_returns_none_for_unknown_id() {
        let parser = SemanticParser::new();
        let evidence = InterventionalEvidenceConfig::default();
        let catalog = ReferenceCatalog::from_raw_entries(sample_raw(), &parser, &evidence).unwrap();
        assert!(catalog.get("does-not-exist").is_none());
    }
}

//! Dense nearest-neighbor index over the reference catalog.
//!
//! Flat brute-force scan, appropriate at reference-catalog scale (a few
//! thousand entries); `rayon` parallelizes the scan across entries.

use rayon::prelude::*;
use tracing::instrument;

use crate::blob_store::BlobStore;
use crate::error::IndexError;

const MAGIC: &[u8; 7] = b"RADIDX\0";
const VERSION: u8 = 1;
const FINGERPRINT_LEN: usize = 32;

pub struct VectorIndex {
    fingerprint: String,
    dim: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// In-memory construction from parallel `ids`/`vectors` slices. All
    /// vectors must share the same dimension.
    pub fn build(fingerprint: String, ids: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
        for v in &vectors {
            if v.len() != dim {
                return Err(IndexError::Malformed(format!(
                    "inconsistent vector dimension: expected {}, found {}",
                    dim,
                    v.len()
                )));
            }
        }
        Ok(Self {
            fingerprint,
            dim,
            ids,
            vectors,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Top-`k` nearest neighbors to `query` by inner-product similarity
    /// (equivalent to cosine similarity for L2-normalized vectors).
    pub fn topk(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(idx, vector)| (idx, dot(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(idx, score)| (self.ids[idx].clone(), score))
            .collect()
    }

    /// Serializes to the `RADIDX\0` binary format described in the
    /// persisted-formats contract.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let fingerprint_bytes = decode_fingerprint(&self.fingerprint)?;

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&fingerprint_bytes);
        buf.extend_from_slice(&(self.dim as u32).to_le_bytes());
        buf.extend_from_slice(&(self.ids.len() as u32).to_le_bytes());
        for (id, vector) in self.ids.iter().zip(self.vectors.iter()) {
            let id_bytes = id.as_bytes();
            buf.extend_from_slice(&(id_bytes.len() as u16).to_le_bytes());
            buf.extend_from_slice(id_bytes);
            for component in vector {
                buf.extend_from_slice(&component.to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Deserializes from the `RADIDX\0` format, rejecting on header or
    /// fingerprint mismatch against `expected_fingerprint`.
    pub fn from_bytes(data: &[u8], expected_fingerprint: &str) -> Result<Self, IndexError> {
        let mut cursor = 0usize;
        let magic = data
            .get(cursor..cursor + MAGIC.len())
            .ok_or_else(|| IndexError::Malformed("truncated magic header".into()))?;
        if magic != MAGIC {
            return Err(IndexError::Malformed("bad magic header".into()));
        }
        cursor += MAGIC.len();

        let version = *data
            .get(cursor)
            .ok_or_else(|| IndexError::Malformed("truncated version".into()))?;
        if version != VERSION {
            return Err(IndexError::Malformed(format!("unsupported version {}", version)));
        }
        cursor += 1;

        let fingerprint_bytes = data
            .get(cursor..cursor + FINGERPRINT_LEN)
            .ok_or_else(|| IndexError::Malformed("truncated fingerprint".into()))?;
        let fingerprint = hex::encode(fingerprint_bytes);
        cursor += FINGERPRINT_LEN;

        if fingerprint != expected_fingerprint {
            return Err(IndexError::Mismatch {
                expected: expected_fingerprint.to_string(),
                found: fingerprint,
            });
        }

        let dim = read_u32(data, &mut cursor)? as usize;
        let count = read_u32(data, &mut cursor)? as usize;

        let mut ids = Vec::with_capacity(count);
        let mut vectors = Vec::with_capacity(count);
        for _ in 0..count {
            let id_len = read_u16(data, &mut cursor)? as usize;
            let id_bytes = data
                .get(cursor..cursor + id_len)
                .ok_or_else(|| IndexError::Malformed("truncated id".into()))?;
            let id = String::from_utf8(id_bytes.to_vec())
                .map_err(|e| IndexError::Malformed(format!("invalid id utf8: {}", e)))?;
            cursor += id_len;

            let mut vector = Vec::with_capacity(dim);
            for _ in 0..dim {
                let bytes = data
                    .get(cursor..cursor + 4)
                    .ok_or_else(|| IndexError::Malformed("truncated vector component".into()))?;
                vector.push(f32::from_le_bytes(bytes.try_into().unwrap()));
                cursor += 4;
            }
            ids.push(id);
            vectors.push(vector);
        }

        Ok(Self {
            fingerprint,
            dim,
            ids,
            vectors,
        })
    }

    #[instrument(skip(self, blob_store))]
    pub async fn save(&self, blob_store: &dyn BlobStore, key: &str) -> Result<(), IndexError> {
        let bytes = self.to_bytes()?;
        blob_store.put(key, &bytes).await?;
        Ok(())
    }

    #[instrument(skip(blob_store))]
    pub async fn load(blob_store: &dyn BlobStore, key: &str, expected_fingerprint: &str) -> Result<Self, IndexError> {
        let bytes = blob_store.get(key).await?;
        Self::from_bytes(&bytes, expected_fingerprint)
    }
}

fn decode_fingerprint(fingerprint: &str) -> Result<[u8; FINGERPRINT_LEN], IndexError> {
    let bytes = hex::decode(fingerprint)
        .map_err(|e| IndexError::Malformed(format!("fingerprint is not valid hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| IndexError::Malformed("fingerprint must decode to 32 bytes".into()))
}

fn read_u32(data: &[u8], cursor: &mut usize) -> Result<u32, IndexError> {
    let bytes = data
        .get(*cursor..*cursor + 4)
        .ok_or_else(|| IndexError::Malformed("truncated u32".into()))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u16(data: &[u8], cursor: &mut usize) -> Result<u16, IndexError> {
    let bytes = data
        .get(*cursor..*cursor + 2)
        .ok_or_else(|| IndexError::Malformed("truncated u16".into()))?;
    *cursor += 2;
    Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::LocalFsBlobStore;

    fn sample_fingerprint() -> String {
        "a".repeat(64)
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(
            sample_fingerprint(),
            vec!["1".into(), "2".into(), "3".into()],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7071, 0.7071]],
        )
        .unwrap()
    }

    #[test]
    fn topk_ranks_by_inner_product() {
        let index = sample_index();
        let results = index.topk(&[1.0, 0.0], 2);
        assert_eq!(results[0].0, "1");
    }

    #[test]
    fn round_trips_through_byte_serialization() {
        let index = sample_index();
        let bytes = index.to_bytes().unwrap();
        let loaded = VectorIndex::from_bytes(&bytes, &sample_fingerprint()).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.fingerprint(), index.fingerprint());
        let results = loaded.topk(&[0.0, 1.0], 1);
        assert_eq!(results[0].0, "2");
    }

    #[test]
    fn rejects_fingerprint_mismatch() {
        let index = sample_index();
        let bytes = index.to_bytes().unwrap();
        let other_fingerprint = "b".repeat(64);
        let err = VectorIndex::from_bytes(&bytes, &other_fingerprint).unwrap_err();
        assert!(matches!(err, IndexError::Mismatch { .. }));
    }

    #[test]
    fn rejects_bad_magic_header() {
        let mut bytes = sample_index().to_bytes().unwrap();
        bytes[0] = b'X';
        let err = VectorIndex::from_bytes(&bytes, &sample_fingerprint()).unwrap_err();
        assert!(matches!(err, IndexError::Malformed(_)));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_via_blob_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsBlobStore::new(dir.path());
        let index = sample_index();
        index.save(&store, "indices/bge-small/abc.bin").await.unwrap();
        let loaded = VectorIndex::load(&store, "indices/bge-small/abc.bin", &sample_fingerprint())
            .await
            .unwrap();
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn build_rejects_inconsistent_dimensions() {
        let result = VectorIndex::build(
            sample_fingerprint(),
            vec!["1".into(), "2".into()],
            vec![vec![1.0, 0.0], vec![1.0, 0.0, 0.0]],
        );
        assert!(result.is_err());
    }
}

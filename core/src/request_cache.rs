//! In-process LRU cache of `MatchResult`s, keyed by everything that can
//! change the answer for the same input text.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::types::MatchResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestCacheKey {
    pub preprocessed_exam: String,
    pub modality_hint: String,
    pub retriever_id: String,
    pub reranker_id: String,
    pub config_fingerprint: String,
}

pub struct RequestCache {
    inner: Mutex<LruCache<RequestCacheKey, MatchResult>>,
}

impl RequestCache {
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("max_size.max(1) is never zero");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &RequestCacheKey) -> Option<MatchResult> {
        let mut cache = self.inner.lock().expect("request cache lock poisoned");
        cache.get(key).cloned()
    }

    pub fn put(&self, key: RequestCacheKey, value: MatchResult) {
        let mut cache = self.inner.lock().expect("request cache lock poisoned");
        cache.put(key, value);
    }

    /// Invalidates every entry, used when `config_fingerprint` changes at
    /// startup or when the validation cache reloads (approved entries may
    /// now short-circuit results that were previously cached unapproved).
    pub fn clear(&self) {
        let mut cache = self.inner.lock().expect("request cache lock poisoned");
        cache.clear();
    }

    pub fn len(&self) -> usize {
        let cache = self.inner.lock().expect("request cache lock poisoned");
        cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ParsedExam, ValidationStatus};

    fn sample_key(suffix: &str) -> RequestCacheKey {
        RequestCacheKey {
            preprocessed_exam: format!("ct chest {}", suffix),
            modality_hint: "CT".into(),
            retriever_id: "bge-small".into(),
            reranker_id: "cross-encoder".into(),
            config_fingerprint: "fp-1".into(),
        }
    }

    fn sample_result() -> MatchResult {
        MatchResult::from_winner(ParsedExam::default(), None, vec![], ValidationStatus::None)
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = RequestCache::new(10);
        let key = sample_key("a");
        cache.put(key.clone(), sample_result());
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn miss_returns_none() {
        let cache = RequestCache::new(10);
        assert!(cache.get(&sample_key("missing")).is_none());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = RequestCache::new(10);
        cache.put(sample_key("a"), sample_result());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_entry_past_capacity() {
        let cache = RequestCache::new(1);
        cache.put(sample_key("a"), sample_result());
        cache.put(sample_key("b"), sample_result());
        assert!(cache.get(&sample_key("a")).is_none());
        assert!(cache.get(&sample_key("b")).is_some());
    }
}

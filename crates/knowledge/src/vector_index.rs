//! Persistent vector index over retrievable units.
//!
//! Distances are cosine distances (`1 - cos`), so 0.0 is identical direction
//! and smaller is more similar. All stored vectors share the dimensionality
//! of the embedder that created the index; mixing embedders is rejected as a
//! configuration error.

use crate::embeddings::EmbeddingProvider;
use crate::mmr::maximal_marginal_relevance;
use crate::store::{cosine_similarity, IndexStore};
use crate::types::{EmbeddingRecord, RetrievableUnit};
use ragchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Vector index persisted under a directory.
///
/// The SQLite handle is opened lazily and dropped on [`reset`](Self::reset).
/// The lock is never held across an `await`.
#[derive(Debug)]
pub struct VectorIndex {
    dir: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Mutex<Option<IndexStore>>,
}

impl VectorIndex {
    /// Index persisted under `dir`, opening an existing one if present.
    ///
    /// # Errors
    /// [`AppError::Config`] if the existing index was built with a different
    /// dimensionality than `embedder` produces.
    pub fn open(dir: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let dir = dir.into();
        let store = IndexStore::open_existing(&dir)?;

        let index = Self {
            dir,
            embedder,
            store: Mutex::new(store),
        };
        {
            let guard = index.lock()?;
            if let Some(store) = guard.as_ref() {
                index.check_compatible(store)?;
            }
        }

        Ok(index)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Option<IndexStore>>> {
        self.store
            .lock()
            .map_err(|_| AppError::Knowledge("Vector index lock poisoned".to_string()))
    }

    fn check_compatible(&self, store: &IndexStore) -> AppResult<()> {
        if let Some(dimensions) = store.dimensions()? {
            if dimensions != self.embedder.dimensions() {
                return Err(AppError::Config(format!(
                    "Index at {:?} holds {}-dimensional vectors but embedder '{}' produces {}; \
                     reset the index or restore the original embedding settings",
                    self.dir,
                    dimensions,
                    self.embedder.model_name(),
                    self.embedder.dimensions()
                )));
            }
        }

        if let Some(model) = store.embedding_model()? {
            if model != self.embedder.model_name() {
                tracing::warn!(
                    "Index was built with embedding model '{}', now using '{}'",
                    model,
                    self.embedder.model_name()
                );
            }
        }

        Ok(())
    }

    /// Whether a populated index exists on disk.
    pub fn exists(&self) -> bool {
        self.count().map(|count| count > 0).unwrap_or(false)
    }

    /// Number of stored units; 0 when no index exists.
    pub fn count(&self) -> AppResult<usize> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = IndexStore::open_existing(&self.dir)?;
        }
        match guard.as_ref() {
            Some(store) => store.count(),
            None => Ok(0),
        }
    }

    /// Number of distinct source documents; 0 when no index exists.
    pub fn source_count(&self) -> AppResult<usize> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = IndexStore::open_existing(&self.dir)?;
        }
        match guard.as_ref() {
            Some(store) => store.source_count(),
            None => Ok(0),
        }
    }

    /// Embed and store `units`, returning how many were new.
    ///
    /// Units already present (same content hash) are skipped. Every source
    /// mentioned in `units` is replaced: its stored units that are not in
    /// `units` are removed, so re-ingesting an edited document leaves no
    /// stale text behind. Sources not mentioned are kept.
    pub async fn insert(&self, units: &[RetrievableUnit]) -> AppResult<usize> {
        if units.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let expected = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(AppError::Config(format!(
                "Embedder '{}' returned {} dimensions, expected {}",
                self.embedder.model_name(),
                bad.len(),
                expected
            )));
        }

        let records: Vec<EmbeddingRecord> = units
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(unit, vector)| EmbeddingRecord { unit, vector })
            .collect();

        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(IndexStore::open(&self.dir)?);
        }
        let store = guard
            .as_mut()
            .ok_or_else(|| AppError::Knowledge("Vector index not open".to_string()))?;
        self.check_compatible(store)?;

        let added = store.insert(&records, self.embedder.model_name())?;
        tracing::info!(
            "Indexed {} new units ({} submitted) in {:?}",
            added,
            records.len(),
            self.dir
        );
        Ok(added)
    }

    fn records(&self) -> AppResult<Vec<EmbeddingRecord>> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = IndexStore::open_existing(&self.dir)?;
        }
        let records = match guard.as_ref() {
            Some(store) => store.all_records()?,
            None => Vec::new(),
        };

        if records.is_empty() {
            return Err(AppError::IndexEmpty);
        }
        Ok(records)
    }

    /// The `k` nearest units to `text` among those of `source_ids`, by
    /// ascending cosine distance.
    ///
    /// An empty result means no stored unit belongs to those sources.
    ///
    /// # Errors
    /// [`AppError::IndexEmpty`] if no records are stored at all.
    pub async fn query_filtered(
        &self,
        text: &str,
        k: usize,
        source_ids: &[String],
    ) -> AppResult<Vec<(RetrievableUnit, f32)>> {
        let records = {
            let mut guard = self.lock()?;
            if guard.is_none() {
                *guard = IndexStore::open_existing(&self.dir)?;
            }
            let Some(store) = guard.as_ref() else {
                return Err(AppError::IndexEmpty);
            };
            if store.count()? == 0 {
                return Err(AppError::IndexEmpty);
            }
            store.records_for_sources(source_ids)?
        };
        if records.is_empty() {
            tracing::debug!("No stored units match sources {:?}", source_ids);
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        Ok(nearest(&query, records, k)
            .into_iter()
            .map(|(record, distance)| (record.unit, distance))
            .collect())
    }

    /// The `k` nearest units to `text`, by ascending cosine distance.
    ///
    /// Returns fewer than `k` when the index holds fewer records.
    ///
    /// # Errors
    /// [`AppError::IndexEmpty`] if no records are stored.
    pub async fn query(&self, text: &str, k: usize) -> AppResult<Vec<(RetrievableUnit, f32)>> {
        let records = self.records()?;
        let query = self.embedder.embed(text).await?;

        let nearest = nearest(&query, records, k);
        tracing::debug!(
            "Query returned {} units, distances: {:?}",
            nearest.len(),
            nearest.iter().map(|(_, d)| *d).collect::<Vec<_>>()
        );

        Ok(nearest
            .into_iter()
            .map(|(record, distance)| (record.unit, distance))
            .collect())
    }

    /// Up to `k` units chosen by maximal marginal relevance among the
    /// `max(fetch_k, k)` nearest candidates.
    ///
    /// # Errors
    /// [`AppError::IndexEmpty`] if no records are stored.
    pub async fn query_diverse(
        &self,
        text: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> AppResult<Vec<RetrievableUnit>> {
        let records = self.records()?;
        let query = self.embedder.embed(text).await?;

        let candidates = nearest(&query, records, fetch_k.max(k));
        let vectors: Vec<Vec<f32>> = candidates.iter().map(|(r, _)| r.vector.clone()).collect();
        let picked = maximal_marginal_relevance(&query, &vectors, k, lambda);

        tracing::debug!(
            "Diverse query picked {:?} from {} candidates",
            picked,
            candidates.len()
        );

        let mut slots: Vec<Option<EmbeddingRecord>> =
            candidates.into_iter().map(|(r, _)| Some(r)).collect();
        Ok(picked
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .map(|record| record.unit)
            .collect())
    }

    /// Drop every record and remove the persist directory.
    pub fn reset(&self) -> AppResult<()> {
        let mut guard = self.lock()?;
        // Close the connection before deleting its file
        guard.take();

        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| {
                AppError::Knowledge(format!("Failed to remove index {:?}: {}", self.dir, e))
            })?;
        }

        tracing::info!("Reset vector index at {:?}", self.dir);
        Ok(())
    }
}

/// Records sorted by ascending distance to `query`, truncated to `k`.
fn nearest(query: &[f32], records: Vec<EmbeddingRecord>, k: usize) -> Vec<(EmbeddingRecord, f32)> {
    let mut scored: Vec<(EmbeddingRecord, f32)> = records
        .into_iter()
        .map(|record| {
            let distance = 1.0 - cosine_similarity(query, &record.vector);
            (record, distance)
        })
        .collect();

    // Stable sort keeps storage order among equal distances
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use tempfile::TempDir;

    fn index(dir: &Path, dimensions: usize) -> VectorIndex {
        VectorIndex::open(dir.join("store"), Arc::new(MockProvider::new(dimensions))).unwrap()
    }

    fn units(texts: &[&str]) -> Vec<RetrievableUnit> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| RetrievableUnit::new(format!("doc{}.txt", i), None, 0, *text))
            .collect()
    }

    #[tokio::test]
    async fn test_query_on_missing_index_is_index_empty() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 64);

        assert!(!index.exists());
        let err = index.query("anything", 3).await.unwrap_err();
        assert!(matches!(err, AppError::IndexEmpty));
    }

    #[tokio::test]
    async fn test_insert_then_query_orders_by_distance() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 256);

        index
            .insert(&units(&[
                "Bananas are yellow tropical fruit",
                "Python was created by Guido van Rossum",
                "Python supports multiple paradigms",
            ]))
            .await
            .unwrap();
        assert!(index.exists());
        assert_eq!(index.count().unwrap(), 3);

        let results = index.query("Who created Python?", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].0.text.contains("Guido"));
        for pair in results.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 64);
        let batch = units(&["alpha beta gamma", "delta epsilon"]);

        assert_eq!(index.insert(&batch).await.unwrap(), 2);
        assert_eq!(index.insert(&batch).await.unwrap(), 0);
        assert_eq!(index.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_config_error() {
        let temp = TempDir::new().unwrap();
        index(temp.path(), 64)
            .insert(&units(&["stored with sixty four dimensions"]))
            .await
            .unwrap();

        let err = VectorIndex::open(
            temp.path().join("store"),
            Arc::new(MockProvider::new(128)),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_reset_removes_directory() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 64);
        index.insert(&units(&["something to forget"])).await.unwrap();
        assert!(index.dir().exists());

        index.reset().unwrap();
        assert!(!index.dir().exists());
        assert!(!index.exists());
        assert!(matches!(
            index.query("forget", 1).await.unwrap_err(),
            AppError::IndexEmpty
        ));

        // The index can be rebuilt after a reset
        index.insert(&units(&["fresh start"])).await.unwrap();
        assert_eq!(index.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_source_count_sees_index_rebuilt_elsewhere() {
        let temp = TempDir::new().unwrap();
        let first = index(temp.path(), 64);
        first.insert(&units(&["one", "two"])).await.unwrap();
        assert_eq!(first.source_count().unwrap(), 2);

        first.reset().unwrap();
        assert_eq!(first.source_count().unwrap(), 0);

        let second = index(temp.path(), 64);
        second.insert(&units(&["three"])).await.unwrap();
        assert_eq!(first.source_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_filtered_on_missing_index_is_index_empty() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 64);

        let err = index
            .query_filtered("anything", 3, &["doc0.txt".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IndexEmpty));
    }

    #[tokio::test]
    async fn test_query_diverse_has_no_duplicates() {
        let temp = TempDir::new().unwrap();
        let index = index(temp.path(), 256);
        index
            .insert(&units(&[
                "Rust ownership prevents data races",
                "Rust ownership prevents data races at compile time",
                "Cargo manages Rust packages",
                "Tokio is an async runtime for Rust",
            ]))
            .await
            .unwrap();

        let picked = index.query_diverse("Rust ownership", 3, 4, 0.5).await.unwrap();
        assert_eq!(picked.len(), 3);
        let mut ids: Vec<&str> = picked.iter().map(|u| u.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}

//! SQLite persistence for embedded retrievable units.
//!
//! One database file per persist directory. Units are keyed by their content
//! hash, so ingesting the same document twice stores it once. Ingesting a
//! source again replaces its previous units.

use crate::types::{EmbeddingRecord, RetrievableUnit};
use ragchat_core::{AppError, AppResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// File name of the index database inside the persist directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

const META_DIMENSIONS: &str = "dimensions";
const META_MODEL: &str = "embedding_model";

/// Open handle on the on-disk index.
#[derive(Debug)]
pub struct IndexStore {
    conn: Connection,
    path: PathBuf,
}

impl IndexStore {
    /// Open or create the index under `dir`.
    pub fn open(dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;

        let path = dir.join(INDEX_FILE_NAME);
        let conn = Connection::open(&path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS units (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL,
                location TEXT,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_units_source ON units(source_id);
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", path);
        Ok(Self { conn, path })
    }

    /// Open the index under `dir` only if it has been created before.
    pub fn open_existing(dir: &Path) -> AppResult<Option<Self>> {
        if !dir.join(INDEX_FILE_NAME).is_file() {
            return Ok(None);
        }
        Self::open(dir).map(Some)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn meta(&self, key: &str) -> AppResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Knowledge(format!("Failed to read index metadata: {}", e)))
    }

    /// Embedding dimensions the index was built with, if any unit was stored.
    pub fn dimensions(&self) -> AppResult<Option<usize>> {
        Ok(self
            .meta(META_DIMENSIONS)?
            .and_then(|value| value.parse().ok()))
    }

    /// Embedding model the index was built with.
    pub fn embedding_model(&self) -> AppResult<Option<String>> {
        self.meta(META_MODEL)
    }

    /// Store records in one transaction and return how many were new.
    ///
    /// `records` is the complete unit set of every source it mentions: stored
    /// units of those sources that are not in `records` are deleted. Records
    /// whose id is already present are left untouched.
    pub fn insert(&mut self, records: &[EmbeddingRecord], model: &str) -> AppResult<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let dimensions = first.vector.len();

        let tx = self
            .conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        let mut added = 0;
        let mut removed = 0;
        {
            let keep: HashSet<&str> = records.iter().map(|r| r.unit.id.as_str()).collect();
            let sources: BTreeSet<&str> =
                records.iter().map(|r| r.unit.source_id.as_str()).collect();

            let mut existing = tx
                .prepare("SELECT id FROM units WHERE source_id = ?1")
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare lookup: {}", e)))?;
            let mut delete = tx
                .prepare("DELETE FROM units WHERE id = ?1")
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare delete: {}", e)))?;

            for source in sources {
                let ids = existing
                    .query_map(params![source], |row| row.get::<_, String>(0))
                    .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                    .map_err(|e| AppError::Knowledge(format!("Failed to read units: {}", e)))?;

                for id in ids.iter().filter(|id| !keep.contains(id.as_str())) {
                    removed += delete
                        .execute(params![id])
                        .map_err(|e| AppError::Knowledge(format!("Failed to delete unit: {}", e)))?;
                }
            }

            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO units (id, source_id, location, position, text, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;

            for record in records {
                let unit = &record.unit;
                added += stmt
                    .execute(params![
                        unit.id,
                        unit.source_id,
                        unit.location,
                        unit.position as i64,
                        unit.text,
                        embedding_to_bytes(&record.vector),
                    ])
                    .map_err(|e| AppError::Knowledge(format!("Failed to insert unit: {}", e)))?;
            }

            let mut meta = tx
                .prepare("INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)")
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare metadata: {}", e)))?;
            for (key, value) in [(META_DIMENSIONS, dimensions.to_string()), (META_MODEL, model.to_string())] {
                meta.execute(params![key, value])
                    .map_err(|e| AppError::Knowledge(format!("Failed to write metadata: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit units: {}", e)))?;

        tracing::debug!(
            "Stored {} new units ({} submitted), removed {} superseded",
            added,
            records.len(),
            removed
        );
        Ok(added)
    }

    /// Number of stored units.
    pub fn count(&self) -> AppResult<usize> {
        self.count_query("SELECT COUNT(*) FROM units")
    }

    /// Number of distinct source documents.
    pub fn source_count(&self) -> AppResult<usize> {
        self.count_query("SELECT COUNT(DISTINCT source_id) FROM units")
    }

    fn count_query(&self, sql: &str) -> AppResult<usize> {
        self.conn
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|v| v as usize)
            .map_err(|e| AppError::Knowledge(format!("Failed to count units: {}", e)))
    }

    /// Every stored record, in source then position order.
    pub fn all_records(&self) -> AppResult<Vec<EmbeddingRecord>> {
        self.select_records(
            "SELECT id, source_id, location, position, text, embedding
             FROM units ORDER BY source_id, position, id",
            &[],
        )
    }

    /// Stored records of the given sources, in source then position order.
    pub fn records_for_sources(&self, source_ids: &[String]) -> AppResult<Vec<EmbeddingRecord>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; source_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, source_id, location, position, text, embedding
             FROM units WHERE source_id IN ({}) ORDER BY source_id, position, id",
            placeholders
        );
        self.select_records(&sql, source_ids)
    }

    fn select_records(&self, sql: &str, args: &[String]) -> AppResult<Vec<EmbeddingRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let bytes: Vec<u8> = row.get(5)?;
                Ok((
                    RetrievableUnit {
                        id: row.get(0)?,
                        source_id: row.get(1)?,
                        location: row.get(2)?,
                        position: row.get::<_, i64>(3)? as u32,
                        text: row.get(4)?,
                    },
                    bytes,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query units: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            let (unit, bytes) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read unit: {}", e)))?;
            records.push(EmbeddingRecord {
                vector: bytes_to_embedding(&bytes)?,
                unit,
            });
        }

        Ok(records)
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(source: &str, position: u32, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            unit: RetrievableUnit::new(source, None, position, text),
            vector,
        }
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp = TempDir::new().unwrap();
        assert!(IndexStore::open_existing(temp.path()).unwrap().is_none());

        IndexStore::open(temp.path()).unwrap();
        assert!(IndexStore::open_existing(temp.path()).unwrap().is_some());
    }

    #[test]
    fn test_insert_and_read_back() {
        let temp = TempDir::new().unwrap();
        let mut store = IndexStore::open(temp.path()).unwrap();

        let records = vec![
            record("b.txt", 0, "second", vec![0.0, 1.0, 0.0]),
            record("a.txt", 0, "first", vec![1.0, 0.5, -0.25]),
        ];
        assert_eq!(store.insert(&records, "trigram-v1").unwrap(), 2);

        let stored = store.all_records().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].unit.source_id, "a.txt");
        assert_eq!(stored[0].vector, vec![1.0, 0.5, -0.25]);
        assert_eq!(store.dimensions().unwrap(), Some(3));
        assert_eq!(store.embedding_model().unwrap().as_deref(), Some("trigram-v1"));
        assert_eq!(store.source_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_units_are_ignored() {
        let temp = TempDir::new().unwrap();
        let mut store = IndexStore::open(temp.path()).unwrap();
        let records = vec![record("a.txt", 0, "same", vec![1.0, 0.0])];

        assert_eq!(store.insert(&records, "m").unwrap(), 1);
        assert_eq!(store.insert(&records, "m").unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_reinserting_a_source_replaces_its_units() {
        let temp = TempDir::new().unwrap();
        let mut store = IndexStore::open(temp.path()).unwrap();
        store
            .insert(
                &[
                    record("a.txt", 0, "old first", vec![1.0, 0.0]),
                    record("a.txt", 1, "old second", vec![0.0, 1.0]),
                    record("b.txt", 0, "untouched", vec![1.0, 1.0]),
                ],
                "m",
            )
            .unwrap();

        let added = store
            .insert(
                &[
                    record("a.txt", 0, "old first", vec![1.0, 0.0]),
                    record("a.txt", 1, "new second", vec![0.5, 0.5]),
                ],
                "m",
            )
            .unwrap();
        assert_eq!(added, 1);

        let texts: Vec<String> = store
            .all_records()
            .unwrap()
            .into_iter()
            .map(|r| r.unit.text)
            .collect();
        assert_eq!(texts, vec!["old first", "new second", "untouched"]);
    }

    #[test]
    fn test_records_for_sources_filters() {
        let temp = TempDir::new().unwrap();
        let mut store = IndexStore::open(temp.path()).unwrap();
        store
            .insert(
                &[
                    record("a.txt", 0, "a", vec![1.0]),
                    record("b.txt", 0, "b", vec![1.0]),
                    record("c.txt", 0, "c", vec![1.0]),
                ],
                "m",
            )
            .unwrap();

        let sources: Vec<String> = store
            .records_for_sources(&["c.txt".to_string(), "a.txt".to_string()])
            .unwrap()
            .into_iter()
            .map(|r| r.unit.source_id)
            .collect();
        assert_eq!(sources, vec!["a.txt", "c.txt"]);
        assert!(store.records_for_sources(&[]).unwrap().is_empty());
        assert!(store
            .records_for_sources(&["missing.txt".to_string()])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_store_persists_across_handles() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = IndexStore::open(temp.path()).unwrap();
            store
                .insert(&[record("a.txt", 0, "kept", vec![1.0])], "m")
                .unwrap();
        }

        let store = IndexStore::open_existing(temp.path()).unwrap().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

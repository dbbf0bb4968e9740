use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::SimilarityMetric;
use crate::embeddings::vector::{decode_f32_blob, distance, encode_f32_blob, l2_normalize};
use crate::embeddings::{EmbeddingError, EmbeddingService};

use super::room::{Room, RoomFilter};
use super::schema;
use super::{Result, StoreError};

/// Texts sent to the embedding provider per call during batch upserts.
const EMBED_BATCH_SIZE: usize = 32;

const ROOM_COLUMNS: &str = "id, name, city, description, amenities, price, capacity, beds, \
     room_type, has_kitchen, available_from, available_to";

/// A catalog hit: the stored room and its distance from the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMatch {
    pub room: Room,
    pub distance: f64,
}

/// Room catalog backed by SQLite.
///
/// Cheap to clone; clones share the connection pool, the embedding service
/// and the per-room write locks.
#[derive(Clone)]
pub struct RoomStore {
    pool: Pool<SqliteConnectionManager>,
    embedder: EmbeddingService,
    metric: SimilarityMetric,
    dimensions: usize,
    upsert_locks: Arc<DashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomStore {
    /// Open (or create) the catalog database at `path`.
    pub fn open(path: &Path, embedder: EmbeddingService, metric: SimilarityMetric) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder().max_size(8).build(manager)?;
        {
            let conn = pool.get()?;
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "catalog journal mode");
        }

        let store = Self::from_pool(pool, embedder, metric)?;
        info!(
            path = %path.display(),
            metric = metric.as_str(),
            dimensions = store.dimensions,
            "room catalog opened"
        );
        Ok(store)
    }

    /// An in-memory catalog. Everything is lost when the last clone drops.
    pub fn open_in_memory(embedder: EmbeddingService, metric: SimilarityMetric) -> Result<Self> {
        // A single connection that never expires keeps the database alive.
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?;
        Self::from_pool(pool, embedder, metric)
    }

    fn from_pool(
        pool: Pool<SqliteConnectionManager>,
        embedder: EmbeddingService,
        metric: SimilarityMetric,
    ) -> Result<Self> {
        let dimensions = embedder.dimensions();
        {
            let conn = pool.get()?;
            schema::run_migrations(&conn)?;
            schema::ensure_embedding_profile(&conn, embedder.model_id(), dimensions)?;
        }
        Ok(Self {
            pool,
            embedder,
            metric,
            dimensions,
            upsert_locks: Arc::new(DashMap::new()),
        })
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    /// Embedding dimension D every stored vector has.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedder(&self) -> &EmbeddingService {
        &self.embedder
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Embed `text` and store it with `room`, replacing any room with the same id.
    ///
    /// Writes for one id are serialized; an update keeps the room's original
    /// insertion position. If `text` is unchanged since the last write the
    /// stored vector is reused.
    pub async fn upsert(&self, room: &Room, text: &str) -> Result<()> {
        room.validate().map_err(StoreError::InvalidRoom)?;
        self.with_room_lock(&room.id, self.upsert_locked(room, text))
            .await
    }

    /// [`Self::upsert`] using [`Room::embedding_text`].
    pub async fn upsert_room(&self, room: &Room) -> Result<()> {
        self.upsert(room, &room.embedding_text()).await
    }

    /// Upsert many rooms, embedding their texts in batched provider calls.
    ///
    /// Rooms whose text is unchanged keep their stored vector. Every room is
    /// validated before anything is embedded or written; each write takes
    /// the room's lock like [`Self::upsert`].
    pub async fn upsert_batch(&self, entries: &[(Room, String)]) -> Result<usize> {
        for (room, _) in entries {
            room.validate().map_err(StoreError::InvalidRoom)?;
        }

        let hashes: Vec<String> = entries.iter().map(|(_, text)| text_hash(text)).collect();
        let mut embeddings = Vec::with_capacity(entries.len());
        for ((room, _), hash) in entries.iter().zip(&hashes) {
            embeddings.push(self.cached_embedding(&room.id, hash)?);
        }

        let pending: Vec<usize> = (0..entries.len())
            .filter(|&i| embeddings[i].is_none())
            .collect();
        for chunk in pending.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = chunk.iter().map(|&i| entries[i].1.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            for (&i, vector) in chunk.iter().zip(vectors) {
                embeddings[i] = Some(vector);
            }
        }
        debug!(
            rooms = entries.len(),
            embedded = pending.len(),
            "room batch embedded"
        );

        for (((room, _), hash), embedding) in entries.iter().zip(hashes).zip(embeddings) {
            let embedding = embedding.ok_or_else(|| {
                StoreError::Embedding(EmbeddingError::Request(format!(
                    "no embedding returned for room '{}'",
                    room.id
                )))
            })?;
            let store = self.clone();
            let owned = room.clone();
            self.with_room_lock(&room.id, async move {
                tokio::task::spawn_blocking(move || store.write_room(&owned, &embedding, &hash))
                    .await
                    .map_err(|e| StoreError::Task(e.to_string()))?
            })
            .await?;
        }
        Ok(entries.len())
    }

    /// Run `write` while holding the write lock for `id`.
    async fn with_room_lock<T, F>(&self, id: &str, write: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let lock = self.upsert_locks.entry(id.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            write.await
        };
        drop(lock);
        self.upsert_locks
            .remove_if(id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn upsert_locked(&self, room: &Room, text: &str) -> Result<()> {
        let hash = text_hash(text);

        let embedding = match self.cached_embedding(&room.id, &hash)? {
            Some(embedding) => {
                debug!(room_id = %room.id, "room text unchanged, reusing embedding");
                embedding
            }
            None => self.embedder.embed(text).await?,
        };

        let store = self.clone();
        let room = room.clone();
        tokio::task::spawn_blocking(move || store.write_room(&room, &embedding, &hash))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Store `room` with a precomputed embedding.
    ///
    /// The vector is normalized before it is written.
    pub fn upsert_with_embedding(&self, room: &Room, embedding: &[f32]) -> Result<()> {
        room.validate().map_err(StoreError::InvalidRoom)?;
        let embedding = self.prepare_vector(embedding)?;
        let hash = hex::encode(Sha256::digest(encode_f32_blob(&embedding)));
        self.write_room(room, &embedding, &hash)
    }

    fn cached_embedding(&self, id: &str, hash: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM rooms
                 WHERE id = ?1 AND embedding_hash = ?2 AND embedding_dimension = ?3",
                params![id, hash, self.dimensions as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.and_then(|b| decode_f32_blob(&b)))
    }

    fn write_room(&self, room: &Room, embedding: &[f32], hash: &str) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let amenities = serde_json::to_string(&room.amenities)
            .map_err(|e| StoreError::InvalidRoom(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO rooms (
                id, name, city, description, amenities, price, capacity, beds,
                room_type, has_kitchen, available_from, available_to,
                embedding_hash, embedding_dimension, embedding, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                city = excluded.city,
                description = excluded.description,
                amenities = excluded.amenities,
                price = excluded.price,
                capacity = excluded.capacity,
                beds = excluded.beds,
                room_type = excluded.room_type,
                has_kitchen = excluded.has_kitchen,
                available_from = excluded.available_from,
                available_to = excluded.available_to,
                embedding_hash = excluded.embedding_hash,
                embedding_dimension = excluded.embedding_dimension,
                embedding = excluded.embedding,
                updated_at = excluded.updated_at",
            params![
                room.id,
                room.name,
                room.city,
                room.description,
                amenities,
                room.price,
                room.capacity,
                room.beds,
                room.room_type,
                room.has_kitchen,
                room.available_from.map(|d| d.to_string()),
                room.available_to.map(|d| d.to_string()),
                hash,
                embedding.len() as i64,
                encode_f32_blob(embedding),
                now,
            ],
        )?;
        tx.commit()?;

        debug!(room_id = %room.id, city = %room.city, "room stored");
        Ok(())
    }

    /// Delete a room. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The `k` rooms closest to `query`, nearest first.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<RoomMatch>> {
        self.nearest_filtered(query, k, &RoomFilter::default())
    }

    /// Like [`Self::nearest`], considering only rooms that pass `filter`.
    ///
    /// Returns `min(k, matching rooms)` results ordered by ascending distance.
    /// Rows whose stored vector has the wrong dimension are skipped.
    pub fn nearest_filtered(
        &self,
        query: &[f32],
        k: usize,
        filter: &RoomFilter,
    ) -> Result<Vec<RoomMatch>> {
        let query = self.prepare_vector(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let city = filter.city.as_ref().map(|c| c.trim().to_lowercase());

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ROOM_COLUMNS}, embedding_dimension, embedding
             FROM rooms
             WHERE (?1 IS NULL OR price <= ?1)
             ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![filter.max_price], |row| {
            Ok((
                room_from_row(row)?,
                row.get::<_, i64>(12)?,
                row.get::<_, Vec<u8>>(13)?,
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (room, dimension, blob) = row?;
            if let Some(city) = &city {
                if room.city.trim().to_lowercase() != *city {
                    continue;
                }
            }

            let stored = match decode_f32_blob(&blob) {
                Some(v) if v.len() == self.dimensions && dimension as usize == v.len() => v,
                _ => {
                    warn!(
                        room_id = %room.id,
                        stored_dimension = dimension,
                        expected = self.dimensions,
                        "skipping room with malformed embedding"
                    );
                    continue;
                }
            };

            if let Some(d) = distance(self.metric, &query, &stored) {
                matches.push(RoomMatch { room, distance: d });
            }
        }

        // Rows arrive in insertion order and the sort is stable, so equal
        // distances keep that order.
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);

        debug!(
            k,
            returned = matches.len(),
            filtered = !filter.is_empty(),
            "catalog nearest-neighbor scan"
        );
        Ok(matches)
    }

    pub fn get(&self, id: &str) -> Result<Option<Room>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"),
                [id],
                room_from_row,
            )
            .optional()?)
    }

    /// Every room, in insertion order.
    pub fn list(&self) -> Result<Vec<Room>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY seq ASC"))?;
        let rooms = stmt
            .query_map([], room_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rooms)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM rooms", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Check a caller-supplied vector and return a unit-length copy.
    fn prepare_vector(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::InvalidVector(
                "vector contains non-finite values".to_string(),
            ));
        }
        let mut unit = vector.to_vec();
        if !l2_normalize(&mut unit) {
            return Err(StoreError::InvalidVector("vector has zero length".to_string()));
        }
        Ok(unit)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn text_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| s.parse::<NaiveDate>())
        .transpose()
        .map_err(|e| conversion_error(idx, e))
}

/// Build a [`Room`] from the first twelve columns of [`ROOM_COLUMNS`].
fn room_from_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    let amenities: String = row.get(4)?;
    Ok(Room {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        description: row.get(3)?,
        amenities: serde_json::from_str(&amenities).map_err(|e| conversion_error(4, e))?,
        price: row.get(5)?,
        capacity: row.get(6)?,
        beds: row.get(7)?,
        room_type: row.get(8)?,
        has_kitchen: row.get(9)?,
        available_from: parse_date(row, 10)?,
        available_to: parse_date(row, 11)?,
    })
}

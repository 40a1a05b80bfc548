//! Telemetry row storage
//!
//! Persists telemetry rows to Sled in two trees:
//! - `records`: id (u64 big-endian) -> JSON `TelemetryRecord`
//! - `by_time`: order-preserving timestamp ‖ id -> id
//!
//! Walking `by_time` yields rows by timestamp with ties in insertion order.
//! Every multi-row write goes through one transaction over both trees, so a
//! reader never sees a record without its index entry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use super::StorageError;
use crate::types::{Channel, NewTelemetry, TelemetryPatch, TelemetryRecord, TimeRange};

const RECORDS_TREE: &str = "records";
const TIME_INDEX_TREE: &str = "by_time";

/// Selection applied by [`TelemetryStore::query`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordFilter {
    pub channel: Option<Channel>,
    pub range: TimeRange,
    /// Keep only the most recent N matches (still returned oldest first)
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn channel(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &TelemetryRecord) -> bool {
        self.channel.map_or(true, |c| c == record.channel_id) && self.range.contains(&record.timestamp)
    }
}

/// Housekeeping summary for `/health` and the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub per_channel: BTreeMap<Channel, usize>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub size_on_disk: u64,
}

/// Handle to the telemetry store. Cheap to clone; all clones share one database.
#[derive(Clone)]
pub struct TelemetryStore {
    db: sled::Db,
    records: sled::Tree,
    by_time: sled::Tree,
}

impl TelemetryStore {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref())?;
        let store = Self::from_db(db)?;
        info!(path = %path.as_ref().display(), records = store.count(), "Telemetry store opened");
        Ok(store)
    }

    /// In-memory store removed on drop (tests, dry runs).
    pub fn open_temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let records = db.open_tree(RECORDS_TREE)?;
        let by_time = db.open_tree(TIME_INDEX_TREE)?;
        Ok(Self { db, records, by_time })
    }

    /// Flush and release the handle.
    pub fn close(self) -> Result<(), StorageError> {
        self.flush()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Append one row and return it with its assigned id.
    pub fn insert(&self, row: NewTelemetry) -> Result<TelemetryRecord, StorageError> {
        let mut inserted = self.insert_batch(vec![row])?;
        inserted.pop().ok_or(StorageError::Corrupt("empty batch result".into()))
    }

    /// Append all rows atomically. Ids increase in input order.
    pub fn insert_batch(&self, rows: Vec<NewTelemetry>) -> Result<Vec<TelemetryRecord>, StorageError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let id = self.db.generate_id()?;
            let record = row.with_id(id);
            let value = serde_json::to_vec(&record)?;
            prepared.push((record, value));
        }

        (&self.records, &self.by_time).transaction(|(records, by_time)| {
            for (record, value) in &prepared {
                records.insert(&id_key(record.id)[..], &value[..])?;
                by_time.insert(&time_key(&record.timestamp, record.id)[..], &id_key(record.id)[..])?;
            }
            Ok::<_, ConflictableTransactionError<StorageError>>(())
        })?;

        debug!(rows = prepared.len(), "Inserted telemetry rows");
        Ok(prepared.into_iter().map(|(record, _)| record).collect())
    }

    /// Apply a partial update, moving the index entry if the timestamp changed.
    pub fn update(&self, id: u64, patch: &TelemetryPatch) -> Result<TelemetryRecord, StorageError> {
        let updated = (&self.records, &self.by_time).transaction(|(records, by_time)| {
            let Some(raw) = records.get(id_key(id))? else {
                return Err(ConflictableTransactionError::Abort(StorageError::NotFound(id)));
            };
            let mut record: TelemetryRecord = serde_json::from_slice(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;

            by_time.remove(&time_key(&record.timestamp, id)[..])?;
            patch.apply(&mut record);
            let value = serde_json::to_vec(&record)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
            records.insert(&id_key(id)[..], value)?;
            by_time.insert(&time_key(&record.timestamp, id)[..], &id_key(id)[..])?;
            Ok(record)
        })?;
        Ok(updated)
    }

    /// Remove one row, returning what was deleted.
    pub fn delete(&self, id: u64) -> Result<TelemetryRecord, StorageError> {
        let removed = (&self.records, &self.by_time).transaction(|(records, by_time)| {
            let Some(raw) = records.remove(&id_key(id)[..])? else {
                return Err(ConflictableTransactionError::Abort(StorageError::NotFound(id)));
            };
            let record: TelemetryRecord = serde_json::from_slice(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
            by_time.remove(&time_key(&record.timestamp, id)[..])?;
            Ok(record)
        })?;
        Ok(removed)
    }

    /// Delete everything except the `keep` most recent rows (by timestamp,
    /// ties by id). Returns the number of rows removed.
    pub fn retain_latest(&self, keep: usize) -> Result<usize, StorageError> {
        let total = self.by_time.len();
        if total <= keep {
            return Ok(0);
        }

        let mut stale = Vec::with_capacity(total - keep);
        for item in self.by_time.iter().take(total - keep) {
            let (time_key, id_bytes) = item?;
            stale.push((time_key, id_bytes));
        }

        (&self.records, &self.by_time).transaction(|(records, by_time)| {
            for (time_key, id_bytes) in &stale {
                by_time.remove(time_key)?;
                records.remove(id_bytes)?;
            }
            Ok::<_, ConflictableTransactionError<StorageError>>(())
        })?;

        debug!(removed = stale.len(), kept = keep, "Applied retention");
        Ok(stale.len())
    }

    /// Drop every row.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.records.clear()?;
        self.by_time.clear()?;
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, id: u64) -> Result<Option<TelemetryRecord>, StorageError> {
        match self.records.get(id_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Rows matching `filter`, ordered by timestamp then id.
    pub fn query(&self, filter: &RecordFilter) -> Result<Vec<TelemetryRecord>, StorageError> {
        let mut out = Vec::new();
        let limit = filter.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            return Ok(out);
        }

        // Walk newest first so a limit keeps the most recent rows.
        for item in self.time_range_iter(&filter.range).rev() {
            let (_, id_bytes) = item?;
            // Retention may remove the row between the index read and this one
            let Some(raw) = self.records.get(&id_bytes)? else {
                debug!(id = decode_id(&id_bytes), "Skipping row removed during query");
                continue;
            };
            let record: TelemetryRecord = serde_json::from_slice(&raw)?;
            if filter.matches(&record) {
                out.push(record);
                if out.len() >= limit {
                    break;
                }
            }
        }

        out.reverse();
        Ok(out)
    }

    /// `(timestamp, payload)` pairs for one channel, ordered by timestamp.
    pub fn channel_samples(
        &self,
        channel: Channel,
        range: TimeRange,
    ) -> Result<Vec<(DateTime<Utc>, String)>, StorageError> {
        let rows = self.query(&RecordFilter::channel(channel).with_range(range))?;
        Ok(rows.into_iter().map(|r| (r.timestamp, r.payload)).collect())
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> Result<StoreStats, StorageError> {
        let mut per_channel: BTreeMap<Channel, usize> =
            Channel::ALL.iter().map(|c| (*c, 0)).collect();
        for item in self.records.iter() {
            let (_, raw) = item?;
            let record: TelemetryRecord = serde_json::from_slice(&raw)?;
            *per_channel.entry(record.channel_id).or_default() += 1;
        }

        let first_timestamp = self.boundary_timestamp(self.by_time.first()?)?;
        let last_timestamp = self.boundary_timestamp(self.by_time.last()?)?;

        Ok(StoreStats {
            total_records: self.records.len(),
            per_channel,
            first_timestamp,
            last_timestamp,
            size_on_disk: self.db.size_on_disk().unwrap_or(0),
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn boundary_timestamp(
        &self,
        entry: Option<(sled::IVec, sled::IVec)>,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        match entry {
            Some((_, id_bytes)) => Ok(self.get(decode_id(&id_bytes))?.map(|r| r.timestamp)),
            None => Ok(None),
        }
    }

    fn time_range_iter(&self, range: &TimeRange) -> sled::Iter {
        let start = range
            .start
            .map(|ts| time_key(&ts, 0))
            .unwrap_or([0u8; 16]);
        let end = range
            .end
            .map(|ts| time_key(&ts, u64::MAX))
            .unwrap_or([0xFF; 16]);
        self.by_time.range(start..=end)
    }
}

impl From<TransactionError<StorageError>> for StorageError {
    fn from(err: TransactionError<StorageError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StorageError::Sled(e),
        }
    }
}

// ============================================================================
// Key encoding
// ============================================================================

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_be_bytes(buf)
}

/// Seconds since the epoch with the sign bit flipped, so big-endian byte
/// order matches chronological order across the whole i64 range.
fn time_key(ts: &DateTime<Utc>, id: u64) -> [u8; 16] {
    let secs = (ts.timestamp() as u64) ^ (1 << 63);
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&secs.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

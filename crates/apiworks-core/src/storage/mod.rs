//! # redb-backed Entity Storage
//!
//! Every entity kind gets one row table `u128 → postcard(row)` keyed by the
//! entity ID. Kinds with an owning parent also get a parent index
//! `(parent, id) → ()` so listing children is a range scan.
//!
//! redb provides what the engine relies on:
//! - ACID write transactions (the importer runs entirely inside one)
//! - MVCC: readers see a snapshot, writers are serialized
//! - Crash safety (copy-on-write B-trees)
//!
//! Reads go through [`ReadScope`], implemented for both read snapshots and
//! open write transactions, so the same reader functions serve exports and
//! the lookups an import performs mid-transaction.

pub mod reader;
pub mod tables;
pub mod writer;

use crate::id::Id;
use crate::mapper::{Mapped, MapperError};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Row table shape shared by every entity kind.
pub type RowTable = TableDefinition<'static, u128, &'static [u8]>;

/// Parent index shape: `(parent_key, id_key) → ()`.
pub type ParentIndex = TableDefinition<'static, (u128, u128), ()>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("row codec error: {0}")]
    Codec(String),

    #[error("{table} not found: {id}")]
    NotFound { table: &'static str, id: Id },

    #[error("{table} already exists: {id}")]
    Conflict { table: &'static str, id: Id },

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

impl From<MapperError> for StoreError {
    fn from(err: MapperError) -> Self {
        Self::Codec(err.to_string())
    }
}

macro_rules! redb_error_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    Self::Storage(redb::Error::from(err))
                }
            }
        )+
    };
}

redb_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError
);

// =============================================================================
// TABLE DESCRIPTORS
// =============================================================================

/// Static description of how one entity kind is stored.
///
/// Implemented by zero-sized markers in [`tables`]. Several markers may share
/// a model type (headers and search params are both `HttpKeyValue`); the
/// marker selects the table.
pub trait Table {
    type Model: Mapped;

    /// Kind name used in errors and logs.
    const NAME: &'static str;
    const ROWS: RowTable;
    const BY_PARENT: Option<ParentIndex> = None;

    fn id(model: &Self::Model) -> Id;

    fn parent(_model: &Self::Model) -> Option<Id> {
        None
    }

    fn encode(model: &Self::Model) -> Result<Vec<u8>, StoreError> {
        postcard::to_allocvec(&model.to_row()).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self::Model, StoreError> {
        let row = postcard::from_bytes(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(Self::Model::from_row(row)?)
    }
}

// =============================================================================
// READ SCOPES
// =============================================================================

/// Anything rows can be read from: a snapshot or an open write transaction.
pub trait ReadScope {
    fn fetch(&self, table: RowTable, key: u128) -> Result<Option<Vec<u8>>, StoreError>;

    fn fetch_children(&self, index: ParentIndex, parent: u128) -> Result<Vec<u128>, StoreError>;

    fn fetch_all(&self, table: RowTable) -> Result<Vec<Vec<u8>>, StoreError>;
}

fn fetch_from<T>(table: &T, key: u128) -> Result<Option<Vec<u8>>, StoreError>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
}

fn children_from<T>(index: &T, parent: u128) -> Result<Vec<u128>, StoreError>
where
    T: ReadableTable<(u128, u128), ()>,
{
    let mut out = Vec::new();
    for entry in index.range((parent, 0u128)..=(parent, u128::MAX))? {
        let (key, _) = entry?;
        out.push(key.value().1);
    }
    Ok(out)
}

fn all_from<T>(table: &T) -> Result<Vec<Vec<u8>>, StoreError>
where
    T: ReadableTable<u128, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(value.value().to_vec());
    }
    Ok(out)
}

impl ReadScope for ReadTransaction {
    fn fetch(&self, table: RowTable, key: u128) -> Result<Option<Vec<u8>>, StoreError> {
        fetch_from(&self.open_table(table)?, key)
    }

    fn fetch_children(&self, index: ParentIndex, parent: u128) -> Result<Vec<u128>, StoreError> {
        children_from(&self.open_table(index)?, parent)
    }

    fn fetch_all(&self, table: RowTable) -> Result<Vec<Vec<u8>>, StoreError> {
        all_from(&self.open_table(table)?)
    }
}

impl ReadScope for WriteTransaction {
    fn fetch(&self, table: RowTable, key: u128) -> Result<Option<Vec<u8>>, StoreError> {
        fetch_from(&self.open_table(table)?, key)
    }

    fn fetch_children(&self, index: ParentIndex, parent: u128) -> Result<Vec<u128>, StoreError> {
        children_from(&self.open_table(index)?, parent)
    }

    fn fetch_all(&self, table: RowTable) -> Result<Vec<Vec<u8>>, StoreError> {
        all_from(&self.open_table(table)?)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Handle to the redb database holding every workspace.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create a store at `path`, creating any missing table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())?;
        Self::init(db)
    }

    /// A store backed by memory only. Used by tests and dry runs.
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, StoreError> {
        let tx = db.begin_write()?;
        for table in tables::ALL_ROWS {
            tx.open_table(*table)?;
        }
        for index in tables::ALL_INDEXES.iter() {
            tx.open_table(*index)?;
        }
        tx.commit()?;
        Ok(Self { db })
    }

    /// Begin a read snapshot.
    pub fn read(&self) -> Result<ReadTransaction, StoreError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction. Dropping it without commit rolls back.
    pub fn begin_write(&self) -> Result<WriteTransaction, StoreError> {
        Ok(self.db.begin_write()?)
    }

    /// Run `f` in a fresh write transaction; commit on `Ok`, abort on `Err`.
    pub fn write_with<R, E>(&self, f: impl FnOnce(&WriteTransaction) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let tx = self.begin_write().map_err(E::from)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| E::from(StoreError::from(e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort) = tx.abort() {
                    warn!(error = %abort, "failed to abort write transaction");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tables::Workspaces;
    use super::*;
    use crate::model::Workspace;
    use tempfile::tempdir;

    #[test]
    fn open_creates_every_table() {
        let dir = tempdir().expect("create temp dir");
        let store = Store::open(dir.path().join("w.redb")).expect("open");
        let read = store.read().expect("read");
        for table in tables::ALL_ROWS {
            assert!(read.fetch_all(*table).expect("scan").is_empty());
        }
    }

    #[test]
    fn write_with_commits_on_ok() {
        let store = Store::in_memory().expect("store");
        let ws = Workspace::new("alpha");
        store
            .write_with(|tx| writer::insert::<Workspaces>(tx, &ws))
            .expect("insert");

        let read = store.read().expect("read");
        assert_eq!(reader::get::<Workspaces>(&read, ws.id).expect("get"), ws);
    }

    #[test]
    fn write_with_rolls_back_on_err() {
        let store = Store::in_memory().expect("store");
        let ws = Workspace::new("alpha");
        let result: Result<(), StoreError> = store.write_with(|tx| {
            writer::insert::<Workspaces>(tx, &ws)?;
            Err(StoreError::Corrupt("injected".into()))
        });
        assert!(result.is_err());

        let read = store.read().expect("read");
        assert!(reader::find::<Workspaces>(&read, ws.id).expect("find").is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("w.redb");
        let ws = Workspace::new("persisted");
        {
            let store = Store::open(&path).expect("open");
            store
                .write_with(|tx| writer::insert::<Workspaces>(tx, &ws))
                .expect("insert");
        }
        let store = Store::open(&path).expect("reopen");
        let read = store.read().expect("read");
        assert_eq!(reader::get::<Workspaces>(&read, ws.id).expect("get").name, "persisted");
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store I/O: {0}")]
    StoreIo(hypersync_db::DbError),

    #[error("malformed key or corrupt ancestral entry: {0}")]
    Encoding(String),

    #[error("snapshot engine: {0}")]
    Snapshot(#[from] hypersync_snapshot::SnapshotError),
}

impl From<hypersync_db::DbError> for SyncError {
    fn from(e: hypersync_db::DbError) -> Self {
        match e {
            hypersync_db::DbError::CorruptRecord(msg) => SyncError::Encoding(msg),
            other => SyncError::StoreIo(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("checksum worker pool scheduling failed")]
    Scheduling,

    #[error("prepare_record called without a matching prepare_flush")]
    CacheMissing,

    #[error("tail cache id does not match the flush counter, producer layer lost an update")]
    CacheIdMismatch,

    #[error("ancestral store I/O: {0}")]
    StoreIo(hypersync_db::DbError),

    #[error("malformed key or corrupt ancestral entry: {0}")]
    Encoding(String),

    #[error("key present in keys_ordered but in neither existing nor non_existing map")]
    InternalInconsistency,

    #[error("the snapshot engine has latched broken after an ancestral write failure")]
    Broken,
}

impl From<hypersync_checksum::ChecksumError> for SnapshotError {
    fn from(_: hypersync_checksum::ChecksumError) -> Self {
        SnapshotError::Scheduling
    }
}

impl From<hypersync_db::DbError> for SnapshotError {
    fn from(e: hypersync_db::DbError) -> Self {
        match e {
            hypersync_db::DbError::CorruptRecord(msg) => SnapshotError::Encoding(msg),
            other => SnapshotError::StoreIo(other),
        }
    }
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

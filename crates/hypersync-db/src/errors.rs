use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("rockbound codec: {0}")]
    Codec(#[from] rockbound::CodecError),

    #[error("rocksdb: {0}")]
    Rocksdb(#[from] rockbound::rocksdb::Error),

    #[error("ancestral db is marked unhealthy, refusing reads and writes")]
    Unhealthy,

    #[error("corrupt ancestral record: {0}")]
    CorruptRecord(String),

    #[error("{0}")]
    Other(String),
}

pub type DbResult<T> = Result<T, DbError>;

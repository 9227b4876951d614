use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChecksumError {
    /// Acquiring a worker-pool slot failed, e.g. because the pool was closed
    /// for shutdown while the caller was waiting for admission.
    #[error("checksum worker pool scheduling failed")]
    Scheduling,
}

use thiserror::Error;

/// Failures talking to the job database. Always surfaced, never retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A background store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Bookkeeping failures while supervising a job. The job's own exit status is
/// never reported here; it only decides between `DoneSuccess` and
/// `DoneFailed`.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The terminal status could not be written, leaving the job `InProgress`.
    #[error("failed to mark job {job_id} as {status}: {source}")]
    StatusWrite {
        job_id: i64,
        status: crate::types::JobStatus,
        #[source]
        source: StoreError,
    },
}

/// Failures the worker pool collects from its producer and consumers.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to claim next job: {0}")]
    Claim(#[source] StoreError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A job was claimed but the worker that asked for it had gone away.
    /// The job is left `InProgress`.
    #[error("job {job_id} was claimed but never run")]
    Orphaned { job_id: i64 },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

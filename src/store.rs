//! SQLite-backed job storage and the claim engine.
//!
//! Every call goes through one mutex-guarded connection, and each mutation is
//! a single statement (or an immediate transaction), so the same file can be
//! shared safely by several threads of this process and by other processes.
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{
    params, Connection, OptionalExtension, Row, TransactionBehavior,
};
use tokio::task;
use tracing::{debug, trace};

use crate::error::StoreError;
use crate::types::{Job, JobStatus};

/// How long a statement waits for another process to release the database
/// lock before giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const JOB_COLUMNS: &str =
    "id, command, pid, status, created_at, started_at, finished_at";

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        command: row.get(1)?,
        pid: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
    })
}

/// A cloneable handle onto the job database. Clones share one connection.
#[derive(Clone, Debug)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

impl JobStore {
    /// Opens (creating if needed) the job database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS jobs (
              id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
              command TEXT NOT NULL,
              pid INTEGER DEFAULT 0,
              status INTEGER DEFAULT 0,
              created_at INTEGER DEFAULT 0,
              started_at INTEGER DEFAULT 0,
              finished_at INTEGER DEFAULT 0
            );
            "#,
        )?;

        debug!(path = %path.display(), "opened job store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // A panic while holding the lock can't leave the connection half-written:
    // SQLite rolls back any statement that didn't complete.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `command` as a new pending job, returning its id.
    pub fn add_job(&self, command: &str) -> Result<i64, StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO jobs
               (command, pid, status, created_at, started_at, finished_at)
             VALUES (?1, 0, ?2, ?3, 0, 0)",
            params![command, JobStatus::Pending, now_millis()],
        )?;
        let id = conn.last_insert_rowid();

        debug!(job_id = id, command, "added job");
        Ok(id)
    }

    /// All jobs, in no particular order.
    pub fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs"))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let job = self
            .conn()
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    /// Deletes the job with the given id, returning whether it existed. No
    /// check is made for a process still running the job.
    pub fn delete_job(&self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .conn()
            .execute("DELETE FROM jobs WHERE id = ?1", params![id])?;

        debug!(job_id = id, existed = removed > 0, "deleted job");
        Ok(removed > 0)
    }

    /// Atomically moves the oldest pending job to `InProgress`, stamping
    /// `started_at`, and returns the updated row. `None` means the queue is
    /// drained.
    ///
    /// The select and update happen in one statement inside an immediate
    /// transaction, so concurrent callers, in this process or another, never
    /// receive the same job.
    pub fn claim_next(&self) -> Result<Option<Job>, StoreError> {
        let mut conn = self.conn();
        let tx =
            conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let job = tx
            .query_row(
                &format!(
                    "UPDATE jobs SET status = ?1, started_at = ?2
                     WHERE id = (
                       SELECT id FROM jobs WHERE status = ?3
                       ORDER BY id ASC LIMIT 1
                     )
                     RETURNING {JOB_COLUMNS}"
                ),
                params![
                    JobStatus::InProgress,
                    now_millis(),
                    JobStatus::Pending
                ],
                job_from_row,
            )
            .optional()?;
        tx.commit()?;

        match &job {
            Some(job) => debug!(job_id = job.id, "claimed job"),
            None => trace!("no pending jobs to claim"),
        }
        Ok(job)
    }

    /// Records the OS process id running the job.
    pub fn set_pid(&self, job_id: i64, pid: i64) -> Result<(), StoreError> {
        self.conn().execute(
            "UPDATE jobs SET pid = ?1 WHERE id = ?2",
            params![pid, job_id],
        )?;
        Ok(())
    }

    /// Sets the job's status and stamps `finished_at`. Only meant for terminal
    /// statuses; the stamp is written regardless.
    ///
    /// `finished_at` is kept strictly after `started_at`, so a job that exits
    /// within the millisecond it was claimed still shows a forward interval.
    pub fn set_status(
        &self,
        job_id: i64,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        self.conn().execute(
            "UPDATE jobs SET status = ?1, finished_at = MAX(?2, started_at + 1)
             WHERE id = ?3",
            params![status, now_millis(), job_id],
        )?;

        debug!(job_id, %status, "set job status");
        Ok(())
    }

    /// Runs a blocking store call on tokio's blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&JobStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        task::spawn_blocking(move || f(&store)).await?
    }

    pub async fn claim_next_async(&self) -> Result<Option<Job>, StoreError> {
        self.blocking(|store| store.claim_next()).await
    }

    pub async fn set_pid_async(
        &self,
        job_id: i64,
        pid: i64,
    ) -> Result<(), StoreError> {
        self.blocking(move |store| store.set_pid(job_id, pid)).await
    }

    pub async fn set_status_async(
        &self,
        job_id: i64,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        self.blocking(move |store| store.set_status(job_id, status)).await
    }
}

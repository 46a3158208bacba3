//! Runs claimed jobs as shell subprocesses and records their outcome.
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::store::JobStore;
use crate::types::{Job, JobStatus};

/// Interpreter used to run job commands, as `sh -c <command>`.
const SHELL: &str = "sh";

/// Runs `job`'s command to completion, then marks it `DoneSuccess` or
/// `DoneFailed` by its exit status. The subprocess shares this process's
/// stdout and stderr.
///
/// `job` should be one returned by a claim, so it is `InProgress`. Any other
/// job is still run, with a warning.
///
/// A command that can't be spawned, exits non-zero or is killed only fails the
/// job. An `Err` means the final status couldn't be recorded and the job is
/// still `InProgress`. There is no timeout.
pub async fn execute(
    store: &JobStore,
    job: &Job,
) -> Result<JobStatus, ExecError> {
    execute_in(SHELL, store, job).await
}

#[instrument(name = "execute", skip_all, fields(job_id = job.id))]
async fn execute_in(
    shell: &str,
    store: &JobStore,
    job: &Job,
) -> Result<JobStatus, ExecError> {
    if job.status != JobStatus::InProgress {
        warn!(status = %job.status, "running a job that was never claimed");
    }

    let status = match run_command(shell, store, job).await {
        Ok(exit) if exit.success() => {
            info!(%exit, "job succeeded");
            JobStatus::DoneSuccess
        },
        Ok(exit) => {
            info!(%exit, "job failed");
            JobStatus::DoneFailed
        },
        Err(error) => {
            warn!(%error, "job could not be run");
            JobStatus::DoneFailed
        },
    };

    store
        .set_status_async(job.id, status)
        .await
        .map_err(|source| ExecError::StatusWrite {
            job_id: job.id,
            status,
            source,
        })?;

    Ok(status)
}

/// Spawns the command, records its pid and waits for it to exit.
async fn run_command(
    shell: &str,
    store: &JobStore,
    job: &Job,
) -> io::Result<ExitStatus> {
    let mut child = Command::new(shell)
        .arg("-c")
        .arg(&job.command)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()?;

    // id() is only None once the child has been reaped, which can't have
    // happened yet.
    if let Some(pid) = child.id() {
        debug!(pid, command = %job.command, "started job");
        if let Err(error) = store.set_pid_async(job.id, pid.into()).await {
            warn!(%error, pid, "failed to record job pid");
        }
    }

    child.wait().await
}

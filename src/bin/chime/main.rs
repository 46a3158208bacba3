mod args;
mod util;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chime::{pool, JobStore};
use clap::Parser;
use tracing::{error, info, warn, Level};

use crate::args::{Args, Command};
use crate::util::{render_jobs, resolve_db_path};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging goes to stderr so `list` output stays clean on stdout.
    if args.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(error) = begin(args).await {
        error!("command failed: {error:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn begin(args: Args) -> Result<()> {
    let db_path = resolve_db_path(args.db_path)?;
    let store = JobStore::open(&db_path)
        .with_context(|| format!("opening db at {}", db_path.display()))?;

    match args.command {
        Command::Add { command } => {
            let id = store.add_job(&command).context("adding job")?;
            info!(job_id = id, "added job");
        },
        Command::List { yaml } => {
            let jobs = store.list_jobs().context("listing jobs")?;
            print!("{}", render_jobs(jobs, yaml)?);
        },
        Command::Remove { id } => {
            if !store.delete_job(id).context("removing job")? {
                warn!(job_id = id, "no such job");
            }
        },
        Command::Take => {
            if let Some(job) = pool::take_one(&store).await? {
                info!(job_id = job.id, status = %job.status, "took job");
            }
        },
        Command::Run { workers } => {
            // Negative counts fall through to run_all's minimum of one.
            let workers = usize::try_from(workers).unwrap_or(0);
            // Failures are logged by the pool; the run itself still succeeds.
            pool::run_all(&store, workers).await;
        },
    }

    Ok(())
}

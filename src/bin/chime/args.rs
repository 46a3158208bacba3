use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub(crate) struct Args {
    /// Path to the job database. Defaults to ~/.chime.db.
    #[arg(long, env = "CHIME_DB_PATH")]
    pub(crate) db_path: Option<PathBuf>,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub(crate) debug: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Queues a shell command to run later.
    Add {
        /// The command, passed to `sh -c` as a single string.
        command: String,
    },
    /// Lists every job.
    List {
        /// Prints YAML instead of one line per job.
        #[arg(long, default_value_t)]
        yaml: bool,
    },
    /// Deletes a job, whatever its status.
    Remove { id: i64 },
    /// Runs the next pending job, if any.
    Take,
    /// Runs pending jobs until the queue is empty.
    Run {
        /// Number of jobs to run in parallel. Values below 1 mean 1.
        #[arg(default_value_t = 1, allow_negative_numbers = true)]
        workers: i64,
    },
}

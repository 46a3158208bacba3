use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chime::Job;
use itertools::Itertools;

const DEFAULT_DB_FILE: &str = ".chime.db";

/// Falls back to `$HOME/.chime.db` when no path was given.
pub(crate) fn resolve_db_path(given: Option<PathBuf>) -> Result<PathBuf> {
    match given {
        Some(path) => Ok(path),
        None => {
            let home = env::var_os("HOME").context("finding home directory")?;
            Ok(PathBuf::from(home).join(DEFAULT_DB_FILE))
        },
    }
}

/// Renders jobs oldest first, either one line each or as a YAML list.
pub(crate) fn render_jobs(jobs: Vec<Job>, yaml: bool) -> Result<String> {
    let jobs = jobs.into_iter().sorted_by_key(|j| j.id).collect_vec();

    if yaml {
        return serde_yaml::to_string(&jobs).context("serialising jobs");
    }

    Ok(jobs.iter().map(|j| format!("{j}\n")).collect())
}

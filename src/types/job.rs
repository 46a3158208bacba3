use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::states::JobStatus;

/// A queued shell command and its bookkeeping. Timestamps are milliseconds
/// since the Unix epoch, with 0 meaning "not yet".
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Job {
    pub id: i64,
    pub command: String,
    pub pid: i64,
    pub status: JobStatus,
    pub created_at: i64,
    pub started_at: i64,
    pub finished_at: i64,
}

fn millis_to_time(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(ms)
    }
}

impl Job {
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.created_at)
    }

    pub fn started_at_time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.started_at)
    }

    pub fn finished_at_time(&self) -> Option<DateTime<Utc>> {
        millis_to_time(self.finished_at)
    }

    /// Wall time spent running: up to `finished_at` for finished jobs, up to
    /// now for running ones. Pending jobs have no elapsed time.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started_at_time()?;
        let until = self.finished_at_time().unwrap_or_else(Utc::now);

        // Clock skew can make this negative; report zero rather than nothing.
        Some((until - started).to_std().unwrap_or_default())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} {}", self.id, self.status.marker(), self.command)?;

        if self.pid > 0 {
            write!(f, " [{}]", self.pid)?;
        }
        if let Some(elapsed) = self.elapsed() {
            write!(f, " {elapsed:?}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        Job {
            id: 7,
            command: "echo hi".to_owned(),
            pid: 0,
            status,
            created_at: 1_700_000_000_000,
            started_at: 0,
            finished_at: 0,
        }
    }

    #[test]
    fn test_display_pending() {
        let j = job(JobStatus::Pending);
        assert_eq!(j.to_string(), "7: [ ] echo hi");
        assert_eq!(j.elapsed(), None);
        assert!(j.started_at_time().is_none());
    }

    #[test]
    fn test_display_finished() {
        let j = Job {
            pid: 4242,
            started_at: 1_700_000_001_000,
            finished_at: 1_700_000_002_500,
            ..job(JobStatus::DoneSuccess)
        };

        assert_eq!(j.elapsed(), Some(Duration::from_millis(1500)));
        assert_eq!(j.to_string(), "7: [x] echo hi [4242] 1.5s");
    }

    #[test]
    fn test_running_elapsed_counts_to_now() {
        let j = Job {
            started_at: Utc::now().timestamp_millis() - 2_000,
            ..job(JobStatus::InProgress)
        };

        let elapsed = j.elapsed().unwrap();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(j.to_string().starts_with("7: [-] echo hi "));
    }
}

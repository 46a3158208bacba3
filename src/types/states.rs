use std::fmt;

use rusqlite::types::{
    FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef,
};
use serde::Serialize;

/// Lifecycle of a job. Jobs start `Pending`, are claimed into `InProgress`,
/// and finish in one of the two terminal states.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobStatus {
    Pending,
    InProgress,
    DoneSuccess,
    DoneFailed,
}

impl JobStatus {
    /// The integer stored in the `status` column.
    pub const fn code(self) -> i64 {
        use JobStatus::*;

        match self {
            Pending => 0,
            InProgress => 1,
            DoneSuccess => 2,
            DoneFailed => 3,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        use JobStatus::*;

        match code {
            0 => Some(Pending),
            1 => Some(InProgress),
            2 => Some(DoneSuccess),
            3 => Some(DoneFailed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::DoneSuccess | Self::DoneFailed)
    }

    /// Whether `next` is reachable from `self` in a single step. Terminal
    /// states go nowhere and nothing skips `InProgress`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use JobStatus::*;

        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, DoneSuccess)
                | (InProgress, DoneFailed)
        )
    }

    /// Short marker used when rendering a job on a single line.
    pub const fn marker(self) -> &'static str {
        use JobStatus::*;

        match self {
            Pending => "[ ]",
            InProgress => "[-]",
            DoneSuccess => "[x]",
            DoneFailed => "[!]",
        }
    }

    const fn name(self) -> &'static str {
        use JobStatus::*;

        match self {
            Pending => "pending",
            InProgress => "in-progress",
            DoneSuccess => "done-success",
            DoneFailed => "done-failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Lets `list --yaml` print readable status names instead of column integers.
impl Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use JobStatus::*;

    const ALL: [JobStatus; 4] = [Pending, InProgress, DoneSuccess, DoneFailed];

    #[test]
    fn test_codes_match_column_layout() {
        assert_eq!(Pending.code(), 0);
        assert_eq!(InProgress.code(), 1);
        assert_eq!(DoneSuccess.code(), 2);
        assert_eq!(DoneFailed.code(), 3);

        for status in ALL {
            assert_eq!(JobStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(JobStatus::from_code(4), None);
        assert_eq!(JobStatus::from_code(-1), None);
    }

    #[test]
    fn test_transitions() {
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(DoneSuccess));
        assert!(InProgress.can_transition_to(DoneFailed));

        // No skipping InProgress, no going backwards.
        assert!(!Pending.can_transition_to(DoneSuccess));
        assert!(!Pending.can_transition_to(DoneFailed));
        assert!(!InProgress.can_transition_to(Pending));
        assert!(!InProgress.can_transition_to(InProgress));

        // Nothing leaves a terminal state.
        for to in ALL {
            assert!(!DoneSuccess.can_transition_to(to), "done-success -> {to}");
            assert!(!DoneFailed.can_transition_to(to), "done-failed -> {to}");
        }

        assert!(!Pending.is_terminal());
        assert!(!InProgress.is_terminal());
        assert!(DoneSuccess.is_terminal());
        assert!(DoneFailed.is_terminal());
    }

    #[test]
    fn test_serialise_yaml() {
        assert_eq!(
            serde_yaml::to_string(&InProgress).unwrap(),
            "in-progress\n"
        );
        assert_eq!(
            serde_yaml::to_string(&DoneFailed).unwrap(),
            "done-failed\n"
        );
    }
}

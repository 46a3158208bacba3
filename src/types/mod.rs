pub mod job;
pub mod states;

pub use job::Job;
pub use states::JobStatus;

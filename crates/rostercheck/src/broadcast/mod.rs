//! Broadcasting of job progress for live consumers.

pub mod job_progress;

pub use job_progress::{JobPhase, JobProgressBroadcaster, JobProgressEvent};

pub mod job;
pub mod report;

pub use job::{JobStatus, JobSummary, ProviderRow, SourceKind, UploadJob};
pub use report::{
    FieldWithConfidence, PriorityLevel, ProviderInput, ProviderOutput, ProviderReport, RawFields,
    DEFAULT_MEMBER_IMPACT,
};

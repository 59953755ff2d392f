pub mod invoice;
pub mod loaders;
pub mod media;
pub mod outcome;
pub mod submission;
pub mod verdict;

pub use invoice::{ExtractionResult, LineItem, REQUIRED_FIELDS};
pub use loaders::{load_all_invoice_files, load_invoice_file};
pub use media::{canonical_media_type, MediaPolicy};
pub use outcome::{
    BatchId, BatchStatus, BatchSummary, FailureReason, FileOutcome, OutcomeState, StateCounts,
    TransitionError,
};
pub use submission::{FileSubmission, SubmissionId};
pub use verdict::{IssueKind, ValidationIssue, ValidationVerdict};

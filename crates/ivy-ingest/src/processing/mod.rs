//! Background processing: scheduler and parsing workers

mod scheduler;
mod worker;

pub use scheduler::{JobScheduler, SchedulerStats, UploadMetadata, PDF_MIME_TYPE};
pub use worker::{Dispatch, ParsingWorker, WorkerOutcome};

//! # feedloader-pipeline
//!
//! Everything between a candidate link and a cleaned-up download: the
//! seen-links store, metainfo fetching, the polling orchestrator and batch
//! processing.

pub mod batch;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod orchestrator;

pub use batch::{BatchReport, CandidateOutcome, CompletedDownload, Pipeline};
pub use dedup::DedupStore;
pub use error::{DedupError, FetchError, OrchestrationError};
pub use fetch::Fetcher;
pub use orchestrator::{
    CancelToken, Completion, Orchestration, OrchestrationState, Orchestrator, OrchestratorConfig,
    PendingDownload,
};

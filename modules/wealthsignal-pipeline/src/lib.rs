pub mod assessment;
pub mod clustering;
pub mod commit;
pub mod contacts;
pub mod enrichment;
pub mod extraction;
pub mod freshness;
pub mod infra;
pub mod notify;
pub mod pipeline;
pub mod prompts;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use pipeline::{CommitStatus, Pipeline, PipelineDeps, RunOptions, RunOutcome};

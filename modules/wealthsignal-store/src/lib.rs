pub mod error;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use retry::RetryPolicy;
pub use traits::{
    nearest, BulkWriteReport, DocumentStore, RunRecord, ScoredVector, UpsertOutcome, VectorIndex,
    VectorRecord,
};

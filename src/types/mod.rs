//! Core domain types shared across the pipeline.

pub mod ids;
pub mod record;
pub mod transaction;

pub use ids::{Receipt, RecordId, SourceId};
pub use record::Record;
pub use transaction::Transaction;

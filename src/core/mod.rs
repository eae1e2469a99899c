pub mod aggregator;
pub mod cache;
pub mod coordinator;
pub mod resolver;

pub use crate::domain::model::{AggregatedResult, QueryOptions, SourceRecord};
pub use crate::domain::ports::SourceAdapter;
pub use crate::utils::error::Result;

pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{HttpSource, StaticRecord, StaticSource};
pub use config::{CliConfig, MarketDataConfig};
pub use core::{cache::MarketDataCache, coordinator::MarketDataService, resolver::CodeMapping};
pub use domain::model::{AggregatedResult, FallbackEntry, QueryOptions, SourceRecord};
pub use domain::ports::SourceAdapter;
pub use utils::error::{MarketDataError, Result};

// Adapters layer: concrete SourceAdapter implementations configured from TOML.

pub mod http_source;
pub mod static_source;

pub use http_source::HttpSource;
pub use static_source::{StaticRecord, StaticSource};

use crate::core::resolver::{self, CodeMapping};
use crate::domain::model::IndustryMatch;
use crate::utils::error::{MarketDataError, Result};

/// 預設最低對應分數
pub const DEFAULT_MIN_MATCH_SCORE: f64 = 0.5;

/// 解析來源自己的分類代碼；分數低於門檻視為 ResolutionMiss
pub(crate) fn resolve_code(
    mapping: &CodeMapping,
    industry: &str,
    min_match_score: f64,
) -> Result<IndustryMatch> {
    match resolver::resolve(industry, mapping) {
        Some(found) if found.match_score >= min_match_score => Ok(found),
        Some(found) => Err(MarketDataError::ResolutionMiss {
            industry: industry.to_string(),
            score: found.match_score,
        }),
        None => Err(MarketDataError::ResolutionMiss {
            industry: industry.to_string(),
            score: 0.0,
        }),
    }
}

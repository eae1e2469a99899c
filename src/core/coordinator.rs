use crate::core::aggregator::{self, format_growth_rate, format_market_size, normalize_distribution};
use crate::config::MarketDataConfig;
use crate::core::cache::MarketDataCache;
use crate::domain::model::{
    AggregatedResult, CacheStats, Confidence, FallbackEntry, QueryOptions, SourceDetail,
    SourceRecord,
};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{MarketDataError, Result};
use chrono::{Datelike, Utc};
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// 合併結果的快取 scope
pub const AGGREGATED_SCOPE: &str = "aggregated";

/// 備援資料的來源識別碼
pub const FALLBACK_SOURCE_ID: &str = "fallback-dataset";

const FALLBACK_CONFIDENCE: f64 = 0.3;

/// 市場資料的唯一對外入口：快取查詢、並行呼叫所有來源、合併與回寫快取
pub struct MarketDataService {
    sources: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<MarketDataCache<AggregatedResult>>,
    fallback: HashMap<String, FallbackEntry>,
    source_timeout: Option<Duration>,
}

impl MarketDataService {
    pub fn new(cache: Arc<MarketDataCache<AggregatedResult>>) -> Self {
        Self {
            sources: Vec::new(),
            cache,
            fallback: HashMap::new(),
            source_timeout: None,
        }
    }

    /// 依 TOML 配置建立來源、快取與備援資料
    pub fn from_config(config: &MarketDataConfig) -> Result<Self> {
        config.build_service()
    }

    pub fn with_source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    /// 備援資料以小寫產業名稱為鍵
    pub fn with_fallback(mut self, industry: &str, entry: FallbackEntry) -> Self {
        self.fallback.insert(industry.trim().to_lowercase(), entry);
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = Some(timeout);
        self
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_id()).collect()
    }

    pub fn cache(&self) -> &Arc<MarketDataCache<AggregatedResult>> {
        &self.cache
    }

    /// 取得產業市場資料；永不失敗，降級結果透過 `has_data` 與信心分數表示
    pub async fn get_industry_data(&self, industry: &str, options: &QueryOptions) -> AggregatedResult {
        tracing::info!("📊 Getting market data for \"{}\"", industry);

        match self.try_get_industry_data(industry, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("❌ Error in market data service for \"{}\": {}", industry, e);
                let mut result = AggregatedResult::empty(industry, Utc::now().year());
                result.explanation = e.user_friendly_message();
                result.error = Some(e.to_string());
                result
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.flush();
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn try_get_industry_data(
        &self,
        industry: &str,
        options: &QueryOptions,
    ) -> Result<AggregatedResult> {
        let name = industry.trim();
        if name.is_empty() {
            return Err(MarketDataError::ValidationError {
                message: "Industry name cannot be empty".to_string(),
            });
        }

        if !options.bypass_cache {
            if let Some(cached) = self.cache.get(AGGREGATED_SCOPE, name, options) {
                tracing::info!("✅ Found cached market data for \"{}\"", name);
                return Ok(cached);
            }
        }

        tracing::info!("🔍 Querying {} data sources for \"{}\"", self.sources.len(), name);

        // 全部來源完成後才合併，不做串流式的部分合併
        let results = join_all(
            self.sources
                .iter()
                .map(|source| self.fetch_guarded(source.as_ref(), name, options)),
        )
        .await;

        tracing::info!(
            "🧩 Aggregating data from {} successful sources",
            results.iter().filter(|r| r.has_data).count()
        );
        let mut aggregated = aggregator::aggregate(&results, name);
        aggregated.explanation = aggregator::generate_explanation(&aggregated);

        if !aggregated.has_data {
            if let Some(fallback) = self.fallback_result(name) {
                tracing::info!("📚 Using fallback data for \"{}\"", name);
                self.cache.set(AGGREGATED_SCOPE, name, fallback.clone(), options);
                return Ok(fallback);
            }
            let error = MarketDataError::NoDataAvailable {
                industry: name.to_string(),
            };
            tracing::warn!("⚠️ {}", error);
            return Ok(aggregated);
        }

        self.cache.set(AGGREGATED_SCOPE, name, aggregated.clone(), options);
        Ok(aggregated)
    }

    /// 單一來源的呼叫保護：逾時或 panic 都轉成無資料紀錄
    async fn fetch_guarded(
        &self,
        source: &dyn SourceAdapter,
        industry: &str,
        options: &QueryOptions,
    ) -> SourceRecord {
        let source_id = source.source_id().to_string();
        let call = AssertUnwindSafe(source.fetch_data(industry, options)).catch_unwind();

        let outcome = match self.source_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome.map_err(|_| "source panicked".to_string()),
                Err(_) => Err(format!("timed out after {:?}", timeout)),
            },
            None => call.await.map_err(|_| "source panicked".to_string()),
        };

        match outcome {
            Ok(mut record) => {
                if record.source.is_empty() {
                    record.source = source_id;
                }
                if !record.has_data {
                    tracing::debug!(
                        "{} returned no data: {}",
                        record.source,
                        record.error.as_deref().unwrap_or("unknown reason")
                    );
                }
                record
            }
            Err(message) => {
                let error = MarketDataError::SourceUnavailable {
                    source_id: source_id.clone(),
                    message,
                };
                tracing::warn!("❌ {}", error);
                SourceRecord::no_data(source_id, error.to_string())
            }
        }
    }

    fn fallback_result(&self, industry: &str) -> Option<AggregatedResult> {
        let entry = self.fallback.get(&industry.to_lowercase())?;
        let current_year = Utc::now().year();

        let mut result = AggregatedResult::empty(industry, entry.year.unwrap_or(current_year));
        result.has_data = true;
        result.global_market_size = entry.global_market_size;
        result.display_market_size = entry.global_market_size.map(format_market_size);
        result.growth_rate = entry.growth_rate;
        result.display_growth_rate = entry.growth_rate.map(format_growth_rate);
        result.geographic_distribution = entry
            .geographic_distribution
            .clone()
            .map(normalize_distribution);
        result.confidence = Confidence::flat(FALLBACK_CONFIDENCE);
        result.sources = vec![FALLBACK_SOURCE_ID.to_string()];
        result.source_count = 1;
        result.source_details = vec![SourceDetail {
            name: FALLBACK_SOURCE_ID.to_string(),
            quality: None,
            provided_metrics: fallback_metrics(entry),
            data_source: FALLBACK_SOURCE_ID.to_string(),
        }];
        result.explanation = format!(
            "Using fallback dataset for {} as no live data sources were available.",
            industry
        );
        Some(result)
    }
}

fn fallback_metrics(entry: &FallbackEntry) -> Vec<String> {
    SourceRecord {
        global_market_size: entry.global_market_size,
        growth_rate: entry.growth_rate,
        geographic_distribution: entry.geographic_distribution.clone(),
        ..Default::default()
    }
    .provided_metrics()
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 未提供品質評分時使用的預設值
pub const DEFAULT_SOURCE_QUALITY: u8 = 3;

/// 品質評分上限
pub const MAX_SOURCE_QUALITY: u8 = 5;

/// 地區 -> 比例
pub type GeographicDistribution = BTreeMap<String, f64>;

/// 查詢選項；`bypass_cache` 只控制流程，不參與快取鍵
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing)]
    pub bypass_cache: bool,
}

impl QueryOptions {
    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Partial,
    Fallback,
}

/// 自由文字產業名稱對應到來源分類代碼的結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryMatch {
    pub industry: String,
    pub code: String,
    pub match_score: f64,
    pub match_type: MatchType,
}

/// 單一來源回傳的標準化部分資料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub has_data: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_market_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_distribution: Option<GeographicDistribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_match: Option<IndustryMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceRecord {
    /// 建立「沒有資料」的紀錄；來源失敗與真正無資料一視同仁
    pub fn no_data(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            has_data: false,
            source: source.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn quality(&self) -> u8 {
        self.source_quality.unwrap_or(DEFAULT_SOURCE_QUALITY)
    }

    pub fn provided_metrics(&self) -> Vec<String> {
        let mut metrics = Vec::new();
        if self.global_market_size.is_some() {
            metrics.push("market_size".to_string());
        }
        if self.growth_rate.is_some() {
            metrics.push("growth_rate".to_string());
        }
        if self.geographic_distribution.is_some() {
            metrics.push("geographic_distribution".to_string());
        }
        if self.competitive_intensity.is_some() {
            metrics.push("competitive_intensity".to_string());
        }
        metrics
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub overall: f64,
    pub market_size: f64,
    pub growth_rate: f64,
}

impl Confidence {
    pub fn flat(value: f64) -> Self {
        Self {
            overall: value,
            market_size: value,
            growth_rate: value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDetail {
    pub name: String,
    pub quality: Option<u8>,
    pub provided_metrics: Vec<String>,
    pub data_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub error: String,
}

/// 多來源合併後的市場估計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub industry: String,
    pub has_data: bool,
    pub global_market_size: Option<f64>,
    pub display_market_size: Option<String>,
    pub growth_rate: Option<f64>,
    pub display_growth_rate: Option<String>,
    pub geographic_distribution: Option<GeographicDistribution>,
    pub confidence: Confidence,
    pub sources: Vec<String>,
    pub source_count: usize,
    pub year: i32,
    pub retrieval_date: DateTime<Utc>,
    pub source_details: Vec<SourceDetail>,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SourceError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregatedResult {
    /// 沒有任何數值欄位的空結果
    pub fn empty(industry: impl Into<String>, year: i32) -> Self {
        Self {
            industry: industry.into(),
            has_data: false,
            global_market_size: None,
            display_market_size: None,
            growth_rate: None,
            display_growth_rate: None,
            geographic_distribution: None,
            confidence: Confidence::default(),
            sources: Vec::new(),
            source_count: 0,
            year,
            retrieval_date: Utc::now(),
            source_details: Vec::new(),
            explanation: String::new(),
            errors: Vec::new(),
            error: None,
        }
    }
}

/// 靜態備援資料中的單一產業
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackEntry {
    #[serde(default)]
    pub global_market_size: Option<f64>,
    #[serde(default)]
    pub growth_rate: Option<f64>,
    #[serde(default)]
    pub geographic_distribution: Option<GeographicDistribution>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub keys: usize,
}

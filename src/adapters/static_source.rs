use crate::adapters::resolve_code;
use crate::core::resolver::CodeMapping;
use crate::domain::model::{GeographicDistribution, QueryOptions, SourceRecord};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{MarketDataError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 靜態資料集中的一筆紀錄，以分類代碼索引
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticRecord {
    pub code: String,
    #[serde(default)]
    pub global_market_size: Option<f64>,
    #[serde(default)]
    pub growth_rate: Option<f64>,
    #[serde(default)]
    pub geographic_distribution: Option<GeographicDistribution>,
    #[serde(default)]
    pub competitive_intensity: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

/// 記憶體內的來源，適合發佈的統計表或人工整理的估計值
pub struct StaticSource {
    id: String,
    quality: u8,
    synthetic: bool,
    min_match_score: f64,
    mapping: CodeMapping,
    records: Vec<StaticRecord>,
    data_source: Option<String>,
}

impl StaticSource {
    pub fn new(id: impl Into<String>, quality: u8, mapping: CodeMapping) -> Self {
        Self {
            id: id.into(),
            quality,
            synthetic: false,
            min_match_score: crate::adapters::DEFAULT_MIN_MATCH_SCORE,
            mapping,
            records: Vec::new(),
            data_source: None,
        }
    }

    pub fn with_records(mut self, records: Vec<StaticRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn with_min_match_score(mut self, score: f64) -> Self {
        self.min_match_score = score;
        self
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    /// 依查詢年份挑選；未指定時取最新年份
    fn select_record(&self, code: &str, options: &QueryOptions) -> Option<&StaticRecord> {
        self.records
            .iter()
            .filter(|r| r.code == code)
            .filter(|r| match (options.year, r.year) {
                (Some(wanted), Some(year)) => wanted == year,
                (Some(_), None) => false,
                (None, year) => {
                    let after_start = options
                        .start_year
                        .map_or(true, |start| year.map_or(true, |y| y >= start));
                    let before_end = options
                        .end_year
                        .map_or(true, |end| year.map_or(true, |y| y <= end));
                    after_start && before_end
                }
            })
            .max_by_key(|r| r.year.unwrap_or(i32::MIN))
    }

    fn lookup(&self, industry: &str, options: &QueryOptions) -> Result<SourceRecord> {
        let found = resolve_code(&self.mapping, industry, self.min_match_score)?;
        tracing::debug!(
            "📊 {}: code {} for {} (match score: {:.2})",
            self.id,
            found.code,
            industry,
            found.match_score
        );

        let record = self
            .select_record(&found.code, options)
            .ok_or_else(|| MarketDataError::SourceUnavailable {
                source_id: self.id.clone(),
                message: format!("No data for code {}", found.code),
            })?;

        Ok(SourceRecord {
            has_data: true,
            source: self.id.clone(),
            source_quality: Some(self.quality),
            global_market_size: record.global_market_size,
            growth_rate: record.growth_rate,
            geographic_distribution: record
                .geographic_distribution
                .clone()
                .map(crate::core::aggregator::normalize_distribution),
            competitive_intensity: record.competitive_intensity,
            year: record.year,
            synthetic: self.synthetic,
            data_source: self.data_source.clone(),
            industry_match: Some(found),
            error: None,
        })
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch_data(&self, industry: &str, options: &QueryOptions) -> SourceRecord {
        match self.lookup(industry, options) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("😬 {}: {}", self.id, e);
                SourceRecord::no_data(self.id.clone(), e.to_string())
            }
        }
    }
}

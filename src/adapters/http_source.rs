use crate::adapters::resolve_code;
use crate::core::aggregator::normalize_distribution;
use crate::core::resolver::CodeMapping;
use crate::domain::model::{GeographicDistribution, IndustryMatch, QueryOptions, SourceRecord};
use crate::domain::ports::SourceAdapter;
use crate::utils::error::{MarketDataError, Result};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP 回應中可辨識的欄位
#[derive(Debug, Default, Deserialize)]
struct SourcePayload {
    #[serde(default)]
    has_data: Option<bool>,
    #[serde(default)]
    global_market_size: Option<f64>,
    #[serde(default)]
    growth_rate: Option<f64>,
    #[serde(default)]
    geographic_distribution: Option<GeographicDistribution>,
    #[serde(default)]
    competitive_intensity: Option<f64>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    data_source: Option<String>,
}

impl SourcePayload {
    fn has_metrics(&self) -> bool {
        self.global_market_size.is_some()
            || self.growth_rate.is_some()
            || self.geographic_distribution.is_some()
            || self.competitive_intensity.is_some()
    }
}

/// 透過 HTTP JSON 端點取得資料的來源
///
/// 端點可使用 `{code}`、`{industry}`、`{year}`、`{start_year}`、`{end_year}`
/// 佔位符；憑證只以 header 或查詢參數原樣帶過。
pub struct HttpSource {
    id: String,
    quality: u8,
    synthetic: bool,
    min_match_score: f64,
    mapping: CodeMapping,
    endpoint: String,
    headers: HashMap<String, String>,
    parameters: HashMap<String, String>,
    timeout: Option<Duration>,
    field_mapping: HashMap<String, String>,
    client: Client,
}

impl HttpSource {
    pub fn new(
        id: impl Into<String>,
        quality: u8,
        endpoint: impl Into<String>,
        mapping: CodeMapping,
    ) -> Self {
        Self {
            id: id.into(),
            quality,
            synthetic: false,
            min_match_score: crate::adapters::DEFAULT_MIN_MATCH_SCORE,
            mapping,
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            parameters: HashMap::new(),
            timeout: None,
            field_mapping: HashMap::new(),
            client: Client::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 回應欄位名稱 -> SourceRecord 欄位名稱
    pub fn with_field_mapping(mut self, field_mapping: HashMap<String, String>) -> Self {
        self.field_mapping = field_mapping;
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

    /// 替換端點中的佔位符
    fn build_endpoint(
        &self,
        found: &IndustryMatch,
        industry: &str,
        options: &QueryOptions,
    ) -> Result<String> {
        let current_year = Utc::now().year();
        let year = options.year.unwrap_or(current_year - 1);
        let start_year = options.start_year.unwrap_or(current_year - 4);
        let end_year = options.end_year.unwrap_or(current_year - 1);

        let replacements = [
            ("{code}", encode(&found.code)),
            ("{industry}", encode(industry)),
            ("{year}", year.to_string()),
            ("{start_year}", start_year.to_string()),
            ("{end_year}", end_year.to_string()),
        ];

        let mut endpoint = self.endpoint.clone();
        for (placeholder, value) in &replacements {
            endpoint = endpoint.replace(placeholder, value);
        }

        // 檢查是否還有未替換的參數
        if endpoint.contains('{') && endpoint.contains('}') {
            return Err(MarketDataError::ConfigError {
                message: format!("Unresolved parameters in endpoint: {}", endpoint),
            });
        }

        Ok(endpoint)
    }

    /// 依欄位映射重新命名回應中的鍵
    fn apply_field_mapping(
        &self,
        obj: serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        if self.field_mapping.is_empty() {
            return obj;
        }
        obj.into_iter()
            .map(|(key, value)| {
                let mapped = self.field_mapping.get(&key).cloned().unwrap_or(key);
                (mapped, value)
            })
            .collect()
    }

    async fn fetch_record(&self, industry: &str, options: &QueryOptions) -> Result<SourceRecord> {
        let found = resolve_code(&self.mapping, industry, self.min_match_score)?;
        let endpoint = self.build_endpoint(&found, industry, options)?;
        tracing::debug!("📡 {}: GET {}", self.id, endpoint);

        let mut request = self.client.get(&endpoint);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if !self.parameters.is_empty() {
            request = request.query(&self.parameters);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::SourceUnavailable {
                source_id: self.id.clone(),
                message: format!("HTTP {}", status),
            });
        }

        let json_data: serde_json::Value = response.json().await?;
        let serde_json::Value::Object(obj) = json_data else {
            return Err(MarketDataError::SourceUnavailable {
                source_id: self.id.clone(),
                message: "Expected a JSON object response".to_string(),
            });
        };

        let payload: SourcePayload =
            serde_json::from_value(serde_json::Value::Object(self.apply_field_mapping(obj)))?;
        let has_data = payload.has_data.unwrap_or(true) && payload.has_metrics();
        if !has_data {
            return Err(MarketDataError::SourceUnavailable {
                source_id: self.id.clone(),
                message: format!("No data returned for code {}", found.code),
            });
        }

        Ok(SourceRecord {
            has_data,
            source: self.id.clone(),
            source_quality: Some(self.quality),
            global_market_size: payload.global_market_size,
            growth_rate: payload.growth_rate,
            geographic_distribution: payload.geographic_distribution.map(normalize_distribution),
            competitive_intensity: payload.competitive_intensity,
            year: payload.year,
            synthetic: self.synthetic,
            data_source: payload.data_source,
            industry_match: Some(found),
            error: None,
        })
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn fetch_data(&self, industry: &str, options: &QueryOptions) -> SourceRecord {
        match self.fetch_record(industry, options).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("🚨 {} error for {}: {}", self.id, industry, e);
                SourceRecord::no_data(self.id.clone(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MatchType;
    use httpmock::prelude::*;

    fn mapping() -> CodeMapping {
        CodeMapping::new()
            .with_entry("Software", "511210")
            .with_entry("Healthcare", "621111")
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/industries/511210");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "global_market_size": 300.0,
                    "growth_rate": 0.05,
                    "geographic_distribution": {"US": 0.6, "EU": 0.4},
                    "year": 2023
                }));
        });

        let source = HttpSource::new("bls", 4, server.url("/industries/{code}"), mapping());
        let record = source.fetch_data("Software", &QueryOptions::default()).await;

        api_mock.assert();
        assert!(record.has_data);
        assert_eq!(record.source_quality, Some(4));
        assert_eq!(record.global_market_size, Some(300.0));
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.industry_match.unwrap().match_type, MatchType::Exact);
    }

    #[tokio::test]
    async fn test_headers_parameters_and_year_placeholders() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/series/621111/2020/2022")
                .header("X-Api-Key", "secret")
                .query_param("format", "json");
            then.status(200).json_body(serde_json::json!({"growth_rate": 0.03}));
        });

        let source = HttpSource::new(
            "world_bank",
            3,
            server.url("/series/{code}/{start_year}/{end_year}"),
            mapping(),
        )
        .with_headers(HashMap::from([("X-Api-Key".to_string(), "secret".to_string())]))
        .with_parameters(HashMap::from([("format".to_string(), "json".to_string())]))
        .with_timeout(Duration::from_secs(5));

        let options = QueryOptions {
            start_year: Some(2020),
            end_year: Some(2022),
            ..Default::default()
        };
        let record = source.fetch_data("healthcare", &options).await;

        api_mock.assert();
        assert!(record.has_data);
        assert_eq!(record.growth_rate, Some(0.03));
        assert!(record.global_market_size.is_none());
    }

    #[tokio::test]
    async fn test_field_mapping_renames_response_keys() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/511210");
            then.status(200).json_body(serde_json::json!({
                "marketSizeBillions": 412.5,
                "cagr": 0.081,
                "regions": {"North America": 1.0, "Europe": 1.0}
            }));
        });

        let source = HttpSource::new("sec", 3, server.url("/{code}"), mapping())
            .with_field_mapping(HashMap::from([
                ("marketSizeBillions".to_string(), "global_market_size".to_string()),
                ("cagr".to_string(), "growth_rate".to_string()),
                ("regions".to_string(), "geographic_distribution".to_string()),
            ]))
            .with_synthetic(true);

        let record = source.fetch_data("Software", &QueryOptions::default()).await;
        assert!(record.has_data);
        assert!(record.synthetic);
        assert_eq!(record.global_market_size, Some(412.5));
        assert_eq!(record.growth_rate, Some(0.081));
        assert_eq!(record.geographic_distribution.unwrap()["Europe"], 0.5);
    }

    #[tokio::test]
    async fn test_server_error_becomes_no_data() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/511210");
            then.status(500);
        });

        let source = HttpSource::new("bls", 4, server.url("/{code}"), mapping());
        let record = source.fetch_data("Software", &QueryOptions::default()).await;

        api_mock.assert();
        assert!(!record.has_data);
        assert_eq!(record.source, "bls");
        assert!(record.error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_or_malformed_payload_becomes_no_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/511210");
            then.status(200).json_body(serde_json::json!({"has_data": false}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/621111");
            then.status(200).json_body(serde_json::json!([1, 2, 3]));
        });

        let source = HttpSource::new("bls", 4, server.url("/{code}"), mapping());

        let record = source.fetch_data("Software", &QueryOptions::default()).await;
        assert!(!record.has_data);

        let record = source.fetch_data("Healthcare", &QueryOptions::default()).await;
        assert!(!record.has_data);
        assert!(record.error.unwrap().contains("JSON object"));
    }

    #[tokio::test]
    async fn test_unresolved_industry_makes_no_request() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(serde_json::json!({"growth_rate": 0.1}));
        });

        let source = HttpSource::new("bls", 4, server.url("/{code}"), mapping());
        let record = source
            .fetch_data("Quantum Basket Weaving", &QueryOptions::default())
            .await;

        api_mock.assert_hits(0);
        assert!(!record.has_data);
    }

    #[test]
    fn test_unknown_placeholder_is_rejected() {
        let source = HttpSource::new("bls", 4, "https://example.com/{code}/{region}", mapping());
        let found = IndustryMatch {
            industry: "Software".to_string(),
            code: "511210".to_string(),
            match_score: 1.0,
            match_type: MatchType::Exact,
        };
        let err = source
            .build_endpoint(&found, "Software", &QueryOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("{region}"));
    }

    #[test]
    fn test_industry_placeholder_is_encoded() {
        let source = HttpSource::new("bls", 4, "https://example.com/search?q={industry}", mapping());
        let found = IndustryMatch {
            industry: "Software".to_string(),
            code: "511210".to_string(),
            match_score: 1.0,
            match_type: MatchType::Exact,
        };
        let endpoint = source
            .build_endpoint(&found, "Food & Beverage", &QueryOptions::default())
            .unwrap();
        assert_eq!(endpoint, "https://example.com/search?q=Food+%26+Beverage");
    }
}

//! 多來源市場資料合併
//!
//! 各來源的可靠度、涵蓋範圍與提供的指標都不同；以來源品質作為權重，
//! 逐項指標獨立合併，並計算永不為 0 或 1 的信心分數。

use crate::domain::model::{
    AggregatedResult, Confidence, GeographicDistribution, SourceDetail, SourceError,
    SourceRecord, MAX_SOURCE_QUALITY,
};
use chrono::{Datelike, Utc};

const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;
const SIZE_ONLY_FACTOR: f64 = 0.8;
const GROWTH_ONLY_FACTOR: f64 = 0.6;

pub const NO_DATA_EXPLANATION: &str = "No reliable market data found for this industry.";

/// 合併所有來源的部分資料；沒有資料是正常結果，不是錯誤
pub fn aggregate(records: &[SourceRecord], industry: &str) -> AggregatedResult {
    let current_year = Utc::now().year();
    let valid: Vec<&SourceRecord> = records.iter().filter(|r| r.has_data).collect();

    if valid.is_empty() {
        let mut result = AggregatedResult::empty(industry, current_year);
        result.sources = records
            .iter()
            .filter(|r| !r.source.is_empty())
            .map(|r| r.source.clone())
            .collect();
        result.errors = records
            .iter()
            .filter_map(|r| {
                r.error.as_ref().map(|error| SourceError {
                    source: r.source.clone(),
                    error: error.clone(),
                })
            })
            .collect();
        result.explanation = NO_DATA_EXPLANATION.to_string();
        return result;
    }

    // 市場規模
    let size_sources: Vec<&SourceRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.global_market_size.is_some())
        .collect();
    let market_size = weighted_average(&size_sources, |r| r.global_market_size);
    let market_size_confidence = compute_confidence(&size_sources);
    let market_size_year = size_sources
        .iter()
        .map(|r| r.year.unwrap_or(current_year))
        .max();

    // 成長率
    let growth_sources: Vec<&SourceRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.growth_rate.is_some())
        .collect();
    let growth_rate = weighted_average(&growth_sources, |r| r.growth_rate);
    let growth_rate_confidence = compute_confidence(&growth_sources);

    let geographic_distribution = combine_geography(&valid);

    let overall = overall_confidence(
        market_size.map(|_| market_size_confidence),
        growth_rate.map(|_| growth_rate_confidence),
    );

    let mut result = AggregatedResult::empty(industry, market_size_year.unwrap_or(current_year));
    result.has_data = true;
    result.global_market_size = market_size;
    result.display_market_size = market_size.map(format_market_size);
    result.growth_rate = growth_rate;
    result.display_growth_rate = growth_rate.map(format_growth_rate);
    result.geographic_distribution = geographic_distribution;
    result.confidence = Confidence {
        overall,
        market_size: market_size_confidence,
        growth_rate: growth_rate_confidence,
    };
    result.sources = valid.iter().map(|r| r.source.clone()).collect();
    result.source_count = valid.len();
    result.source_details = valid
        .iter()
        .map(|r| SourceDetail {
            name: r.source.clone(),
            quality: r.source_quality,
            provided_metrics: r.provided_metrics(),
            data_source: r.data_source.clone().unwrap_or_else(|| r.source.clone()),
        })
        .collect();
    result
}

fn weighted_average<F>(sources: &[&SourceRecord], value: F) -> Option<f64>
where
    F: Fn(&SourceRecord) -> Option<f64>,
{
    let (weighted_sum, weight_sum) = sources
        .iter()
        .filter_map(|r| value(r).map(|v| (v, f64::from(r.quality()))))
        .fold((0.0, 0.0), |(sum, weights), (v, w)| (sum + v * w, weights + w));

    (weight_sum > 0.0).then(|| weighted_sum / weight_sum)
}

/// 依來源品質加權累加各地區比例，再重新正規化為總和 1
fn combine_geography(sources: &[&SourceRecord]) -> Option<GeographicDistribution> {
    let mut combined = GeographicDistribution::new();
    let mut any = false;

    for source in sources {
        if let Some(distribution) = &source.geographic_distribution {
            any = true;
            let weight = f64::from(source.quality());
            for (region, value) in distribution {
                *combined.entry(region.clone()).or_insert(0.0) += value * weight;
            }
        }
    }

    any.then(|| normalize_distribution(combined))
}

/// 將比例正規化為總和 1；總和不為正時原樣回傳
pub fn normalize_distribution(mut distribution: GeographicDistribution) -> GeographicDistribution {
    let total: f64 = distribution.values().sum();
    if total > 0.0 {
        for value in distribution.values_mut() {
            *value /= total;
        }
    }
    distribution
}

/// 根據來源數量與品質計算信心分數
///
/// 空集合回傳 0，否則結果限制在 `[0.1, 0.9]`。
pub fn compute_confidence(sources: &[&SourceRecord]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }

    let count = sources.len() as f64;
    let base = (count * 0.15).min(0.5);

    let total_quality: f64 = sources.iter().map(|s| f64::from(s.quality())).sum();
    let quality_factor = total_quality / (count * f64::from(MAX_SOURCE_QUALITY));

    let synthetic_count = sources.iter().filter(|s| s.synthetic).count();
    let synthetic_penalty = if synthetic_count > 0 {
        (synthetic_count as f64 / count) * 0.5
    } else {
        0.0
    };

    (base + quality_factor * 0.4 - synthetic_penalty).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// 整體信心取最弱的一環；只有單一指標時打折
pub fn overall_confidence(market_size: Option<f64>, growth_rate: Option<f64>) -> f64 {
    match (market_size, growth_rate) {
        (Some(size), Some(growth)) => size.min(growth),
        (Some(size), None) => size * SIZE_ONLY_FACTOR,
        (None, Some(growth)) => growth * GROWTH_ONLY_FACTOR,
        (None, None) => MIN_CONFIDENCE,
    }
}

/// 市場規模以十億美元為單位
pub fn format_market_size(market_size: f64) -> String {
    if market_size >= 1000.0 {
        format!("${:.2} trillion", market_size / 1000.0)
    } else {
        format!("${:.2} billion", market_size)
    }
}

pub fn format_growth_rate(growth_rate: f64) -> String {
    format!("{:.1}%", growth_rate * 100.0)
}

pub fn generate_explanation(result: &AggregatedResult) -> String {
    if !result.has_data {
        return NO_DATA_EXPLANATION.to_string();
    }

    let count = result.sources.len();
    let mut explanation = format!(
        "Market data for {} industry based on {} source{}",
        result.industry,
        count,
        if count == 1 { "" } else { "s" }
    );

    match (result.global_market_size, result.growth_rate) {
        (Some(size), growth) => {
            explanation.push_str(&format!(
                ", indicating a global market size of approximately {}",
                format_market_size(size)
            ));
            if let Some(growth) = growth {
                explanation.push_str(&format!(
                    " with an annual growth rate of {}",
                    format_growth_rate(growth)
                ));
            }
        }
        (None, Some(growth)) => {
            explanation.push_str(&format!(
                ", indicating an annual growth rate of {}",
                format_growth_rate(growth)
            ));
        }
        (None, None) => {}
    }
    explanation.push('.');

    let overall = result.confidence.overall;
    if overall < 0.3 {
        explanation.push_str(" This data has low confidence due to limited sources or data quality.");
    } else if overall < 0.6 {
        explanation.push_str(" This data has moderate confidence based on available sources.");
    } else {
        explanation
            .push_str(" This data has relatively high confidence based on multiple quality sources.");
    }

    explanation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, quality: u8) -> SourceRecord {
        SourceRecord {
            has_data: true,
            source: source.to_string(),
            source_quality: Some(quality),
            ..Default::default()
        }
    }

    fn geo(pairs: &[(&str, f64)]) -> GeographicDistribution {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_empty_input_has_no_data() {
        let result = aggregate(&[], "Software");
        assert!(!result.has_data);
        assert!(result.sources.is_empty());
        assert_eq!(result.explanation, NO_DATA_EXPLANATION);
    }

    #[test]
    fn test_no_data_collects_attempted_sources_and_errors() {
        let records = vec![
            SourceRecord::no_data("bls", "No matching NAICS code found"),
            SourceRecord::no_data("world_bank", "timed out"),
        ];
        let result = aggregate(&records, "Software");

        assert!(!result.has_data);
        assert_eq!(result.sources, vec!["bls", "world_bank"]);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[1].error, "timed out");
        assert!(result.global_market_size.is_none());
        assert!(result.growth_rate.is_none());
        assert!(result.geographic_distribution.is_none());
        assert_eq!(result.source_count, 0);
    }

    #[test]
    fn test_weighted_average_by_quality() {
        let mut a = record("a", 5);
        a.global_market_size = Some(100.0);
        let mut b = record("b", 1);
        b.global_market_size = Some(200.0);

        let result = aggregate(&[a, b], "Software");
        assert_close(result.global_market_size.unwrap(), 700.0 / 6.0);
        assert!(result.growth_rate.is_none());
    }

    #[test]
    fn test_missing_quality_defaults_to_three() {
        let mut a = record("a", 3);
        a.source_quality = None;
        a.growth_rate = Some(0.1);
        let mut b = record("b", 1);
        b.growth_rate = Some(0.2);

        let result = aggregate(&[a, b], "Software");
        assert_close(result.growth_rate.unwrap(), (0.1 * 3.0 + 0.2) / 4.0);
        assert_eq!(result.source_details[0].quality, None);
    }

    #[test]
    fn test_two_source_blend() {
        let mut a = record("a", 4);
        a.global_market_size = Some(300.0);
        a.growth_rate = Some(0.05);
        a.geographic_distribution = Some(geo(&[("US", 0.6), ("EU", 0.4)]));
        let mut b = record("b", 3);
        b.global_market_size = Some(350.0);
        b.growth_rate = Some(0.07);

        let result = aggregate(&[a, b], "Software");

        assert!(result.has_data);
        assert_close(result.global_market_size.unwrap(), 321.4286);
        assert_close(result.growth_rate.unwrap(), 0.0586);
        let distribution = result.geographic_distribution.unwrap();
        assert_close(distribution["US"], 0.6);
        assert_close(distribution["EU"], 0.4);
        assert_eq!(
            result.confidence.overall,
            result.confidence.market_size.min(result.confidence.growth_rate)
        );
        assert_eq!(result.display_market_size.as_deref(), Some("$321.43 billion"));
        assert_eq!(result.display_growth_rate.as_deref(), Some("5.9%"));
        assert_eq!(result.source_count, 2);
    }

    #[test]
    fn test_geography_sums_to_one() {
        let mut a = record("a", 5);
        a.geographic_distribution = Some(geo(&[("US", 0.5), ("EU", 0.3), ("APAC", 0.2)]));
        let mut b = record("b", 2);
        b.geographic_distribution = Some(geo(&[("US", 0.2), ("LATAM", 0.8)]));
        let mut c = record("c", 3);
        c.global_market_size = Some(10.0);

        let result = aggregate(&[a, b, c], "Retail");
        let distribution = result.geographic_distribution.unwrap();
        let total: f64 = distribution.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(distribution.len(), 4);
    }

    #[test]
    fn test_compute_confidence_bounds() {
        assert_eq!(compute_confidence(&[]), 0.0);

        let low = record("low", 1);
        let mut synthetic = record("synthetic", 1);
        synthetic.synthetic = true;
        let value = compute_confidence(&[&synthetic]);
        assert_eq!(value, MIN_CONFIDENCE);

        let high: Vec<SourceRecord> = (0..6).map(|i| record(&format!("s{i}"), 5)).collect();
        let refs: Vec<&SourceRecord> = high.iter().collect();
        assert_close(compute_confidence(&refs), MAX_CONFIDENCE);

        let value = compute_confidence(&[&low]);
        assert!((MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&value));
        assert_close(value, 0.15 + 0.2 * 0.4);
    }

    #[test]
    fn test_synthetic_sources_are_penalized() {
        let observed = record("observed", 4);
        let mut estimated = record("estimated", 4);
        estimated.synthetic = true;

        let clean = compute_confidence(&[&observed, &observed]);
        let mixed = compute_confidence(&[&observed, &estimated]);
        assert!(mixed < clean);
        assert_close(clean - mixed, 0.25);
    }

    #[test]
    fn test_overall_confidence_rules() {
        assert_eq!(overall_confidence(Some(0.5), Some(0.4)), 0.4);
        assert_close(overall_confidence(Some(0.5), None), 0.4);
        assert_close(overall_confidence(None, Some(0.5)), 0.3);
        assert_eq!(overall_confidence(None, None), 0.1);

        // 只有地理分佈的來源
        let mut a = record("a", 4);
        a.geographic_distribution = Some(geo(&[("US", 1.0)]));
        let result = aggregate(&[a], "Software");
        assert!(result.has_data);
        assert_eq!(result.confidence.overall, 0.1);
        assert_eq!(result.confidence.market_size, 0.0);
    }

    #[test]
    fn test_year_is_latest_market_size_year() {
        let mut a = record("a", 4);
        a.global_market_size = Some(1.0);
        a.year = Some(2021);
        let mut b = record("b", 4);
        b.global_market_size = Some(2.0);
        b.year = Some(2023);
        let mut c = record("c", 4);
        c.growth_rate = Some(0.1);
        c.year = Some(2030);

        let result = aggregate(&[a, b, c], "Software");
        assert_eq!(result.year, 2023);
    }

    #[test]
    fn test_source_details() {
        let mut a = record("bls", 4);
        a.global_market_size = Some(1.0);
        a.competitive_intensity = Some(0.4);
        a.data_source = Some("BLS CES".to_string());
        let mut b = record("world_bank", 3);
        b.growth_rate = Some(0.02);

        let result = aggregate(&[a, b, SourceRecord::no_data("sec", "down")], "Software");
        assert_eq!(result.sources, vec!["bls", "world_bank"]);
        assert_eq!(result.source_details[0].data_source, "BLS CES");
        assert_eq!(
            result.source_details[0].provided_metrics,
            vec!["market_size", "competitive_intensity"]
        );
        assert_eq!(result.source_details[1].data_source, "world_bank");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(format_market_size(1500.0), "$1.50 trillion");
        assert_eq!(format_market_size(999.994), "$999.99 billion");
        assert_eq!(format_growth_rate(0.0586), "5.9%");
    }

    #[test]
    fn test_explanation() {
        let mut a = record("a", 5);
        a.global_market_size = Some(1200.0);
        a.growth_rate = Some(0.1);
        let mut result = aggregate(&[a], "Software");
        let explanation = generate_explanation(&result);
        assert!(explanation.starts_with(
            "Market data for Software industry based on 1 source, indicating a global market size of approximately $1.20 trillion with an annual growth rate of 10.0%."
        ));
        assert!(explanation.contains("moderate confidence"));

        result.global_market_size = None;
        result.confidence.overall = 0.2;
        let explanation = generate_explanation(&result);
        assert!(explanation.contains("indicating an annual growth rate of 10.0%."));
        assert!(explanation.contains("low confidence"));

        result.sources.push("b".to_string());
        result.confidence.overall = 0.7;
        let explanation = generate_explanation(&result);
        assert!(explanation.contains("based on 2 sources"));
        assert!(explanation.contains("relatively high confidence"));

        assert_eq!(
            generate_explanation(&aggregate(&[], "Software")),
            NO_DATA_EXPLANATION
        );
    }
}

use crate::domain::model::{IndustryMatch, MatchType};
use serde::{Deserialize, Serialize};

/// 候選分數門檻
pub const CANDIDATE_THRESHOLD: f64 = 0.4;

/// 慣例上的預設代碼鍵
pub const DEFAULT_CODE_KEY: &str = "DEFAULT_GROWTH";

/// 回退結果使用的產業名稱
pub const FALLBACK_INDUSTRY: &str = "DEFAULT";

const WORD_WEIGHT: f64 = 0.6;
const SUBSTRING_WEIGHT: f64 = 0.3;
const CHAR_WEIGHT: f64 = 0.1;
const SUBSTRING_SIGNAL: f64 = 0.8;
const MIN_SIGNIFICANT_WORD_LEN: usize = 3;

/// 產業名稱到來源分類代碼的有序對照表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMapping {
    entries: Vec<(String, String)>,
    default_code: Option<String>,
}

impl CodeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, industry: impl Into<String>, code: impl Into<String>) -> Self {
        self.insert(industry, code);
        self
    }

    pub fn with_default(mut self, code: impl Into<String>) -> Self {
        self.default_code = Some(code.into());
        self
    }

    /// 保留插入順序；同名鍵覆寫原位置的代碼
    pub fn insert(&mut self, industry: impl Into<String>, code: impl Into<String>) {
        let industry = industry.into();
        let code = code.into();
        match self.entries.iter_mut().find(|(key, _)| *key == industry) {
            Some(entry) => entry.1 = code,
            None => self.entries.push((industry, code)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, industry: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == industry).map(|(_, v)| v)
    }

    /// 明確指定的預設代碼，其次是 `DEFAULT_GROWTH`，最後是第一個值
    pub fn default_code(&self) -> Option<&str> {
        self.default_code
            .as_deref()
            .or_else(|| self.get(DEFAULT_CODE_KEY))
            .or_else(|| self.entries.first().map(|(_, v)| v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CodeMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = CodeMapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// 三種相似度訊號（未加權）
#[derive(Debug, Clone, Copy, PartialEq)]
struct Signals {
    word: f64,
    substring: f64,
    chars: f64,
    shared_words: usize,
}

impl Signals {
    fn compute(a: &str, b: &str) -> Self {
        let str1 = normalize(a);
        let str2 = normalize(b);

        let words1: Vec<&str> = str1.split_whitespace().collect();
        let words2: Vec<&str> = str2.split_whitespace().collect();

        let shared_words = words1
            .iter()
            .filter(|w| w.chars().count() >= MIN_SIGNIFICANT_WORD_LEN && words2.contains(w))
            .count();
        let max_words = words1.len().max(words2.len());
        let word = if max_words > 0 {
            shared_words as f64 / max_words as f64
        } else {
            0.0
        };

        let substring = if !str1.is_empty()
            && !str2.is_empty()
            && (str1.contains(str2.as_str()) || str2.contains(str1.as_str()))
        {
            SUBSTRING_SIGNAL
        } else {
            0.0
        };

        let chars1: Vec<char> = str1.chars().collect();
        let chars2: Vec<char> = str2.chars().collect();
        let max_len = chars1.len().max(chars2.len());
        let chars = if max_len > 0 {
            let matching = chars1
                .iter()
                .zip(chars2.iter())
                .filter(|(c1, c2)| c1 == c2)
                .count();
            matching as f64 / max_len as f64
        } else {
            0.0
        };

        Self {
            word,
            substring,
            chars,
            shared_words,
        }
    }

    /// 取加權訊號的最大值，避免弱訊號稀釋強訊號
    fn score(&self) -> f64 {
        (self.word * WORD_WEIGHT)
            .max(self.substring * SUBSTRING_WEIGHT)
            .max(self.chars * CHAR_WEIGHT)
    }

    fn qualifies(&self) -> bool {
        self.score() > CANDIDATE_THRESHOLD || (self.substring > 0.0 && self.shared_words > 0)
    }
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}

/// 兩個產業名稱的相似度，範圍 0..=1
pub fn similarity_score(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.to_lowercase() == b.to_lowercase() {
        return 1.0;
    }
    Signals::compute(a, b).score()
}

/// 將自由文字產業名稱對應到對照表中的代碼
///
/// 只有在輸入為空白或對照表為空時回傳 `None`；找不到合適候選時回傳
/// `MatchType::Fallback`，分數為 0。
pub fn resolve(industry: &str, mapping: &CodeMapping) -> Option<IndustryMatch> {
    let industry = industry.trim();
    if industry.is_empty() || mapping.is_empty() {
        return None;
    }

    let lower = industry.to_lowercase();
    if let Some((key, code)) = mapping.iter().find(|(key, _)| key.to_lowercase() == lower) {
        return Some(IndustryMatch {
            industry: key.to_string(),
            code: code.to_string(),
            match_score: 1.0,
            match_type: MatchType::Exact,
        });
    }

    let mut best: Option<(f64, &str, &str)> = None;
    for (key, code) in mapping.iter() {
        let signals = Signals::compute(industry, key);
        if !signals.qualifies() {
            continue;
        }
        let score = signals.score();
        // 嚴格大於：同分時保留先插入的鍵
        if best.map_or(true, |(best_score, _, _)| score > best_score) {
            best = Some((score, key, code));
        }
    }

    if let Some((score, key, code)) = best {
        tracing::debug!("Resolved '{}' to '{}' ({}) score {:.2}", industry, key, code, score);
        return Some(IndustryMatch {
            industry: key.to_string(),
            code: code.to_string(),
            match_score: score,
            match_type: MatchType::Partial,
        });
    }

    let code = mapping.default_code()?;
    tracing::debug!("No mapping matched '{}', falling back to {}", industry, code);
    Some(IndustryMatch {
        industry: FALLBACK_INDUSTRY.to_string(),
        code: code.to_string(),
        match_score: 0.0,
        match_type: MatchType::Fallback,
    })
}

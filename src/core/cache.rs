//! 市場資料快取
//!
//! 避免重複打到有流量限制的外部來源。快取在整個行程內共用，
//! 讀寫都經過 `RwLock`，統計計數使用 atomic。

use crate::domain::model::CacheStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// 預設存活時間：24 小時
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub cached_at: DateTime<Utc>,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct MarketDataCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> MarketDataCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 清理週期為 TTL 的十分之一
    pub fn sweep_interval(&self) -> Duration {
        (self.ttl / 10).max(MIN_SWEEP_INTERVAL)
    }

    /// 由 scope、產業名稱與查詢選項組成快取鍵
    ///
    /// 產業名稱轉小寫、去頭尾空白、空白轉底線；選項以排序後的 JSON
    /// 附加在後，因此欄位順序不影響鍵值。
    pub fn generate_key<O: Serialize + ?Sized>(scope: &str, industry: &str, options: &O) -> String {
        let normalized_industry = industry
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");

        let mut key = format!("{}:{}", scope, normalized_industry);

        if let Some(options) = canonical_options(options) {
            key.push(':');
            key.push_str(&options);
        }

        key
    }

    pub fn get<O: Serialize + ?Sized>(&self, scope: &str, industry: &str, options: &O) -> Option<V> {
        self.get_entry(scope, industry, options)
            .map(|entry| entry.value)
    }

    /// 同 `get`，但連同寫入時間一起回傳
    pub fn get_entry<O: Serialize + ?Sized>(
        &self,
        scope: &str,
        industry: &str,
        options: &O,
    ) -> Option<CacheEntry<V>> {
        let key = Self::generate_key(scope, industry, options);
        let now = Instant::now();

        let found = self
            .read()
            .get(&key)
            .filter(|entry| !entry.is_expired(now))
            .cloned();

        match found {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache hit: {}", key);
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Cache miss: {}", key);
                self.remove_if_expired(&key, now);
                None
            }
        }
    }

    pub fn set<O: Serialize + ?Sized>(&self, scope: &str, industry: &str, value: V, options: &O) {
        self.set_with_ttl(scope, industry, value, options, self.ttl);
    }

    /// 以單一 entry 整體替換，讀者不會看到寫到一半的值
    pub fn set_with_ttl<O: Serialize + ?Sized>(
        &self,
        scope: &str,
        industry: &str,
        value: V,
        options: &O,
        ttl: Duration,
    ) {
        let key = Self::generate_key(scope, industry, options);
        let entry = CacheEntry {
            key: key.clone(),
            value,
            cached_at: Utc::now(),
            expires_at: Instant::now() + ttl,
        };

        self.write().insert(key, entry);
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn has<O: Serialize + ?Sized>(&self, scope: &str, industry: &str, options: &O) -> bool {
        let key = Self::generate_key(scope, industry, options);
        let now = Instant::now();
        self.read()
            .get(&key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// 回傳刪除的鍵數 (0 或 1)
    pub fn delete<O: Serialize + ?Sized>(&self, scope: &str, industry: &str, options: &O) -> usize {
        let key = Self::generate_key(scope, industry, options);
        usize::from(self.write().remove(&key).is_some())
    }

    pub fn flush(&self) {
        self.write().clear();
        tracing::info!("🧹 Market data cache cleared");
    }

    /// 清除所有過期項目，回傳清除數量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let keys = self
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count();

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            keys,
        }
    }

    /// 啟動背景清理任務；只持有弱參照，快取釋放後任務自行結束
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即完成
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!("Cache sweep purged {} expired entries", purged);
                }
            }
        })
    }

    fn remove_if_expired(&self, key: &str, now: Instant) {
        let mut entries = self.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone + Send + Sync + 'static> Default for MarketDataCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// 選項轉成鍵排序的 JSON；沒有有效欄位時回傳 None
fn canonical_options<O: Serialize + ?Sized>(options: &O) -> Option<String> {
    let value = serde_json::to_value(options).ok()?;
    let value = canonicalize(value)?;
    match &value {
        serde_json::Value::Object(map) if map.is_empty() => None,
        _ => serde_json::to_string(&value).ok(),
    }
}

fn canonicalize(value: serde_json::Value) -> Option<serde_json::Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .filter_map(|(k, v)| canonicalize(v).map(|v| (k, v)))
                .collect();
            Some(serde_json::Value::Object(sorted.into_iter().collect()))
        }
        serde_json::Value::Array(items) => Some(serde_json::Value::Array(
            items
                .into_iter()
                .map(|v| canonicalize(v).unwrap_or(serde_json::Value::Null))
                .collect(),
        )),
        other => Some(other),
    }
}

use crate::domain::model::{QueryOptions, SourceRecord};
use async_trait::async_trait;

/// 外部資料來源的統一介面
///
/// 實作必須自行解析產業代碼，且永不失敗：任何內部錯誤都轉成
/// `SourceRecord::no_data`。
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// 穩定的來源識別碼
    fn source_id(&self) -> &str;

    async fn fetch_data(&self, industry: &str, options: &QueryOptions) -> SourceRecord;
}

//! 品目分類クライアント
//!
//! 1品目につき1回のAPI呼び出しで `aceita_meia_porcao` を得る。
//! 実装は [`Classifier`] トレイトの裏に隠し、テストではスタブに差し替える。

mod anthropic;
mod retry;

pub use anthropic::{AnthropicClassifier, AnthropicOptions};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use meia_porcao_common::FoodItem;
use thiserror::Error;

/// 分類呼び出しの失敗
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    /// レート制限・タイムアウト・5xx など（バックオフ付きで再試行）
    #[error("一時的なAPIエラー: {0}")]
    Transient(String),

    /// 認証失敗（実行全体を中断）
    #[error("API認証エラー: {0}")]
    Authentication(String),

    /// 応答がJSONでない・キーがない（1回だけ再試行）
    #[error("レスポンス形式エラー: {0}")]
    ResponseFormat(String),

    /// 再試行しても変わらないリクエスト拒否（その他の4xx）
    #[error("リクエスト拒否: {0}")]
    Rejected(String),

    /// 致命的エラーにより実行前に打ち切られた
    #[error("中断されました")]
    Cancelled,
}

impl ClassifyError {
    /// 同じ品目で再試行する価値があるか
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifyError::Transient(_) | ClassifyError::ResponseFormat(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ClassifyError::Authentication(_))
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// 品目がハーフポーションを受け付けるか判定する
    async fn classify(&self, item: &FoodItem, temperature: f32) -> Result<bool, ClassifyError>;
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HalfPortionError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。ANTHROPIC_API_KEY を設定するか `meia-porcao config --set-api-key YOUR_KEY` を実行してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("入力データが不正: {0}")]
    MalformedInput(String),

    #[error("API認証エラー: {0}")]
    Authentication(String),

    #[error("チェックポイントエラー: {0}")]
    Checkpoint(String),

    #[error("出力エラー: {0}")]
    Output(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl HalfPortionError {
    /// 実行全体を中断する致命的エラーか
    pub fn is_fatal_run_error(&self) -> bool {
        matches!(
            self,
            HalfPortionError::MalformedInput(_) | HalfPortionError::Authentication(_)
        )
    }
}

impl From<meia_porcao_common::Error> for HalfPortionError {
    fn from(err: meia_porcao_common::Error) -> Self {
        match err {
            meia_porcao_common::Error::Io(e) => HalfPortionError::Io(e),
            meia_porcao_common::Error::Json(e) => HalfPortionError::JsonParse(e),
            meia_porcao_common::Error::Parse(msg) => HalfPortionError::MalformedInput(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, HalfPortionError>;

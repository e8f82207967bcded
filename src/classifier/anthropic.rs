//! Anthropic Messages API 連携
//!
//! 1品目 = 1リクエスト。システム指示に判定基準、ユーザー入力に
//! `{nome_cardapio, unidade_caseira}` を渡し、応答テキストをパースする。

use super::{Classifier, ClassifyError};
use async_trait::async_trait;
use meia_porcao_common::{build_item_prompt, parse_classification_response, FoodItem, SYSTEM_INSTRUCTIONS};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// クライアント設定
#[derive(Debug, Clone)]
pub struct AnthropicOptions {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

pub struct AnthropicClassifier {
    client: reqwest::Client,
    api_key: String,
    options: AnthropicOptions,
}

// APIキーをDebug出力に含めない
impl std::fmt::Debug for AnthropicClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClassifier")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicClassifier {
    pub fn new(api_key: String, options: AnthropicOptions) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ClassifyError::Rejected(format!("HTTPクライアント初期化エラー: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            options,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.options.api_url.trim_end_matches('/'))
    }

    async fn send(&self, item: &FoodItem, temperature: f32) -> Result<String, ClassifyError> {
        let content = build_item_prompt(item)
            .map_err(|e| ClassifyError::Rejected(format!("入力の生成に失敗: {}", e)))?;

        let request = MessagesRequest {
            model: &self.options.model,
            max_tokens: self.options.max_tokens,
            temperature,
            system: SYSTEM_INSTRUCTIONS,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::Transient(format!("リクエスト失敗: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &body));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::ResponseFormat(format!("レスポンスJSONが不正: {}", e)))?;

        if let Some(usage) = &payload.usage {
            tracing::debug!(
                id = item.id,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "token usage"
            );
        }

        first_text(&payload)
            .map(str::to_string)
            .ok_or_else(|| ClassifyError::ResponseFormat("テキスト応答がありません".into()))
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, item: &FoodItem, temperature: f32) -> Result<bool, ClassifyError> {
        let text = self.send(item, temperature).await?;
        parse_classification_response(&text).map_err(|e| {
            let preview: String = text.chars().take(200).collect();
            ClassifyError::ResponseFormat(format!("{} (応答: {:?})", e, preview))
        })
    }
}

/// HTTPステータスをエラー種別に振り分ける
fn error_for_status(status: StatusCode, body: &str) -> ClassifyError {
    let message = format!("HTTP {}: {}", status.as_u16(), body.chars().take(300).collect::<String>());

    match status.as_u16() {
        401 | 403 => ClassifyError::Authentication(message),
        408 | 409 | 429 | 529 => ClassifyError::Transient(message),
        s if s >= 500 => ClassifyError::Transient(message),
        _ => ClassifyError::Rejected(message),
    }
}

fn first_text(response: &MessagesResponse) -> Option<&str> {
    response
        .content
        .iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, ""),
            ClassifyError::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, ""),
            ClassifyError::Authentication(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            ClassifyError::Transient(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::from_u16(529).unwrap(), "overloaded_error"),
            ClassifyError::Transient(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, ""),
            ClassifyError::Transient(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, "invalid model"),
            ClassifyError::Rejected(_)
        ));
    }

    #[test]
    fn test_first_text_block() {
        let payload: MessagesResponse = serde_json::from_str(
            r#"{
                "content": [{"type": "text", "text": "{\"aceita_meia_porcao\": true}"}],
                "usage": {"input_tokens": 812, "output_tokens": 12}
            }"#,
        )
        .unwrap();
        assert_eq!(first_text(&payload), Some(r#"{"aceita_meia_porcao": true}"#));
    }

    #[test]
    fn test_first_text_missing() {
        let payload: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(first_text(&payload).is_none());

        let payload: MessagesResponse =
            serde_json::from_str(r#"{"content": [{"type": "tool_use", "id": "x"}]}"#).unwrap();
        assert!(first_text(&payload).is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 50,
            temperature: 0.0,
            system: SYSTEM_INSTRUCTIONS,
            messages: vec![Message {
                role: "user",
                content: build_item_prompt(&FoodItem::new(1, "Ovo cozido", "Unidade")).unwrap(),
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 50);
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value["messages"][0]["content"].as_str().unwrap().contains("Ovo cozido"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let classifier = AnthropicClassifier::new(
            "sk-ant-secret".into(),
            AnthropicOptions {
                api_url: "https://api.anthropic.com".into(),
                model: "claude-sonnet-4-20250514".into(),
                max_tokens: 50,
                timeout: Duration::from_secs(5),
            },
        )
        .unwrap();
        let debug = format!("{:?}", classifier);
        assert!(!debug.contains("sk-ant-secret"));
        assert_eq!(classifier.endpoint(), "https://api.anthropic.com/v1/messages");
    }
}

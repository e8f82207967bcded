//! APIレスポンスパーサー
//!
//! モデルの応答テキストからJSONオブジェクトを抽出し、
//! `aceita_meia_porcao` の真偽値を取り出す。

use crate::error::{Error, Result};
use crate::types::RESULT_FIELD;
use serde_json::Value;

/// APIレスポンスからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} オブジェクト
/// 3. エラー
///
/// # Examples
/// ```
/// use meia_porcao_common::extract_json;
///
/// let response = "```json\n{\"aceita_meia_porcao\": true}\n```";
/// assert_eq!(extract_json(response).unwrap(), "{\"aceita_meia_porcao\": true}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7; // "```json" の長さ
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("JSONが見つかりません".into()))
}

/// 判定レスポンスをパース
///
/// `{"aceita_meia_porcao": <bool>}` 以外（キー欠落、真偽値以外、JSON不正）は
/// すべてエラー。欠落を `false` とみなすことはしない。
pub fn parse_classification_response(response: &str) -> Result<bool> {
    let json_str = extract_json(response)?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| Error::Parse(format!("JSONパースエラー: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::Parse("JSONオブジェクトではありません".into()))?;

    match object.get(RESULT_FIELD) {
        Some(Value::Bool(decision)) => Ok(*decision),
        Some(other) => Err(Error::Parse(format!(
            "{} が真偽値ではありません: {}",
            RESULT_FIELD, other
        ))),
        None => Err(Error::Parse(format!("{} がありません", RESULT_FIELD))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_object() {
        assert!(parse_classification_response(r#"{"aceita_meia_porcao": true}"#).unwrap());
        assert!(!parse_classification_response(r#"{"aceita_meia_porcao":false}"#).unwrap());
    }

    #[test]
    fn test_parse_fenced_block() {
        let response = "```json\n{\n  \"aceita_meia_porcao\": false\n}\n```";
        assert!(!parse_classification_response(response).unwrap());
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let response = "Resultado: {\"aceita_meia_porcao\": true} (fim)";
        assert!(parse_classification_response(response).unwrap());
    }

    #[test]
    fn test_missing_field_is_error() {
        let err = parse_classification_response(r#"{"resultado": false}"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("aceita_meia_porcao"));
    }

    #[test]
    fn test_non_bool_field_is_error() {
        assert!(parse_classification_response(r#"{"aceita_meia_porcao": "false"}"#).is_err());
        assert!(parse_classification_response(r#"{"aceita_meia_porcao": null}"#).is_err());
    }

    #[test]
    fn test_no_json_is_error() {
        assert!(parse_classification_response("Não sei.").is_err());
        assert!(parse_classification_response("").is_err());
    }

    #[test]
    fn test_broken_json_is_error() {
        assert!(parse_classification_response(r#"{"aceita_meia_porcao": tru}"#).is_err());
    }
}

//! 品目・判定結果・実行サマリの型定義
//!
//! 入出力JSONのフィールド名（`nome_cardapio`, `unidadeCaseira`,
//! `aceita_meia_porcao` など）はデータセットの既存フォーマットに合わせる。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 判定結果フィールド名
pub const RESULT_FIELD: &str = "aceita_meia_porcao";

/// 入力データの1品目
///
/// `id` 以外のフィールドは欠落していても読み込める。
/// 未知のフィールドは `extra` に保持され、結果へそのまま引き継がれる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,

    #[serde(default, deserialize_with = "string_or_empty")]
    pub nome_cardapio: String,

    #[serde(rename = "unidadeCaseira", default, deserialize_with = "string_or_empty")]
    pub unidade_caseira: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FoodItem {
    pub fn new(id: i64, nome_cardapio: impl Into<String>, unidade_caseira: impl Into<String>) -> Self {
        Self {
            id,
            nome_cardapio: nome_cardapio.into(),
            unidade_caseira: unidade_caseira.into(),
            extra: Map::new(),
        }
    }

    /// 単位が空（曖昧）かどうか
    pub fn has_blank_unit(&self) -> bool {
        self.unidade_caseira.trim().is_empty()
    }
}

/// 1品目の判定結果。生成後は変更しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub id: i64,

    #[serde(default)]
    pub nome_cardapio: String,

    #[serde(rename = "unidadeCaseira", default)]
    pub unidade_caseira: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    pub aceita_meia_porcao: bool,
}

impl ClassificationResult {
    pub fn from_item(item: &FoodItem, aceita_meia_porcao: bool) -> Self {
        let mut extra = item.extra.clone();
        // 既に判定済みのデータセットを再入力した場合の重複キーを防ぐ
        extra.remove(RESULT_FIELD);

        Self {
            id: item.id,
            nome_cardapio: item.nome_cardapio.clone(),
            unidade_caseira: item.unidade_caseira.clone(),
            extra,
            aceita_meia_porcao,
        }
    }
}

/// 1回の実行分の集計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_analisados: usize,
    pub total_aceita_meia_porcao_true: usize,
    pub total_aceita_meia_porcao_false: usize,
    pub resultados: Vec<ClassificationResult>,
}

impl RunSummary {
    /// 結果列から集計を作る（順序はそのまま保持）
    pub fn from_results(resultados: Vec<ClassificationResult>) -> Self {
        let accepted = resultados.iter().filter(|r| r.aceita_meia_porcao).count();
        Self {
            total_analisados: resultados.len(),
            total_aceita_meia_porcao_true: accepted,
            total_aceita_meia_porcao_false: resultados.len() - accepted,
            resultados,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resultados.is_empty()
    }
}

/// 文字列以外のスカラー値は文字列化し、`null`・欠落・配列・オブジェクトは空文字列として読む
fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

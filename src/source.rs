use crate::error::{HalfPortionError, Result};
use meia_porcao_common::FoodItem;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// 既定の入力ファイル
pub const DEFAULT_INPUT_PATH: &str = "dados_com_id.json";

/// 入力ファイルから判定対象の品目を読み込む
///
/// 全件を読み込んだうえで `exclude_ids` に含まれる品目を除外し、
/// 先頭から最大 `max_items` 件を返す（入力順を保持）。
pub fn load_candidates(
    path: &Path,
    exclude_ids: &HashSet<i64>,
    max_items: usize,
) -> Result<Vec<FoodItem>> {
    let items = load_items(path)?;
    let total = items.len();

    let mut seen = HashSet::new();
    let candidates: Vec<FoodItem> = items
        .into_iter()
        .filter(|item| !exclude_ids.contains(&item.id))
        .filter(|item| {
            let first = seen.insert(item.id);
            if !first {
                tracing::warn!(id = item.id, "重複したIDをスキップします");
            }
            first
        })
        .take(max_items)
        .collect();

    tracing::info!(
        total,
        excluded = exclude_ids.len(),
        candidates = candidates.len(),
        "判定対象を読み込みました"
    );

    Ok(candidates)
}

/// 入力ファイル全体を品目として読み込む
pub fn load_items(path: &Path) -> Result<Vec<FoodItem>> {
    let values = read_array(path)?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| parse_item(index, value))
        .collect()
}

/// 生データの各オブジェクトに連番IDを付与する（`id = 配列内の位置`）
pub fn assign_ids(values: &mut [Value]) -> Result<usize> {
    for (index, value) in values.iter_mut().enumerate() {
        let object = value.as_object_mut().ok_or_else(|| {
            HalfPortionError::MalformedInput(format!("{}番目の要素がオブジェクトではありません", index))
        })?;
        object.insert("id".to_string(), Value::from(index as i64));
    }
    Ok(values.len())
}

/// JSON配列ファイルを読み込む
pub fn read_array(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(HalfPortionError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&content).map_err(|e| {
        HalfPortionError::MalformedInput(format!("{}: JSONとして読めません: {}", path.display(), e))
    })?;

    match root {
        Value::Array(values) => Ok(values),
        _ => Err(HalfPortionError::MalformedInput(format!(
            "{}: ルートがJSON配列ではありません",
            path.display()
        ))),
    }
}

fn parse_item(index: usize, value: Value) -> Result<FoodItem> {
    let object = value.as_object().ok_or_else(|| {
        HalfPortionError::MalformedInput(format!("{}番目の要素がオブジェクトではありません", index))
    })?;

    match object.get("id") {
        Some(id) if id.is_i64() || id.is_u64() => {}
        Some(id) => {
            return Err(HalfPortionError::MalformedInput(format!(
                "{}番目の要素のidが整数ではありません: {}",
                index, id
            )))
        }
        None => {
            return Err(HalfPortionError::MalformedInput(format!(
                "{}番目の要素にidがありません",
                index
            )))
        }
    }

    serde_json::from_value(value)
        .map_err(|e| HalfPortionError::MalformedInput(format!("{}番目の要素: {}", index, e)))
}

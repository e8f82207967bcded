//! 結果ファイルの出力
//!
//! - 連番ファイル `classificacao_porcoes_<n>.json` への実行サマリ書き込み
//! - 結果ファイルの判定値をデータセットへマージ

use crate::error::{HalfPortionError, Result};
use meia_porcao_common::{RunSummary, RESULT_FIELD};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// 既定の出力ディレクトリ
pub const DEFAULT_OUTPUT_DIR: &str = "dados/resultados_meia_porcao";

const OUTPUT_PREFIX: &str = "classificacao_porcoes_";

/// 出力ディレクトリ内の既存連番の最大値 + 1 のパスを返す（ディレクトリは作成する）
pub fn next_output_path(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let next = max_sequence(dir)? + 1;
    Ok(dir.join(file_name_for(next)))
}

/// 実行サマリを新しい連番ファイルに書き込む
///
/// 既存ファイルは上書きしない。同時実行で番号が取られていた場合は次の番号を使う。
/// 書き込みに失敗した場合は作りかけのファイルを削除する。
pub fn write_summary(dir: &Path, summary: &impl serde::Serialize) -> Result<PathBuf> {
    let mut path = next_output_path(dir)?;

    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                return match write_contents(file, summary) {
                    Ok(()) => Ok(path),
                    Err(e) => {
                        if let Err(remove_err) = std::fs::remove_file(&path) {
                            tracing::warn!(path = %path.display(), error = %remove_err, "作りかけの結果ファイルを削除できません");
                        }
                        Err(HalfPortionError::Output(format!(
                            "{} に書き込めません: {}",
                            path.display(),
                            e
                        )))
                    }
                };
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                path = next_output_path(dir)?;
            }
            Err(e) => {
                return Err(HalfPortionError::Output(format!(
                    "{} に書き込めません: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

fn write_contents(file: std::fs::File, value: &impl serde::Serialize) -> Result<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn file_name_for(seq: u64) -> String {
    format!("{}{}.json", OUTPUT_PREFIX, seq)
}

fn max_sequence(dir: &Path) -> Result<u64> {
    lazy_static::lazy_static! {
        static ref SEQ_RE: Regex = Regex::new(r"^classificacao_porcoes_(\d+)\.json$").unwrap();
    }

    let mut max = 0;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if let Some(cap) = SEQ_RE.captures(&name) {
            if let Ok(n) = cap[1].parse::<u64>() {
                max = max.max(n);
            }
        }
    }
    Ok(max)
}

/// マージ結果の件数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub total: usize,
    pub updated: usize,
}

impl MergeStats {
    pub fn not_updated(&self) -> usize {
        self.total - self.updated
    }
}

/// 結果ファイル群から id → 判定値 の対応表を作る（後のファイルが優先）
pub fn collect_decisions(result_files: &[PathBuf]) -> Result<HashMap<i64, bool>> {
    let mut decisions = HashMap::new();

    for path in result_files {
        if !path.exists() {
            return Err(HalfPortionError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let summary: RunSummary = serde_json::from_str(&content).map_err(|e| {
            HalfPortionError::MalformedInput(format!("{}: 結果ファイルとして読めません: {}", path.display(), e))
        })?;

        for result in summary.resultados {
            decisions.insert(result.id, result.aceita_meia_porcao);
        }
    }

    Ok(decisions)
}

/// データセットの各オブジェクトに `aceita_meia_porcao` を追加する
///
/// 対応する判定がないオブジェクトはそのまま残す。
pub fn merge_decisions(dataset: &mut [Value], decisions: &HashMap<i64, bool>) -> MergeStats {
    let mut stats = MergeStats {
        total: dataset.len(),
        updated: 0,
    };

    for doc in dataset.iter_mut() {
        let id = doc.get("id").and_then(Value::as_i64);
        if let (Some(id), Some(object)) = (id, doc.as_object_mut()) {
            if let Some(&decision) = decisions.get(&id) {
                object.insert(RESULT_FIELD.to_string(), Value::Bool(decision));
                stats.updated += 1;
            }
        }
    }

    stats
}

/// タイムスタンプ付きバックアップを作成（`<stem>_backup_<YYYYmmdd_HHMMSS><ext>`）
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dados".into());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let backup = path.with_file_name(format!("{}_backup_{}{}", stem, timestamp, ext));
    std::fs::copy(path, &backup)?;
    Ok(backup)
}

/// JSON値を整形して書き込む
pub fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meia_porcao_common::{ClassificationResult, FoodItem};
    use serde_json::json;
    use tempfile::tempdir;

    fn summary_of(decisions: &[(i64, bool)]) -> RunSummary {
        RunSummary::from_results(
            decisions
                .iter()
                .map(|&(id, d)| ClassificationResult::from_item(&FoodItem::new(id, "Item", "Unidade"), d))
                .collect(),
        )
    }

    #[test]
    fn test_first_output_is_one() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("resultados");
        let path = next_output_path(&out).unwrap();
        assert_eq!(path, out.join("classificacao_porcoes_1.json"));
        assert!(out.is_dir());
    }

    #[test]
    fn test_next_output_follows_max_sequence() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("classificacao_porcoes_2.json"), "{}").unwrap();
        std::fs::write(dir.path().join("classificacao_porcoes_10.json"), "{}").unwrap();
        std::fs::write(dir.path().join("classificacao_porcoes_x.json"), "{}").unwrap();
        std::fs::write(dir.path().join("outro_99.json"), "{}").unwrap();

        let path = next_output_path(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "classificacao_porcoes_11.json");
    }

    #[test]
    fn test_write_summary_never_overwrites() {
        let dir = tempdir().unwrap();
        let first = write_summary(dir.path(), &summary_of(&[(1, true)])).unwrap();
        let second = write_summary(dir.path(), &summary_of(&[(2, false)])).unwrap();

        assert_ne!(first, second);
        let content: Value = serde_json::from_str(&std::fs::read_to_string(&first).unwrap()).unwrap();
        assert_eq!(content["resultados"][0]["id"], 1);
        assert_eq!(content["total_analisados"], 1);
    }

    struct Unwritable;

    impl serde::Serialize for Unwritable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("シリアライズ失敗"))
        }
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let err = write_summary(dir.path(), &Unwritable).unwrap_err();
        assert!(matches!(err, HalfPortionError::Output(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // 番号は消費されない
        let path = write_summary(dir.path(), &summary_of(&[(1, true)])).unwrap();
        assert_eq!(path.file_name().unwrap(), "classificacao_porcoes_1.json");
    }

    #[test]
    fn test_merge_decisions() {
        let dir = tempdir().unwrap();
        let r1 = dir.path().join("classificacao_porcoes_1.json");
        let r2 = dir.path().join("classificacao_porcoes_2.json");
        write_json(&r1, &summary_of(&[(0, true), (1, true)])).unwrap();
        write_json(&r2, &summary_of(&[(1, false)])).unwrap();

        let decisions = collect_decisions(&[r1, r2]).unwrap();
        assert_eq!(decisions.get(&1), Some(&false));

        let mut dataset = vec![
            json!({"id": 0, "nome_cardapio": "Pão francês"}),
            json!({"id": 1, "nome_cardapio": "Ovo cozido"}),
            json!({"id": 2, "nome_cardapio": "Pizza"}),
        ];
        let stats = merge_decisions(&mut dataset, &decisions);

        assert_eq!(stats, MergeStats { total: 3, updated: 2 });
        assert_eq!(stats.not_updated(), 1);
        assert_eq!(dataset[0][RESULT_FIELD], true);
        assert_eq!(dataset[1][RESULT_FIELD], false);
        assert!(dataset[2].get(RESULT_FIELD).is_none());
    }

    #[test]
    fn test_collect_decisions_missing_file() {
        let err = collect_decisions(&[PathBuf::from("/nonexistent/r.json")]).unwrap_err();
        assert!(matches!(err, HalfPortionError::FileNotFound(_)));
    }

    #[test]
    fn test_create_backup_copies_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dados.json");
        std::fs::write(&path, "[]").unwrap();

        let backup = create_backup(&path).unwrap();
        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dados_backup_"));
        assert!(name.ends_with(".json"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "[]");
    }
}

//! 処理済みIDチェックポイント
//!
//! 判定に成功した品目のIDを1行1件で追記し、次回実行で再判定しない。
//! 書き込みは内部ロックで直列化されるため、並行タスクから `record` してよい。

use crate::error::{HalfPortionError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// 既定のチェックポイントファイル
pub const DEFAULT_CHECKPOINT_PATH: &str = "dados/ids_alimentos_analisados.txt";

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 処理済みIDを読み込む。ストアが空・未作成なら空集合
    async fn load(&self) -> Result<HashSet<i64>>;

    /// IDを永続化する。戻った時点で書き込みは完了している
    async fn record(&self, id: i64) -> Result<()>;
}

/// テキストファイルによるチェックポイント
#[derive(Debug)]
pub struct FileCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// チェックポイントファイルを削除。存在しなければ `Ok(false)`
    pub fn clear(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<HashSet<i64>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_ids(&content))
    }

    async fn record(&self, id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                HalfPortionError::Checkpoint(format!("{} を開けません: {}", self.path.display(), e))
            })?;

        file.write_all(format!("{}\n", id).as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}

/// メモリ上のチェックポイント（テスト用）
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    ids: std::sync::Mutex<HashSet<i64>>,
    history: std::sync::Mutex<Vec<i64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let store = Self::default();
        store
            .ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(ids);
        store
    }

    /// 現在の処理済みID
    pub fn snapshot(&self) -> HashSet<i64> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `record` された順のID
    pub fn recorded(&self) -> Vec<i64> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<HashSet<i64>> {
        Ok(self.snapshot())
    }

    async fn record(&self, id: i64) -> Result<()> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).insert(id);
        self.history.lock().unwrap_or_else(|e| e.into_inner()).push(id);
        Ok(())
    }
}

fn parse_ids(content: &str) -> HashSet<i64> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(line = %line, "チェックポイントの不正な行を無視します");
                None
            }
        })
        .collect()
}

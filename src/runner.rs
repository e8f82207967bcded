//! バッチ判定ランナー
//!
//! 状態遷移: `Idle -> Loading -> Classifying -> Aggregating -> Done`
//! （入力不正・認証失敗時は `Failed`）
//!
//! 1. チェックポイントを読み込み、未処理の品目を最大 `max_items` 件選ぶ
//! 2. 同時実行数を制限しつつ判定し、成功したIDは即座にチェックポイントへ記録
//! 3. 全件の決着後、完了順の結果を連番ファイルへ書き出す
//!
//! 失敗した品目はチェックポイントに残さないので、次回実行で再判定される。

use crate::checkpoint::CheckpointStore;
use crate::classifier::{Classifier, ClassifyError, RetryPolicy};
use crate::error::{HalfPortionError, Result};
use crate::limiter::ConcurrencyLimiter;
use crate::{output, source};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::ProgressBar;
use meia_porcao_common::{ClassificationResult, FoodItem, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Classifying,
    Aggregating,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub max_items: usize,
    pub max_concurrent: usize,
    pub temperature: f32,
    pub retry: RetryPolicy,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            max_items: 100,
            max_concurrent: 5,
            temperature: 0.0,
            retry: RetryPolicy::default(),
        }
    }
}

/// 品目単位の失敗理由
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureCause {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("チェックポイント記録に失敗: {0}")]
    Checkpoint(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub id: i64,
    pub cause: FailureCause,
}

/// 1回の実行結果
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 今回の判定対象件数
    pub candidates: usize,
    pub summary: RunSummary,
    /// 結果ファイル（成功0件なら書き出さない）
    pub output_path: Option<PathBuf>,
    pub failures: Vec<ItemFailure>,
    /// 致命的エラーで打ち切られた件数
    pub cancelled: usize,
}

enum ItemOutcome {
    Classified(ClassificationResult),
    Failed(ItemFailure),
    Cancelled,
}

pub struct BatchRunner {
    classifier: Arc<dyn Classifier>,
    checkpoint: Arc<dyn CheckpointStore>,
    options: RunOptions,
    state: RunState,
    progress: Option<ProgressBar>,
}

impl BatchRunner {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        checkpoint: Arc<dyn CheckpointStore>,
        options: RunOptions,
    ) -> Self {
        Self {
            classifier,
            checkpoint,
            options,
            state: RunState::Idle,
            progress: None,
        }
    }

    /// 1件決着するごとに進める進捗バー
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        self.transition(RunState::Loading);

        let candidates = match self.load().await {
            Ok(items) => items,
            Err(e) => {
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        let limiter = match ConcurrencyLimiter::new(self.options.max_concurrent) {
            Ok(l) => l,
            Err(e) => {
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        self.transition(RunState::Classifying);
        info!(
            candidates = candidates.len(),
            max_concurrent = limiter.max_concurrent(),
            "判定を開始します"
        );
        if let Some(pb) = &self.progress {
            pb.set_length(candidates.len() as u64);
        }
        let batch = self.classify_all(&candidates, &limiter).await;

        let summary = RunSummary::from_results(batch.results);
        let mut report = RunReport {
            candidates: candidates.len(),
            summary,
            output_path: None,
            failures: batch.failures,
            cancelled: batch.cancelled,
        };

        if let Some(reason) = batch.fatal {
            // 記録済みの結果は次回再判定されないので、失敗時も書き出しておく
            if let Err(e) = self.write_output(&mut report) {
                error!(error = %e, "中断前の結果を書き出せませんでした");
            }
            self.transition(RunState::Failed);
            return Err(HalfPortionError::Authentication(reason));
        }

        self.transition(RunState::Aggregating);
        if let Err(e) = self.write_output(&mut report) {
            self.transition(RunState::Failed);
            return Err(e);
        }

        info!(
            analisados = report.summary.total_analisados,
            aceitam = report.summary.total_aceita_meia_porcao_true,
            nao_aceitam = report.summary.total_aceita_meia_porcao_false,
            falhas = report.failures.len(),
            "判定完了"
        );

        self.transition(RunState::Done);
        Ok(report)
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    async fn load(&self) -> Result<Vec<FoodItem>> {
        let processed = self.checkpoint.load().await?;
        info!(processed = processed.len(), "チェックポイントを読み込みました");

        source::load_candidates(&self.options.input, &processed, self.options.max_items)
    }

    async fn classify_all(&self, candidates: &[FoodItem], limiter: &ConcurrencyLimiter) -> BatchOutcome {
        let mut pending: FuturesUnordered<_> = candidates
            .iter()
            .map(|item| self.process_item(item, limiter))
            .collect();

        let mut outcome = BatchOutcome::default();

        // 完了順に受け取る
        while let Some(item_outcome) = pending.next().await {
            match item_outcome {
                ItemOutcome::Classified(result) => outcome.results.push(result),
                ItemOutcome::Failed(failure) => {
                    if let FailureCause::Classify(err) = &failure.cause {
                        if err.is_fatal() && outcome.fatal.is_none() {
                            error!(id = failure.id, error = %err, "致命的エラーのため残りの判定を中止します");
                            outcome.fatal = Some(err.to_string());
                            limiter.close();
                        }
                    }
                    error!(id = failure.id, cause = %failure.cause, "判定に失敗しました（次回再試行）");
                    outcome.failures.push(failure);
                }
                ItemOutcome::Cancelled => outcome.cancelled += 1,
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        if outcome.cancelled > 0 {
            warn!(cancelled = outcome.cancelled, "未判定のまま打ち切った品目があります");
        }

        outcome
    }

    async fn process_item(&self, item: &FoodItem, limiter: &ConcurrencyLimiter) -> ItemOutcome {
        let temperature = self.options.temperature;
        let classifier = &self.classifier;

        let task = async {
            if item.has_blank_unit() {
                warn!(id = item.id, "単位が空です（判定はモデルの指示に従います）");
            }

            let decision = self
                .options
                .retry
                .run(|attempt| async move {
                    if limiter.is_closed() {
                        return Err(ClassifyError::Cancelled);
                    }
                    debug!(id = item.id, attempt, in_flight = limiter.in_flight(), "classify");
                    classifier.classify(item, temperature).await
                })
                .await;

            match decision {
                Ok(accepts) => self.finalize(item, accepts).await,
                Err(ClassifyError::Cancelled) => ItemOutcome::Cancelled,
                Err(err) => ItemOutcome::Failed(ItemFailure {
                    id: item.id,
                    cause: err.into(),
                }),
            }
        };

        limiter.run(task).await.unwrap_or(ItemOutcome::Cancelled)
    }

    /// チェックポイントへの記録が済んだ時点で結果を確定する
    async fn finalize(&self, item: &FoodItem, accepts: bool) -> ItemOutcome {
        match self.checkpoint.record(item.id).await {
            Ok(()) => {
                info!(id = item.id, aceita_meia_porcao = accepts, "判定しました");
                ItemOutcome::Classified(ClassificationResult::from_item(item, accepts))
            }
            Err(e) => ItemOutcome::Failed(ItemFailure {
                id: item.id,
                cause: FailureCause::Checkpoint(e.to_string()),
            }),
        }
    }

    fn write_output(&self, report: &mut RunReport) -> Result<()> {
        if report.summary.is_empty() {
            info!("新たに判定された品目はありません");
            return Ok(());
        }

        let path = output::write_summary(&self.options.output_dir, &report.summary)?;
        info!(path = %path.display(), "結果を保存しました");
        report.output_path = Some(path);
        Ok(())
    }
}

#[derive(Default)]
struct BatchOutcome {
    results: Vec<ClassificationResult>,
    failures: Vec<ItemFailure>,
    cancelled: usize,
    fatal: Option<String>,
}

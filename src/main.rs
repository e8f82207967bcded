use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use meia_porcao::checkpoint::{CheckpointStore, FileCheckpointStore};
use meia_porcao::classifier::{AnthropicClassifier, AnthropicOptions};
use meia_porcao::runner::{BatchRunner, RunOptions};
use meia_porcao::{cli, config, error, logging, output, source};
use cli::{Cli, Commands};
use config::Config;
use error::HalfPortionError;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Classify {
            input,
            ids,
            output_dir,
            max_items,
            max_concurrent,
            temperature,
            claude_model,
            max_tokens,
        } => {
            println!("🍽  meia-porcao - ハーフポーション判定\n");

            let api_key = config.get_api_key()?;
            let options = AnthropicOptions {
                api_url: config.api_url.clone(),
                model: claude_model.unwrap_or_else(|| config.model.clone()),
                max_tokens: max_tokens.unwrap_or(config.max_tokens),
                timeout: config.timeout(),
            };
            tracing::info!(model = %options.model, max_concurrent, max_items, temperature, "分類器を初期化します");

            let classifier = AnthropicClassifier::new(api_key, options)
                .map_err(|e| HalfPortionError::Config(e.to_string()))?;

            let run_options = RunOptions {
                max_items,
                max_concurrent,
                temperature,
                retry: config.retry.to_policy(),
                ..RunOptions::new(input, output_dir)
            };

            let progress = ProgressBar::new(0);
            progress.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} ({elapsed})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let mut runner = BatchRunner::new(
                Arc::new(classifier),
                Arc::new(FileCheckpointStore::new(ids)),
                run_options,
            )
            .with_progress(progress.clone());

            let result = runner.run().await;
            progress.finish_and_clear();
            let report = match result {
                Ok(report) => report,
                Err(e) if e.is_fatal_run_error() => {
                    println!("❌ 実行を中断しました（記録済みの品目は次回スキップされます）");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            println!("✔ 判定対象: {}件", report.candidates);
            println!("  判定済み: {}件", report.summary.total_analisados);
            println!("  ハーフ可: {}件", report.summary.total_aceita_meia_porcao_true);
            println!("  ハーフ不可: {}件", report.summary.total_aceita_meia_porcao_false);
            if !report.failures.is_empty() {
                println!("  失敗（次回再試行）: {}件", report.failures.len());
            }
            match &report.output_path {
                Some(path) => println!("✔ 結果を保存: {}", path.display()),
                None => println!("新たに判定された品目はありません"),
            }

            println!("\n✅ 完了");
        }

        Commands::Prepare { input, output: target } => {
            let mut values = source::read_array(&input)?;
            let count = source::assign_ids(&mut values)?;
            output::write_json(&target, &values)
                .with_context(|| format!("ID付きデータの保存に失敗: {}", target.display()))?;
            println!("✔ {}件にIDを付与: {}", count, target.display());
        }

        Commands::Merge { dataset, results, output: target } => {
            let decisions = output::collect_decisions(&results)?;
            println!("✔ 判定結果 {}件を読み込み", decisions.len());

            let mut values = source::read_array(&dataset)?;
            let stats = output::merge_decisions(&mut values, &decisions);

            let target = match target {
                Some(path) => path,
                None => {
                    let backup = output::create_backup(&dataset)
                        .with_context(|| format!("バックアップ作成に失敗: {}", dataset.display()))?;
                    println!("✔ バックアップを作成: {}", backup.display());
                    dataset.clone()
                }
            };
            output::write_json(&target, &values)
                .with_context(|| format!("統合データの保存に失敗: {}", target.display()))?;

            println!("✔ 保存: {}", target.display());
            println!("  総件数: {}", stats.total);
            println!("  判定値を追加: {}", stats.updated);
            println!("  判定なし: {}", stats.not_updated());
        }

        Commands::Checkpoint { ids, clear, info } => {
            let store = FileCheckpointStore::new(ids);

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if store.exists() {
                    let processed = store.load().await?;
                    println!("チェックポイント情報:");
                    println!("  パス: {}", store.path().display());
                    println!("  件数: {}", processed.len());
                    if let Ok(meta) = std::fs::metadata(store.path()) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("チェックポイントファイルが存在しません: {}", store.path().display());
                }
            }

            if clear {
                match store.clear() {
                    Ok(true) => println!("✔ チェックポイントを削除しました: {}", store.path().display()),
                    Ok(false) => println!("チェックポイントファイルが存在しません"),
                    Err(e) => println!("チェックポイント削除エラー: {}", e),
                }
            }
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  最大トークン: {}", config.max_tokens);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  API URL: {}", config.api_url);
                println!("  リトライ: 最大{}回", config.retry.max_attempts);
                println!("  APIキー: {}", if config.get_api_key().is_ok() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}

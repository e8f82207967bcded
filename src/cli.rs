use crate::checkpoint::DEFAULT_CHECKPOINT_PATH;
use crate::output::DEFAULT_OUTPUT_DIR;
use crate::source::DEFAULT_INPUT_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meia-porcao")]
#[command(about = "メニュー品目のハーフポーション可否をAIで一括判定するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 未判定の品目をAIで判定し、連番の結果ファイルを出力
    Classify {
        /// 入力JSONファイル（品目の配列）
        #[arg(long, default_value = DEFAULT_INPUT_PATH)]
        input: PathBuf,

        /// 処理済みIDのチェックポイントファイル
        #[arg(long, default_value = DEFAULT_CHECKPOINT_PATH)]
        ids: PathBuf,

        /// 結果ファイルの出力先ディレクトリ
        #[arg(long = "output-dir", visible_alias = "output_dir", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// 1回の実行で判定する最大件数
        #[arg(long = "max-items", visible_alias = "max_items", default_value = "100")]
        max_items: usize,

        /// API同時リクエスト数
        #[arg(long = "max-concurrent", visible_alias = "max_concurrent", default_value = "5")]
        max_concurrent: usize,

        /// 生成温度（0.0で最も安定）
        #[arg(long, default_value = "0.0")]
        temperature: f32,

        /// 使用モデル（省略時は設定ファイルの値）
        #[arg(long = "claude-model", visible_alias = "claude_model")]
        claude_model: Option<String>,

        /// 応答の最大トークン数（省略時は設定ファイルの値）
        #[arg(long = "max-tokens", visible_alias = "max_tokens")]
        max_tokens: Option<u32>,
    },

    /// 生データの各品目に連番IDを付与
    Prepare {
        /// 入力JSONファイル（IDなしの配列）
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル
        #[arg(short, long, default_value = DEFAULT_INPUT_PATH)]
        output: PathBuf,
    },

    /// 結果ファイルの判定値をデータセットに書き戻す
    Merge {
        /// データセットJSONファイル
        #[arg(required = true)]
        dataset: PathBuf,

        /// 結果ファイル（複数可、後のものが優先）
        #[arg(required = true, num_args = 1..)]
        results: Vec<PathBuf>,

        /// 出力先（省略時はバックアップを作成して上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// チェックポイント管理
    Checkpoint {
        /// チェックポイントファイル
        #[arg(long, default_value = DEFAULT_CHECKPOINT_PATH)]
        ids: PathBuf,

        /// チェックポイントを削除（全品目が再判定対象になる）
        #[arg(long)]
        clear: bool,

        /// チェックポイント情報を表示
        #[arg(long)]
        info: bool,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_defaults() {
        let cli = Cli::try_parse_from(["meia-porcao", "classify"]).unwrap();
        match cli.command {
            Commands::Classify { input, ids, max_items, max_concurrent, temperature, claude_model, .. } => {
                assert_eq!(input, PathBuf::from("dados_com_id.json"));
                assert_eq!(ids, PathBuf::from("dados/ids_alimentos_analisados.txt"));
                assert_eq!(max_items, 100);
                assert_eq!(max_concurrent, 5);
                assert_eq!(temperature, 0.0);
                assert!(claude_model.is_none());
            }
            _ => panic!("classify expected"),
        }
    }

    #[test]
    fn test_underscore_flags_are_accepted() {
        let cli = Cli::try_parse_from([
            "meia-porcao",
            "classify",
            "--input",
            "alimentos.json",
            "--max_items",
            "10",
            "--max_concurrent",
            "1",
            "--temperature",
            "0.2",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify { input, max_items, max_concurrent, temperature, .. } => {
                assert_eq!(input, PathBuf::from("alimentos.json"));
                assert_eq!(max_items, 10);
                assert_eq!(max_concurrent, 1);
                assert!((temperature - 0.2).abs() < f32::EPSILON);
            }
            _ => panic!("classify expected"),
        }
    }

    #[test]
    fn test_merge_requires_results() {
        assert!(Cli::try_parse_from(["meia-porcao", "merge", "dados.json"]).is_err());

        let cli = Cli::try_parse_from(["meia-porcao", "merge", "dados.json", "r1.json", "r2.json"]).unwrap();
        match cli.command {
            Commands::Merge { results, output, .. } => {
                assert_eq!(results.len(), 2);
                assert!(output.is_none());
            }
            _ => panic!("merge expected"),
        }
    }
}

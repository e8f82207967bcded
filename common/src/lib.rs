//! Meia Porção Common Library
//!
//! 判定パイプラインとデータ加工コマンドで共有される型・プロンプト・パーサー

pub mod types;
pub mod error;
pub mod parser;
pub mod prompts;

pub use types::{ClassificationResult, FoodItem, RunSummary, RESULT_FIELD};
pub use error::{Error, Result};
pub use parser::{extract_json, parse_classification_response};
pub use prompts::{build_item_prompt, SYSTEM_INSTRUCTIONS, UNSPECIFIED};

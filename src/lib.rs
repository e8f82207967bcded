pub mod checkpoint;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod output;
pub mod runner;
pub mod source;

pub use meia_porcao_common::{ClassificationResult, FoodItem, RunSummary};

pub mod data;
pub mod strategy;
pub mod types;

pub use strategy::{method_chain, strategy_for, StrategyEntry};
pub use types::{ChartType, DataPoint, RenderMethod};

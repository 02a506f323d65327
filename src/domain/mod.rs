// Domain layer - pure data and deterministic algorithms
pub mod dashboard;
pub mod matching;
pub mod report;
pub mod sql_rules;
pub mod widget;

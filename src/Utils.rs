/// Terminal and file logging set up through simplelog.
pub mod logger;
/// Spearman correlation filtering and ranking for uncertainty analyses.
pub mod significance;

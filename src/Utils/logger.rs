use crate::errors::{FlowsheetError, FlowsheetResult};
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;

/// Terminal logger at `level`, plus a debug-level log file when `log_file` is given.
/// Must be called once per process.
pub fn init_logger(level: &str, log_file: Option<&str>) -> FlowsheetResult<()> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| FlowsheetError::invalid("log_level", format!("unknown level '{}'", level)))?;

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        let file = File::create(path).map_err(|source| FlowsheetError::Io {
            path: path.to_string(),
            source,
        })?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}

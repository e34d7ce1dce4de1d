use biorefinery_ccu::Utils::logger::init_logger;
use biorefinery_ccu::cli::cli_main::run_interactive_menu;
use biorefinery_ccu::settings::{CcuConfig, ConfigManager, DEFAULT_CONFIG_FILE};
use log::warn;

pub fn main() {
    // the logger is configured from the file, so load errors are reported once it is up
    let (mut manager, load_error) = match ConfigManager::try_with_config_file(DEFAULT_CONFIG_FILE) {
        Ok(manager) => (manager, None),
        Err(e) => (
            ConfigManager::from_config(CcuConfig::default(), DEFAULT_CONFIG_FILE),
            Some(e),
        ),
    };
    let config = manager.get_config();
    let logging = match init_logger(&config.log_level, config.log_file.as_deref()) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("logger was not initialized: {}", e);
            false
        }
    };
    if let Some(e) = load_error {
        if logging {
            warn!("using default configuration: {}", e);
        } else {
            eprintln!("using default configuration: {}", e);
        }
    }
    run_interactive_menu(&mut manager);
}

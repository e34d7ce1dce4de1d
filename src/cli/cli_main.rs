use super::cli_simulation::{
    incentives_menu, simulate_from_config, sweep_percent_capture, write_default_config,
};
use crate::settings::ConfigManager;
use std::io::{self, Write};

pub fn run_interactive_menu(manager: &mut ConfigManager) {
    loop {
        show_main_menu(manager);
        let Some(choice) = get_user_input() else {
            break;
        };

        match choice.trim() {
            "1" => simulate_from_config(manager.get_config()),
            "2" => sweep_percent_capture(manager.get_config()),
            "3" => incentives_menu(manager.get_config()),
            "4" => write_default_config(manager),
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}
/* colors
Blue (\x1b[34m) - Welcome header text

Yellow (\x1b[33m) - Menu options

Cyan (\x1b[36m) - "Enter your choice:" prompt

Reset (\x1b[0m) - Returns to normal color after each colored section
*/
fn show_main_menu(manager: &ConfigManager) {
    println!(
        "\x1b[34m\n Captured CO2 to methanol in a cellulosic ethanol biorefinery\n configuration: {}\n\x1b[0m",
        manager.config_file()
    );
    println!("\x1b[33m1. Simulate biorefinery + CCU\x1b[0m");
    println!("\x1b[33m2. Sweep maximum percent capture\x1b[0m");
    println!("\x1b[33m3. 45Q carbon credit\x1b[0m");
    println!("\x1b[33m4. Write default configuration\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

/// `None` once stdin is closed.
pub(super) fn get_user_input() -> Option<String> {
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input),
    }
}

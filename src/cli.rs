/// Interactive main menu.
pub mod cli_main;
/// Simulation, capture sweep and 45Q actions behind the menu.
pub mod cli_simulation;

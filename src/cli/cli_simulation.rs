use super::cli_main::get_user_input;
use crate::Flowsheet::ccu_system::CcuSystem;
use crate::Flowsheet::stream::Chemical;
use crate::TEA::incentives::{CONSTRUCTION_YEARS, CarbonCreditIncentive};
use crate::errors::FlowsheetResult;
use crate::settings::{CcuConfig, ConfigManager};
use log::{error, info};
use prettytable::{Table, row};
use std::io::{self, Write};

const SWEEP_PERCENTS: [Option<f64>; 5] = [Some(110.0), Some(130.0), Some(150.0), Some(200.0), None];

pub fn simulate_from_config(config: &CcuConfig) {
    match run_simulation(config) {
        Ok(system) => {
            system.pretty_print_streams();
            println!(
                "electricity demand: {:.1} kW, captured CO2: {:.2} kmol/hr",
                system.electricity_demand_kw(),
                system.captured().f_mol()
            );
        }
        Err(e) => {
            error!("simulation failed: {}", e);
            println!("\x1b[31mSimulation failed: {}\x1b[0m", e);
        }
    }
}

fn run_simulation(config: &CcuConfig) -> FlowsheetResult<CcuSystem> {
    let mut system = CcuSystem::new(config)?;
    let solution = system.simulate_with_fallback()?;
    solution.pretty_print_history();
    Ok(system)
}

fn describe_cap(percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{}", p),
        None => "no cap".to_string(),
    }
}

pub fn sweep_percent_capture(config: &CcuConfig) {
    let mut table = Table::new();
    table.add_row(row![
        "max capture, %",
        "status",
        "iterations",
        "boiler CO2, kmol/hr",
        "captured CO2, kmol/hr",
        "MeOH, kmol/hr"
    ]);
    for percent in SWEEP_PERCENTS {
        let mut case = config.clone();
        case.maximum_percent_capture = percent;
        let outcome = CcuSystem::new(&case).and_then(|mut system| {
            let solution = system.simulate_with_fallback()?;
            Ok((system, solution))
        });
        match outcome {
            Ok((system, solution)) => {
                table.add_row(row![
                    describe_cap(percent),
                    "converged",
                    solution.iterations,
                    format!("{:.2}", system.emissions().imol(Chemical::CO2)),
                    format!("{:.2}", system.captured().f_mol()),
                    format!("{:.3}", system.methanol().imol(Chemical::CH3OH))
                ]);
            }
            Err(e) => {
                info!("sweep case {} did not converge: {}", describe_cap(percent), e);
                table.add_row(row![describe_cap(percent), e.to_string(), "-", "-", "-", "-"]);
            }
        }
    }
    table.printstd();
}

pub fn incentives_menu(config: &CcuConfig) {
    print!(
        "\x1b[36mNumber of cash-flow years including {} construction years [23]: \x1b[0m",
        CONSTRUCTION_YEARS
    );
    let _ = io::stdout().flush();
    let years = match get_user_input() {
        None => return,
        Some(input) => {
            let input = input.trim();
            if input.is_empty() {
                23
            } else {
                match input.parse::<usize>() {
                    Ok(years) => years,
                    Err(_) => {
                        println!("Invalid number of years.");
                        return;
                    }
                }
            }
        }
    };

    let mut system = match CcuSystem::new(config) {
        Ok(system) => system,
        Err(e) => {
            println!("\x1b[31mInvalid configuration: {}\x1b[0m", e);
            return;
        }
    };
    let incentive = CarbonCreditIncentive::from_config(&config.tea);
    let mut incentives = vec![0.0; years];
    match system.simulate_with_fallback() {
        Ok(_) => {
            incentive.fill_incentives(&mut incentives, Some(system.methanol()));
            println!(
                "carbon utilized: {:.1} t/yr, annual credit: {:.0} USD",
                incentive.carbon_amount_utilized(Some(system.methanol())),
                incentive.annual_credit(Some(system.methanol()))
            );
        }
        Err(e) => {
            error!("simulation failed, no credit is claimed: {}", e);
            incentive.fill_incentives(&mut incentives, None);
        }
    }
    incentive.pretty_print_incentives(&incentives);
}

pub fn write_default_config(manager: &mut ConfigManager) {
    match manager.reset_to_defaults() {
        Ok(()) => println!("Default configuration written to {}", manager.config_file()),
        Err(e) => println!("\x1b[31mCould not write configuration: {}\x1b[0m", e),
    }
}

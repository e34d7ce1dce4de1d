/// Material streams with molar flows per chemical and their mass/carbon totals.
pub mod stream;
/// Split specifications: fixed splits and the adaptive capture controller that caps captured
/// CO2 at a percentage of the first observed emissions.
pub mod capture_controller;
/// Mass-balance unit operations of the CO2 capture and methanol synthesis train.
pub mod units;
/// The biorefinery boiler coupled to carbon capture and methanol synthesis, solved as a recycle
/// loop.
pub mod ccu_system;
mod ccu_system_tests;

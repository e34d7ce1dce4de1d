#[allow(non_snake_case)]
pub mod Flowsheet;
#[allow(non_snake_case)]
pub mod Solvers;
#[allow(non_snake_case)]
pub mod TEA;
#[allow(non_snake_case)]
pub mod Utils;
pub mod cli;
pub mod errors;
pub mod settings;

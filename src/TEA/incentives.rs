//! 45Q carbon utilization credit on top of the cellulosic ethanol cash flow.
//!
//! The credit is paid per tonne of carbon utilized in methanol for `credit_years` years once
//! the plant operates. The first three years of the cash-flow table are construction years.
use crate::Flowsheet::stream::Stream;
use crate::errors::{FlowsheetError, FlowsheetResult};
use crate::settings::TeaConfig;
use prettytable::{Table, row};

/// Construction years preceding operation in the cash-flow table.
pub const CONSTRUCTION_YEARS: usize = 3;

/// Molar mass used to convert utilized carbon to tonnes, kg/kmol.
pub const UTILIZED_CARBON_MOLAR_MASS: f64 = 32.04;

#[derive(Debug, Clone, PartialEq)]
pub struct CarbonCreditIncentive {
    /// USD per tonne
    pub carbon_credit: f64,
    pub credit_years: usize,
    pub operating_days: f64,
}

impl Default for CarbonCreditIncentive {
    fn default() -> Self {
        Self::from_config(&TeaConfig::default())
    }
}

impl CarbonCreditIncentive {
    pub fn new(carbon_credit: f64, credit_years: usize, operating_days: f64) -> FlowsheetResult<Self> {
        if !(carbon_credit.is_finite() && carbon_credit >= 0.0) {
            return Err(FlowsheetError::invalid(
                "carbon_credit",
                format!("must be finite and non-negative, got {}", carbon_credit),
            ));
        }
        if !(operating_days > 0.0 && operating_days <= 366.0) {
            return Err(FlowsheetError::invalid(
                "operating_days",
                format!("must lie in (0, 366], got {}", operating_days),
            ));
        }
        Ok(CarbonCreditIncentive {
            carbon_credit,
            credit_years,
            operating_days,
        })
    }

    pub fn from_config(config: &TeaConfig) -> Self {
        CarbonCreditIncentive {
            carbon_credit: config.carbon_credit,
            credit_years: config.credit_years,
            operating_days: config.operating_days,
        }
    }

    pub fn operating_hours(&self) -> f64 {
        self.operating_days * 24.0
    }

    /// Carbon utilized in the methanol product, tonnes per year. No methanol stream, no credit.
    pub fn carbon_amount_utilized(&self, methanol: Option<&Stream>) -> f64 {
        match methanol {
            None => 0.0,
            Some(methanol) => {
                methanol.carbon_flow() * UTILIZED_CARBON_MOLAR_MASS * self.operating_hours()
                    / 1000.0
            }
        }
    }

    /// USD per year
    pub fn annual_credit(&self, methanol: Option<&Stream>) -> f64 {
        self.carbon_amount_utilized(methanol) * self.carbon_credit
    }

    /// Adds the annual credit to every eligible year of `incentives`.
    pub fn fill_incentives(&self, incentives: &mut [f64], methanol: Option<&Stream>) {
        let annual_credit = self.annual_credit(methanol);
        if annual_credit == 0.0 {
            return;
        }
        for (year, incentive) in incentives.iter_mut().enumerate() {
            if year < CONSTRUCTION_YEARS {
                continue;
            }
            let project_year = year - CONSTRUCTION_YEARS + 1;
            if project_year <= self.credit_years {
                *incentive += annual_credit;
            }
        }
    }

    pub fn pretty_print_incentives(&self, incentives: &[f64]) {
        let mut table = Table::new();
        table.add_row(row!["year", "project year", "incentive, USD"]);
        for (year, incentive) in incentives.iter().enumerate() {
            let project_year = if year < CONSTRUCTION_YEARS {
                "-".to_string()
            } else {
                (year - CONSTRUCTION_YEARS + 1).to_string()
            };
            table.add_row(row![year, project_year, format!("{:.0}", incentive)]);
        }
        table.printstd();
    }
}

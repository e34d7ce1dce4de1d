//! Filtering of Spearman rank correlations from an uncertainty analysis.
//!
//! Given the Spearman rho and p-value of every (input parameter, output indicator) pair, keep
//! the significant pairs and rank the parameters by |rho| within each indicator.
use crate::errors::{FlowsheetError, FlowsheetResult};
use prettytable::{Table, row};
use std::cmp::Ordering;

/// Matrix of values indexed by input parameter (rows) and output indicator (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationTable {
    pub parameters: Vec<String>,
    pub indicators: Vec<String>,
    /// `values[parameter][indicator]`
    pub values: Vec<Vec<f64>>,
}

impl CorrelationTable {
    pub fn new(
        parameters: Vec<String>,
        indicators: Vec<String>,
        values: Vec<Vec<f64>>,
    ) -> FlowsheetResult<Self> {
        if values.len() != parameters.len()
            || values.iter().any(|row| row.len() != indicators.len())
        {
            return Err(FlowsheetError::invalid(
                "values",
                format!(
                    "expected {} rows of {} values",
                    parameters.len(),
                    indicators.len()
                ),
            ));
        }
        Ok(CorrelationTable {
            parameters,
            indicators,
            values,
        })
    }

    fn same_shape(&self, other: &CorrelationTable) -> bool {
        self.parameters == other.parameters && self.indicators == other.indicators
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignificanceOptions {
    pub cutoff_p: f64,
    pub cutoff_rho: f64,
    pub round_rho_to: i32,
    pub round_p_to: i32,
    /// keep only indicators whose name contains one of these substrings
    pub indicator_filter: Option<Vec<String>>,
}

impl Default for SignificanceOptions {
    fn default() -> Self {
        Self {
            cutoff_p: 0.05,
            cutoff_rho: 0.0,
            round_rho_to: 3,
            round_p_to: 3,
            indicator_filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignificantParameter {
    pub parameter: String,
    pub indicator: String,
    /// 1 = largest |rho| for this indicator; equal |rho| share a rank
    pub rank: usize,
    pub rho: f64,
    pub p_value: f64,
}

/// Significant (p < cutoff_p, |rho| >= cutoff_rho) parameter/indicator pairs, sorted by
/// indicator and then by decreasing |rho|. Pairs with a NaN rho or p are skipped.
pub fn get_significant_params(
    rho: &CorrelationTable,
    p: &CorrelationTable,
    options: &SignificanceOptions,
) -> FlowsheetResult<Vec<SignificantParameter>> {
    if !rho.same_shape(p) {
        return Err(FlowsheetError::invalid(
            "p",
            "rho and p-value tables must have the same parameters and indicators",
        ));
    }

    let mut rows: Vec<(f64, SignificantParameter)> = Vec::new();
    for (i, parameter) in rho.parameters.iter().enumerate() {
        for (j, indicator) in rho.indicators.iter().enumerate() {
            if let Some(filter) = &options.indicator_filter {
                if !filter.iter().any(|key| indicator.contains(key.as_str())) {
                    continue;
                }
            }
            let r = rho.values[i][j];
            let pv = p.values[i][j];
            if r.is_nan() || pv.is_nan() {
                continue;
            }
            if pv < options.cutoff_p && r.abs() >= options.cutoff_rho {
                rows.push((
                    r.abs(),
                    SignificantParameter {
                        parameter: parameter.clone(),
                        indicator: indicator.clone(),
                        rank: 0,
                        rho: round_to(r, options.round_rho_to),
                        p_value: round_to(pv, options.round_p_to),
                    },
                ));
            }
        }
    }

    rows.sort_by(|(abs_a, a), (abs_b, b)| {
        a.indicator
            .cmp(&b.indicator)
            .then(abs_b.partial_cmp(abs_a).unwrap_or(Ordering::Equal))
    });

    // dense rank within each indicator
    let mut previous: Option<(String, f64)> = None;
    let mut rank = 0;
    for (abs_rho, row) in rows.iter_mut() {
        match &previous {
            Some((indicator, last)) if *indicator == row.indicator => {
                if *abs_rho != *last {
                    rank += 1;
                }
            }
            _ => rank = 1,
        }
        row.rank = rank;
        previous = Some((row.indicator.clone(), *abs_rho));
    }

    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

pub fn pretty_print_significant(rows: &[SignificantParameter]) {
    let mut table = Table::new();
    table.add_row(row!["parameter", "indicator", "rank", "rho", "p value"]);
    for r in rows {
        table.add_row(row![r.parameter, r.indicator, r.rank, r.rho, r.p_value]);
    }
    table.printstd();
}

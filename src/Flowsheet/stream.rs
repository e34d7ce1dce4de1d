//! Material streams of the CCU flowsheet.
//!
//! A stream is a map of chemical -> molar flow in kmol/hr. Only mass balances are carried,
//! temperature and pressure are not tracked.
use crate::errors::{FlowsheetError, FlowsheetResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Chemicals that appear in the captured-CO2 to methanol train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Chemical {
    CO2,
    H2,
    H2O,
    CH3OH,
    O2,
    N2,
    MEA,
    CaSO4,
}

impl Chemical {
    pub const ALL: [Chemical; 8] = [
        Chemical::CO2,
        Chemical::H2,
        Chemical::H2O,
        Chemical::CH3OH,
        Chemical::O2,
        Chemical::N2,
        Chemical::MEA,
        Chemical::CaSO4,
    ];

    /// molar mass, kg/kmol
    pub fn molar_mass(&self) -> f64 {
        match self {
            Chemical::CO2 => 44.01,
            Chemical::H2 => 2.016,
            Chemical::H2O => 18.015,
            Chemical::CH3OH => 32.04,
            Chemical::O2 => 31.998,
            Chemical::N2 => 28.014,
            Chemical::MEA => 61.08,
            Chemical::CaSO4 => 136.14,
        }
    }

    /// carbon atoms per molecule
    pub fn carbon_atoms(&self) -> f64 {
        match self {
            Chemical::CO2 | Chemical::CH3OH => 1.0,
            Chemical::MEA => 2.0,
            _ => 0.0,
        }
    }

    /// condensable at the methanol loop flash conditions (35 C, ~73 atm)
    pub fn is_condensable(&self) -> bool {
        matches!(
            self,
            Chemical::H2O | Chemical::CH3OH | Chemical::MEA | Chemical::CaSO4
        )
    }
}

impl fmt::Display for Chemical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Phase {
    #[default]
    Gas,
    Liquid,
}

/// Material stream with molar flows in kmol/hr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub phase: Phase,
    imol: BTreeMap<Chemical, f64>,
}

impl Stream {
    pub fn new(id: &str) -> Self {
        Stream {
            id: id.to_string(),
            phase: Phase::Gas,
            imol: BTreeMap::new(),
        }
    }

    pub fn with_flows(id: &str, flows: &[(Chemical, f64)]) -> FlowsheetResult<Self> {
        let mut stream = Stream::new(id);
        for (chemical, flow) in flows {
            stream.set_imol(*chemical, *flow)?;
        }
        Ok(stream)
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn imol(&self, chemical: Chemical) -> f64 {
        self.imol.get(&chemical).copied().unwrap_or(0.0)
    }

    /// Sets the molar flow of one chemical. Non-finite flows are rejected with
    /// [`FlowsheetError::NonFiniteFlow`], negative ones as invalid parameters.
    pub fn set_imol(&mut self, chemical: Chemical, flow: f64) -> FlowsheetResult<()> {
        if !flow.is_finite() {
            return Err(FlowsheetError::NonFiniteFlow {
                stream: self.id.clone(),
                chemical: chemical.to_string(),
            });
        }
        if flow < 0.0 {
            return Err(FlowsheetError::invalid(
                &format!("{}.imol[{}]", self.id, chemical),
                format!("molar flow must be non-negative, got {}", flow),
            ));
        }
        if flow == 0.0 {
            self.imol.remove(&chemical);
        } else {
            self.imol.insert(chemical, flow);
        }
        Ok(())
    }

    /// Iterates over the non-zero component flows.
    pub fn flows(&self) -> impl Iterator<Item = (Chemical, f64)> + '_ {
        self.imol.iter().map(|(c, f)| (*c, *f))
    }

    /// total molar flow, kmol/hr
    pub fn f_mol(&self) -> f64 {
        self.imol.values().sum()
    }

    /// total mass flow, kg/hr
    pub fn f_mass(&self) -> f64 {
        self.imol.iter().map(|(c, f)| c.molar_mass() * f).sum()
    }

    /// atomic carbon flow, kmol C/hr
    pub fn carbon_flow(&self) -> f64 {
        self.imol.iter().map(|(c, f)| c.carbon_atoms() * f).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.imol.is_empty()
    }

    /// Sets this stream to the sum of `inlets`.
    pub fn mix_from(&mut self, inlets: &[&Stream]) {
        self.imol.clear();
        for inlet in inlets {
            for (chemical, flow) in inlet.flows() {
                *self.imol.entry(chemical).or_insert(0.0) += flow;
            }
        }
    }

    /// Copy of this stream with every flow multiplied by `factor` (clamped at zero).
    pub fn scaled(&self, id: &str, factor: f64) -> Stream {
        let factor = factor.max(0.0);
        let imol = self
            .imol
            .iter()
            .map(|(c, f)| (*c, f * factor))
            .filter(|(_, f)| *f > 0.0)
            .collect();
        Stream {
            id: id.to_string(),
            phase: self.phase,
            imol,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:.3} kmol/hr):", self.id, self.phase, self.f_mol())?;
        for (chemical, flow) in self.flows() {
            write!(f, " {}={:.3}", chemical, flow)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stream_totals() {
        let s = Stream::with_flows("s", &[(Chemical::CO2, 10.0), (Chemical::CH3OH, 2.0)]).unwrap();
        assert_relative_eq!(s.f_mol(), 12.0);
        assert_relative_eq!(s.f_mass(), 10.0 * 44.01 + 2.0 * 32.04, epsilon = 1e-9);
        assert_relative_eq!(s.carbon_flow(), 12.0);
        assert_eq!(s.imol(Chemical::H2), 0.0);
    }

    #[test]
    fn test_negative_flow_rejected() {
        let mut s = Stream::new("s");
        let err = s.set_imol(Chemical::H2, -1.0).unwrap_err();
        assert!(matches!(err, FlowsheetError::InvalidParameter { .. }));
        assert!(matches!(
            s.set_imol(Chemical::H2, f64::NAN),
            Err(FlowsheetError::NonFiniteFlow { .. })
        ));
        assert!(matches!(
            s.set_imol(Chemical::CO2, f64::INFINITY),
            Err(FlowsheetError::NonFiniteFlow { .. })
        ));
        assert!(s.is_empty());
    }

    #[test]
    fn test_mix_and_scale() {
        let a = Stream::with_flows("a", &[(Chemical::CO2, 1.0), (Chemical::H2, 3.0)]).unwrap();
        let b = Stream::with_flows("b", &[(Chemical::CO2, 2.0)]).unwrap();
        let mut m = Stream::new("m");
        m.mix_from(&[&a, &b]);
        assert_relative_eq!(m.imol(Chemical::CO2), 3.0);
        assert_relative_eq!(m.imol(Chemical::H2), 3.0);

        let half = m.scaled("half", 0.5);
        assert_eq!(half.id, "half");
        assert_relative_eq!(half.f_mol(), 3.0);
        assert!(m.scaled("none", 0.0).is_empty());
    }
}

//! Unit operations of the captured-CO2 to methanol train.
//!
//! Units only close mass balances; heat duties, pressures and phase equilibria are outside this
//! crate. Each unit maps its inlet streams to new outlet streams in `run`, so the flowsheet can
//! be re-evaluated any number of times by the recycle solver.
use crate::Flowsheet::capture_controller::{SplitController, SplitSpec};
use crate::Flowsheet::stream::{Chemical, Phase, Stream};
use crate::errors::{FlowsheetError, FlowsheetResult};
use std::collections::BTreeMap;

/// Two-outlet splitter whose split may be fixed or computed by a controller.
#[derive(Debug, Clone)]
pub struct Splitter {
    pub id: String,
    pub split: SplitSpec,
    outs: [String; 2],
}

impl Splitter {
    pub fn new(id: &str, split: SplitSpec, outs: [&str; 2]) -> Self {
        Splitter {
            id: id.to_string(),
            split,
            outs: outs.map(|s| s.to_string()),
        }
    }

    /// Evaluates the split specification on the inlet molar flow and splits every chemical by
    /// the same fraction. Returns `[first, second]`.
    pub fn run(&mut self, inlet: &Stream) -> [Stream; 2] {
        let split = self.split.evaluate(inlet.f_mol()).clamp(0.0, 1.0);
        [
            inlet.scaled(&self.outs[0], split),
            inlet.scaled(&self.outs[1], 1.0 - split),
        ]
    }

    pub fn reset(&mut self) {
        self.split.reset();
    }
}

/// Splitter with a split fraction per chemical; unlisted chemicals go to the second outlet.
#[derive(Debug, Clone)]
pub struct ComponentSplitter {
    pub id: String,
    pub split: BTreeMap<Chemical, f64>,
    outs: [String; 2],
}

impl ComponentSplitter {
    pub fn new(id: &str, split: &[(Chemical, f64)], outs: [&str; 2]) -> FlowsheetResult<Self> {
        for (chemical, fraction) in split {
            if !(0.0..=1.0).contains(fraction) {
                return Err(FlowsheetError::invalid(
                    &format!("{}.split[{}]", id, chemical),
                    format!("split fraction must lie in [0, 1], got {}", fraction),
                ));
            }
        }
        Ok(ComponentSplitter {
            id: id.to_string(),
            split: split.iter().copied().collect(),
            outs: outs.map(|s| s.to_string()),
        })
    }

    pub fn run(&self, inlet: &Stream) -> FlowsheetResult<[Stream; 2]> {
        let mut top = Stream::new(&self.outs[0]).with_phase(inlet.phase);
        let mut bottom = Stream::new(&self.outs[1]).with_phase(inlet.phase);
        for (chemical, flow) in inlet.flows() {
            let fraction = self.split.get(&chemical).copied().unwrap_or(0.0);
            top.set_imol(chemical, flow * fraction)?;
            bottom.set_imol(chemical, flow * (1.0 - fraction))?;
        }
        Ok([top, bottom])
    }
}

#[derive(Debug, Clone)]
pub struct Mixer {
    pub id: String,
    out: String,
}

impl Mixer {
    pub fn new(id: &str, out: &str) -> Self {
        Mixer {
            id: id.to_string(),
            out: out.to_string(),
        }
    }

    pub fn run(&self, inlets: &[&Stream]) -> Stream {
        let mut outlet = Stream::new(&self.out);
        outlet.mix_from(inlets);
        outlet
    }
}

/// Monoethanolamine absorber/stripper pair.
///
/// `co2_recovery` of the inlet CO2 leaves as concentrated CO2, everything else is vented.
/// Solvent losses are replaced with fresh MEA in proportion to the CO2 recovered.
#[derive(Debug, Clone)]
pub struct AmineAbsorption {
    pub id: String,
    pub co2_recovery: f64,
    /// kg MEA per kmol of CO2 recovered
    pub mea_makeup_per_co2: f64,
}

pub struct AmineAbsorptionOutlets {
    pub vent: Stream,
    pub concentrated: Stream,
    pub makeup_mea: Stream,
}

impl AmineAbsorption {
    pub fn new(id: &str, co2_recovery: f64, mea_makeup_per_co2: f64) -> FlowsheetResult<Self> {
        if !(0.0..=1.0).contains(&co2_recovery) {
            return Err(FlowsheetError::invalid(
                "co2_recovery",
                format!("must lie in [0, 1], got {}", co2_recovery),
            ));
        }
        if mea_makeup_per_co2 < 0.0 {
            return Err(FlowsheetError::invalid(
                "mea_makeup_per_co2",
                "must be non-negative",
            ));
        }
        Ok(AmineAbsorption {
            id: id.to_string(),
            co2_recovery,
            mea_makeup_per_co2,
        })
    }

    pub fn run(&self, flue_gas: &Stream) -> FlowsheetResult<AmineAbsorptionOutlets> {
        let captured_co2 = flue_gas.imol(Chemical::CO2) * self.co2_recovery;
        let mut vent = flue_gas.scaled("vent", 1.0);
        vent.set_imol(Chemical::CO2, flue_gas.imol(Chemical::CO2) - captured_co2)?;
        let concentrated = Stream::with_flows("concentrated", &[(Chemical::CO2, captured_co2)])?;
        let makeup_mea = Stream::with_flows(
            "makeup_MEA",
            &[(
                Chemical::MEA,
                captured_co2 * self.mea_makeup_per_co2 / Chemical::MEA.molar_mass(),
            )],
        )?
        .with_phase(Phase::Liquid);
        Ok(AmineAbsorptionOutlets {
            vent,
            concentrated,
            makeup_mea,
        })
    }
}

/// Water electrolyzer, 2 H2O -> 2 H2 + O2, with complete conversion.
#[derive(Debug, Clone)]
pub struct Electrolyzer {
    pub id: String,
    /// electricity per kg of hydrogen, kWh/kg
    pub kwh_per_kg_h2: f64,
}

pub struct ElectrolyzerOutlets {
    pub hydrogen: Stream,
    pub oxygen: Stream,
    /// kW
    pub power: f64,
}

impl Electrolyzer {
    pub fn new(id: &str, kwh_per_kg_h2: f64) -> FlowsheetResult<Self> {
        if !(kwh_per_kg_h2.is_finite() && kwh_per_kg_h2 >= 0.0) {
            return Err(FlowsheetError::invalid(
                "kwh_per_kg_h2",
                format!("must be finite and non-negative, got {}", kwh_per_kg_h2),
            ));
        }
        Ok(Electrolyzer {
            id: id.to_string(),
            kwh_per_kg_h2,
        })
    }

    pub fn run(&self, water: &Stream) -> FlowsheetResult<ElectrolyzerOutlets> {
        let h2o = water.imol(Chemical::H2O);
        let hydrogen = Stream::with_flows("hydrogen", &[(Chemical::H2, h2o)])?;
        let oxygen = Stream::with_flows("oxygen", &[(Chemical::O2, h2o / 2.0)])?;
        let power = hydrogen.f_mass() * self.kwh_per_kg_h2;
        Ok(ElectrolyzerOutlets {
            hydrogen,
            oxygen,
            power,
        })
    }
}

/// Methanol synthesis, CO2 + 3 H2 -> CH3OH + H2O.
///
/// `conversion` is the single-pass conversion of the limiting reactant. Catalyst passes through
/// and leaves as spent catalyst.
#[derive(Debug, Clone)]
pub struct MethanolReactor {
    pub id: String,
    pub conversion: f64,
}

impl MethanolReactor {
    pub fn new(id: &str, conversion: f64) -> FlowsheetResult<Self> {
        if !(0.0..=1.0).contains(&conversion) {
            return Err(FlowsheetError::invalid(
                "conversion",
                format!("must lie in [0, 1], got {}", conversion),
            ));
        }
        Ok(MethanolReactor {
            id: id.to_string(),
            conversion,
        })
    }

    /// Returns `[product, spent_catalyst]`.
    pub fn run(&self, feed: &Stream, catalyst: &Stream) -> FlowsheetResult<[Stream; 2]> {
        let co2 = feed.imol(Chemical::CO2);
        let h2 = feed.imol(Chemical::H2);
        let extent = self.conversion * co2.min(h2 / 3.0);

        let mut product = feed.scaled("product", 1.0);
        product.set_imol(Chemical::CO2, (co2 - extent).max(0.0))?;
        product.set_imol(Chemical::H2, (h2 - 3.0 * extent).max(0.0))?;
        product.set_imol(Chemical::CH3OH, feed.imol(Chemical::CH3OH) + extent)?;
        product.set_imol(Chemical::H2O, feed.imol(Chemical::H2O) + extent)?;

        let spent_catalyst = catalyst.scaled("spent_catalyst", 1.0);
        Ok([product, spent_catalyst])
    }
}

/// Ideal vapour/liquid separation: condensables to liquid, light gases to vapour.
#[derive(Debug, Clone)]
pub struct PhaseSplitter {
    pub id: String,
    outs: [String; 2],
}

impl PhaseSplitter {
    pub fn new(id: &str, outs: [&str; 2]) -> Self {
        PhaseSplitter {
            id: id.to_string(),
            outs: outs.map(|s| s.to_string()),
        }
    }

    /// Returns `[gas, liquid]`.
    pub fn run(&self, inlet: &Stream) -> FlowsheetResult<[Stream; 2]> {
        let mut gas = Stream::new(&self.outs[0]).with_phase(Phase::Gas);
        let mut liquid = Stream::new(&self.outs[1]).with_phase(Phase::Liquid);
        for (chemical, flow) in inlet.flows() {
            if chemical.is_condensable() {
                liquid.set_imol(chemical, flow)?;
            } else {
                gas.set_imol(chemical, flow)?;
            }
        }
        Ok([gas, liquid])
    }
}

/// Shortcut binary distillation with light key CH3OH and heavy key H2O.
///
/// `lr`: light key recovery in the distillate, `hr`: heavy key recovery in the bottoms.
/// Chemicals lighter than methanol go to the distillate, heavier ones to the bottoms.
#[derive(Debug, Clone)]
pub struct BinaryDistillation {
    pub id: String,
    pub lr: f64,
    pub hr: f64,
}

impl BinaryDistillation {
    pub fn new(id: &str, lr: f64, hr: f64) -> FlowsheetResult<Self> {
        for (name, value) in [("Lr", lr), ("Hr", hr)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(FlowsheetError::invalid(
                    name,
                    format!("recovery must lie in (0, 1), got {}", value),
                ));
            }
        }
        Ok(BinaryDistillation {
            id: id.to_string(),
            lr,
            hr,
        })
    }

    /// Returns `[distillate, bottoms]`.
    pub fn run(&self, feed: &Stream) -> FlowsheetResult<[Stream; 2]> {
        let mut distillate = Stream::new("MeOH").with_phase(Phase::Liquid);
        let mut bottoms = Stream::new("bottom_water").with_phase(Phase::Liquid);
        for (chemical, flow) in feed.flows() {
            let to_top = match chemical {
                Chemical::CH3OH => self.lr,
                Chemical::H2O => 1.0 - self.hr,
                Chemical::MEA | Chemical::CaSO4 => 0.0,
                _ => 1.0,
            };
            distillate.set_imol(chemical, flow * to_top)?;
            bottoms.set_imol(chemical, flow * (1.0 - to_top))?;
        }
        Ok([distillate, bottoms])
    }
}

/// Boiler-turbogenerator of the biorefinery.
///
/// Burning the biorefinery residues produces `base_emissions`. Electricity bought by the CCU
/// train beyond `surplus_power` is covered by firing natural gas, which adds
/// `co2_per_kwh` kmol CO2 per kWh together with its combustion water and nitrogen.
#[derive(Debug, Clone)]
pub struct BoilerTurbogenerator {
    pub id: String,
    pub base_emissions: Stream,
    /// kW available for export before extra fuel is needed
    pub surplus_power: f64,
    /// kmol CO2 per kWh of extra electricity
    pub co2_per_kwh: f64,
}

/// CH4 + 2 (O2 + 3.76 N2) -> CO2 + 2 H2O + 7.52 N2
const FLUE_H2O_PER_CO2: f64 = 2.0;
const FLUE_N2_PER_CO2: f64 = 7.52;

impl BoilerTurbogenerator {
    pub fn new(
        id: &str,
        base_emissions: Stream,
        surplus_power: f64,
        co2_per_kwh: f64,
    ) -> FlowsheetResult<Self> {
        if !(co2_per_kwh.is_finite() && co2_per_kwh >= 0.0) {
            return Err(FlowsheetError::invalid(
                "co2_per_kwh",
                format!("must be finite and non-negative, got {}", co2_per_kwh),
            ));
        }
        if !(surplus_power.is_finite() && surplus_power >= 0.0) {
            return Err(FlowsheetError::invalid(
                "surplus_power",
                format!("must be finite and non-negative, got {}", surplus_power),
            ));
        }
        Ok(BoilerTurbogenerator {
            id: id.to_string(),
            base_emissions,
            surplus_power,
            co2_per_kwh,
        })
    }

    /// Flue gas for a given electricity demand of the CCU train, kW.
    pub fn run(&self, electricity_demand: f64) -> FlowsheetResult<Stream> {
        let extra_co2 = (electricity_demand - self.surplus_power).max(0.0) * self.co2_per_kwh;
        let mut emissions = self.base_emissions.scaled("emissions", 1.0);
        for (chemical, added) in [
            (Chemical::CO2, extra_co2),
            (Chemical::H2O, FLUE_H2O_PER_CO2 * extra_co2),
            (Chemical::N2, FLUE_N2_PER_CO2 * extra_co2),
        ] {
            emissions.set_imol(chemical, emissions.imol(chemical) + added)?;
        }
        Ok(emissions)
    }
}

//! Captured CO2 to methanol, coupled to the biorefinery boiler.
//!
//! Flowsheet (unit ids follow the biorefinery area numbering):
//!
//! ```text
//! BT emissions -> S1300 (capture splitter) -> U1301 (MEA absorption) -> M1302 (+ fermentation CO2)
//!   -> S1301 (CO2 purification) -> compression -> M1101 (+ H2 from R1101 electrolyzer)
//!   -> M1102 (+ recycle gas) -> R1102 (methanol synthesis) -> S1102 (flash)
//!        gas    -> S1103 (purge 1 %) -> recycle gas back to M1102
//!        liquid -> D1101 (MeOH / water distillation) -> MeOH
//! R1101 electricity -> BT (extra fuel) -> BT emissions
//! ```
//!
//! Hydrogen is fed at H2:CO2 = 3:1 on the CO2 recovered by U1301 only; the fermentation CO2 is
//! in excess and leaves with the purge.
//!
//! Two tear streams close the flowsheet: the boiler emissions, because the electrolyzer power is
//! supplied by firing more fuel in the boiler, and the methanol loop recycle gas. Without a capture
//! cap every kmol of CO2 captured raises the boiler emissions by more than one kmol and the loop
//! diverges; S1300 carries a [`CaptureController`] that caps the captured flow at a percentage
//! of the first emissions it sees.
use crate::Flowsheet::capture_controller::{CaptureController, FixedSplit, SplitSpec};
use crate::Flowsheet::stream::{Chemical, Phase, Stream};
use crate::Flowsheet::units::{
    AmineAbsorption, BinaryDistillation, BoilerTurbogenerator, ComponentSplitter, Electrolyzer,
    MethanolReactor, Mixer, PhaseSplitter, Splitter,
};
use crate::Solvers::recycle::{RecycleLoop, RecycleSolution, RecycleSolver, SolverMethod};
use crate::errors::{FlowsheetError, FlowsheetResult};
use crate::settings::{CcuConfig, HydrogenSource};
use log::{info, warn};
use nalgebra::DVector;
use prettytable::{Cell, Row, Table, row};

const N_CHEMICALS: usize = Chemical::ALL.len();

/// Streams of the last flowsheet evaluation.
#[derive(Debug, Clone)]
pub struct CcuStreams {
    /// boiler flue gas produced by the last evaluation
    pub emissions: Stream,
    pub captured: Stream,
    pub flue_purge: Stream,
    pub vent: Stream,
    /// CO2 recovered by the absorber, before fermentation off-gas joins it
    pub absorbed_co2: Stream,
    pub makeup_mea: Stream,
    pub concentrated_co2: Stream,
    pub other_gases: Stream,
    pub water_stream: Stream,
    pub hydrogen: Stream,
    pub oxygen: Stream,
    pub reactor_feed: Stream,
    pub product: Stream,
    pub spent_catalyst: Stream,
    pub recycled: Stream,
    pub purge: Stream,
    pub methanol: Stream,
    pub bottom_water: Stream,
    pub gas_out: Stream,
}

impl CcuStreams {
    fn initial(emissions: Stream) -> Self {
        CcuStreams {
            emissions,
            captured: Stream::new("captured"),
            flue_purge: Stream::new("purge_BT"),
            vent: Stream::new("vent"),
            absorbed_co2: Stream::new("concentrated"),
            makeup_mea: Stream::new("makeup_MEA").with_phase(Phase::Liquid),
            concentrated_co2: Stream::new("concentrated_CO2"),
            other_gases: Stream::new("other_gases"),
            water_stream: Stream::new("water_stream_1").with_phase(Phase::Liquid),
            hydrogen: Stream::new("hydrogen"),
            oxygen: Stream::new("oxygen"),
            reactor_feed: Stream::new("reactor_feed"),
            product: Stream::new("product"),
            spent_catalyst: Stream::new("spent_catalyst"),
            recycled: Stream::new("recycled"),
            purge: Stream::new("purge"),
            methanol: Stream::new("MeOH").with_phase(Phase::Liquid),
            bottom_water: Stream::new("bottom_water").with_phase(Phase::Liquid),
            gas_out: Stream::new("gas_out"),
        }
    }

    pub fn all(&self) -> Vec<&Stream> {
        vec![
            &self.emissions,
            &self.captured,
            &self.flue_purge,
            &self.vent,
            &self.absorbed_co2,
            &self.makeup_mea,
            &self.concentrated_co2,
            &self.other_gases,
            &self.water_stream,
            &self.hydrogen,
            &self.oxygen,
            &self.reactor_feed,
            &self.product,
            &self.spent_catalyst,
            &self.recycled,
            &self.purge,
            &self.methanol,
            &self.bottom_water,
            &self.gas_out,
        ]
    }
}

pub struct CcuSystem {
    bt: BoilerTurbogenerator,
    fermentation: Stream,
    catalyst: Stream,
    hydrogen_source: HydrogenSource,
    s1300: Splitter,
    u1301: AmineAbsorption,
    m1302: Mixer,
    s1301: ComponentSplitter,
    r1101: Electrolyzer,
    m1101: Mixer,
    m1102: Mixer,
    r1102: MethanolReactor,
    s1102: PhaseSplitter,
    s1103: Splitter,
    d1101: BinaryDistillation,
    m1104: Mixer,
    solver: RecycleSolver,
    /// methods tried in turn when the configured one fails
    fallback_methods: Vec<SolverMethod>,
    streams: CcuStreams,
    /// tear values the next evaluation starts from
    tear: DVector<f64>,
    electricity_demand: f64,
    /// captured molar flow of every evaluation since the last reset
    captured_history: Vec<f64>,
}

impl CcuSystem {
    pub fn new(config: &CcuConfig) -> FlowsheetResult<Self> {
        config.validate()?;
        let bt = BoilerTurbogenerator::new(
            "BT",
            config.biorefinery.boiler_emissions()?,
            config.biorefinery.surplus_power,
            config.biorefinery.natural_gas_co2_per_kwh,
        )?;
        let capture_controller = CaptureController::new(config.percent_capture())?;
        let catalyst = Stream::with_flows(
            "catalyst_MeOH",
            &[(Chemical::CaSO4, config.methanol.catalyst_makeup)],
        )?
        .with_phase(Phase::Liquid);

        let emissions = bt.run(0.0)?;
        let tear = tear_vector(&emissions, &Stream::new("recycled"));
        let system = CcuSystem {
            fermentation: config.biorefinery.fermentation_emissions()?,
            catalyst,
            hydrogen_source: config.hydrogen_source,
            s1300: Splitter::new(
                "S1300",
                SplitSpec::from(capture_controller),
                ["captured", "purge_BT"],
            ),
            u1301: AmineAbsorption::new(
                "U1301",
                config.capture.co2_recovery,
                config.capture.mea_makeup_per_co2,
            )?,
            m1302: Mixer::new("M1302", "CO2_mix"),
            s1301: ComponentSplitter::new(
                "S1301",
                &[(Chemical::CO2, 1.0)],
                ["concentrated_CO2", "other_gases"],
            )?,
            r1101: Electrolyzer::new("R1101", config.methanol.kwh_per_kg_h2)?,
            m1101: Mixer::new("M1101", "fresh_feed"),
            m1102: Mixer::new("M1102", "reactor_feed"),
            r1102: MethanolReactor::new("R1102", config.methanol.conversion)?,
            s1102: PhaseSplitter::new("S1102", ["gas", "condensed_water_and_methanol"]),
            s1103: Splitter::new(
                "S1103",
                SplitSpec::from(FixedSplit::new(config.methanol.purge_split)?),
                ["purge", "recycled"],
            ),
            d1101: BinaryDistillation::new("D1101", config.methanol.lr, config.methanol.hr)?,
            m1104: Mixer::new("M1104", "gas_out"),
            solver: config.solver.build()?,
            fallback_methods: config.solver.fallback_methods.clone(),
            streams: CcuStreams::initial(emissions),
            tear,
            electricity_demand: 0.0,
            captured_history: Vec::new(),
            bt,
        };
        Ok(system)
    }

    /// Back to the state of a freshly built system: initial tear streams and no capture baseline.
    pub fn reset(&mut self) -> FlowsheetResult<()> {
        self.s1300.reset();
        self.s1103.reset();
        let emissions = self.bt.run(0.0)?;
        self.tear = tear_vector(&emissions, &Stream::new("recycled"));
        self.streams = CcuStreams::initial(emissions);
        self.electricity_demand = 0.0;
        self.captured_history.clear();
        Ok(())
    }

    /// Converges the flowsheet starting from a clean state (see [`CcuSystem::reset`]).
    ///
    /// A capture limit the mass balance cannot satisfy, typically no cap at all with an
    /// electrolyzer, is reported as [`FlowsheetError::ConvergenceFailure`]; the streams then hold
    /// the last evaluation.
    pub fn simulate(&mut self) -> FlowsheetResult<RecycleSolution> {
        self.reset()?;
        let mut solver = self.solver.clone();
        let result = solver.solve(self);
        self.log_outcome(&result);
        result
    }

    /// Like [`CcuSystem::simulate`], but when the configured method fails the system is reset
    /// and solved again with each of the configured fallback methods in turn.
    pub fn simulate_with_fallback(&mut self) -> FlowsheetResult<RecycleSolution> {
        let solver = self.solver.clone();
        let fallbacks = self.fallback_methods.clone();
        let result = solver.solve_with_fallback(self, &fallbacks);
        self.log_outcome(&result);
        result
    }

    fn log_outcome(&self, result: &FlowsheetResult<RecycleSolution>) {
        match result {
            Ok(solution) => info!(
                "CCU system converged in {} iterations: MeOH {:.3} kmol/hr, emissions {:.3} kmol CO2/hr",
                solution.iterations,
                self.streams.methanol.imol(Chemical::CH3OH),
                self.streams.emissions.imol(Chemical::CO2)
            ),
            Err(e) => warn!(
                "CCU system failed: {}; emissions at {:.3e} kmol CO2/hr",
                e,
                self.streams.emissions.imol(Chemical::CO2)
            ),
        }
    }

    pub fn fallback_methods(&self) -> &[SolverMethod] {
        &self.fallback_methods
    }

    /// One pass through every unit from the current state, without resetting.
    pub fn run_once(&mut self) -> FlowsheetResult<()> {
        let tear = self.tear.clone();
        self.evaluate(&tear)?;
        Ok(())
    }

    pub fn solver_mut(&mut self) -> &mut RecycleSolver {
        &mut self.solver
    }

    pub fn streams(&self) -> &CcuStreams {
        &self.streams
    }

    pub fn emissions(&self) -> &Stream {
        &self.streams.emissions
    }

    pub fn captured(&self) -> &Stream {
        &self.streams.captured
    }

    pub fn methanol(&self) -> &Stream {
        &self.streams.methanol
    }

    pub fn gas_out(&self) -> &Stream {
        &self.streams.gas_out
    }

    /// electricity drawn by the electrolyzer in the last evaluation, kW
    pub fn electricity_demand_kw(&self) -> f64 {
        self.electricity_demand
    }

    /// S1300, the splitter carrying the capture controller
    pub fn capture_splitter(&self) -> &Splitter {
        &self.s1300
    }

    pub fn capture_splitter_mut(&mut self) -> &mut Splitter {
        &mut self.s1300
    }

    pub fn captured_history(&self) -> &[f64] {
        &self.captured_history
    }

    pub fn capture_controller(&self) -> Option<&CaptureController> {
        match &self.s1300.split {
            SplitSpec::CaptureController(controller) => Some(controller),
            _ => None,
        }
    }

    /// Changes the capture cap of S1300; `f64::INFINITY` disables it.
    pub fn set_maximum_percent_capture(&mut self, percent: f64) -> FlowsheetResult<()> {
        match &mut self.s1300.split {
            SplitSpec::CaptureController(controller) => {
                controller.set_maximum_percent_capture(percent)
            }
            _ => Err(FlowsheetError::invalid(
                "S1300",
                "carbon capture splitter has no capture controller",
            )),
        }
    }

    pub fn pretty_print_streams(&self) {
        let mut table = Table::new();
        let mut header = vec!["stream".to_string(), "total".to_string()];
        header.extend(Chemical::ALL.iter().map(|c| c.to_string()));
        table.add_row(Row::new(header.iter().map(|h| Cell::new(h)).collect()));
        for stream in self.streams.all() {
            let mut cells = vec![stream.id.clone(), format!("{:.3}", stream.f_mol())];
            cells.extend(Chemical::ALL.iter().map(|c| format!("{:.3}", stream.imol(*c))));
            table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
        }
        table.printstd();

        let mut summary = Table::new();
        summary.add_row(row!["electricity demand, kW", format!("{:.1}", self.electricity_demand)]);
        if let Some(controller) = self.capture_controller() {
            summary.add_row(row![
                "capture baseline, kmol/hr",
                controller.baseline().map_or("-".to_string(), |b| format!("{:.3}", b))
            ]);
            summary.add_row(row!["capture split", format!("{:.4}", controller.last_split())]);
        }
        summary.printstd();
    }
}

impl RecycleLoop for CcuSystem {
    fn tear_guess(&self) -> DVector<f64> {
        self.tear.clone()
    }

    fn evaluate(&mut self, tear: &DVector<f64>) -> FlowsheetResult<DVector<f64>> {
        let emissions = stream_from_tear("emissions", tear.rows(0, N_CHEMICALS).iter())?;
        let recycle = stream_from_tear("recycled", tear.rows(N_CHEMICALS, N_CHEMICALS).iter())?;

        let [captured, flue_purge] = self.s1300.run(&emissions);
        self.captured_history.push(captured.f_mol());
        let absorber = self.u1301.run(&captured)?;
        let co2_mix = self.m1302.run(&[&self.fermentation, &absorber.concentrated]);
        let [concentrated_co2, other_gases] = self.s1301.run(&co2_mix)?;

        // H2:CO2 = 3:1 on the CO2 recovered from flue gas; fermentation CO2 is left in excess
        let h2_demand = 3.0 * absorber.concentrated.imol(Chemical::CO2);
        let (water_stream, hydrogen, oxygen, power) = match self.hydrogen_source {
            HydrogenSource::Electrolyzer => {
                let water = Stream::with_flows("water_stream_1", &[(Chemical::H2O, h2_demand)])?
                    .with_phase(Phase::Liquid);
                let out = self.r1101.run(&water)?;
                (water, out.hydrogen, out.oxygen, out.power)
            }
            HydrogenSource::Purchased => (
                Stream::new("water_stream_1").with_phase(Phase::Liquid),
                Stream::with_flows("hydrogen", &[(Chemical::H2, h2_demand)])?,
                Stream::new("oxygen"),
                0.0,
            ),
        };

        let fresh_feed = self.m1101.run(&[&concentrated_co2, &hydrogen]);
        let reactor_feed = self.m1102.run(&[&fresh_feed, &recycle]);
        let [product, spent_catalyst] = self.r1102.run(&reactor_feed, &self.catalyst)?;
        let [gas, condensed] = self.s1102.run(&product)?;
        let [purge, recycled] = self.s1103.run(&gas);
        let [methanol, bottom_water] = self.d1101.run(&condensed)?;
        let gas_out = self.m1104.run(&[&purge, &other_gases]);
        let new_emissions = self.bt.run(power)?;

        let next = tear_vector(&new_emissions, &recycled);
        self.tear = next.clone();
        self.electricity_demand = power;
        self.streams = CcuStreams {
            emissions: new_emissions,
            captured,
            flue_purge,
            vent: absorber.vent,
            absorbed_co2: absorber.concentrated,
            makeup_mea: absorber.makeup_mea,
            concentrated_co2,
            other_gases,
            water_stream,
            hydrogen,
            oxygen,
            reactor_feed,
            product,
            spent_catalyst,
            recycled,
            purge,
            methanol,
            bottom_water,
            gas_out,
        };
        Ok(next)
    }

    fn restart(&mut self) -> FlowsheetResult<()> {
        self.reset()
    }
}

fn tear_vector(emissions: &Stream, recycle: &Stream) -> DVector<f64> {
    DVector::from_iterator(
        2 * N_CHEMICALS,
        Chemical::ALL
            .iter()
            .map(|c| emissions.imol(*c))
            .chain(Chemical::ALL.iter().map(|c| recycle.imol(*c))),
    )
}

fn stream_from_tear<'a>(id: &str, flows: impl Iterator<Item = &'a f64>) -> FlowsheetResult<Stream> {
    let mut stream = Stream::new(id);
    for (chemical, flow) in Chemical::ALL.iter().zip(flows) {
        // NaN is kept so that set_imol reports it
        let flow = if *flow < 0.0 { 0.0 } else { *flow };
        stream.set_imol(*chemical, flow)?;
    }
    Ok(stream)
}

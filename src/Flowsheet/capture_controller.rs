//! Split specifications for two-outlet splitters.
//!
//! The carbon-capture splitter in front of the amine absorber does not use a fixed split. Its
//! split is recomputed every time the recycle solver evaluates the unit:
//!
//! * the first evaluation records the inlet CO2 flow as the *baseline* and passes everything
//!   to the capture path (split = 1);
//! * every later evaluation caps the captured flow at
//!   `baseline * maximum_percent_capture / 100`, i.e. split = `ceiling / inlet_flow` when the
//!   inlet exceeds the ceiling and 1 otherwise.
//!
//! There is no smoothing between evaluations. The controller does not know whether the
//! flowsheet has converged; it only makes the captured flow a bounded function of the inlet
//! flow, so that the recycle solver can reach a fixed point. With an infinite percentage nothing
//! is ever purged and the captured CO2 accumulates around the loop, which the solver reports as
//! a convergence failure.
//!
//! ```rust
//! use biorefinery_ccu::Flowsheet::capture_controller::{CaptureController, SplitController};
//!
//! let mut controller = CaptureController::new(110.0).unwrap();
//! assert_eq!(controller.evaluate(1000.0), 1.0); // baseline
//! assert_eq!(controller.evaluate(1050.0), 1.0);
//! assert!((controller.evaluate(1300.0) - 1100.0 / 1300.0).abs() < 1e-12);
//! ```
use crate::errors::{FlowsheetError, FlowsheetResult};
use enum_dispatch::enum_dispatch;
use log::debug;

/// Strategy deciding the fraction of a splitter inlet routed to its first outlet.
#[enum_dispatch]
pub trait SplitController {
    /// Returns the split fraction in [0, 1] for the current evaluation.
    fn evaluate(&mut self, inlet_flow: f64) -> f64;
    /// Forgets any state remembered from previous evaluations.
    fn reset(&mut self) {}
}

/// Constant split, e.g. the 1 % purge of the methanol recycle gas.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSplit {
    pub split: f64,
}

impl FixedSplit {
    pub fn new(split: f64) -> FlowsheetResult<Self> {
        if !(0.0..=1.0).contains(&split) {
            return Err(FlowsheetError::invalid(
                "split",
                format!("split fraction must lie in [0, 1], got {}", split),
            ));
        }
        Ok(FixedSplit { split })
    }
}

impl SplitController for FixedSplit {
    fn evaluate(&mut self, _inlet_flow: f64) -> f64 {
        self.split
    }
}

/// Caps the captured flow at a percentage of the first observed inlet flow.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureController {
    maximum_percent_capture: f64,
    baseline: Option<f64>,
    last_split: f64,
}

impl CaptureController {
    /// `maximum_percent_capture` must be positive; `f64::INFINITY` disables the cap.
    pub fn new(maximum_percent_capture: f64) -> FlowsheetResult<Self> {
        validate_percent(maximum_percent_capture)?;
        Ok(CaptureController {
            maximum_percent_capture,
            baseline: None,
            last_split: 1.0,
        })
    }

    /// Controller that never throttles.
    pub fn uncapped() -> Self {
        CaptureController {
            maximum_percent_capture: f64::INFINITY,
            baseline: None,
            last_split: 1.0,
        }
    }

    pub fn maximum_percent_capture(&self) -> f64 {
        self.maximum_percent_capture
    }

    /// Changes the cap. A recorded baseline is kept.
    pub fn set_maximum_percent_capture(&mut self, percent: f64) -> FlowsheetResult<()> {
        validate_percent(percent)?;
        self.maximum_percent_capture = percent;
        Ok(())
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// Maximum captured flow, available once the baseline is recorded.
    pub fn ceiling(&self) -> Option<f64> {
        self.baseline.map(|baseline| {
            if self.is_capped() {
                baseline * self.maximum_percent_capture / 100.0
            } else {
                // 0 * inf is NaN
                f64::INFINITY
            }
        })
    }

    pub fn last_split(&self) -> f64 {
        self.last_split
    }

    pub fn is_capped(&self) -> bool {
        self.maximum_percent_capture.is_finite()
    }
}

impl SplitController for CaptureController {
    fn evaluate(&mut self, inlet_flow: f64) -> f64 {
        let split = match self.ceiling() {
            None => {
                debug!("capture baseline set to {:.4} kmol/hr", inlet_flow);
                self.baseline = Some(inlet_flow);
                1.0
            }
            // zero inlet always lands here, so the division below never sees 0
            Some(ceiling) if inlet_flow <= ceiling => 1.0,
            Some(ceiling) => ceiling / inlet_flow,
        };
        self.last_split = split;
        split
    }

    fn reset(&mut self) {
        self.baseline = None;
        self.last_split = 1.0;
    }
}

fn validate_percent(percent: f64) -> FlowsheetResult<()> {
    if percent.is_nan() || percent <= 0.0 {
        return Err(FlowsheetError::invalid(
            "maximum_percent_capture",
            format!("must be positive (infinity disables the cap), got {}", percent),
        ));
    }
    Ok(())
}

/// Split specification carried by a [`crate::Flowsheet::units::Splitter`].
#[enum_dispatch(SplitController)]
#[derive(Debug, Clone, PartialEq)]
pub enum SplitSpec {
    FixedSplit,
    CaptureController,
}

//! # Settings Module
//!
//! ## Purpose
//! Holds every number the CCU flowsheet, its recycle solver and the 45Q incentive need, and
//! persists them as JSON (`ccu_config.json` by default). Nothing in the crate reads global
//! state: a [`CcuConfig`] is passed explicitly to [`crate::Flowsheet::ccu_system::CcuSystem::new`].
//!
//! ## Key Features
//! - **Defaults**: a missing file (or missing keys) falls back to default values
//! - **Validation**: ranges are checked before a configuration is accepted
//! - **Persistence**: `save_config` writes pretty-printed JSON
//!
//! ## Configuration Format
//! ```json
//! {
//!   "maximum_percent_capture": 150.0,
//!   "hydrogen_source": "Electrolyzer",
//!   "solver": { "method": "FixedPoint", "maxiter": 500, "mol": 0.001, "rmol": 0.001,
//!               "fallback_methods": ["FixedPoint", "Aitken"] },
//!   ...
//! }
//! ```
//! `"maximum_percent_capture": null` disables the capture cap (JSON has no infinity).
use crate::Flowsheet::stream::{Chemical, Stream};
use crate::Solvers::recycle::{RecycleSolver, SolverMethod};
use crate::errors::{FlowsheetError, FlowsheetResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "ccu_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HydrogenSource {
    /// on-site water electrolysis powered by the biorefinery boiler
    #[default]
    Electrolyzer,
    /// hydrogen bought over the fence, no electricity drawn
    Purchased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    pub maxiter: usize,
    pub mol: f64,
    pub rmol: f64,
    /// tried in order after `method` fails, each from a reset flowsheet
    pub fallback_methods: Vec<SolverMethod>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::FixedPoint,
            maxiter: 500,
            mol: 1e-3,
            rmol: 1e-3,
            fallback_methods: vec![SolverMethod::FixedPoint, SolverMethod::Aitken],
        }
    }
}

impl SolverConfig {
    pub fn build(&self) -> FlowsheetResult<RecycleSolver> {
        let mut solver = RecycleSolver::new(self.method, self.maxiter, self.mol, self.rmol);
        solver.set_tolerance(Some(self.mol), Some(self.rmol), Some(self.maxiter))?;
        Ok(solver)
    }
}

/// Flue gas of the biorefinery boiler and fermentation off-gas, kmol/hr.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiorefineryConfig {
    pub boiler_co2: f64,
    pub boiler_h2o: f64,
    pub boiler_n2: f64,
    pub boiler_o2: f64,
    pub fermentation_co2: f64,
    pub fermentation_h2o: f64,
    /// electricity the biorefinery exports today, kW
    pub surplus_power: f64,
    /// kmol CO2 emitted per kWh produced from extra natural gas
    pub natural_gas_co2_per_kwh: f64,
}

impl Default for BiorefineryConfig {
    fn default() -> Self {
        Self {
            boiler_co2: 2800.0,
            boiler_h2o: 2400.0,
            boiler_n2: 11000.0,
            boiler_o2: 900.0,
            fermentation_co2: 470.0,
            fermentation_h2o: 5.0,
            surplus_power: 0.0,
            natural_gas_co2_per_kwh: 0.0125,
        }
    }
}

impl BiorefineryConfig {
    pub fn boiler_emissions(&self) -> FlowsheetResult<Stream> {
        Stream::with_flows(
            "emissions_BT",
            &[
                (Chemical::CO2, self.boiler_co2),
                (Chemical::H2O, self.boiler_h2o),
                (Chemical::N2, self.boiler_n2),
                (Chemical::O2, self.boiler_o2),
            ],
        )
    }

    pub fn fermentation_emissions(&self) -> FlowsheetResult<Stream> {
        Stream::with_flows(
            "emissions_fermentation",
            &[
                (Chemical::CO2, self.fermentation_co2),
                (Chemical::H2O, self.fermentation_h2o),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub co2_recovery: f64,
    /// kg MEA per kmol CO2 recovered
    pub mea_makeup_per_co2: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            co2_recovery: 0.8,
            mea_makeup_per_co2: 0.066,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethanolConfig {
    /// single-pass conversion of the limiting reactant
    pub conversion: f64,
    /// fraction of the loop gas purged
    pub purge_split: f64,
    /// methanol recovery in the distillate
    pub lr: f64,
    /// water recovery in the bottoms
    pub hr: f64,
    /// catalyst feed, kmol/hr
    pub catalyst_makeup: f64,
    pub kwh_per_kg_h2: f64,
}

impl Default for MethanolConfig {
    fn default() -> Self {
        Self {
            conversion: 0.25,
            purge_split: 0.01,
            lr: 0.9999,
            hr: 0.9999,
            catalyst_makeup: 0.001,
            kwh_per_kg_h2: 55.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeaConfig {
    /// USD per tonne CO2 (45Q)
    pub carbon_credit: f64,
    pub credit_years: usize,
    pub operating_days: f64,
}

impl Default for TeaConfig {
    fn default() -> Self {
        Self {
            carbon_credit: 85.0,
            credit_years: 12,
            operating_days: 350.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcuConfig {
    /// percent of the first observed boiler emissions that may be captured; `None` = no cap
    pub maximum_percent_capture: Option<f64>,
    pub hydrogen_source: HydrogenSource,
    pub solver: SolverConfig,
    pub biorefinery: BiorefineryConfig,
    pub capture: CaptureConfig,
    pub methanol: MethanolConfig,
    pub tea: TeaConfig,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for CcuConfig {
    fn default() -> Self {
        Self {
            maximum_percent_capture: Some(150.0),
            hydrogen_source: HydrogenSource::Electrolyzer,
            solver: SolverConfig::default(),
            biorefinery: BiorefineryConfig::default(),
            capture: CaptureConfig::default(),
            methanol: MethanolConfig::default(),
            tea: TeaConfig::default(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl CcuConfig {
    /// Capture percentage as used by the controller, `f64::INFINITY` for no cap.
    pub fn percent_capture(&self) -> f64 {
        self.maximum_percent_capture.unwrap_or(f64::INFINITY)
    }

    pub fn validate(&self) -> FlowsheetResult<()> {
        if let Some(pct) = self.maximum_percent_capture {
            if !(pct > 0.0) || pct.is_infinite() {
                return Err(FlowsheetError::invalid(
                    "maximum_percent_capture",
                    format!("must be positive and finite, or null for no cap, got {}", pct),
                ));
            }
        }
        self.solver.build()?;
        let b = &self.biorefinery;
        for (name, value) in [
            ("boiler_co2", b.boiler_co2),
            ("boiler_h2o", b.boiler_h2o),
            ("boiler_n2", b.boiler_n2),
            ("boiler_o2", b.boiler_o2),
            ("fermentation_co2", b.fermentation_co2),
            ("fermentation_h2o", b.fermentation_h2o),
            ("surplus_power", b.surplus_power),
            ("natural_gas_co2_per_kwh", b.natural_gas_co2_per_kwh),
            ("mea_makeup_per_co2", self.capture.mea_makeup_per_co2),
            ("catalyst_makeup", self.methanol.catalyst_makeup),
            ("kwh_per_kg_h2", self.methanol.kwh_per_kg_h2),
            ("carbon_credit", self.tea.carbon_credit),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(FlowsheetError::invalid(
                    name,
                    format!("must be finite and non-negative, got {}", value),
                ));
            }
        }
        for (name, value) in [
            ("co2_recovery", self.capture.co2_recovery),
            ("conversion", self.methanol.conversion),
            ("purge_split", self.methanol.purge_split),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FlowsheetError::invalid(
                    name,
                    format!("must lie in [0, 1], got {}", value),
                ));
            }
        }
        if !(self.tea.operating_days > 0.0 && self.tea.operating_days <= 366.0) {
            return Err(FlowsheetError::invalid(
                "operating_days",
                format!("must lie in (0, 366], got {}", self.tea.operating_days),
            ));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(FlowsheetError::invalid(
                "log_level",
                format!("unknown level '{}'", self.log_level),
            ));
        }
        Ok(())
    }
}

/// Loads, edits and saves a [`CcuConfig`] bound to one JSON file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CcuConfig,
    config_file: String,
}

impl ConfigManager {
    /// Manager bound to `ccu_config.json` in the current directory.
    pub fn new() -> Self {
        Self::with_config_file(DEFAULT_CONFIG_FILE)
    }

    /// Loads `config_file`; an unreadable or invalid file falls back to the defaults.
    pub fn with_config_file(config_file: &str) -> Self {
        Self::try_with_config_file(config_file).unwrap_or_else(|e| {
            warn!("using default configuration: {}", e);
            Self::from_config(CcuConfig::default(), config_file)
        })
    }

    /// Loads `config_file`, reporting an unreadable or invalid file as an error. A missing file
    /// yields the defaults.
    pub fn try_with_config_file(config_file: &str) -> FlowsheetResult<Self> {
        let config = Self::load_config(config_file)?;
        Ok(Self::from_config(config, config_file))
    }

    /// Manager holding `config` without reading `config_file`.
    pub fn from_config(config: CcuConfig, config_file: &str) -> Self {
        Self {
            config,
            config_file: config_file.to_string(),
        }
    }

    /// Reads and validates a configuration. A missing file yields the defaults.
    pub fn load_config(config_file: &str) -> FlowsheetResult<CcuConfig> {
        if !Path::new(config_file).exists() {
            return Ok(CcuConfig::default());
        }
        let content = fs::read_to_string(config_file).map_err(|source| FlowsheetError::Io {
            path: config_file.to_string(),
            source,
        })?;
        let config: CcuConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("loaded configuration from '{}'", config_file);
        Ok(config)
    }

    pub fn save_config(&self) -> FlowsheetResult<()> {
        let content = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.config_file, content).map_err(|source| FlowsheetError::Io {
            path: self.config_file.clone(),
            source,
        })?;
        info!("configuration written to '{}'", self.config_file);
        Ok(())
    }

    pub fn get_config(&self) -> &CcuConfig {
        &self.config
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Replaces the configuration after validating it. Does not save.
    pub fn set_config(&mut self, config: CcuConfig) -> FlowsheetResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// `None` disables the cap.
    pub fn set_maximum_percent_capture(&mut self, percent: Option<f64>) -> FlowsheetResult<()> {
        let mut config = self.config.clone();
        config.maximum_percent_capture = percent;
        self.set_config(config)
    }

    pub fn reset_to_defaults(&mut self) -> FlowsheetResult<()> {
        self.config = CcuConfig::default();
        self.save_config()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = CcuConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.percent_capture(), 150.0);
        assert_eq!(config.solver.maxiter, 500);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let manager = ConfigManager::with_config_file("/nonexistent/dir/ccu_config.json");
        assert_eq!(manager.get_config(), &CcuConfig::default());
    }

    #[test]
    fn test_partial_file_and_null_cap() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "maximum_percent_capture": null, "solver": {{ "maxiter": 20 }}, "hydrogen_source": "Purchased" }}"#
        )
        .unwrap();
        let config = ConfigManager::load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.maximum_percent_capture, None);
        assert_eq!(config.percent_capture(), f64::INFINITY);
        assert_eq!(config.solver.maxiter, 20);
        assert_eq!(config.solver.rmol, 1e-3);
        assert_eq!(
            config.solver.fallback_methods,
            vec![SolverMethod::FixedPoint, SolverMethod::Aitken]
        );
        assert_eq!(config.hydrogen_source, HydrogenSource::Purchased);
        assert_eq!(config.methanol, MethanolConfig::default());
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let mut broken = NamedTempFile::new().unwrap();
        write!(broken, "{{ not json").unwrap();
        let err = ConfigManager::load_config(broken.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FlowsheetError::ConfigFormat(_)));

        let mut negative = NamedTempFile::new().unwrap();
        write!(negative, r#"{{ "maximum_percent_capture": -5.0 }}"#).unwrap();
        let err = ConfigManager::load_config(negative.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FlowsheetError::InvalidParameter { .. }));

        // the manager falls back to defaults; the fallible constructor reports the problem
        let manager = ConfigManager::with_config_file(negative.path().to_str().unwrap());
        assert_eq!(manager.get_config().maximum_percent_capture, Some(150.0));
        assert_eq!(manager.config_file(), negative.path().to_str().unwrap());
        assert!(matches!(
            ConfigManager::try_with_config_file(broken.path().to_str().unwrap()),
            Err(FlowsheetError::ConfigFormat(_))
        ));
        assert!(ConfigManager::try_with_config_file("/nonexistent/dir/ccu_config.json").is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let mut manager = ConfigManager::with_config_file(&path);
        manager.set_maximum_percent_capture(Some(110.0)).unwrap();
        manager.save_config().unwrap();

        let reloaded = ConfigManager::with_config_file(&path);
        assert_eq!(reloaded.get_config().maximum_percent_capture, Some(110.0));

        assert!(manager.set_maximum_percent_capture(Some(0.0)).is_err());
        assert_eq!(manager.get_config().maximum_percent_capture, Some(110.0));

        manager.set_maximum_percent_capture(None).unwrap();
        manager.save_config().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"maximum_percent_capture\": null"));

        manager.reset_to_defaults().unwrap();
        let reloaded = ConfigManager::with_config_file(&path);
        assert_eq!(reloaded.get_config(), &CcuConfig::default());
    }

    #[test]
    fn test_bad_log_level() {
        let mut config = CcuConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
        config.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }
}

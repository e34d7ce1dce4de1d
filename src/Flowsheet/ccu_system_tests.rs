/////////////////////////////////////////////////////////////////////////////////////////////////////
// TESTS
/////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use crate::Flowsheet::capture_controller::{
        CaptureController, FixedSplit, SplitController, SplitSpec,
    };
    use crate::Flowsheet::ccu_system::CcuSystem;
    use crate::Flowsheet::stream::Chemical;
    use crate::Solvers::recycle::{RecycleLoop, RecycleSolver, SolverMethod};
    use crate::errors::{FlowsheetError, FlowsheetResult};
    use crate::settings::{CcuConfig, HydrogenSource};
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    /// Captured flow fed back to the capture point amplified by `gain` each pass.
    struct AccumulationLoop {
        controller: CaptureController,
        gain: f64,
        initial_flow: f64,
        observed: Vec<f64>,
        captured: Vec<f64>,
    }

    impl AccumulationLoop {
        fn new(percent: f64) -> Self {
            AccumulationLoop {
                controller: CaptureController::new(percent).unwrap(),
                gain: 1.2,
                initial_flow: 1000.0,
                observed: Vec::new(),
                captured: Vec::new(),
            }
        }
    }

    impl RecycleLoop for AccumulationLoop {
        fn tear_guess(&self) -> DVector<f64> {
            DVector::from_element(1, self.initial_flow)
        }

        fn evaluate(&mut self, tear: &DVector<f64>) -> FlowsheetResult<DVector<f64>> {
            let flow = tear[0];
            let split = self.controller.evaluate(flow);
            self.observed.push(flow);
            self.captured.push(split * flow);
            Ok(DVector::from_element(1, self.gain * split * flow))
        }
    }

    #[test]
    fn test_no_cap_accumulates_until_budget_is_exhausted() {
        let mut lp = AccumulationLoop::new(f64::INFINITY);
        let mut solver = RecycleSolver::new(SolverMethod::FixedPoint, 5, 1e-3, 1e-3);
        let result = solver.solve(&mut lp);
        assert!(matches!(
            result,
            Err(FlowsheetError::ConvergenceFailure { iterations: 5, .. })
        ));
        assert_eq!(lp.controller.baseline(), Some(1000.0));
        assert_eq!(lp.controller.last_split(), 1.0);
        for (observed, captured) in lp.observed.iter().zip(&lp.captured) {
            assert_eq!(observed, captured);
        }
        assert_relative_eq!(lp.observed[4], 1000.0 * 1.2_f64.powi(4), epsilon = 1e-9);
        let returned = 1.2 * lp.captured[4];
        assert!(returned > 2.0 * 1000.0);
    }

    #[test]
    fn test_cap_reaches_fixed_point() {
        let mut lp = AccumulationLoop::new(110.0);
        let mut solver = RecycleSolver::new(SolverMethod::FixedPoint, 5, 1e-3, 1e-3);
        let solution = solver.solve(&mut lp).unwrap();
        assert_eq!(solution.iterations, 3);
        assert_relative_eq!(solution.tear[0], 1320.0, epsilon = 1e-9);
        assert_eq!(lp.observed.len(), 3);
        for (observed, expected) in lp.observed.iter().zip([1000.0, 1200.0, 1320.0]) {
            assert_relative_eq!(*observed, expected, epsilon = 1e-9);
        }
        assert!(lp.captured.iter().all(|c| *c <= 1100.0 + 1e-9));
        assert_relative_eq!(*lp.captured.last().unwrap(), 1100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cap_with_wegstein() {
        let mut lp = AccumulationLoop::new(110.0);
        let mut solver = RecycleSolver::new(SolverMethod::Wegstein, 20, 1e-6, 1e-9);
        let solution = solver.solve(&mut lp).unwrap();
        assert_relative_eq!(solution.tear[0], 1320.0, epsilon = 1e-6);
        assert!(lp.captured.iter().all(|c| *c <= 1100.0 + 1e-9));
    }

    fn config(percent: Option<f64>) -> CcuConfig {
        let mut config = CcuConfig::default();
        config.maximum_percent_capture = percent;
        config
    }

    #[test]
    fn test_single_pass_raises_boiler_emissions() {
        for percent in [None, Some(150.0)] {
            let mut system = CcuSystem::new(&config(percent)).unwrap();
            let co2_before = system.emissions().imol(Chemical::CO2);
            assert_relative_eq!(co2_before, 2800.0);
            system.run_once().unwrap();
            let co2_after = system.emissions().imol(Chemical::CO2);
            assert!(
                co2_after > 1.2 * co2_before,
                "emissions did not increase after a loop; before {}, after {}",
                co2_before,
                co2_after
            );
            assert!(system.electricity_demand_kw() > 0.0);
        }
    }

    #[test]
    fn test_no_cap_does_not_converge() {
        let mut config = config(None);
        config.solver.maxiter = 50;
        let mut system = CcuSystem::new(&config).unwrap();
        let co2_initial = system.emissions().imol(Chemical::CO2);
        match system.simulate() {
            Err(FlowsheetError::ConvergenceFailure { iterations, .. }) => {
                assert_eq!(iterations, 50)
            }
            other => panic!("system should not converge, got {:?}", other.map(|s| s.iterations)),
        }
        let co2_final = system.emissions().imol(Chemical::CO2);
        assert!(
            co2_final > 1000.0 * co2_initial,
            "system should not converge; there was no accumulation"
        );
        let controller = system.capture_controller().unwrap();
        assert_eq!(controller.last_split(), 1.0);
    }

    #[test]
    fn test_runaway_overflow_is_a_convergence_failure() {
        let mut config = config(None);
        config.solver.maxiter = 1000;
        let mut system = CcuSystem::new(&config).unwrap();
        match system.simulate() {
            Err(FlowsheetError::ConvergenceFailure {
                iterations,
                residual,
            }) => {
                assert!(iterations < 1000);
                assert!(residual.is_infinite());
            }
            other => panic!(
                "runaway should end in a convergence failure, got {:?}",
                other.map(|s| s.iterations)
            ),
        }
    }

    #[test]
    fn test_cap_converges_and_bounds_capture() {
        let mut system = CcuSystem::new(&config(Some(110.0))).unwrap();
        let initial = system.emissions().clone();
        system
            .solver_mut()
            .set_tolerance(None, Some(0.01), None)
            .unwrap();
        let solution = system.simulate().unwrap();
        assert!(solution.iterations < 500);

        let baseline = system.capture_controller().unwrap().baseline().unwrap();
        assert_relative_eq!(baseline, initial.f_mol(), epsilon = 1e-9);
        let ceiling = 1.1 * baseline;
        assert!(
            system
                .captured_history()
                .iter()
                .all(|c| *c <= ceiling * (1.0 + 1e-12))
        );
        assert_relative_eq!(system.captured().f_mol(), ceiling, max_relative = 1e-9);

        let co2_final = system.emissions().imol(Chemical::CO2);
        assert!(co2_final > initial.imol(Chemical::CO2));
        assert!(co2_final < 1000.0 * initial.imol(Chemical::CO2));
        assert!(system.methanol().imol(Chemical::CH3OH) > 0.0);
    }

    #[test]
    fn test_converged_loop_closes_carbon_balance() {
        let mut config = config(Some(110.0));
        config.solver.rmol = 1e-7;
        config.solver.mol = 1e-7;
        // excess fermentation CO2 builds up in the recycle and leaves only with the 1 % purge
        config.solver.maxiter = 5000;
        let mut system = CcuSystem::new(&config).unwrap();
        system.simulate().unwrap();

        let s = system.streams();
        let carbon_in = s.concentrated_co2.carbon_flow();
        let carbon_out =
            s.methanol.carbon_flow() + s.bottom_water.carbon_flow() + s.purge.carbon_flow();
        assert_relative_eq!(carbon_in, carbon_out, max_relative = 1e-4);

        // H2:CO2 = 3:1 on the CO2 from the absorber, fermentation CO2 is not hydrogenated
        assert_relative_eq!(
            s.hydrogen.imol(Chemical::H2),
            3.0 * s.absorbed_co2.imol(Chemical::CO2),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            s.concentrated_co2.imol(Chemical::CO2) - s.absorbed_co2.imol(Chemical::CO2),
            470.0,
            max_relative = 1e-12
        );
        assert!(s.recycled.imol(Chemical::CO2) > 470.0);
        assert_relative_eq!(
            s.oxygen.imol(Chemical::O2),
            0.5 * s.water_stream.imol(Chemical::H2O),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_purchased_hydrogen_needs_no_cap() {
        let mut config = config(None);
        config.hydrogen_source = HydrogenSource::Purchased;
        let mut system = CcuSystem::new(&config).unwrap();
        let initial = system.emissions().clone();
        system.simulate().unwrap();
        assert_eq!(system.electricity_demand_kw(), 0.0);
        assert_relative_eq!(
            system.emissions().imol(Chemical::CO2),
            initial.imol(Chemical::CO2)
        );
        assert!(system.streams().oxygen.is_empty());
        assert_relative_eq!(system.captured().f_mol(), initial.f_mol());
    }

    #[test]
    fn test_reset_clears_baseline_and_state() {
        let mut system = CcuSystem::new(&config(Some(110.0))).unwrap();
        let initial = system.emissions().clone();
        system.run_once().unwrap();
        system.run_once().unwrap();
        assert!(system.capture_controller().unwrap().baseline().is_some());
        assert_eq!(system.captured_history().len(), 2);

        system.reset().unwrap();
        assert_eq!(system.capture_controller().unwrap().baseline(), None);
        assert!(system.captured_history().is_empty());
        assert_eq!(system.emissions(), &initial);
        assert_eq!(system.electricity_demand_kw(), 0.0);

        system.run_once().unwrap();
        assert_eq!(
            system.capture_controller().unwrap().baseline(),
            Some(initial.f_mol())
        );
    }

    #[test]
    fn test_repeated_simulations_are_independent() {
        let mut system = CcuSystem::new(&config(Some(110.0))).unwrap();
        let first = system.simulate().unwrap();
        let methanol_first = system.methanol().imol(Chemical::CH3OH);
        let baseline_first = system.capture_controller().unwrap().baseline();

        let second = system.simulate().unwrap();
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(system.capture_controller().unwrap().baseline(), baseline_first);
        assert_relative_eq!(system.methanol().imol(Chemical::CH3OH), methanol_first);

        let mut fresh = CcuSystem::new(&config(Some(110.0))).unwrap();
        let third = fresh.simulate().unwrap();
        assert_eq!(third.iterations, first.iterations);
        assert_relative_eq!(fresh.methanol().imol(Chemical::CH3OH), methanol_first);
    }

    #[test]
    fn test_removing_the_cap_on_a_built_system() {
        let mut config = config(Some(110.0));
        config.solver.maxiter = 30;
        let mut system = CcuSystem::new(&config).unwrap();
        system.set_maximum_percent_capture(f64::INFINITY).unwrap();
        assert!(system.simulate().is_err());
        assert!(system.set_maximum_percent_capture(0.0).is_err());
    }

    #[test]
    fn test_fixed_capture_split_replaces_controller() {
        let mut system = CcuSystem::new(&config(Some(110.0))).unwrap();
        assert_eq!(system.capture_splitter().id, "S1300");
        system.capture_splitter_mut().split = SplitSpec::from(FixedSplit::new(0.1).unwrap());
        assert!(system.capture_controller().is_none());
        assert!(system.set_maximum_percent_capture(150.0).is_err());

        let emissions = system.emissions().f_mol();
        system.run_once().unwrap();
        assert_relative_eq!(system.captured().f_mol(), 0.1 * emissions, max_relative = 1e-12);
    }

    #[test]
    fn test_fallback_simulation() {
        let config = config(Some(110.0));
        let mut system = CcuSystem::new(&config).unwrap();
        assert_eq!(
            system.fallback_methods(),
            &[SolverMethod::FixedPoint, SolverMethod::Aitken]
        );
        let direct = system.simulate().unwrap();
        let methanol = system.methanol().imol(Chemical::CH3OH);
        let with_fallback = system.simulate_with_fallback().unwrap();
        assert_eq!(direct.iterations, with_fallback.iterations);
        assert_relative_eq!(system.methanol().imol(Chemical::CH3OH), methanol);

        // every attempt starts from a reset system, so the baseline stays the initial emissions
        let mut config = config.clone();
        config.maximum_percent_capture = None;
        config.solver.maxiter = 20;
        let mut system = CcuSystem::new(&config).unwrap();
        let initial = system.emissions().f_mol();
        assert!(matches!(
            system.simulate_with_fallback(),
            Err(FlowsheetError::ConvergenceFailure { .. })
        ));
        assert_eq!(
            system.capture_controller().unwrap().baseline(),
            Some(initial)
        );
        assert_eq!(system.captured_history().len(), 20);
    }
}

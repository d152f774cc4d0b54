#[cfg(test)]
mod tests {
    use crate::Components::component_table::{ComponentRecord, ComponentTable};
    use crate::Components::property_models::{ConstantModel, CorrelationModel};
    use crate::Kinetics::KineticsEngine::{KineticsEngine, RateConstant};
    use crate::Phases::PhaseState::{
        CompositionSpec, PhaseConfig, PhaseKind, PhaseState, SizeSpec,
    };
    use crate::Phases::StreamState::{FlowRate, StreamState};
    use crate::Reactors::BalanceAssembler::{BalanceAssembler, BalanceError};
    use crate::Reactors::ReactorModel::{
        ReactorConfig, ReactorError, ReactorFeed, ReactorKind, ReactorModel, ReactorStatus,
    };
    use crate::Reactors::SolverAdapter::{SolverFailure, SolverSettings};
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(name: &str, molar_mass: f64, density: f64, cp: f64) -> ComponentRecord {
        ComponentRecord {
            name: name.to_string(),
            molar_mass,
            density: CorrelationModel::Constant(ConstantModel::new(density)),
            heat_capacity: CorrelationModel::Constant(ConstantModel::new(cp)),
            formation_enthalpy: 0.0,
        }
    }

    fn ab_table() -> Arc<ComponentTable> {
        // isomerization pair: equal molar masses, so total mass and total
        // moles are both conserved by A => B
        Arc::new(
            ComponentTable::from_records(vec![
                record("A", 92.14, 900.0, 150.0),
                record("B", 92.14, 900.0, 150.0),
            ])
            .unwrap(),
        )
    }

    fn first_order_engine(table: &Arc<ComponentTable>, k: f64) -> KineticsEngine {
        KineticsEngine::from_equations(
            table,
            vec![("A=>B".to_string(), RateConstant::Constant { k })],
        )
        .unwrap()
    }

    fn pure_a_phase(table: &Arc<ComponentTable>, size: SizeSpec) -> PhaseState {
        let config = PhaseConfig::new(
            CompositionSpec::MoleFractions(vec![1.0, 0.0]),
            298.15,
            size,
        );
        PhaseState::create(table, config, PhaseKind::Liquid).unwrap()
    }

    fn loose_settings() -> SolverSettings {
        SolverSettings {
            max_step: 0.5,
            ..SolverSettings::default()
        }
    }

    ///////////////////////////////STATE MACHINE//////////////////////////////////////

    #[test]
    fn test_new_model_is_unconfigured() {
        let model = ReactorModel::new();
        assert_eq!(model.status(), ReactorStatus::Unconfigured);
        assert!(model.trajectory().is_empty());
        assert!(model.last_failure().is_none());
    }

    #[test]
    fn test_solve_before_configure_is_rejected() {
        let mut model = ReactorModel::new();
        match model.solve() {
            Err(ReactorError::InvalidStateTransition { from, .. }) => {
                assert_eq!(from, ReactorStatus::Unconfigured);
            }
            _ => panic!("Expected InvalidStateTransition error"),
        }
    }

    #[test]
    fn test_reset_before_configure_is_rejected() {
        let mut model = ReactorModel::new();
        assert!(matches!(
            model.reset(),
            Err(ReactorError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_configure_batch() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0));
        model
            .configure(config, ReactorFeed::InitialPhase(phase), engine)
            .unwrap();
        assert_eq!(model.status(), ReactorStatus::Configured);
    }

    #[test]
    fn test_configure_rejects_bad_tolerances() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let mut settings = SolverSettings::default();
        settings.rel_tol = -1e-6;
        let config =
            ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0)).with_settings(settings);
        assert!(matches!(
            model.configure(config, ReactorFeed::InitialPhase(phase), engine),
            Err(ReactorError::InvalidConfiguration(_))
        ));
        assert_eq!(model.status(), ReactorStatus::Unconfigured);
    }

    #[test]
    fn test_configure_rejects_zero_segments_plug_flow() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Volume(0.001));
        let stream = StreamState::create(phase, FlowRate::Volumetric(1e-4));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::PlugFlow, (0.0, 10.0))
            .with_volume(0.001)
            .with_segments(0);
        assert!(matches!(
            model.configure(config, ReactorFeed::InletStream(stream), engine),
            Err(ReactorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_configure_rejects_feed_kind_mismatch() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Cstr, (0.0, 10.0)).with_volume(0.001);
        assert!(matches!(
            model.configure(config, ReactorFeed::InitialPhase(phase), engine),
            Err(ReactorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_configure_rejects_foreign_component_table() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let other_table = Arc::new(
            ComponentTable::from_records(vec![
                record("X", 10.0, 900.0, 150.0),
                record("Y", 10.0, 900.0, 150.0),
            ])
            .unwrap(),
        );
        let phase = pure_a_phase(&other_table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0));
        assert!(matches!(
            model.configure(config, ReactorFeed::InitialPhase(phase), engine),
            Err(ReactorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_configure_rejects_zero_holdup_batch_feed() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(0.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0));
        assert!(matches!(
            model.configure(config, ReactorFeed::InitialPhase(phase), engine),
            Err(ReactorError::MissingData(_))
        ));
    }

    #[test]
    fn test_reverse_flow_needs_explicit_permission() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Volume(0.001));
        let stream = StreamState::create(phase, FlowRate::Volumetric(-1e-4));

        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Cstr, (0.0, 10.0)).with_volume(0.001);
        assert!(matches!(
            model.configure(
                config,
                ReactorFeed::InletStream(stream.clone()),
                engine.clone()
            ),
            Err(ReactorError::InvalidConfiguration(_))
        ));

        let config = ReactorConfig::new(ReactorKind::Cstr, (0.0, 10.0))
            .with_volume(0.001)
            .with_allow_reverse_flow(true);
        model
            .configure(config, ReactorFeed::InletStream(stream), engine)
            .unwrap();
        assert_eq!(model.status(), ReactorStatus::Configured);
    }

    ///////////////////////////////BALANCE ASSEMBLY//////////////////////////////////////

    fn batch_assembler(moles_a: f64) -> BalanceAssembler {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(moles_a));
        BalanceAssembler::new(
            ReactorKind::Batch,
            0.0,
            1,
            &ReactorFeed::InitialPhase(phase),
            engine,
            false,
            Vec::new(),
            None,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_batch_rhs_first_order() {
        let assembler = batch_assembler(1.0);
        let y0 = assembler.initial_state();
        // packed as [n_A, n_B, T]
        assert_eq!(y0.len(), 3);
        assert_relative_eq!(y0[0], 1.0, max_relative = 1e-9);
        assert_relative_eq!(y0[1], 0.0, max_relative = 1e-9);
        assert_relative_eq!(y0[2], 298.15, max_relative = 1e-12);

        let dy = assembler.rhs(0.0, &y0).unwrap();
        // dn_A/dt = -k*c_A*V = -k*n_A, first order in concentration
        assert_relative_eq!(dy[0], -0.1 * 1.0, max_relative = 1e-9);
        assert_relative_eq!(dy[1], 0.1 * 1.0, max_relative = 1e-9);
        // energy balance off: temperature is frozen
        assert_eq!(dy[2], 0.0);
    }

    #[test]
    fn test_rhs_packing_mismatch_is_assembly_error() {
        let assembler = batch_assembler(1.0);
        let bad = DVector::from_vec(vec![1.0, 0.0]);
        assert!(matches!(
            assembler.rhs(0.0, &bad),
            Err(BalanceError::BalanceAssemblyError(_))
        ));
    }

    #[test]
    fn test_residual_of_consistent_state_is_zero() {
        let assembler = batch_assembler(1.0);
        let y0 = assembler.initial_state();
        let dy0 = assembler.rhs(0.0, &y0).unwrap();
        let residual = assembler.residual(0.0, &y0, &dy0).unwrap();
        assert!(residual.norm() < 1e-12);
    }

    #[test]
    fn test_residual_with_mass_closure() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let assembler = BalanceAssembler::new(
            ReactorKind::Batch,
            0.0,
            1,
            &ReactorFeed::InitialPhase(phase),
            engine,
            false,
            Vec::new(),
            None,
            true,
        )
        .unwrap();
        let y0 = assembler.initial_state();
        let dy0 = assembler.rhs(0.0, &y0).unwrap();
        // the closure row replaces the last species equation; at the initial
        // state the total mass matches the reference exactly
        let residual = assembler.residual(0.0, &y0, &dy0).unwrap();
        assert!(residual.norm() < 1e-12);

        // perturbing the holdup violates the closure
        let mut y = y0.clone();
        y[0] += 0.1;
        let dy = assembler.rhs(0.0, &y).unwrap();
        let residual = assembler.residual(0.0, &y, &dy).unwrap();
        assert_relative_eq!(residual[1], 0.1 * 92.14 / 1000.0, max_relative = 1e-9);
    }

    #[test]
    fn test_exothermic_batch_heating_rate() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(2.0));
        let q_rxn = 50000.0; // J/mol, exothermic
        let assembler = BalanceAssembler::new(
            ReactorKind::Batch,
            0.0,
            1,
            &ReactorFeed::InitialPhase(phase.clone()),
            engine,
            true,
            vec![q_rxn],
            None,
            false,
        )
        .unwrap();
        let y0 = assembler.initial_state();
        let dy = assembler.rhs(0.0, &y0).unwrap();
        // dT/dt = q*r*V/(n_tot*Cp); r*V = k*n_A
        let expected = q_rxn * 0.1 * 2.0 / (2.0 * 150.0);
        assert_relative_eq!(dy[2], expected, max_relative = 1e-9);
        assert!(dy[2] > 0.0);
    }

    #[test]
    fn test_symbolic_system_matches_numeric_rhs() {
        let table = ab_table();
        let engine = KineticsEngine::from_equations(
            &table,
            vec![(
                "A=>B".to_string(),
                RateConstant::Arrhenius {
                    a: 1e6,
                    n: 0.0,
                    e: 40000.0,
                },
            )],
        )
        .unwrap();
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.5));
        let assembler = BalanceAssembler::new(
            ReactorKind::Batch,
            0.0,
            1,
            &ReactorFeed::InitialPhase(phase),
            engine,
            true,
            vec![30000.0],
            None,
            false,
        )
        .unwrap();
        let system = assembler.assemble_symbolic().unwrap();
        assert_eq!(system.unknowns, vec!["N0", "N1", "T"]);

        // evaluate the symbolic system at a state away from the initial one
        let y = DVector::from_vec(vec![0.9, 0.6, 340.0]);
        let numeric = assembler.rhs(0.0, &y).unwrap();
        let names: Vec<&str> = system.unknowns.iter().map(|s| s.as_str()).collect();
        for (row, eq) in system.eq_system.iter().enumerate() {
            let f = eq.clone().lambdify_owned(names.clone());
            let symbolic = f(vec![y[0], y[1], y[2]]);
            assert_relative_eq!(symbolic, numeric[row], max_relative = 1e-9);
        }
    }

    ///////////////////////////////FULL SOLVES//////////////////////////////////////

    #[test]
    fn test_batch_first_order_conversion() {
        // A => B, k = 0.1 1/s, n_A(0) = 1 mol: n_B(10) = 1 - exp(-1)
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0))
            .with_settings(loose_settings());
        model
            .configure(config, ReactorFeed::InitialPhase(phase), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);

        let final_phase = model.final_phase().unwrap();
        let n_b = final_phase.species_moles()[1];
        assert_relative_eq!(n_b, 1.0 - (-1.0_f64).exp(), max_relative = 1e-2);

        // mass conservation along the whole trajectory: n_A + n_B = 1
        for (_, phase) in model.trajectory() {
            assert_relative_eq!(phase.moles, 1.0, max_relative = 1e-3);
        }

        let quality = model.solution_quality().unwrap();
        assert!(quality.mass_drift_rel < 1e-3);
        assert!(quality.negative_moles_points.is_empty());
    }

    #[test]
    fn test_failed_solve_reset_reconfigure_succeeds() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();

        // a zero wall-clock budget fails deterministically with Timeout
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0))
            .with_settings(loose_settings())
            .with_timeout(Duration::ZERO);
        model
            .configure(
                config,
                ReactorFeed::InitialPhase(phase.clone()),
                engine.clone(),
            )
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Failed);
        match model.last_failure() {
            Some(ReactorError::Solver(SolverFailure::Timeout { .. })) => {}
            other => panic!("Expected Timeout failure, got {:?}", other),
        }

        // terminal states reject configure until reset
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0))
            .with_settings(loose_settings());
        assert!(matches!(
            model.configure(
                config.clone(),
                ReactorFeed::InitialPhase(phase.clone()),
                engine.clone()
            ),
            Err(ReactorError::InvalidStateTransition { .. })
        ));

        // reset -> reconfigure with the corrected settings -> solve
        model.reset().unwrap();
        assert_eq!(model.status(), ReactorStatus::Configured);
        assert!(model.last_failure().is_none());
        model
            .configure(config, ReactorFeed::InitialPhase(phase), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);
        let n_b = model.final_phase().unwrap().species_moles()[1];
        assert_relative_eq!(n_b, 1.0 - (-1.0_f64).exp(), max_relative = 1e-2);
    }

    #[test]
    fn test_cstr_steady_state_conversion() {
        // first-order CSTR: c_A/c_in = 1/(1 + k*tau); k = 0.1, tau = 10 s
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Volume(0.001));
        let stream = StreamState::create(phase, FlowRate::Volumetric(1e-4));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Cstr, (0.0, 200.0))
            .with_volume(0.001)
            .with_settings(loose_settings());
        model
            .configure(config, ReactorFeed::InletStream(stream), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);

        let outlet = model.outlet_stream().unwrap();
        assert_relative_eq!(outlet.phase.mole_frac[0], 0.5, max_relative = 2e-2);

        // twenty residence times in: the balance is essentially stationary
        let quality = model.solution_quality().unwrap();
        let scale = model.final_phase().unwrap().moles.max(1.0);
        assert!(quality.final_rhs_norm < 1e-4 * scale);
    }

    #[test]
    fn test_plug_flow_cascade_conversion_and_profile() {
        // 5 equal segments behave as 5 CSTRs in series:
        // c_out/c_in = 1/(1 + k*tau/n)^n
        let n_segments = 5;
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Volume(0.001));
        let stream = StreamState::create(phase, FlowRate::Volumetric(1e-4));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::PlugFlow, (0.0, 150.0))
            .with_volume(0.001)
            .with_segments(n_segments)
            .with_settings(loose_settings());
        model
            .configure(config, ReactorFeed::InletStream(stream), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);

        let expected = 1.0 / (1.0 + 0.1 * 10.0 / n_segments as f64).powi(n_segments as i32);
        let outlet = model.final_phase().unwrap();
        assert_relative_eq!(outlet.mole_frac[0], expected, max_relative = 2e-2);

        // axial profile: one entry per segment, A monotonically consumed
        let profile = model.axial_profile();
        assert_eq!(profile.len(), n_segments);
        for window in profile.windows(2) {
            assert!(window[1].1.mole_frac[0] < window[0].1.mole_frac[0]);
            assert!(window[1].0 > window[0].0);
        }
    }

    #[test]
    fn test_solution_quality_requires_solved_state() {
        let model = ReactorModel::new();
        assert!(matches!(
            model.solution_quality(),
            Err(ReactorError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_workflow_from_input_data_file() {
        // full path: input record -> component table -> phase/stream ->
        // kinetics -> configured and solved reactor
        use crate::Utils::load_from_file::LoadData;
        use crate::Utils::logging::init_logging;
        use std::io::Write;

        init_logging(log::LevelFilter::Info);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
            "components": [
                {"name": "A", "molar_mass": 92.14,
                 "density": {"model": "constant", "value": 900.0},
                 "heat_capacity": {"model": "constant", "value": 150.0}},
                {"name": "B", "molar_mass": 92.14,
                 "density": {"model": "constant", "value": 900.0},
                 "heat_capacity": {"model": "constant", "value": 150.0}}
            ],
            "reactions": [
                {"equation": "A=>B", "rate": {"form": "constant", "k": 0.1}}
            ],
            "default_composition": [1.0, 0.0],
            "default_temperature": 298.15
        }"#,
        )
        .unwrap();

        let loader = LoadData::new(file.path().to_str().unwrap().to_string());
        let (table, defaults) = loader.load_component_table().unwrap();
        let table = Arc::new(table);
        let reactions = loader.load_reactions().unwrap();

        let engine = KineticsEngine::from_equations(
            &table,
            reactions
                .into_iter()
                .map(|r| (r.equation, r.rate))
                .collect(),
        )
        .unwrap();

        let phase_config = PhaseConfig::new(
            CompositionSpec::MoleFractions(defaults.composition.unwrap()),
            defaults.temperature.unwrap(),
            SizeSpec::Moles(1.0),
        );
        let phase = PhaseState::create(&table, phase_config, PhaseKind::Liquid).unwrap();

        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 10.0))
            .with_settings(loose_settings());
        model
            .configure(config, ReactorFeed::InitialPhase(phase), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);
        let n_b = model.final_phase().unwrap().species_moles()[1];
        assert_relative_eq!(n_b, 1.0 - (-1.0_f64).exp(), max_relative = 1e-2);
    }

    #[test]
    fn test_solve_twice_without_reset_is_rejected() {
        let table = ab_table();
        let engine = first_order_engine(&table, 0.1);
        let phase = pure_a_phase(&table, SizeSpec::Moles(1.0));
        let mut model = ReactorModel::new();
        let config = ReactorConfig::new(ReactorKind::Batch, (0.0, 1.0))
            .with_settings(loose_settings());
        model
            .configure(config, ReactorFeed::InitialPhase(phase), engine)
            .unwrap();
        model.solve().unwrap();
        assert_eq!(model.status(), ReactorStatus::Solved);
        assert!(matches!(
            model.solve(),
            Err(ReactorError::InvalidStateTransition { .. })
        ));
    }
}

use nalgebra::{DMatrix, DVector};
use rb_affine::{AffineExpansion, AffineOperatorStore, AlgebraicOperator, TermOrder, ThetaContext};
use rb_core::{ProblemId, RbError, RbResult, Real};
use rb_expr::{Expr, FunctionSpace, ParametrizedExpression};
use rb_problems::{Engine, EngineConfig, ProblemBuilder, SolveState};
use rb_timestep::{IntegratorType, TimeSteppingParameters};

const DIM: usize = 3;

struct Heat {
    /// Decay rate, the theta of "a"
    k: Real,
    /// Theta of "f" at time t
    source: fn(Real) -> Real,
    /// Declare "dirichlet_bc" with theta [2 t]
    constrained: bool,
    initial_condition: bool,
}

impl Default for Heat {
    fn default() -> Self {
        Self {
            k: 0.0,
            source: |_| 0.0,
            constrained: false,
            initial_condition: true,
        }
    }
}

fn engine(integrator: IntegratorType, dt: Real) -> Engine {
    Engine::with_config(EngineConfig {
        time_stepping: TimeSteppingParameters {
            final_time: 1.0,
            time_step_size: dt,
            integrator,
            ..TimeSteppingParameters::default()
        },
        ..EngineConfig::default()
    })
}

fn add_heat(engine: &Engine, name: &str, heat: Heat) -> ProblemId {
    let Heat {
        k,
        source,
        constrained,
        initial_condition,
    } = heat;
    let mut builder = ProblemBuilder::new(name)
        .term("m", TermOrder::Matrix)
        .term("a", TermOrder::Matrix)
        .term("f", TermOrder::Vector)
        .dimension(DIM)
        .time_dependent()
        .theta(move |term: &str, ctx: &dyn ThetaContext| -> RbResult<Vec<Real>> {
            Ok(match term {
                "a" => vec![k],
                "f" => vec![source(ctx.time())],
                "initial_condition" => vec![ctx.mu()[0]],
                "dirichlet_bc" => vec![2.0 * ctx.time()],
                _ => vec![1.0],
            })
        });
    let mut ops = AffineOperatorStore::new()
        .with(AffineExpansion::new("m", vec![DMatrix::<f64>::identity(DIM, DIM).into()]).unwrap())
        .with(AffineExpansion::new("a", vec![DMatrix::<f64>::identity(DIM, DIM).into()]).unwrap())
        .with(AffineExpansion::new("f", vec![DVector::<f64>::from_element(DIM, 1.0).into()]).unwrap());
    if initial_condition {
        builder = builder
            .term("initial_condition", TermOrder::Vector)
            .term("inner_product", TermOrder::Matrix);
        ops.insert(
            AffineExpansion::new(
                "initial_condition",
                vec![DVector::<f64>::from_element(DIM, 1.0).into()],
            )
            .unwrap(),
        );
        ops.insert(
            AffineExpansion::new(
                "inner_product",
                vec![DMatrix::<f64>::identity(DIM, DIM).into()],
            )
            .unwrap(),
        );
    }
    if constrained {
        builder = builder.term("dirichlet_bc", TermOrder::Scalar);
    }
    engine.add_problem(builder.build().unwrap(), ops).unwrap()
}

#[test]
fn no_dynamics_returns_initial_condition() {
    let engine = engine(IntegratorType::ImplicitEuler, 0.1);
    let id = add_heat(&engine, "still", Heat::default());
    engine.set_mu(id, [1.5]).unwrap();

    let y = engine.solve(id).unwrap();
    assert!((y - DVector::from_element(DIM, 1.5)).norm() < 1e-12);

    let solution = engine.stored_solution(id).unwrap().unwrap();
    let trajectory = solution.trajectory.unwrap();
    assert_eq!(trajectory.states.len(), 11);
    assert!((trajectory.states[0].clone() - DVector::from_element(DIM, 1.5)).norm() < 1e-12);
    assert!(solution.derivative.unwrap().norm() < 1e-12);
    assert!((engine.time(id).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn decay_matches_exponential() {
    let engine = engine(IntegratorType::Bdf2, 0.01);
    let id = add_heat(
        &engine,
        "decay",
        Heat {
            k: 1.0,
            ..Heat::default()
        },
    );
    engine.set_mu(id, [2.0]).unwrap();
    let y = engine.solve(id).unwrap();
    let expected = 2.0 * (-1.0f64).exp();
    for i in 0..DIM {
        assert!((y[i] - expected).abs() < 5e-4, "y[{i}] = {}", y[i]);
    }
}

#[test]
fn time_dependent_theta_sees_current_time() {
    let engine = engine(IntegratorType::Bdf2, 0.01);
    let id = add_heat(
        &engine,
        "ramp",
        Heat {
            source: |t| t,
            ..Heat::default()
        },
    );
    engine.set_mu(id, [0.0]).unwrap();
    // y' = t, y(0) = 0
    let y = engine.solve(id).unwrap();
    assert!((y[0] - 0.5).abs() < 1e-3);
}

#[test]
fn zero_initial_state_without_initial_condition() {
    let engine = engine(IntegratorType::ImplicitEuler, 0.25);
    let id = add_heat(
        &engine,
        "source_only",
        Heat {
            source: |_| 1.0,
            initial_condition: false,
            ..Heat::default()
        },
    );
    engine.set_mu(id, [0.0]).unwrap();
    let y = engine.solve(id).unwrap();
    assert!((y - DVector::from_element(DIM, 1.0)).norm() < 1e-10);
}

#[test]
fn dirichlet_values_constrain_leading_unknown() {
    let engine = engine(IntegratorType::ImplicitEuler, 0.1);
    let id = add_heat(
        &engine,
        "lifted",
        Heat {
            k: 1.0,
            constrained: true,
            ..Heat::default()
        },
    );
    engine.set_mu(id, [1.0]).unwrap();
    engine.solve(id).unwrap();
    let trajectory = engine
        .stored_solution(id)
        .unwrap()
        .unwrap()
        .trajectory
        .unwrap();
    for (t, state) in trajectory.times.iter().zip(&trajectory.states).skip(1) {
        assert!((state[0] - 2.0 * t).abs() < 1e-10);
    }
}

#[test]
fn reduced_trajectory_matches_truth_in_span() {
    let engine = engine(IntegratorType::ImplicitEuler, 0.05);
    let id = add_heat(
        &engine,
        "heat",
        Heat {
            k: 0.5,
            ..Heat::default()
        },
    );
    let basis = DMatrix::from_element(DIM, 1, 1.0) / (DIM as Real).sqrt();
    let reduced = engine.train(id, basis).unwrap();

    engine.set_mu(id, [1.0]).unwrap();
    engine.set_mu(reduced, [1.0]).unwrap();
    let truth = engine.solve(id).unwrap();
    let coefficients = engine.solve(reduced).unwrap();
    assert_eq!(coefficients.len(), 1);

    let expanded = engine.full_order_solution(reduced).unwrap().unwrap();
    assert!((expanded - truth).norm() < 1e-10);
}

#[test]
fn failed_time_step_leaves_problem_unsolved() {
    // y_dot + mean(y)^2 y = 0 needs more than one Newton iteration per step
    let engine = Engine::with_config(EngineConfig {
        time_stepping: TimeSteppingParameters {
            final_time: 1.0,
            time_step_size: 0.1,
            max_nonlinear_iterations: 1,
            ..TimeSteppingParameters::default()
        },
        ..EngineConfig::default()
    });
    let definition = ProblemBuilder::new("cubic")
        .term("m", TermOrder::Matrix)
        .term("a", TermOrder::Matrix)
        .term("f", TermOrder::Vector)
        .term("initial_condition", TermOrder::Vector)
        .term("inner_product", TermOrder::Matrix)
        .dimension(DIM)
        .time_dependent()
        .nonlinear()
        .theta(|term: &str, ctx: &dyn ThetaContext| -> RbResult<Vec<Real>> {
            Ok(match term {
                "a" => vec![ctx.expression("cubic_self")?.mean().powi(2)],
                "f" => vec![0.0],
                "initial_condition" => vec![ctx.mu()[0]],
                _ => vec![1.0],
            })
        })
        .build()
        .unwrap();
    let identity = || -> AlgebraicOperator { DMatrix::<f64>::identity(DIM, DIM).into() };
    let ones = || -> AlgebraicOperator { DVector::<f64>::from_element(DIM, 1.0).into() };
    let ops = AffineOperatorStore::new()
        .with(AffineExpansion::new("m", vec![identity()]).unwrap())
        .with(AffineExpansion::new("a", vec![identity()]).unwrap())
        .with(AffineExpansion::new("f", vec![ones()]).unwrap())
        .with(AffineExpansion::new("initial_condition", vec![ones()]).unwrap())
        .with(AffineExpansion::new("inner_product", vec![identity()]).unwrap());
    let id = engine.add_problem(definition, ops).unwrap();
    engine
        .add_expression(
            id,
            ParametrizedExpression::new(
                "cubic_self",
                Expr::solution(id),
                FunctionSpace::interval(DIM, 0.0, 1.0),
            ),
        )
        .unwrap();
    engine.set_mu(id, [1.0]).unwrap();

    assert!(matches!(
        engine.solve(id),
        Err(RbError::SolverDivergence { .. })
    ));
    assert_eq!(engine.state(id).unwrap(), SolveState::Unsolved);
    assert_eq!(engine.stored_solution(id).unwrap(), None);
}

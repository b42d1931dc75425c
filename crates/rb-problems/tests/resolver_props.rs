//! Property tests for cross-problem resolution.

use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use rb_affine::{AffineExpansion, AffineOperatorStore, TermOrder, ThetaContext};
use rb_core::{RbResult, Real};
use rb_expr::{Expr, FunctionSpace, ParametrizedExpression};
use rb_problems::{Engine, ProblemBuilder};

fn scaled_identity(engine: &Engine, dim: usize) -> rb_core::ProblemId {
    let definition = ProblemBuilder::new("q")
        .term("a", TermOrder::Matrix)
        .term("f", TermOrder::Vector)
        .dimension(dim)
        .theta(|term: &str, ctx: &dyn ThetaContext| -> RbResult<Vec<Real>> {
            Ok(match term {
                "a" => vec![2.0],
                _ => vec![ctx.mu()[0]],
            })
        })
        .build()
        .unwrap();
    let ops = AffineOperatorStore::new()
        .with(AffineExpansion::new("a", vec![DMatrix::<f64>::identity(dim, dim).into()]).unwrap())
        .with(AffineExpansion::new("f", vec![DVector::<f64>::from_element(dim, 1.0).into()]).unwrap());
    engine.add_problem(definition, ops).unwrap()
}

proptest! {
    #[test]
    fn repeated_resolution_tracks_mu(
        dim in 1usize..5,
        mus in prop::collection::vec(-10.0f64..10.0, 1..6),
    ) {
        let engine = Engine::new();
        let q = scaled_identity(&engine, dim);
        let half = ParametrizedExpression::new(
            "q_half",
            Expr::solution(q) + Expr::parameter(0),
            FunctionSpace::interval(dim, 0.0, 1.0),
        );
        for mu in &mus {
            let values = engine.evaluate_expression(&half, [*mu]).unwrap();
            // x = mu / 2, plus mu itself
            prop_assert!((values - DVector::from_element(dim, 1.5 * mu)).amax() < 1e-12);
        }
        prop_assert_eq!(engine.cache().discoveries(), 1);
        prop_assert_eq!(engine.cache().hits(), mus.len() - 1);
        let exact = engine.exact_problem(q).unwrap();
        prop_assert_eq!(engine.solve_count(exact).unwrap(), mus.len());
        prop_assert_eq!(engine.solve_count(q).unwrap(), 0);
    }
}

//! The external interface: one parameter struct, one synchronous solve.

use crate::boundary::{BoundaryCondition, BoundarySet, CompiledBoundarySet};
use crate::error::SolverError;
use crate::expression::{Program, Value};
use crate::grid::{Grid, InitialCondition};
use crate::schemes::{run_crank_nicolson, run_explicit, run_implicit, Scheme, SolveContext};
use crate::source::SourceTerm;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One complete solve request. All configuration travels with the call;
/// the engine holds no process-wide state and every solve is independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatProblem {
    /// Thermal diffusivity, > 0.
    pub alpha: f64,
    /// Domain length, > 0.
    pub length: f64,
    /// Number of spatial points, > 2.
    pub nx: usize,
    /// Number of time steps, > 0.
    pub nt: usize,
    /// Time-step size, > 0.
    pub dt: f64,
    pub initial_condition: InitialCondition,
    /// Must contain the keys `"left"` and `"right"`.
    pub boundary_conditions: HashMap<String, BoundaryCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_term: Option<String>,
    /// Spatially varying diffusivity `kappa(x)` replacing `alpha`;
    /// explicit scheme only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffusivity: Option<String>,
    #[serde(default)]
    pub scheme: Scheme,
}

impl HeatProblem {
    /// Runs the solve and returns the `[nx, nt]` solution field. Fails
    /// fast: validation and expression compilation happen before any
    /// stepping, and no partial field is ever returned.
    pub fn solve(&self) -> Result<DMatrix<f64>, SolverError> {
        if !(self.alpha > 0.0) {
            return Err(SolverError::InvalidParameter("alpha must be positive"));
        }
        if self.nt == 0 {
            return Err(SolverError::InvalidParameter("nt must be positive"));
        }
        if !(self.dt > 0.0) {
            return Err(SolverError::InvalidParameter("dt must be positive"));
        }
        let grid = Grid::uniform(self.length, self.nx)?;
        let set = BoundarySet::from_map(&self.boundary_conditions)?;
        set.check_supported(self.scheme)?;
        if self.diffusivity.is_some() && self.scheme != Scheme::Explicit {
            return Err(SolverError::InvalidParameter(
                "a diffusivity expression is only supported by the explicit scheme",
            ));
        }

        let boundaries = CompiledBoundarySet::new(&set)?;
        let source = match &self.source_term {
            Some(expr) => Some(SourceTerm::compile(expr)?),
            None => None,
        };
        let seed = self.initial_condition.seed(&grid)?;

        let mut u = DMatrix::zeros(self.nx, self.nt);
        u.set_column(0, &seed);

        let dx = grid.dx();
        let r = self.alpha * self.dt / (dx * dx);
        let ctx = SolveContext {
            grid: &grid,
            nt: self.nt,
            dt: self.dt,
            r,
            boundaries: &boundaries,
            source: source.as_ref(),
        };

        match self.scheme {
            Scheme::Explicit => {
                let coupling = match &self.diffusivity {
                    Some(expr) => Some(self.sample_coupling(expr, &grid)?),
                    None => None,
                };
                run_explicit(&mut u, &ctx, coupling.as_deref())?;
            }
            Scheme::Implicit => run_implicit(&mut u, &ctx)?,
            Scheme::CrankNicolson => run_crank_nicolson(&mut u, &ctx)?,
        }
        Ok(u)
    }

    /// Evaluates `kappa(x)` over the grid and scales it into per-point
    /// coupling coefficients `r_i = kappa(x_i) * dt / dx^2`.
    fn sample_coupling(&self, expr: &str, grid: &Grid) -> Result<Vec<f64>, SolverError> {
        let program = Program::compile(expr, &["x"])?;
        let value = program.eval(&[Value::Vector(grid.points().to_vec())])?;
        let dx = grid.dx();
        let scale = self.dt / (dx * dx);
        Ok(match value {
            Value::Scalar(k) => vec![k * scale; grid.nx()],
            Value::Vector(v) => v.into_iter().map(|k| k * scale).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::HeatProblem;
    use crate::boundary::{BoundaryCondition, BoundaryKind, BoundaryValue};
    use crate::error::SolverError;
    use crate::grid::InitialCondition;
    use crate::schemes::Scheme;
    use nalgebra::DMatrix;
    use std::collections::HashMap;

    fn dirichlet(value: f64) -> BoundaryCondition {
        BoundaryCondition {
            kind: BoundaryKind::Dirichlet,
            value: BoundaryValue::Literal(value),
        }
    }

    fn boundary_map(
        left: BoundaryCondition,
        right: BoundaryCondition,
    ) -> HashMap<String, BoundaryCondition> {
        let mut map = HashMap::new();
        map.insert("left".to_string(), left);
        map.insert("right".to_string(), right);
        map
    }

    /// The shared test scenario: a hot plateau with cold fixed ends.
    fn plateau_problem(scheme: Scheme) -> HeatProblem {
        HeatProblem {
            alpha: 0.01,
            length: 1.0,
            nx: 5,
            nt: 3,
            dt: 0.1,
            initial_condition: InitialCondition::Samples(vec![0.0, 1.0, 1.0, 1.0, 0.0]),
            boundary_conditions: boundary_map(dirichlet(0.0), dirichlet(0.0)),
            source_term: None,
            diffusivity: None,
            scheme,
        }
    }

    fn assert_zero_boundary_rows(u: &DMatrix<f64>) {
        for t in 0..u.ncols() {
            assert_eq!(u[(0, t)], 0.0, "left boundary at step {t}");
            assert_eq!(u[(u.nrows() - 1, t)], 0.0, "right boundary at step {t}");
        }
    }

    #[test]
    fn explicit_plateau_shape_and_boundaries() {
        let u = plateau_problem(Scheme::Explicit).solve().expect("should solve");
        assert_eq!(u.shape(), (5, 3));
        assert_zero_boundary_rows(&u);
    }

    #[test]
    fn implicit_plateau_shape_and_boundaries() {
        let u = plateau_problem(Scheme::Implicit).solve().expect("should solve");
        assert_eq!(u.shape(), (5, 3));
        assert_zero_boundary_rows(&u);
        let explicit = plateau_problem(Scheme::Explicit).solve().expect("should solve");
        assert!(
            (u[(2, 2)] - explicit[(2, 2)]).abs() > 1e-6,
            "implicit interior should differ from explicit"
        );
    }

    #[test]
    fn crank_nicolson_interior_sits_between_explicit_and_implicit() {
        let explicit = plateau_problem(Scheme::Explicit).solve().expect("should solve");
        let implicit = plateau_problem(Scheme::Implicit).solve().expect("should solve");
        let cn = plateau_problem(Scheme::CrankNicolson)
            .solve()
            .expect("should solve");
        assert_eq!(cn.shape(), (5, 3));
        assert_zero_boundary_rows(&cn);
        for t in 1..3 {
            for i in 1..4 {
                let lo = explicit[(i, t)].min(implicit[(i, t)]);
                let hi = explicit[(i, t)].max(implicit[(i, t)]);
                assert!(
                    cn[(i, t)] >= lo - 1e-12 && cn[(i, t)] <= hi + 1e-12,
                    "cn[({i}, {t})] = {} outside [{lo}, {hi}]",
                    cn[(i, t)]
                );
            }
        }
    }

    #[test]
    fn identical_inputs_give_bit_identical_output() {
        let problem = plateau_problem(Scheme::CrankNicolson);
        let first = problem.solve().expect("should solve");
        let second = problem.solve().expect("should solve");
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_maximum_is_non_increasing_when_stable() {
        // r = 0.5 * 0.05 / 0.25^2 = 0.4, inside the stability region.
        let problem = HeatProblem {
            alpha: 0.5,
            length: 1.0,
            nx: 5,
            nt: 20,
            dt: 0.05,
            initial_condition: InitialCondition::Samples(vec![0.0, 0.5, 1.0, 0.5, 0.0]),
            boundary_conditions: boundary_map(dirichlet(0.0), dirichlet(0.0)),
            source_term: None,
            diffusivity: None,
            scheme: Scheme::Explicit,
        };
        let u = problem.solve().expect("should solve");
        let mut last_max = f64::INFINITY;
        for t in 0..u.ncols() {
            let step_max = (1..4).map(|i| u[(i, t)]).fold(f64::MIN, f64::max);
            assert!(
                step_max <= last_max + 1e-12,
                "interior maximum grew at step {t}"
            );
            last_max = step_max;
        }
    }

    #[test]
    fn schemes_agree_when_coupling_vanishes() {
        // alpha ~ 0 turns the problem into pointwise decay; the three
        // schemes then agree to per-step truncation error.
        let base = |scheme| HeatProblem {
            alpha: 1e-300,
            length: 1.0,
            nx: 5,
            nt: 4,
            dt: 1e-3,
            initial_condition: InitialCondition::Samples(vec![0.0, 1.0, 1.0, 1.0, 0.0]),
            boundary_conditions: boundary_map(dirichlet(0.0), dirichlet(0.0)),
            source_term: None,
            diffusivity: None,
            scheme,
        };
        let explicit = base(Scheme::Explicit).solve().expect("should solve");
        let implicit = base(Scheme::Implicit).solve().expect("should solve");
        let cn = base(Scheme::CrankNicolson).solve().expect("should solve");
        for t in 0..4 {
            for i in 0..5 {
                assert!((explicit[(i, t)] - implicit[(i, t)]).abs() < 1e-5);
                assert!((explicit[(i, t)] - cn[(i, t)]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn sine_mode_decays_at_the_analytical_rate() {
        // For u_t = alpha*u_xx - u with homogeneous Dirichlet ends, the
        // fundamental mode decays as exp(-(alpha*pi^2 + 1) * t).
        let nt = 101;
        let dt = 1e-3;
        let problem = HeatProblem {
            alpha: 0.1,
            length: 1.0,
            nx: 51,
            nt,
            dt,
            initial_condition: InitialCondition::Expression("sin(pi*x)".to_string()),
            boundary_conditions: boundary_map(dirichlet(0.0), dirichlet(0.0)),
            source_term: None,
            diffusivity: None,
            scheme: Scheme::CrankNicolson,
        };
        let u = problem.solve().expect("should solve");
        let elapsed = (nt - 1) as f64 * dt;
        let rate = 0.1 * std::f64::consts::PI.powi(2) + 1.0;
        let midpoint = u[(25, nt - 1)];
        let expected = (std::f64::consts::PI * 0.5).sin() * (-rate * elapsed).exp();
        assert!(
            (midpoint - expected).abs() < 1e-3,
            "midpoint {midpoint} vs analytical {expected}"
        );
    }

    #[test]
    fn explicit_insulated_boundary_tracks_its_neighbor() {
        let problem = HeatProblem {
            alpha: 0.01,
            length: 1.0,
            nx: 5,
            nt: 4,
            dt: 0.1,
            initial_condition: InitialCondition::Samples(vec![0.0, 1.0, 1.0, 1.0, 0.0]),
            boundary_conditions: boundary_map(
                BoundaryCondition {
                    kind: BoundaryKind::Neumann,
                    value: BoundaryValue::Literal(0.0),
                },
                dirichlet(0.0),
            ),
            source_term: None,
            diffusivity: None,
            scheme: Scheme::Explicit,
        };
        let u = problem.solve().expect("should solve");
        for t in 1..4 {
            assert_eq!(u[(0, t)], u[(1, t - 1)], "zero flux at step {t}");
        }
    }

    #[test]
    fn crank_nicolson_robin_row_holds_every_step() {
        let problem = HeatProblem {
            alpha: 1.0,
            length: 1.0,
            nx: 11,
            nt: 50,
            dt: 0.01,
            initial_condition: InitialCondition::Samples(vec![1.0; 11]),
            boundary_conditions: boundary_map(
                BoundaryCondition {
                    kind: BoundaryKind::Robin,
                    value: BoundaryValue::Literal(1.0),
                },
                dirichlet(1.0),
            ),
            source_term: Some("1".to_string()),
            diffusivity: None,
            scheme: Scheme::CrankNicolson,
        };
        let u = problem.solve().expect("should solve");
        let dx = 0.1;
        for t in 1..u.ncols() {
            let residual = (1.0 + dx * 0.5) * u[(0, t)] - u[(1, t)];
            assert!(
                residual.abs() < 1e-9,
                "robin relation residual {residual} at step {t}"
            );
        }
    }

    #[test]
    fn crank_nicolson_neumann_flux_relation_holds_every_step() {
        let problem = HeatProblem {
            alpha: 0.5,
            length: 1.0,
            nx: 6,
            nt: 10,
            dt: 0.01,
            initial_condition: InitialCondition::Samples(vec![1.0; 6]),
            boundary_conditions: boundary_map(
                BoundaryCondition {
                    kind: BoundaryKind::Neumann,
                    value: BoundaryValue::Literal(2.0),
                },
                dirichlet(0.0),
            ),
            source_term: None,
            diffusivity: None,
            scheme: Scheme::CrankNicolson,
        };
        let u = problem.solve().expect("should solve");
        let dx = 0.2;
        for t in 1..u.ncols() {
            let residual = u[(0, t)] - (u[(1, t)] - dx * 2.0);
            assert!(
                residual.abs() < 1e-9,
                "flux relation residual {residual} at step {t}"
            );
        }
    }

    #[test]
    fn constant_source_raises_the_interior_by_dt() {
        let problem = HeatProblem {
            alpha: 0.01,
            length: 1.0,
            nx: 5,
            nt: 2,
            dt: 0.1,
            initial_condition: InitialCondition::Samples(vec![0.0; 5]),
            boundary_conditions: boundary_map(dirichlet(0.0), dirichlet(0.0)),
            source_term: Some("5".to_string()),
            diffusivity: None,
            scheme: Scheme::Explicit,
        };
        let u = problem.solve().expect("should solve");
        assert_eq!(u[(0, 1)], 0.0);
        assert_eq!(u[(4, 1)], 0.0);
        for i in 1..4 {
            assert!((u[(i, 1)] - 0.5).abs() < 1e-15);
        }
    }

    #[test]
    fn constant_diffusivity_expression_matches_constant_alpha() {
        let mut with_kappa = plateau_problem(Scheme::Explicit);
        with_kappa.diffusivity = Some("0.01".to_string());
        let baseline = plateau_problem(Scheme::Explicit).solve().expect("should solve");
        let varied = with_kappa.solve().expect("should solve");
        assert_eq!(baseline, varied);
    }

    #[test]
    fn diffusivity_requires_the_explicit_scheme() {
        let mut problem = plateau_problem(Scheme::Implicit);
        problem.diffusivity = Some("0.01".to_string());
        assert!(matches!(
            problem.solve(),
            Err(SolverError::InvalidParameter(_))
        ));
    }

    #[test]
    fn mismatched_initial_condition_fails_with_no_partial_result() {
        let mut problem = plateau_problem(Scheme::Explicit);
        problem.initial_condition = InitialCondition::Samples(vec![0.0, 1.0, 1.0, 0.0]);
        assert_eq!(
            problem.solve().expect_err("should fail"),
            SolverError::DimensionMismatch {
                expected: 5,
                actual: 4
            }
        );
    }

    #[test]
    fn robin_under_explicit_is_rejected_before_stepping() {
        let mut problem = plateau_problem(Scheme::Explicit);
        problem.boundary_conditions.insert(
            "left".to_string(),
            BoundaryCondition {
                kind: BoundaryKind::Robin,
                value: BoundaryValue::Literal(1.0),
            },
        );
        assert_eq!(
            problem.solve().expect_err("should fail"),
            SolverError::UnsupportedBoundaryKind {
                kind: BoundaryKind::Robin,
                scheme: Scheme::Explicit,
            }
        );
    }

    #[test]
    fn out_of_domain_scalars_are_rejected() {
        let tweaks: [fn(&mut HeatProblem); 5] = [
            |p| p.alpha = 0.0,
            |p| p.nt = 0,
            |p| p.dt = 0.0,
            |p| p.length = -1.0,
            |p| p.nx = 2,
        ];
        for tweak in tweaks {
            let mut problem = plateau_problem(Scheme::CrankNicolson);
            tweak(&mut problem);
            assert!(matches!(
                problem.solve(),
                Err(SolverError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn single_step_solve_returns_only_the_seed() {
        let mut problem = plateau_problem(Scheme::CrankNicolson);
        problem.nt = 1;
        let u = problem.solve().expect("should solve");
        assert_eq!(u.shape(), (5, 1));
        assert_eq!(u[(2, 0)], 1.0);
    }

    #[test]
    fn deserializes_the_frontend_request_body() {
        let body = r#"{
            "alpha": 0.01,
            "length": 1.0,
            "nx": 5,
            "nt": 3,
            "dt": 0.1,
            "initial_condition": "sin(pi*x)",
            "boundary_conditions": {
                "left": {"type": "dirichlet", "value": 0.0},
                "right": {"type": "neumann", "value": "t/2"}
            },
            "source_term": "exp(-t)*sin(pi*x)"
        }"#;
        let problem: HeatProblem = serde_json::from_str(body).expect("should deserialize");
        assert_eq!(problem.scheme, Scheme::CrankNicolson, "scheme defaults");
        assert!(matches!(
            problem.initial_condition,
            InitialCondition::Expression(_)
        ));
        problem.solve().expect("request should solve");
    }
}

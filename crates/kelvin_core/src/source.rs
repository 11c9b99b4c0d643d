//! Source-term applicator.

use crate::error::SolverError;
use crate::expression::{Program, Value};
use crate::grid::Grid;
use nalgebra::DVector;

/// An optional heat source `f(x, t, u)`, compiled once per solve and
/// injected into the interior of each new column (explicit) or the
/// right-hand side before the linear solve (implicit/Crank-Nicolson).
#[derive(Debug)]
pub(crate) struct SourceTerm {
    program: Program,
}

impl SourceTerm {
    pub(crate) fn compile(source: &str) -> Result<Self, SolverError> {
        Ok(SourceTerm {
            program: Program::compile(source, &["x", "t", "u"])?,
        })
    }

    /// Adds `source * dt` to the interior entries of `target`. Boundary
    /// entries are never touched, so boundary invariants survive arbitrary
    /// sources. `u` is bound to the previous column.
    pub(crate) fn inject(
        &self,
        target: &mut DVector<f64>,
        grid: &Grid,
        time: f64,
        previous: &DVector<f64>,
        dt: f64,
    ) -> Result<(), SolverError> {
        let n = target.len();
        let value = self.program.eval(&[
            Value::Vector(grid.points().to_vec()),
            Value::Scalar(time),
            Value::Vector(previous.iter().copied().collect()),
        ])?;
        match value {
            Value::Scalar(s) => {
                for i in 1..n - 1 {
                    target[i] += dt * s;
                }
            }
            Value::Vector(v) => {
                if v.len() != n {
                    return Err(SolverError::Expression(
                        crate::error::ExpressionError::ShapeMismatch(format!(
                            "source term produced {} values for {} grid points",
                            v.len(),
                            n
                        )),
                    ));
                }
                for i in 1..n - 1 {
                    target[i] += dt * v[i];
                }
            }
        }
        Ok(())
    }
}

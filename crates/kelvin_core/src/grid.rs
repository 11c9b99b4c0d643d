//! Uniform spatial grid and initial-condition seeding.

use crate::error::SolverError;
use crate::expression::{Program, Value};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// An ordered set of `nx` uniformly spaced points over `[0, length]`.
/// Immutable once built; `nx > 2` is an invariant.
#[derive(Debug, Clone)]
pub struct Grid {
    points: Vec<f64>,
    length: f64,
    dx: f64,
}

impl Grid {
    pub fn uniform(length: f64, nx: usize) -> Result<Grid, SolverError> {
        if !(length > 0.0) {
            return Err(SolverError::InvalidParameter("length must be positive"));
        }
        if nx <= 2 {
            return Err(SolverError::InvalidParameter(
                "nx must be greater than 2",
            ));
        }
        let dx = length / (nx - 1) as f64;
        let points = (0..nx).map(|i| i as f64 * dx).collect();
        Ok(Grid { points, length, dx })
    }

    pub fn nx(&self) -> usize {
        self.points.len()
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }
}

/// The seed profile `u[:, 0]`: either literal samples (length must match
/// the grid) or an expression over `x` evaluated at `t = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialCondition {
    Samples(Vec<f64>),
    Expression(String),
}

impl InitialCondition {
    pub fn seed(&self, grid: &Grid) -> Result<DVector<f64>, SolverError> {
        let nx = grid.nx();
        match self {
            InitialCondition::Samples(samples) => {
                if samples.len() != nx {
                    return Err(SolverError::DimensionMismatch {
                        expected: nx,
                        actual: samples.len(),
                    });
                }
                Ok(DVector::from_column_slice(samples))
            }
            InitialCondition::Expression(source) => {
                let program = Program::compile(source, &["x", "t"])?;
                let value = program.eval(&[
                    Value::Vector(grid.points().to_vec()),
                    Value::Scalar(0.0),
                ])?;
                match value {
                    Value::Vector(v) => Ok(DVector::from_vec(v)),
                    // A constant expression fills the whole profile.
                    Value::Scalar(s) => Ok(DVector::from_element(nx, s)),
                }
            }
        }
    }
}

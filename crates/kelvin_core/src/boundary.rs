//! Boundary-condition data model and application.
//!
//! Two operating modes, matching how the schemes consume boundaries:
//! patch mode (the explicit scheme rewrites the boundary entries of each
//! new column) and matrix-row mode (the implicit and Crank-Nicolson
//! schemes overwrite the first/last operator rows once per solve, then
//! patch only the right-hand side per step).

use crate::error::SolverError;
use crate::expression::{Program, Value};
use crate::grid::Grid;
use crate::schemes::Scheme;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Dirichlet,
    Neumann,
    Robin,
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryKind::Dirichlet => write!(f, "dirichlet"),
            BoundaryKind::Neumann => write!(f, "neumann"),
            BoundaryKind::Robin => write!(f, "robin"),
        }
    }
}

/// A literal number or an expression over `x`, `t`, `pi`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryValue {
    Literal(f64),
    Expression(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryCondition {
    #[serde(rename = "type")]
    pub kind: BoundaryKind,
    pub value: BoundaryValue,
}

/// The two required boundary instances, pulled out of the caller's
/// `"left"`/`"right"` mapping.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    pub left: BoundaryCondition,
    pub right: BoundaryCondition,
}

impl BoundarySet {
    pub fn from_map(map: &HashMap<String, BoundaryCondition>) -> Result<Self, SolverError> {
        let left = map
            .get("left")
            .cloned()
            .ok_or(SolverError::MissingBoundaryKey("left"))?;
        let right = map
            .get("right")
            .cloned()
            .ok_or(SolverError::MissingBoundaryKey("right"))?;
        Ok(BoundarySet { left, right })
    }

    /// Capability-per-scheme matrix: Robin boundaries exist only under
    /// Crank-Nicolson. Validated up front, before any stepping.
    pub fn check_supported(&self, scheme: Scheme) -> Result<(), SolverError> {
        for condition in [&self.left, &self.right] {
            let supported = match condition.kind {
                BoundaryKind::Dirichlet | BoundaryKind::Neumann => true,
                BoundaryKind::Robin => scheme == Scheme::CrankNicolson,
            };
            if !supported {
                return Err(SolverError::UnsupportedBoundaryKind {
                    kind: condition.kind,
                    scheme,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// A boundary condition with its value expression compiled for repeated
/// sampling. Expressions see the same environment as everything else
/// (`x` is the grid vector, `t` the step time) but must produce a scalar.
#[derive(Debug)]
pub(crate) struct CompiledBoundary {
    pub(crate) kind: BoundaryKind,
    literal: Option<f64>,
    program: Option<Program>,
}

impl CompiledBoundary {
    fn new(condition: &BoundaryCondition) -> Result<Self, SolverError> {
        let (literal, program) = match &condition.value {
            BoundaryValue::Literal(v) => (Some(*v), None),
            BoundaryValue::Expression(source) => {
                (None, Some(Program::compile(source, &["x", "t"])?))
            }
        };
        Ok(CompiledBoundary {
            kind: condition.kind,
            literal,
            program,
        })
    }

    /// Samples the boundary value at `time`.
    pub(crate) fn sample(&self, grid: &Grid, time: f64) -> Result<f64, SolverError> {
        match (&self.literal, &self.program) {
            (Some(v), _) => Ok(*v),
            (None, Some(program)) => {
                let value = program.eval(&[
                    Value::Vector(grid.points().to_vec()),
                    Value::Scalar(time),
                ])?;
                Ok(value.into_scalar()?)
            }
            (None, None) => unreachable!("boundary value is literal or expression"),
        }
    }

    /// Patch mode: the new boundary entry for the explicit scheme, given
    /// the neighboring value from the previous column.
    pub(crate) fn patch_explicit(
        &self,
        side: Side,
        neighbor_prev: f64,
        grid: &Grid,
        time: f64,
        dx: f64,
    ) -> Result<f64, SolverError> {
        match self.kind {
            BoundaryKind::Dirichlet => self.sample(grid, time),
            BoundaryKind::Neumann => {
                let q = self.sample(grid, time)?;
                // One-sided first-order flux approximation.
                Ok(match side {
                    Side::Left => neighbor_prev - dx * q,
                    Side::Right => neighbor_prev + dx * q,
                })
            }
            BoundaryKind::Robin => unreachable!("robin is rejected for the explicit scheme"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompiledBoundarySet {
    pub(crate) left: CompiledBoundary,
    pub(crate) right: CompiledBoundary,
}

impl CompiledBoundarySet {
    pub(crate) fn new(set: &BoundarySet) -> Result<Self, SolverError> {
        Ok(CompiledBoundarySet {
            left: CompiledBoundary::new(&set.left)?,
            right: CompiledBoundary::new(&set.right)?,
        })
    }

    /// Matrix-row mode for the implicit scheme: overwrite the first/last
    /// rows of `a`. Coefficients are time-invariant.
    pub(crate) fn install_implicit_rows(&self, a: &mut DMatrix<f64>, r: f64, dt: f64) {
        let n = a.nrows();
        match self.left.kind {
            BoundaryKind::Dirichlet => {
                a.row_mut(0).fill(0.0);
                a[(0, 0)] = 1.0;
            }
            BoundaryKind::Neumann => {
                // Ghost-node elimination: the flux folds into the
                // off-diagonal; the right-hand side is never patched.
                a.row_mut(0).fill(0.0);
                a[(0, 0)] = 1.0 + 2.0 * r + dt;
                a[(0, 1)] = -2.0 * r;
            }
            BoundaryKind::Robin => unreachable!("robin is rejected for the implicit scheme"),
        }
        match self.right.kind {
            BoundaryKind::Dirichlet => {
                a.row_mut(n - 1).fill(0.0);
                a[(n - 1, n - 1)] = 1.0;
            }
            BoundaryKind::Neumann => {
                a.row_mut(n - 1).fill(0.0);
                a[(n - 1, n - 1)] = 1.0 + 2.0 * r + dt;
                a[(n - 1, n - 2)] = -2.0 * r;
            }
            BoundaryKind::Robin => unreachable!("robin is rejected for the implicit scheme"),
        }
    }

    /// Per-step right-hand-side patch for the implicit scheme. Neumann is
    /// deliberately a no-op: the flux lives in the matrix row only.
    pub(crate) fn patch_rhs_implicit(
        &self,
        b: &mut DVector<f64>,
        grid: &Grid,
        time: f64,
    ) -> Result<(), SolverError> {
        let n = b.len();
        if self.left.kind == BoundaryKind::Dirichlet {
            b[0] = self.left.sample(grid, time)?;
        }
        if self.right.kind == BoundaryKind::Dirichlet {
            b[n - 1] = self.right.sample(grid, time)?;
        }
        Ok(())
    }

    /// Matrix-row mode for Crank-Nicolson: overwrite the first/last rows
    /// of both the implicit-half matrix `a` and the explicit-half matrix
    /// `bmat`. The Robin coefficient is folded into the operators once,
    /// sampled at `t = 0`.
    pub(crate) fn install_crank_nicolson_rows(
        &self,
        a: &mut DMatrix<f64>,
        bmat: &mut DMatrix<f64>,
        grid: &Grid,
        dx: f64,
    ) -> Result<(), SolverError> {
        let n = a.nrows();
        for (condition, side) in [(&self.left, Side::Left), (&self.right, Side::Right)] {
            let (row, neighbor) = match side {
                Side::Left => (0, 1),
                Side::Right => (n - 1, n - 2),
            };
            a.row_mut(row).fill(0.0);
            bmat.row_mut(row).fill(0.0);
            match condition.kind {
                BoundaryKind::Dirichlet => {
                    a[(row, row)] = 1.0;
                }
                BoundaryKind::Neumann => {
                    // One-sided flux relation imposed at the new time
                    // level; the flux value itself enters through the
                    // right-hand-side patch. The `bmat` row stays zero so
                    // the boundary node is slaved to the implicit solve.
                    a[(row, row)] = 1.0;
                    a[(row, neighbor)] = -1.0;
                }
                BoundaryKind::Robin => {
                    // du/dn + h*u = 0, one-sided, with the coefficient
                    // blended by the half-cell weight. The solve enforces
                    // (1 + h*dx*0.5)*u_boundary = u_neighbor every step.
                    let h = condition.sample(grid, 0.0)?;
                    a[(row, row)] = 1.0 + h * dx * 0.5;
                    a[(row, neighbor)] = -1.0;
                }
            }
        }
        Ok(())
    }

    /// Per-step right-hand-side patch for Crank-Nicolson; `time` is the
    /// half-step time.
    pub(crate) fn patch_rhs_crank_nicolson(
        &self,
        b: &mut DVector<f64>,
        grid: &Grid,
        time: f64,
        dx: f64,
    ) -> Result<(), SolverError> {
        let n = b.len();
        for (condition, side) in [(&self.left, Side::Left), (&self.right, Side::Right)] {
            let row = match side {
                Side::Left => 0,
                Side::Right => n - 1,
            };
            match condition.kind {
                BoundaryKind::Dirichlet => {
                    b[row] = condition.sample(grid, time)?;
                }
                BoundaryKind::Neumann => {
                    // The `bmat` boundary row is zero, so this entry is
                    // wholly the flux contribution.
                    let q = condition.sample(grid, time)?;
                    b[row] = match side {
                        Side::Left => -dx * q,
                        Side::Right => dx * q,
                    };
                }
                // Homogeneous relation, fully encoded in the operator rows.
                BoundaryKind::Robin => {}
            }
        }
        Ok(())
    }
}

//! Time-stepping scheme executors.
//!
//! All three executors share the same contract: given a solution field with
//! a seeded column 0, populate columns `1..nt` in order. Column `t` depends
//! only on column `t-1` (and, for the implicit schemes, on itself through
//! the linear solve). The discretization integrates `u_t = alpha*u_xx - u +
//! source`; the unit decay term shows up as the `dt` contributions to the
//! operator diagonals.

use crate::boundary::CompiledBoundarySet;
use crate::error::SolverError;
use crate::grid::Grid;
use crate::source::SourceTerm;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    Explicit,
    Implicit,
    #[default]
    CrankNicolson,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Explicit => write!(f, "explicit"),
            Scheme::Implicit => write!(f, "implicit"),
            Scheme::CrankNicolson => write!(f, "crank-nicolson"),
        }
    }
}

impl FromStr for Scheme {
    type Err = SolverError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "explicit" => Ok(Scheme::Explicit),
            "implicit" => Ok(Scheme::Implicit),
            "crank-nicolson" => Ok(Scheme::CrankNicolson),
            other => Err(SolverError::UnknownScheme(other.to_string())),
        }
    }
}

/// Everything a scheme executor needs besides the solution field itself.
pub(crate) struct SolveContext<'a> {
    pub grid: &'a Grid,
    pub nt: usize,
    pub dt: f64,
    /// Coupling coefficient `r = alpha * dt / dx^2`.
    pub r: f64,
    pub boundaries: &'a CompiledBoundarySet,
    pub source: Option<&'a SourceTerm>,
}

/// Forward-Euler update on interior points, then boundary patch, then
/// source injection. `coupling` optionally carries per-point `r_i` values
/// for a spatially varying diffusivity.
pub(crate) fn run_explicit(
    u: &mut DMatrix<f64>,
    ctx: &SolveContext<'_>,
    coupling: Option<&[f64]>,
) -> Result<(), SolverError> {
    let nx = ctx.grid.nx();
    let dx = ctx.grid.dx();
    for t in 1..ctx.nt {
        let prev = u.column(t - 1).clone_owned();
        let mut next = DVector::zeros(nx);
        for i in 1..nx - 1 {
            let r = coupling.map_or(ctx.r, |k| k[i]);
            next[i] = prev[i] + r * (prev[i + 1] - 2.0 * prev[i] + prev[i - 1])
                - ctx.dt * prev[i];
        }
        let time = t as f64 * ctx.dt;
        next[0] = ctx.boundaries.left.patch_explicit(
            crate::boundary::Side::Left,
            prev[1],
            ctx.grid,
            time,
            dx,
        )?;
        next[nx - 1] = ctx.boundaries.right.patch_explicit(
            crate::boundary::Side::Right,
            prev[nx - 2],
            ctx.grid,
            time,
            dx,
        )?;
        if let Some(source) = ctx.source {
            source.inject(&mut next, ctx.grid, time, &prev, ctx.dt)?;
        }
        u.set_column(t, &next);
    }
    Ok(())
}

/// Backward-Euler update: one constant tridiagonal operator, LU-factored
/// once, back-substituted every step against the patched previous column.
pub(crate) fn run_implicit(
    u: &mut DMatrix<f64>,
    ctx: &SolveContext<'_>,
) -> Result<(), SolverError> {
    let nx = ctx.grid.nx();
    let mut a = tridiagonal(nx, 1.0 + 2.0 * ctx.r + ctx.dt, -ctx.r);
    ctx.boundaries.install_implicit_rows(&mut a, ctx.r, ctx.dt);
    let factored = a.lu();
    for t in 1..ctx.nt {
        let prev = u.column(t - 1).clone_owned();
        let mut b = prev.clone();
        let time = t as f64 * ctx.dt;
        if let Some(source) = ctx.source {
            source.inject(&mut b, ctx.grid, time, &prev, ctx.dt)?;
        }
        ctx.boundaries.patch_rhs_implicit(&mut b, ctx.grid, time)?;
        let next = factored.solve(&b).ok_or(SolverError::SingularSystem)?;
        u.set_column(t, &next);
    }
    Ok(())
}

/// Crank-Nicolson update: an implicit-half operator `A` and an
/// explicit-half operator `B`, both constant. Each step computes
/// `b = B*u[:,t-1]`, patches boundary and source into `b`, then solves
/// `A*u[:,t] = b`. Expressions see the half-step time.
pub(crate) fn run_crank_nicolson(
    u: &mut DMatrix<f64>,
    ctx: &SolveContext<'_>,
) -> Result<(), SolverError> {
    let nx = ctx.grid.nx();
    let dx = ctx.grid.dx();
    let half_r = 0.5 * ctx.r;
    let half_dt = 0.5 * ctx.dt;
    let mut a = tridiagonal(nx, 1.0 + ctx.r + half_dt, -half_r);
    let mut bmat = tridiagonal(nx, 1.0 - ctx.r - half_dt, half_r);
    ctx.boundaries
        .install_crank_nicolson_rows(&mut a, &mut bmat, ctx.grid, dx)?;
    let factored = a.lu();
    for t in 1..ctx.nt {
        let prev = u.column(t - 1).clone_owned();
        let mut b = &bmat * &prev;
        let time = (t as f64 - 1.0) * ctx.dt + half_dt;
        if let Some(source) = ctx.source {
            source.inject(&mut b, ctx.grid, time, &prev, ctx.dt)?;
        }
        ctx.boundaries
            .patch_rhs_crank_nicolson(&mut b, ctx.grid, time, dx)?;
        let next = factored.solve(&b).ok_or(SolverError::SingularSystem)?;
        u.set_column(t, &next);
    }
    Ok(())
}

/// Builds an `n`-by-`n` tridiagonal matrix with a constant diagonal and
/// constant off-diagonals.
fn tridiagonal(n: usize, diagonal: f64, off: f64) -> DMatrix<f64> {
    let mut m = DMatrix::zeros(n, n);
    m.fill_diagonal(diagonal);
    for i in 1..n {
        m[(i, i - 1)] = off;
        m[(i - 1, i)] = off;
    }
    m
}

//! The `kelvin_core` crate is the finite-difference engine behind the
//! Kelvin 1D heat-equation solver. It integrates `u_t = alpha*u_xx - u +
//! source` on a uniform grid under Dirichlet/Neumann/Robin boundaries.
//!
//! Key components:
//! - **Expression**: a compiled tokenizer/parser/stack-VM for the small
//!   expressions used in initial conditions, boundary values, and sources.
//! - **Grid**: uniform grid construction and initial-condition seeding.
//! - **Boundary / Source**: the two per-step applicators shared by the
//!   schemes.
//! - **Schemes**: explicit, implicit, and Crank-Nicolson executors with a
//!   dense LU solve for the implicit operators.
//! - **Problem**: the single-call external interface.

pub mod boundary;
pub mod error;
pub mod expression;
pub mod grid;
pub mod problem;
pub mod schemes;
pub mod source;

pub use error::{ExpressionError, SolverError};
pub use problem::HeatProblem;
pub use schemes::Scheme;

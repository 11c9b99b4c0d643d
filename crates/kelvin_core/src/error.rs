use crate::boundary::BoundaryKind;
use crate::schemes::Scheme;
use thiserror::Error;

/// Failures raised while parsing, compiling, or evaluating an expression
/// string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("syntax error in expression: {0}")]
    Syntax(String),
    #[error("unknown symbol `{0}` in expression")]
    UnknownSymbol(String),
    #[error("unknown function `{0}` in expression")]
    UnknownFunction(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Everything that can go wrong during one solve. All variants are
/// non-recoverable for the current call: the engine fails fast and returns
/// nothing partial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("initial condition has {actual} samples but the grid has {expected} points")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("boundary conditions are missing the `{0}` key")]
    MissingBoundaryKey(&'static str),
    #[error("{kind} boundaries are not supported by the {scheme} scheme")]
    UnsupportedBoundaryKind { kind: BoundaryKind, scheme: Scheme },
    #[error("unknown scheme `{0}`")]
    UnknownScheme(String),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error("assembled system matrix is singular")]
    SingularSystem,
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

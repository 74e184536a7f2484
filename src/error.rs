#![allow(dead_code)]

use thiserror::Error;

/// Error taxonomy for the core engine (§7). None of these rely on unwinding for control
/// flow: every fallible core operation returns `Result<T, SolveError>` and the caller
/// (ultimately the visitor, see [`crate::alg::visitor`]) decides what happens next.
#[derive(Debug, Error)]
pub enum SolveError {
    /// Surfaced only at the boundary between an external parser and the core; the core
    /// itself never produces this once construction has completed successfully.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The rounding sub-pass produced an infeasible primal (cost `+inf`). Non-fatal:
    /// the scheduler simply retries rounding on its next scheduled interval.
    #[error("primal rounding produced an infeasible assignment")]
    InfeasibleProblem,

    /// A NaN cost was encountered. This indicates an implementation bug upstream (NaN
    /// must never be written into a factor table) and is always a programming error,
    /// never a data problem.
    #[error("NaN cost encountered at {0}")]
    NumericDomain(&'static str),

    /// Allocation failure or a configured memory cap was hit. Handled gracefully: the
    /// scheduler runs one final rounding pass and then terminates.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Tightening found no violated inequality meeting `min_dual_increase`. Non-fatal;
    /// the scheduler continues without tightening this round.
    #[error("tightening made no progress (no violation >= {min_dual_increase})")]
    TighteningNoProgress { min_dual_increase: f64 },

    /// The visitor's timeout elapsed; the current sweep is allowed to finish, then the
    /// scheduler terminates.
    #[error("timeout elapsed")]
    Timeout,
}

pub type SolveResult<T> = Result<T, SolveError>;

//! Polymorphic boundary to the subproblem solvers.
//!
//! A [`PricingSolver`] wraps whatever machinery actually optimizes a block
//! subproblem (an LP/MIP code, a combinatorial algorithm, a heuristic). The
//! pricing core treats it as a small vtable: capability check, exact solve,
//! and an optional cheaper heuristic solve. Solvers see the block model
//! frozen for the duration of one call and must not retain references to it.

use derive_more::{Display, Error};
use dyn_clone::DynClone;
use faer::ColRef;
use problemo::Problem;

use crate::column::Column;
use crate::interface::decomp::BlockModel;
use crate::{E, I, Status};

#[derive(Debug, Display, Error, PartialEq)]
pub enum SolverError {
    #[display("Numerical trouble inside a subproblem solve")]
    Numerical,

    #[display("Solve limits are inconsistent")]
    InvalidLimits,
}

/// Working limits handed to a solver at dispatch time. Solvers report back
/// through [`Status`] which limit, if any, stopped them.
#[derive(Debug, Clone)]
pub struct SolveLimits {
    /// Wall-clock limit in seconds.
    pub timelimit: E,
    /// LP iteration budget, if any.
    pub lpiterlimit: Option<I>,
    /// Stop after this many improving solutions.
    pub sollimit: Option<I>,
    /// Node limit for enumerating solvers.
    pub nodelimit: Option<i64>,
}

impl SolveLimits {
    pub fn unbounded() -> Self {
        Self {
            timelimit: E::INFINITY,
            lpiterlimit: None,
            sollimit: None,
            nodelimit: None,
        }
    }
}

/// Result of one solver invocation: the claimed status, a lower bound on the
/// subproblem objective (valid for `Optimal`, best-effort otherwise), and
/// the columns generated.
#[derive(Debug)]
pub struct SolveOutcome {
    pub status: Status,
    pub lowerbound: Option<E>,
    pub cols: Vec<Column>,
}

impl SolveOutcome {
    /// Outcome of a solver that cannot handle the subproblem at all.
    pub fn not_applicable() -> Self {
        Self {
            status: Status::NotApplicable,
            lowerbound: None,
            cols: Vec::new(),
        }
    }
}

/// Capability interface of a subproblem solver.
///
/// Branching constraints active at the current node ride on the model (they
/// are pushed through a probing scope before dispatch and popped afterwards,
/// see [`BlockModel::active_branch_rows`]). Errors returned from a solve are
/// treated as numerical trouble: the round continues and the problem counts
/// as limit-stopped rather than solved.
pub trait PricingSolver: DynClone {
    fn name(&self) -> &'static str;

    /// Larger priorities are dispatched first when several solvers can
    /// handle the same block.
    fn priority(&self) -> i32 {
        0
    }

    fn can_handle(&self, model: &BlockModel) -> bool;

    /// Solves the block subproblem to proven optimality (within limits)
    /// under the given pricing objective.
    fn solve_exact(
        &mut self,
        model: &BlockModel,
        objective: ColRef<'_, E>,
        limits: &SolveLimits,
    ) -> Result<SolveOutcome, Problem>;

    /// Cheaper, possibly truncated solve. The default forwards to
    /// [`solve_exact`](Self::solve_exact).
    fn solve_heuristic(
        &mut self,
        model: &BlockModel,
        objective: ColRef<'_, E>,
        limits: &SolveLimits,
    ) -> Result<SolveOutcome, Problem> {
        self.solve_exact(model, objective, limits)
    }
}

dyn_clone::clone_trait_object!(PricingSolver);

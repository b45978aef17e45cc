use serde::{Deserialize, Serialize};

pub mod callback;
pub mod column;
pub mod interface;
pub mod linalg;
pub mod pricing;
pub mod solver;
pub mod stats;
pub mod terminators;

#[cfg(test)]
pub mod tests;

pub use crate::pricing::{Pricer, PricingOutcome};

pub type E = f64;
pub type I = usize;

/// Tolerance for structural comparisons (sparse entries, column equality).
pub const EPS: E = 1e-9;

/// Tolerance below which a reduced cost counts as dual-feasibly negative.
pub const REDCOST_EPS: E = 1e-6;

/// Status codes reported by pricing solvers and aggregated per block.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize)]
pub enum Status {
    #[default]
    /// No result yet, or the last solve was inconclusive.
    Unknown,
    /// The subproblem was solved to proven optimality.
    Optimal,
    /// The subproblem is infeasible under the active branching constraints.
    Infeasible,
    /// The subproblem is unbounded (an extreme ray was found).
    Unbounded,
    /// The solver stopped after reaching its solution-count limit.
    SolutionLimit,
    /// The solver stopped after crossing the objective cutoff.
    ObjectiveLimit,
    /// The solver stopped due to a node limit.
    NodeLimit,
    /// The solver stopped due to a time limit.
    TimeLimit,
    /// The solver was interrupted (e.g., by user or signal).
    Interrupted,
    /// The solver cannot handle this subproblem; ignored in aggregation.
    NotApplicable,
}

impl Status {
    /// Whether this status settles the subproblem (no further solves needed
    /// once all branching constraints are incorporated).
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Optimal | Status::Infeasible | Status::Unbounded)
    }

    /// Whether the solver gave up on a working limit rather than a proof.
    pub fn hit_limit(self) -> bool {
        matches!(
            self,
            Status::SolutionLimit
                | Status::ObjectiveLimit
                | Status::NodeLimit
                | Status::TimeLimit
                | Status::Interrupted
        )
    }
}

/// Orderings used to score pricing jobs before a round (see
/// [`pricing::job`](crate::pricing::job)).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sorting {
    /// Solve blocks in index order.
    Index,
    /// Prefer blocks with large convexity duals.
    Dual,
    #[default]
    /// Prefer blocks that generated few points/rays so far.
    Reliability,
    /// Prefer blocks that produced improving columns in recent rounds.
    LastRounds,
}

/// Norm used when turning a reduced cost into an efficacy value in the
/// price store.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficacyChoice {
    #[default]
    /// Scale by the norm of the current dual vector.
    Dual,
    /// Use the raw reduced cost.
    Redcost,
    /// Scale by the norm of the column's master coefficients.
    MasterCoef,
}

/// Flat configuration of the pricing subsystem. All parameters are
/// per-instance and read-only once pricing starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingOptions {
    /// Heuristic iterations per (problem, call) before escalation to exact.
    pub heurpricingiters: I,
    /// Job scoring rule.
    pub sorting: Sorting,
    /// Window length for the "recent improving columns" score.
    pub nroundscol: I,
    /// Fraction of blocks that must succeed before the round may abort.
    pub relmaxsuccessfulprobs: E,
    /// Blocks solved per chunk before the abort condition is re-checked.
    pub chunksize: I,
    /// Every `eagerfreq` rounds all blocks are solved regardless of success;
    /// 0 disables eager rounds.
    pub eagerfreq: I,
    /// Per-job wall-clock cap in seconds.
    pub jobtimelimit: E,
    /// Column pool age limit; -1 disables aging.
    pub agelimit: i64,
    /// Weight of the efficacy term in the column score.
    pub redcostfac: E,
    /// Weight of the objective-parallelism term in the column score.
    pub objparalfac: E,
    /// Weight of the orthogonality term in the column score.
    pub orthofac: E,
    /// Minimal orthogonality a column must keep to already-picked columns.
    pub mincolorth: E,
    /// Per-round cap on applied columns at the root node.
    pub maxcolsroot: I,
    /// Per-round cap on applied columns at non-root nodes.
    pub maxcols: I,
    /// Per-round cap on applied columns during Farkas pricing.
    pub maxcolsfarkas: I,
    /// Norm selection for the efficacy term.
    pub efficacy_choice: EfficacyChoice,
    /// Archive non-improving columns in the column pool.
    pub use_colpool: bool,
    /// Stage columns in the price store; when false, improving columns are
    /// handed to the master directly.
    pub use_pricestore: bool,
    /// Pricing rounds per node; -1 is unbounded.
    pub maxpricerounds: i64,
    /// LP iteration budget factor relative to the node's LP iterations.
    pub maxlpiterquot: E,
    /// LP iteration budget offset.
    pub maxlpiterofs: I,
}

impl Default for PricingOptions {
    fn default() -> Self {
        Self {
            heurpricingiters: 1,
            sorting: Sorting::Reliability,
            nroundscol: 15,
            relmaxsuccessfulprobs: 1.0,
            chunksize: I::MAX,
            eagerfreq: 10,
            jobtimelimit: E::INFINITY,
            agelimit: 100,
            redcostfac: 1.0,
            objparalfac: 0.0,
            orthofac: 0.0,
            mincolorth: 0.0,
            maxcolsroot: 100,
            maxcols: 100,
            maxcolsfarkas: 10,
            efficacy_choice: EfficacyChoice::Dual,
            use_colpool: true,
            use_pricestore: true,
            maxpricerounds: -1,
            maxlpiterquot: 2.0,
            maxlpiterofs: 1000,
        }
    }
}

/// Hooks threaded through a pricing round: a per-round callback and the
/// cooperative termination check polled between jobs and chunks.
pub struct PricingHooks {
    pub callback: Box<dyn crate::callback::Callback>,
    pub terminator: Box<dyn crate::terminators::Terminator>,
}

impl PricingHooks {
    /// Silent hooks that never interrupt; useful as a baseline.
    pub fn quiet() -> Self {
        use crate::callback::{Callback, NoOpCallback};

        Self {
            callback: Box::new(NoOpCallback::new(&PricingOptions::default())),
            terminator: Box::new(crate::terminators::NeverTerminator::new()),
        }
    }
}

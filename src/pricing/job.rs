//! Pricing jobs and their scoring.
//!
//! A [`PricingJob`] is one concrete attempt of one solver on one block. Jobs
//! live on the controller's per-chunk priority queues, max-ordered by score
//! with the block index as tie-break. The score itself is computed by one of
//! the [`ScoringRule`] strategies selected through
//! [`Sorting`](crate::Sorting).

use std::cmp::Ordering;

use enum_dispatch::enum_dispatch;

use crate::pricing::problem::PricingProblem;
use crate::solver::PricingSolver;
use crate::{E, I, Sorting};

/// Strategy scoring a block before a round; higher scores are dispatched
/// first.
#[enum_dispatch]
pub trait ScoringRule {
    fn score(&self, problem: &PricingProblem, dualconv: E, nroundscol: I) -> E;
}

/// Solve blocks in index order.
pub struct IndexScoring {}

impl ScoringRule for IndexScoring {
    fn score(&self, problem: &PricingProblem, _dualconv: E, _nroundscol: I) -> E {
        -(problem.probnr() as E)
    }
}

/// Prefer blocks whose convexity constraint carries a large dual value.
pub struct DualScoring {}

impl ScoringRule for DualScoring {
    fn score(&self, _problem: &PricingProblem, dualconv: E, _nroundscol: I) -> E {
        dualconv
    }
}

/// Prefer blocks that produced few points and rays so far; cheap blocks are
/// the reliable ones.
pub struct ReliabilityScoring {}

impl ScoringRule for ReliabilityScoring {
    fn score(&self, problem: &PricingProblem, _dualconv: E, _nroundscol: I) -> E {
        -(0.2 * problem.n_points() as E + problem.n_rays() as E)
    }
}

/// Prefer blocks that produced improving columns in the recent rounds.
pub struct LastRoundsScoring {}

impl ScoringRule for LastRoundsScoring {
    fn score(&self, problem: &PricingProblem, _dualconv: E, nroundscol: I) -> E {
        problem.ncols_last_rounds(nroundscol) as E
    }
}

#[enum_dispatch(ScoringRule)]
pub enum Scoring {
    IndexScoring,
    DualScoring,
    ReliabilityScoring,
    LastRoundsScoring,
}

impl From<Sorting> for Scoring {
    fn from(sorting: Sorting) -> Self {
        match sorting {
            Sorting::Index => IndexScoring {}.into(),
            Sorting::Dual => DualScoring {}.into(),
            Sorting::Reliability => ReliabilityScoring {}.into(),
            Sorting::LastRounds => LastRoundsScoring {}.into(),
        }
    }
}

/// One unit of pricing work: a solver bound to a block, placed in a chunk,
/// with a dispatch score and the heuristic/exact mode.
pub struct PricingJob {
    probnr: I,
    solver: Box<dyn PricingSolver>,
    chunk: I,
    score: E,
    heuristic: bool,
    n_heur_iters: I,
}

impl PricingJob {
    pub fn new(probnr: I, solver: Box<dyn PricingSolver>, chunk: I) -> Self {
        Self {
            probnr,
            solver,
            chunk,
            score: 0.,
            heuristic: false,
            n_heur_iters: 0,
        }
    }

    /// Prepares the job for a round: scoring and heuristic mode.
    pub fn setup(&mut self, heuristic: bool, score: E) {
        self.heuristic = heuristic;
        self.score = score;
        self.n_heur_iters = 0;
    }

    pub fn probnr(&self) -> I {
        self.probnr
    }

    pub fn chunk(&self) -> I {
        self.chunk
    }

    pub fn score(&self) -> E {
        self.score
    }

    pub fn heuristic(&self) -> bool {
        self.heuristic
    }

    pub fn n_heur_iters(&self) -> I {
        self.n_heur_iters
    }

    pub fn solver(&self) -> &dyn PricingSolver {
        self.solver.as_ref()
    }

    pub fn solver_mut(&mut self) -> &mut Box<dyn PricingSolver> {
        &mut self.solver
    }

    /// Counts one heuristic solver invocation.
    pub fn record_heur_iter(&mut self) {
        self.n_heur_iters += 1;
    }

    /// Escalates the job to exact solving.
    pub fn set_exact(&mut self) {
        self.heuristic = false;
    }
}

// Queue ordering: higher score first, smaller block index on ties. Scores
// are finite by construction, so the partial comparison never fails.
impl PartialEq for PricingJob {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.probnr == other.probnr
    }
}

impl Eq for PricingJob {}

impl PartialOrd for PricingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PricingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.probnr.cmp(&self.probnr))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;
    use crate::tests::harness::ScriptedSolver;

    fn job(probnr: I, score: E) -> PricingJob {
        let mut job = PricingJob::new(probnr, Box::new(ScriptedSolver::empty()), 0);
        job.setup(false, score);
        job
    }

    #[test]
    fn test_queue_orders_by_score_then_probnr() {
        let mut heap = BinaryHeap::new();
        heap.push(job(3, 1.0));
        heap.push(job(1, 2.0));
        heap.push(job(2, 2.0));

        assert_eq!(heap.pop().unwrap().probnr(), 1); // higher score, lower index
        assert_eq!(heap.pop().unwrap().probnr(), 2);
        assert_eq!(heap.pop().unwrap().probnr(), 3);
    }

    #[test]
    fn test_scoring_rules() {
        let mut problem = PricingProblem::new(4);
        problem.init_pricing(Vec::new());
        problem.update(crate::Status::Optimal, None, 2);
        problem.exit_pricing(3);
        problem.init_pricing(Vec::new());

        let index = Scoring::from(Sorting::Index);
        let dual = Scoring::from(Sorting::Dual);
        let last = Scoring::from(Sorting::LastRounds);

        assert_eq!(index.score(&problem, 0.5, 3), -4.0);
        assert_eq!(dual.score(&problem, 0.5, 3), 0.5);
        assert_eq!(last.score(&problem, 0.5, 3), 2.0);
    }

    #[test]
    fn test_reliability_scoring_counts_generated_cols() {
        use crate::column::{BlockRef, Column};

        let mut problem = PricingProblem::new(0);
        problem.init_pricing(Vec::new());
        problem.add_col(Column::new(BlockRef::Block(0), vec![0], vec![1.0], false).unwrap());
        problem.add_col(Column::new(BlockRef::Block(0), vec![1], vec![1.0], true).unwrap());

        let reliability = Scoring::from(Sorting::Reliability);
        assert!((reliability.score(&problem, 0., 3) - (-1.2)).abs() < 1e-12);
    }
}

//! Per-block state across one pricing round.

use std::collections::VecDeque;

use crate::column::Column;
use crate::interface::decomp::BranchingCons;
use crate::{E, I, Status};

/// Round-local state machine of one block: which generic-branching
/// constraints are active, the best lower bound seen, the improving-column
/// count, and the merged solver status.
///
/// With Vanderbeck-style generic branching active, the block must be priced
/// with all `L` branching constraints incorporated. Solver-side restrictions
/// may force incremental application: solving starts with the constraint
/// suffix `conss[next_cons_idx..]` and `next_cons_idx` is decremented after
/// each terminal solve until it reaches zero. Only then the merged status
/// counts as final.
#[derive(Debug)]
pub struct PricingProblem {
    probnr: I,
    branchconss: Vec<BranchingCons>,
    next_cons_idx: I,
    status: Status,
    lowerbound: E,
    n_imp_cols: I,
    n_solves: I,
    /// Extreme points generated over the pricer's lifetime.
    n_points: I,
    /// Extreme rays generated over the pricer's lifetime.
    n_rays: I,
    /// Improving-column counts of recent rounds, newest first.
    ncols_round: VecDeque<I>,
    /// Columns produced this round, owned until the controller drains them.
    cols: Vec<Column>,
}

impl PricingProblem {
    pub fn new(probnr: I) -> Self {
        Self {
            probnr,
            branchconss: Vec::new(),
            next_cons_idx: 0,
            status: Status::Unknown,
            lowerbound: E::NEG_INFINITY,
            n_imp_cols: 0,
            n_solves: 0,
            n_points: 0,
            n_rays: 0,
            ncols_round: VecDeque::new(),
            cols: Vec::new(),
        }
    }

    pub fn probnr(&self) -> I {
        self.probnr
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn lowerbound(&self) -> E {
        self.lowerbound
    }

    pub fn n_imp_cols(&self) -> I {
        self.n_imp_cols
    }

    pub fn n_solves(&self) -> I {
        self.n_solves
    }

    pub fn n_points(&self) -> I {
        self.n_points
    }

    pub fn n_rays(&self) -> I {
        self.n_rays
    }

    /// Starts a round: installs the node's branching constraints and resets
    /// the per-round state.
    pub fn init_pricing(&mut self, branchconss: Vec<BranchingCons>) {
        self.next_cons_idx = branchconss.len();
        self.branchconss = branchconss;
        self.reset();
        self.cols.clear();
    }

    /// Clears status, lower bound, and per-round counters.
    pub fn reset(&mut self) {
        self.status = Status::Unknown;
        self.lowerbound = E::NEG_INFINITY;
        self.n_imp_cols = 0;
        self.n_solves = 0;
    }

    /// Branching constraints a solver must currently incorporate (the suffix
    /// from `next_cons_idx` on).
    pub fn active_conss(&self) -> &[BranchingCons] {
        &self.branchconss[self.next_cons_idx..]
    }

    pub fn branchconss(&self) -> &[BranchingCons] {
        &self.branchconss
    }

    pub fn has_pending_conss(&self) -> bool {
        self.next_cons_idx > 0
    }

    /// Re-adds the next branching constraint for the following solve.
    pub fn advance_cons(&mut self) {
        debug_assert!(self.next_cons_idx > 0);
        self.next_cons_idx -= 1;
    }

    /// Merges one solver result: last status wins (`NotApplicable` is
    /// ignored), the lower bound only grows, improving-column and solve
    /// counters accumulate.
    pub fn update(&mut self, status: Status, lowerbound: Option<E>, n_imp_cols: I) {
        self.n_solves += 1;
        if status != Status::NotApplicable {
            self.status = status;
        }
        if let Some(lb) = lowerbound {
            self.lowerbound = self.lowerbound.max(lb);
        }
        self.n_imp_cols += n_imp_cols;
    }

    /// Whether this block is settled for the round: terminal status with all
    /// branching constraints incorporated.
    pub fn is_done(&self) -> bool {
        self.status.is_terminal() && self.next_cons_idx == 0
    }

    /// Buffers a generated column; duplicates against the buffer are dropped
    /// and reported as `false`.
    pub fn add_col(&mut self, col: Column) -> bool {
        if self.cols.iter().any(|c| c.is_equal(&col)) {
            return false;
        }
        if col.is_ray() {
            self.n_rays += 1;
        } else {
            self.n_points += 1;
        }
        self.cols.push(col);
        true
    }

    /// Hands the round's buffered columns to the caller.
    pub fn take_cols(&mut self) -> Vec<Column> {
        std::mem::take(&mut self.cols)
    }

    /// Improving columns counted over the last `n` rounds.
    pub fn ncols_last_rounds(&self, n: I) -> I {
        self.ncols_round.iter().take(n).sum()
    }

    /// Ends the round: slides the improving-column window.
    pub fn exit_pricing(&mut self, nroundscol: I) {
        self.ncols_round.push_front(self.n_imp_cols);
        self.ncols_round.truncate(nroundscol.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{BlockRef, Column};
    use crate::interface::decomp::{ConsData, ConsSense};

    fn cons(dual: E) -> BranchingCons {
        BranchingCons {
            cons: ConsData {
                vars: vec![0],
                coefs: vec![1.0],
                sense: ConsSense::Le,
                rhs: 1.0,
            },
            dual,
        }
    }

    #[test]
    fn test_update_merges_status_and_bound() {
        let mut problem = PricingProblem::new(0);
        problem.init_pricing(Vec::new());

        problem.update(Status::SolutionLimit, Some(3.0), 1);
        problem.update(Status::NotApplicable, None, 0); // ignored
        problem.update(Status::Optimal, Some(2.0), 2); // bound must not regress

        assert_eq!(problem.status(), Status::Optimal);
        assert_eq!(problem.lowerbound(), 3.0);
        assert_eq!(problem.n_imp_cols(), 3);
        assert_eq!(problem.n_solves(), 3);
    }

    #[test]
    fn test_branching_sequencing() {
        let mut problem = PricingProblem::new(0);
        problem.init_pricing(vec![cons(-1.0), cons(2.0)]);

        // First solve sees only the trailing constraint.
        assert_eq!(problem.active_conss().len(), 1);
        problem.update(Status::Optimal, Some(5.0), 0);
        assert!(!problem.is_done(), "pending constraints keep it open");

        problem.advance_cons();
        assert_eq!(problem.active_conss().len(), 2);
        problem.update(Status::Optimal, Some(7.0), 0);

        assert!(problem.is_done());
        assert_eq!(problem.lowerbound(), 7.0);
        assert_eq!(problem.status(), Status::Optimal);
    }

    #[test]
    fn test_col_buffer_dedup() {
        let mut problem = PricingProblem::new(0);
        problem.init_pricing(Vec::new());

        let col = Column::new(BlockRef::Block(0), vec![0, 2], vec![1.0, 2.0], false).unwrap();
        assert!(problem.add_col(col.clone()));
        assert!(!problem.add_col(col));
        assert_eq!(problem.take_cols().len(), 1);
        assert_eq!(problem.n_points(), 1);
    }

    #[test]
    fn test_round_window() {
        let mut problem = PricingProblem::new(0);
        for n in [3, 1, 4] {
            problem.init_pricing(Vec::new());
            problem.update(Status::Optimal, None, n);
            problem.exit_pricing(2);
        }
        // Window of length 2 keeps the newest counts: 4 and 1.
        assert_eq!(problem.ncols_last_rounds(2), 5);
        assert_eq!(problem.ncols_last_rounds(1), 4);
    }
}

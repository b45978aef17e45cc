//! Round orchestration: job queues, chunking, abort policy.
//!
//! The controller owns the per-block [`PricingProblem`]s and, during a
//! round, per-chunk priority queues of [`PricingJob`]s. It is the sole
//! consumer of those queues; solver dispatch itself happens in the
//! [`Pricer`](crate::pricing::Pricer), which feeds every result back through
//! [`update_job`](PricingController::update_job).

use std::collections::BinaryHeap;

use derive_more::{Display, Error};
use problemo::Problem;

use crate::column::Column;
use crate::column::pool::ColumnPool;
use crate::column::store::PriceStore;
use crate::interface::decomp::{BranchingCons, DecompContext};
use crate::pricing::job::{PricingJob, Scoring, ScoringRule};
use crate::pricing::problem::PricingProblem;
use crate::interface::master::DualValues;
use crate::solver::PricingSolver;
use crate::{E, I, PricingOptions, Status};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ControllerError {
    #[display("Branching constraints do not cover every block")]
    BranchingDimensionMismatch,

    #[display("Convexity duals do not cover every block")]
    DualDimensionMismatch,

    #[display("No pricing solver is registered")]
    NoSolvers,
}

/// Whether a round prices against the LP duals or a Farkas certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingType {
    Redcost,
    Farkas,
}

/// Feedback from [`PricingController::update_job`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JobUpdate {
    /// Improving columns kept from this solve.
    pub nimproving: I,
    /// Columns dropped as duplicates of this round's buffer.
    pub nduplicate: I,
    /// Whether the job went back on the queue (pending branching constraint
    /// or heuristic-to-exact escalation).
    pub requeued: bool,
}

/// Result of draining the per-problem buffers after a round, see
/// [`PricingController::move_cols_to_colpool`].
#[derive(Debug, Default)]
pub struct DrainOutcome {
    /// Improving columns not staged anywhere (only when no store is used);
    /// the caller hands them to the master directly.
    pub direct: Vec<Column>,
    /// Improving columns staged in the price store.
    pub nstored: I,
    /// Non-improving columns archived in the pool.
    pub npooled: I,
    /// Columns dropped as pool duplicates.
    pub nduplicate: I,
}

/// Scheduler of one pricing round over `K` block subproblems.
pub struct PricingController {
    options: PricingOptions,
    problems: Vec<PricingProblem>,
    queues: Vec<BinaryHeap<PricingJob>>,
    chunksize: I,
    nchunks: I,
    curchunk: I,
    startchunk: I,
    pricing_type: PricingType,
    /// Rounds since the last eager round; when it reaches `eagerfreq` the
    /// round solves every block and ignores the abort condition.
    eagerage: I,
    eager_round: bool,
    limit_hit: bool,
    nsolved: I,
    nsuccessful: I,
    nfoundcols: I,
}

impl PricingController {
    pub fn new(options: PricingOptions, nblocks: I) -> Self {
        let chunksize = options.chunksize.clamp(1, nblocks.max(1));
        let nchunks = if nblocks == 0 {
            1
        } else {
            nblocks.div_ceil(chunksize)
        };

        Self {
            options,
            problems: (0..nblocks).map(PricingProblem::new).collect(),
            queues: (0..nchunks).map(|_| BinaryHeap::new()).collect(),
            chunksize,
            nchunks,
            curchunk: 0,
            startchunk: 0,
            pricing_type: PricingType::Redcost,
            eagerage: 0,
            eager_round: false,
            limit_hit: false,
            nsolved: 0,
            nsuccessful: 0,
            nfoundcols: 0,
        }
    }

    pub fn nblocks(&self) -> I {
        self.problems.len()
    }

    pub fn problem(&self, probnr: I) -> &PricingProblem {
        &self.problems[probnr]
    }

    pub fn pricing_type(&self) -> PricingType {
        self.pricing_type
    }

    pub fn is_eager_round(&self) -> bool {
        self.eager_round
    }

    /// Jobs completed this round.
    pub fn nsolved(&self) -> I {
        self.nsolved
    }

    /// Blocks that produced at least one improving column this round.
    pub fn nsuccessful(&self) -> I {
        self.nsuccessful
    }

    /// Improving columns found this round.
    pub fn nfoundcols(&self) -> I {
        self.nfoundcols
    }

    fn chunk_of(&self, probnr: I) -> I {
        probnr / self.chunksize
    }

    /// Starts a round: resets every problem, installs the node's branching
    /// constraints, and decides whether this is an eager round.
    pub fn init_pricing(
        &mut self,
        pricing_type: PricingType,
        branchconss: Vec<Vec<BranchingCons>>,
    ) -> Result<(), Problem> {
        if branchconss.len() != self.problems.len() {
            return Err(ControllerError::BranchingDimensionMismatch)?;
        }

        self.pricing_type = pricing_type;
        self.limit_hit = false;
        self.nsolved = 0;
        self.nsuccessful = 0;
        self.nfoundcols = 0;
        self.curchunk = self.startchunk.min(self.nchunks.saturating_sub(1));

        self.eager_round = false;
        if pricing_type == PricingType::Redcost && self.options.eagerfreq > 0 {
            self.eagerage += 1;
            if self.eagerage >= self.options.eagerfreq {
                self.eager_round = true;
            }
        }

        for (problem, conss) in self.problems.iter_mut().zip(branchconss) {
            problem.init_pricing(conss);
        }
        Ok(())
    }

    /// Builds the job queues: one job per (block, capable solver), heuristic
    /// first when heuristic pricing is enabled, scored by the configured
    /// sorting rule and partitioned into chunks.
    pub fn setup_priority_queue(
        &mut self,
        solvers: &[Box<dyn PricingSolver>],
        ctx: &DecompContext,
        duals: &DualValues,
    ) -> Result<(), Problem> {
        if solvers.is_empty() {
            return Err(ControllerError::NoSolvers)?;
        }
        if duals.conv.nrows() != self.problems.len() {
            return Err(ControllerError::DualDimensionMismatch)?;
        }

        for queue in &mut self.queues {
            queue.clear();
        }

        let scoring = Scoring::from(self.options.sorting);
        let heuristic = self.options.heurpricingiters > 0;

        for probnr in 0..self.problems.len() {
            let model = &ctx.block(probnr).model;
            let score = scoring.score(
                &self.problems[probnr],
                duals.conv[probnr],
                self.options.nroundscol,
            );

            for solver in solvers {
                if !solver.can_handle(model) {
                    continue;
                }
                let chunk = self.chunk_of(probnr);
                let mut job = PricingJob::new(probnr, solver.clone(), chunk);
                job.setup(heuristic, score);
                self.queues[chunk].push(job);
            }
        }
        Ok(())
    }

    /// Returns the best job of the current chunk, advancing through chunks
    /// as they run dry; `None` once every queue is exhausted. Jobs whose
    /// problem is already settled are discarded on the way.
    pub fn next_job(&mut self) -> Option<PricingJob> {
        for offset in 0..self.nchunks {
            let chunk = (self.curchunk + offset) % self.nchunks;
            while let Some(job) = self.queues[chunk].pop() {
                if self.problems[job.probnr()].is_done() {
                    continue;
                }
                self.curchunk = chunk;
                return Some(job);
            }
        }
        None
    }

    /// Whether `job`'s problem is settled for this round.
    pub fn evaluate_job(&self, job: &PricingJob) -> bool {
        self.problems[job.probnr()].is_done()
    }

    /// Merges a solver result into the job's problem, buffers the produced
    /// columns, and re-enqueues the job when more work is required: the next
    /// generic-branching constraint, or the escalation from heuristic to
    /// exact solving.
    pub fn update_job(
        &mut self,
        mut job: PricingJob,
        status: Status,
        lowerbound: Option<E>,
        cols: Vec<Column>,
    ) -> Result<JobUpdate, Problem> {
        if status == Status::NotApplicable {
            // This solver contributes nothing; other jobs cover the block.
            return Ok(JobUpdate::default());
        }

        let probnr = job.probnr();
        let was_successful = self.problems[probnr].n_imp_cols() > 0;

        let mut update = JobUpdate::default();
        for col in cols {
            let improving = col.is_improving();
            if self.problems[probnr].add_col(col) {
                if improving {
                    update.nimproving += 1;
                }
            } else {
                update.nduplicate += 1;
            }
        }

        // An optimality claim from a heuristic solve is no proof; merge it
        // as a truncated solve and ignore its bound.
        let reported = if job.heuristic() && status == Status::Optimal {
            Status::SolutionLimit
        } else {
            status
        };
        let lowerbound = if job.heuristic() { None } else { lowerbound };
        self.problems[probnr].update(reported, lowerbound, update.nimproving);

        self.nsolved += 1;
        self.nfoundcols += update.nimproving;
        if !was_successful && self.problems[probnr].n_imp_cols() > 0 {
            self.nsuccessful += 1;
        }

        if status == Status::Unknown || status.hit_limit() {
            self.limit_hit = true;
        } else if job.heuristic() {
            job.record_heur_iter();
            if update.nimproving == 0 || job.n_heur_iters() >= self.options.heurpricingiters {
                job.set_exact();
            }
            if !self.problems[probnr].is_done() {
                self.queues[job.chunk()].push(job);
                update.requeued = true;
            }
        } else if status.is_terminal() && self.problems[probnr].has_pending_conss() {
            self.problems[probnr].advance_cons();
            self.queues[job.chunk()].push(job);
            update.requeued = true;
        }

        Ok(update)
    }

    /// Abort policy of the pricing loop: enough blocks produced improving
    /// columns and at least one improving column exists overall. Eager
    /// rounds never abort.
    pub fn can_abort(&self) -> bool {
        if self.eager_round {
            return false;
        }
        if self.nfoundcols == 0 {
            return false;
        }
        let nblocks = self.problems.len().max(1);
        self.nsuccessful as E >= self.options.relmaxsuccessfulprobs * nblocks as E
    }

    /// Drains every problem's buffered columns: improving columns go to the
    /// price store (or are returned for direct application when no store is
    /// in use), the rest are archived in the pool when enabled, subject to
    /// deduplication.
    pub fn move_cols_to_colpool(
        &mut self,
        pool: &mut ColumnPool,
        mut store: Option<&mut PriceStore>,
        use_colpool: bool,
    ) -> Result<DrainOutcome, Problem> {
        let mut outcome = DrainOutcome::default();

        for problem in &mut self.problems {
            for col in problem.take_cols() {
                if col.is_improving() {
                    match store {
                        Some(ref mut store) => {
                            store.add_col(col, false);
                            outcome.nstored += 1;
                        }
                        None => outcome.direct.push(col),
                    }
                } else if use_colpool {
                    if pool.add(col)?.is_none() {
                        outcome.npooled += 1;
                    } else {
                        outcome.nduplicate += 1;
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// Whether the round proved that no improving column exists: every block
    /// solved to optimality with all branching constraints incorporated.
    pub fn pricing_is_optimal(&self) -> bool {
        self.problems
            .iter()
            .all(|p| p.status() == Status::Optimal && !p.has_pending_conss())
    }

    /// Whether Farkas pricing proved the node infeasible: every block
    /// subproblem is infeasible.
    pub fn pricing_is_infeasible(&self) -> bool {
        self.pricing_type == PricingType::Farkas
            && !self.problems.is_empty()
            && self.problems.iter().all(|p| p.status() == Status::Infeasible)
    }

    /// Whether the per-block lower bounds are trustworthy: everything solved
    /// to optimality and no solver hit a limit.
    pub fn redcost_is_valid(&self) -> bool {
        self.pricing_is_optimal() && !self.limit_hit
    }

    /// Ends the round: slides each problem's improving-column window,
    /// remembers where to start the next round, and resets the eager age
    /// after an eager round.
    pub fn exit_pricing(&mut self) {
        for problem in &mut self.problems {
            problem.exit_pricing(self.options.nroundscol);
        }
        self.startchunk = self.curchunk;
        if self.eager_round {
            self.eagerage = 0;
        }
        self.eager_round = false;
    }
}

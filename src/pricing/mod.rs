//! The pricing facade driving rounds on behalf of the master LP.
//!
//! One [`Pricer::perform_pricing`] call runs a full round:
//!
//! 1. read duals (or Farkas multipliers) from the master,
//! 2. harvest the column pool for cheap wins without touching a solver,
//! 3. build per-block pricing objectives and the scored job queue,
//! 4. dispatch jobs until the queue is exhausted, the abort policy fires,
//!    or the terminator interrupts,
//! 5. drain the generated columns into the price store and the pool,
//! 6. lift the master lower bound when every block was solved to optimality,
//! 7. apply the selected columns as new master variables.
//!
//! Scheduling is single-threaded and cooperative: solver invocations run to
//! completion, and none of the core's state is mutated while a solver runs.

pub mod controller;
pub mod job;
pub mod problem;

use std::time::Instant;

use derive_more::{Display, Error};
use faer::Col;
use problemo::Problem;

use crate::column::pool::ColumnPool;
use crate::column::store::PriceStore;
use crate::interface::decomp::{ConsData, DecompContext};
use crate::interface::master::{DualValues, Master, PricedVar};
use crate::pricing::controller::{PricingController, PricingType};
use crate::solver::{PricingSolver, SolveLimits, SolveOutcome};
use crate::stats::{PricingStats, RoundStats};
use crate::{E, I, PricingHooks, PricingOptions, Status};

#[derive(Debug, Display, Error, PartialEq)]
pub enum PricerError {
    #[display("Dual values do not match the master constraints")]
    DualDimensionMismatch,

    #[display("Convexity duals do not match the block count")]
    ConvexityDimensionMismatch,

    #[display("Cut duals do not match the registered cut rows")]
    CutDimensionMismatch,

    #[display("No pricing solver is registered")]
    NoSolvers,
}

/// Result of one pricing round, for the host's node processing decision.
///
/// `status` is [`Status::Optimal`] when the round proved that no improving
/// column exists, [`Status::Infeasible`] when Farkas pricing proved the node
/// infeasible, [`Status::Interrupted`]/[`Status::TimeLimit`] on cooperative
/// interruption, and [`Status::Unknown`] otherwise (columns were added or
/// limits cut the round short).
#[derive(Debug, Clone, Copy)]
pub struct PricingOutcome {
    pub status: Status,
    /// Master variables created this round.
    pub ncols_added: I,
    /// Lagrangian lower bound, when the round proved one.
    pub lowerbound: Option<E>,
}

/// The pricing subsystem of one decomposition: column pool, price store,
/// controller, and the registered subproblem solvers.
pub struct Pricer {
    ctx: DecompContext,
    options: PricingOptions,
    solvers: Vec<Box<dyn PricingSolver>>,
    colpool: ColumnPool,
    store: PriceStore,
    controller: PricingController,
    hooks: PricingHooks,
    stats: PricingStats,
}

impl Pricer {
    pub fn new(
        ctx: DecompContext,
        options: PricingOptions,
        mut solvers: Vec<Box<dyn PricingSolver>>,
        hooks: PricingHooks,
    ) -> Result<Self, Problem> {
        if solvers.is_empty() {
            return Err(PricerError::NoSolvers)?;
        }
        solvers.sort_by_key(|s| std::cmp::Reverse(s.priority()));

        let nblocks = ctx.nblocks();
        Ok(Self {
            colpool: ColumnPool::new(options.agelimit),
            store: PriceStore::new(&options),
            controller: PricingController::new(options.clone(), nblocks),
            ctx,
            options,
            solvers,
            hooks,
            stats: PricingStats::new(nblocks),
        })
    }

    pub fn ctx(&self) -> &DecompContext {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut DecompContext {
        &mut self.ctx
    }

    pub fn stats(&self) -> &PricingStats {
        &self.stats
    }

    pub fn colpool(&self) -> &ColumnPool {
        &self.colpool
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub fn controller(&self) -> &PricingController {
        &self.controller
    }

    /// Runs one pricing round against the master. See the
    /// [module docs](self) for the protocol.
    pub fn perform_pricing(&mut self, master: &mut dyn Master) -> Result<PricingOutcome, Problem> {
        if self.options.maxpricerounds >= 0 && self.stats.nrounds as i64 >= self.options.maxpricerounds
        {
            // Round budget exhausted; the master continues without pricing.
            return Ok(PricingOutcome {
                status: Status::Unknown,
                ncols_added: 0,
                lowerbound: None,
            });
        }

        let farkas = !master.is_feasible();
        let duals = master.dual_values();
        self.check_duals(&duals, farkas)?;

        let pricing_type = if farkas {
            PricingType::Farkas
        } else {
            PricingType::Redcost
        };

        let mut round = RoundStats {
            round: self.stats.nrounds + 1,
            farkas,
            ..Default::default()
        };

        self.hooks.terminator.initialize();

        // Harvest the pool before running any solver.
        self.colpool.update_node(master.node_number());
        self.colpool.set_farkas(farkas);
        self.colpool.update_redcost_and_coefs(&self.ctx, &duals)?;
        if farkas {
            self.store.start_farkas();
        } else {
            self.store.end_farkas();
        }
        round.ncolsharvested = self.colpool.price(&mut self.store)?;

        let branchconss = (0..self.ctx.nblocks())
            .map(|b| master.branching_conss(b))
            .collect();
        self.controller.init_pricing(pricing_type, branchconss)?;
        self.controller
            .setup_priority_queue(&self.solvers, &self.ctx, &duals)?;

        let objectives = self.build_objectives(&duals);
        let limits = SolveLimits {
            timelimit: self.options.jobtimelimit,
            lpiterlimit: Some(
                (self.options.maxlpiterquot * master.lp_iterations() as E) as I
                    + self.options.maxlpiterofs,
            ),
            sollimit: None,
            nodelimit: None,
        };

        let interrupted = self.pricing_loop(&duals, &objectives, &limits, &mut round)?;

        // Drain the per-problem buffers: improving columns to the store (or
        // directly to the master), the rest into the pool.
        let drain = self.controller.move_cols_to_colpool(
            &mut self.colpool,
            self.options.use_pricestore.then_some(&mut self.store),
            self.options.use_colpool,
        )?;
        round.ncolspooled = drain.npooled;
        round.ncolsduplicate += drain.nduplicate;

        let mut lowerbound = None;
        if pricing_type == PricingType::Redcost
            && interrupted.is_none()
            && self.controller.redcost_is_valid()
        {
            let mut bound = master.objective_value();
            for b in 0..self.ctx.nblocks() {
                bound += self.ctx.multiplicity(b) as E * self.controller.problem(b).lowerbound();
            }
            if bound > master.lowerbound() {
                master.update_lowerbound(bound);
            }
            lowerbound = Some(bound);
        }

        let napplied = if self.options.use_pricestore {
            if !farkas {
                self.store.remove_inefficacious_cols(&self.ctx, &duals)?;
            }
            let n = self.store.apply_cols(master, &self.ctx, &duals)?;
            self.store.clear();
            n
        } else {
            let mut n = 0;
            for mut col in drain.direct {
                col.compute_master_coefs(&self.ctx)?;
                let objcoef = col.objective_value(&self.ctx);
                master.add_priced_var(PricedVar {
                    block: col.block(),
                    vars: col.vars().to_vec(),
                    vals: col.vals().to_vec(),
                    objcoef,
                    mastercoefs: col.mastercoefs().unwrap().clone(),
                    is_ray: col.is_ray(),
                    lb: 0.,
                    ub: E::INFINITY,
                })?;
                n += 1;
            }
            n
        };

        self.controller.exit_pricing();
        for b in 0..self.ctx.nblocks() {
            self.stats.blocks[b].npoints = self.controller.problem(b).n_points();
            self.stats.blocks[b].nrays = self.controller.problem(b).n_rays();
        }

        let status = if let Some(stopped) = interrupted {
            stopped
        } else if self.controller.pricing_is_infeasible() {
            Status::Infeasible
        } else if napplied == 0
            && round.ncolsharvested == 0
            && self.controller.pricing_is_optimal()
        {
            Status::Optimal
        } else {
            Status::Unknown
        };

        round.ncolsapplied = napplied;
        round.lowerbound = lowerbound;
        round.status = status;
        self.hooks.callback.call(&round);
        self.stats.record_round(round);

        Ok(PricingOutcome {
            status,
            ncols_added: napplied,
            lowerbound,
        })
    }

    /// Dispatches jobs until the queue runs dry, the abort policy fires, or
    /// the terminator triggers. Returns the stopping status on interruption.
    fn pricing_loop(
        &mut self,
        duals: &DualValues,
        objectives: &[(Col<E>, E)],
        limits: &SolveLimits,
        round: &mut RoundStats,
    ) -> Result<Option<Status>, Problem> {
        loop {
            if let Some(stopped) = self.hooks.terminator.terminate() {
                return Ok(Some(stopped));
            }
            if self.controller.can_abort() {
                return Ok(None);
            }
            let Some(mut job) = self.controller.next_job() else {
                return Ok(None);
            };

            let probnr = job.probnr();
            let heuristic = job.heuristic();
            let active: Vec<ConsData> = self
                .controller
                .problem(probnr)
                .active_conss()
                .iter()
                .map(|bc| bc.cons.clone())
                .collect();
            let (objective, objoffset) = &objectives[probnr];

            let started = Instant::now();
            let result = {
                let model = self.ctx.block_model_mut(probnr);
                let mut scope = model.probe();
                let mut pushed = Ok(());
                for cons in active {
                    pushed = scope.add_cons(cons);
                    if pushed.is_err() {
                        break;
                    }
                }
                match pushed {
                    Ok(()) => {
                        if heuristic {
                            job.solver_mut()
                                .solve_heuristic(scope.model(), objective.as_ref(), limits)
                        } else {
                            job.solver_mut()
                                .solve_exact(scope.model(), objective.as_ref(), limits)
                        }
                    }
                    Err(err) => Err(err),
                }
                // The probing scope drops here; branching rows are popped on
                // every path.
            };
            let elapsed = started.elapsed().as_secs_f64();

            round.nsolves += 1;
            if heuristic {
                round.nheursolves += 1;
                self.stats.blocks[probnr].nheursolves += 1;
            }
            round.solvetime += elapsed;
            self.stats.blocks[probnr].nsolves += 1;
            self.stats.blocks[probnr].solvetime += elapsed;

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(trouble) => {
                    // Numerical trouble is recoverable; the problem counts
                    // as limit-stopped and the loop continues.
                    self.hooks.callback.warn(&format!(
                        "solver {} failed on block {}: {}",
                        job.solver().name(),
                        probnr,
                        trouble
                    ));
                    SolveOutcome {
                        status: Status::Unknown,
                        lowerbound: None,
                        cols: Vec::new(),
                    }
                }
            };

            // An interrupt raised while the solver ran discards its result;
            // pool and store stay intact.
            if let Some(stopped) = self.hooks.terminator.terminate() {
                return Ok(Some(stopped));
            }

            let lowerbound = outcome
                .lowerbound
                .map(|lb| lb + objoffset - duals.conv[probnr]);
            let mut cols = outcome.cols;
            for col in &mut cols {
                col.compute_redcost(&self.ctx, duals)?;
            }
            round.ncolsfound += cols.len();

            // The pool is the content-addressed memory of everything
            // generated: it gates duplicates from earlier rounds and keeps a
            // copy of every new column for later harvesting.
            let mut kept = Vec::with_capacity(cols.len());
            for col in cols {
                if col.nvars() == 0 {
                    continue;
                }
                if self.options.use_colpool {
                    match self.colpool.add(col.clone())? {
                        None => kept.push(col),
                        Some(_) => round.ncolsduplicate += 1,
                    }
                } else {
                    kept.push(col);
                }
            }

            let update = self
                .controller
                .update_job(job, outcome.status, lowerbound, kept)?;
            round.ncolsimproving += update.nimproving;
            round.ncolsduplicate += update.nduplicate;
        }
    }

    /// Per-block pricing objectives in subproblem space, with the constant
    /// offset that the affine map contributes to the block lower bound.
    ///
    /// A pricing variable `v` with map `pricing = scalar * original +
    /// constant` prices at `(c_o - pi^T A[:, o] - mu^T cuts[:, o]) / scalar`
    /// per unit; under Farkas pricing the objective share `c_o` is zero.
    fn build_objectives(&self, duals: &DualValues) -> Vec<(Col<E>, E)> {
        let mut dual_image = self.ctx.coupling().transpose() * &duals.pi;
        for (cut, &mu) in self.ctx.cuts().iter().zip(duals.cuts.iter()) {
            for (&j, &coef) in cut.vars.iter().zip(cut.coefs.iter()) {
                dual_image[j] += mu * coef;
            }
        }

        (0..self.ctx.nblocks())
            .map(|b| {
                let model = &self.ctx.block(b).model;
                let mut objective = Col::<E>::zeros(model.nvars());
                let mut offset = 0.;
                for (v, var) in model.vars().iter().enumerate() {
                    let share = if duals.farkas { 0. } else { var.obj };
                    let unit = (share - dual_image[var.origvar]) / var.scalar;
                    objective[v] = unit;
                    offset -= unit * var.constant;
                }
                (objective, offset)
            })
            .collect()
    }

    fn check_duals(&self, duals: &DualValues, farkas: bool) -> Result<(), Problem> {
        if duals.farkas != farkas {
            return Err(PricerError::DualDimensionMismatch)?;
        }
        if duals.pi.nrows() != self.ctx.nmasterconss() {
            return Err(PricerError::DualDimensionMismatch)?;
        }
        if duals.conv.nrows() != self.ctx.nblocks() {
            return Err(PricerError::ConvexityDimensionMismatch)?;
        }
        if duals.cuts.len() != self.ctx.cuts().len() {
            return Err(PricerError::CutDimensionMismatch)?;
        }
        Ok(())
    }
}

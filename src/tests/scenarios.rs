//! End-to-end pricing rounds against a recording master.

use std::sync::Arc;

use crate::callback::{Callback, NoOpCallback};
use crate::column::{BlockRef, Column};
use crate::interface::decomp::{BranchingCons, ConsData, ConsSense};
use crate::pricing::Pricer;
use crate::tests::harness::{
    RecordingCallback, ScriptedResponse, ScriptedSolver, TestMaster, exact_options,
    scripted_pricer, simple_ctx, unit_col,
};
use crate::{E, PricingHooks, PricingOptions, Status};

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

/// A pricer whose rounds are captured by a recording callback.
fn recorded_pricer(
    ctx: crate::interface::decomp::DecompContext,
    options: PricingOptions,
    solver: ScriptedSolver,
) -> (Pricer, Arc<std::sync::Mutex<Vec<crate::stats::RoundStats>>>) {
    let (callback, rounds, _) = RecordingCallback::handles();
    let pricer = Pricer::new(
        ctx,
        options,
        vec![Box::new(solver)],
        PricingHooks {
            callback: Box::new(callback),
            terminator: Box::new(crate::terminators::NeverTerminator::new()),
        },
    )
    .unwrap();
    (pricer, rounds)
}

#[test]
fn test_duplicate_column_collapses_everywhere() {
    // Two blocks; block 0's solver emits the same column twice in one round.
    let ctx = simple_ctx(2, 3);
    let solver = ScriptedSolver::empty();
    let col = Column::new(BlockRef::Block(0), vec![0, 2], vec![1.0, 2.0], false).unwrap();
    solver.push(
        0,
        ScriptedResponse::optimal(-7.0)
            .with_col(col.clone())
            .with_col(col),
    );

    let mut pricer = scripted_pricer(ctx, exact_options(), solver);
    let mut master = TestMaster::new(pricer.ctx());
    let outcome = pricer.perform_pricing(&mut master).unwrap();

    assert_eq!(master.added().len(), 1, "one master variable");
    assert_eq!(pricer.colpool().len(), 1, "one pool entry");
    assert_eq!(outcome.ncols_added, 1);
    assert!(pricer.store().is_empty(), "store cleared after application");
    assert_eq!(pricer.stats().lastround.ncolsduplicate, 1);
    // Both blocks solved to optimality: the Lagrangian bound is proven.
    assert_eq!(master.lower, -7.0);
}

#[test]
fn test_pool_aging_evicts_stale_column() {
    // A non-improving column survives `agelimit` harvests, then drops.
    let ctx = simple_ctx(1, 2);
    let mut options = exact_options();
    options.agelimit = 2;

    let solver = ScriptedSolver::empty();
    solver.push(0, ScriptedResponse::optimal(9.0).with_col(unit_col(0, 0, 1.0)));

    let mut pricer = scripted_pricer(ctx, options, solver);
    let mut master = TestMaster::new(pricer.ctx());
    master.duals.pi[0] = -10.0; // makes every column non-improving

    pricer.perform_pricing(&mut master).unwrap(); // generates the column
    assert_eq!(pricer.colpool().len(), 1);

    for _ in 0..2 {
        pricer.perform_pricing(&mut master).unwrap();
        assert_eq!(pricer.colpool().len(), 1);
    }
    pricer.perform_pricing(&mut master).unwrap();
    assert!(pricer.colpool().is_empty(), "aged out after the limit");
}

#[test]
fn test_farkas_to_redcost_transition() {
    // Infeasible master: a ray with negative Farkas value restores
    // feasibility; the next (reduced-cost) round re-evaluates the pool
    // without evicting anything.
    let ctx = simple_ctx(1, 2);
    let solver = ScriptedSolver::empty();
    let ray = Column::new(BlockRef::Block(0), vec![0], vec![1.0], true).unwrap();
    solver.push(0, ScriptedResponse::status(Status::Unbounded).with_col(ray));

    let mut pricer = scripted_pricer(ctx, exact_options(), solver);
    let mut master = TestMaster::new(pricer.ctx());
    master.set_farkas(true);
    master.duals.pi[0] = 0.3; // Farkas multipliers: -y^T A x = -0.3

    let outcome = pricer.perform_pricing(&mut master).unwrap();
    assert_eq!(outcome.ncols_added, 1);
    assert!(master.added()[0].is_ray);
    assert!(outcome.lowerbound.is_none(), "no bound from Farkas pricing");

    // Master feasible now; duals keep the archived ray non-improving.
    master.set_farkas(false);
    master.duals.pi[0] = -5.0;
    let outcome = pricer.perform_pricing(&mut master).unwrap();
    assert_eq!(outcome.status, Status::Optimal);
    assert_eq!(pricer.colpool().len(), 1, "no eviction on mode switch");
    assert_eq!(master.added().len(), 1);
}

#[test]
fn test_generic_branching_sequencing() {
    // Two active branching constraints are incorporated back to front; the
    // block is done only once both are in, and the bound is monotone.
    let ctx = simple_ctx(1, 2);
    let solver = ScriptedSolver::empty();
    solver.push(0, ScriptedResponse::optimal(5.0));
    solver.push(0, ScriptedResponse::optimal(7.0));
    let seen = solver.seen_branch_rows.clone();

    let mut pricer = scripted_pricer(ctx, exact_options(), solver);
    let mut master = TestMaster::new(pricer.ctx());
    master.objval = 1.0;
    master
        .branchconss
        .insert(0, vec![cons(-1.0), cons(2.0)]);

    let outcome = pricer.perform_pricing(&mut master).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    let problem = pricer.controller().problem(0);
    assert_eq!(problem.status(), Status::Optimal);
    assert!(problem.is_done());
    assert_eq!(problem.lowerbound(), 7.0);
    assert_eq!(outcome.status, Status::Optimal);
    assert_eq!(outcome.lowerbound, Some(8.0)); // master obj + block bound
    assert_eq!(master.bound_updates, vec![8.0]);
}

#[test]
fn test_abort_on_enough_successes() {
    // K = 10, half the blocks must succeed: the loop stops after five
    // improving blocks and leaves no stale optimality behind.
    let ctx = simple_ctx(10, 1);
    let mut options = exact_options();
    options.relmaxsuccessfulprobs = 0.5;
    options.use_colpool = false;

    let solver = ScriptedSolver::empty();
    for b in 0..5 {
        solver.push(
            b,
            ScriptedResponse::optimal(-(1.0 + b as E)).with_col(unit_col(b, b, 1.0)),
        );
    }

    let (mut pricer, rounds) = recorded_pricer(ctx, options, solver);
    let mut master = TestMaster::new(pricer.ctx());

    let outcome = pricer.perform_pricing(&mut master).unwrap();
    assert_eq!(rounds.lock().unwrap()[0].nsolves, 5, "abort after 5 blocks");
    assert_eq!(outcome.ncols_added, 5);
    assert_eq!(outcome.status, Status::Unknown);
    assert_eq!(pricer.controller().problem(9).status(), Status::Unknown);
    assert!(outcome.lowerbound.is_none(), "unsolved blocks, no bound");

    // The next round still solves the skipped blocks.
    let outcome = pricer.perform_pricing(&mut master).unwrap();
    assert_eq!(rounds.lock().unwrap()[1].nsolves, 10);
    assert_eq!(outcome.status, Status::Optimal);
}

#[test]
fn test_eager_round_solves_all_blocks() {
    // With eagerfreq = 3, rounds 1 and 2 abort after the first success;
    // round 3 solves all ten blocks regardless.
    let ctx = simple_ctx(10, 1);
    let mut options = exact_options();
    options.relmaxsuccessfulprobs = 0.0;
    options.eagerfreq = 3;
    options.use_colpool = false;

    let solver = ScriptedSolver::empty();
    for round in 1..=3 {
        solver.push(
            0,
            ScriptedResponse::optimal(-1.0).with_col(unit_col(0, 0, round as E)),
        );
    }

    let (mut pricer, rounds) = recorded_pricer(ctx, options, solver);
    let mut master = TestMaster::new(pricer.ctx());

    for _ in 0..3 {
        pricer.perform_pricing(&mut master).unwrap();
    }
    let rounds = rounds.lock().unwrap();
    assert_eq!(rounds[0].nsolves, 1);
    assert_eq!(rounds[1].nsolves, 1);
    assert_eq!(rounds[2].nsolves, 10, "eager round ignores the abort");
}

#[test]
fn test_farkas_pricing_detects_infeasible_node() {
    let ctx = simple_ctx(2, 1);
    let solver = ScriptedSolver::empty();
    solver.push(0, ScriptedResponse::status(Status::Infeasible));
    solver.push(1, ScriptedResponse::status(Status::Infeasible));

    let mut pricer = scripted_pricer(ctx, exact_options(), solver);
    let mut master = TestMaster::new(pricer.ctx());
    master.set_farkas(true);

    let outcome = pricer.perform_pricing(&mut master).unwrap();
    assert_eq!(outcome.status, Status::Infeasible);
    assert_eq!(outcome.ncols_added, 0);
}

#[test]
fn test_round_output_formats_without_panicking() {
    let mut callback = crate::callback::RoundOutput::new(&PricingOptions::default());
    callback.call(&crate::stats::RoundStats {
        round: 1,
        lowerbound: Some(-3.25),
        ..Default::default()
    });
    NoOpCallback::new(&PricingOptions::default()).call(&Default::default());
}

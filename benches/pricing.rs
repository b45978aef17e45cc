use faer::Col;
use faer::sparse::{SparseColMat, Triplet};
use problemo::Problem;

use colgen::column::pool::ColumnPool;
use colgen::column::{BlockRef, Column};
use colgen::interface::decomp::{BlockInfo, BlockModel, BranchingCons, DecompContext};
use colgen::interface::master::{DualValues, Master, PricedVar};
use colgen::pricing::Pricer;
use colgen::solver::{PricingSolver, SolveLimits, SolveOutcome};
use colgen::{E, I, PricingHooks, PricingOptions, Status};

fn main() {
    divan::main();
}

/// Dense-ish coupling over `norig` original variables with two rows per
/// variable block of ten.
fn coupling(norig: I) -> SparseColMat<I, E> {
    let nrows = (norig / 10).max(1);
    let mut triplets = Vec::new();
    for j in 0..norig {
        triplets.push(Triplet::new(j % nrows, j, 1.0 + (j % 7) as E));
    }
    SparseColMat::try_new_from_triplets(nrows, norig, &triplets).unwrap()
}

fn context(nblocks: I, nvars: I) -> DecompContext {
    let norig = nblocks * nvars;
    let blocks = (0..nblocks)
        .map(|b| {
            let origvars: Vec<I> = (b * nvars..(b + 1) * nvars).collect();
            let obj: Vec<E> = origvars.iter().map(|&o| -((o % 5) as E) - 1.0).collect();
            let model = BlockModel::continuous(
                b,
                &origvars,
                &obj,
                Col::<E>::zeros(nvars),
                Col::from_fn(nvars, |_| 1.0),
            )
            .unwrap();
            BlockInfo {
                multiplicity: 1,
                model,
            }
        })
        .collect();

    let a = coupling(norig);
    let nrows = a.nrows();
    DecompContext::new(
        Col::from_fn(norig, |o| -((o % 5) as E) - 1.0),
        a,
        Col::from_fn(nrows, |_| 1.0),
        blocks,
        vec![false; norig],
    )
    .unwrap()
}

fn column(block: I, seed: I, nvars: I) -> Column {
    let vars: Vec<I> = (0..nvars).map(|v| block * nvars + v).collect();
    let vals: Vec<E> = (0..nvars).map(|v| 1.0 + ((seed + v) % 9) as E).collect();
    Column::new(BlockRef::Block(block), vars, vals, false).unwrap()
}

#[divan::bench(args = [100, 1000])]
fn colpool_add_with_duplicates(bencher: divan::Bencher, n: I) {
    bencher
        .with_inputs(|| {
            let fresh: Vec<Column> = (0..n).map(|i| column(0, i, 8)).collect();
            let dups = fresh.clone();
            (fresh, dups)
        })
        .bench_values(|(fresh, dups)| {
            let mut pool = ColumnPool::new(-1);
            for col in fresh {
                pool.add(col).unwrap();
            }
            for col in dups {
                pool.add(col).unwrap();
            }
            pool.len()
        });
}

#[divan::bench(args = [100, 1000])]
fn redcost_evaluation(bencher: divan::Bencher, n: I) {
    let ctx = context(10, 10);
    let duals = DualValues {
        pi: Col::from_fn(ctx.nmasterconss(), |i| 0.1 * i as E),
        conv: Col::<E>::zeros(10),
        cuts: Vec::new(),
        farkas: false,
    };

    bencher
        .with_inputs(|| (0..n).map(|i| column(i % 10, i, 10)).collect::<Vec<_>>())
        .bench_values(|mut cols| {
            let mut acc = 0.0;
            for col in &mut cols {
                acc += col.compute_redcost(&ctx, &duals).unwrap();
            }
            acc
        });
}

// Minimal master/solver pair so a whole round can be benchmarked without
// the test harness.

struct BenchMaster {
    duals: DualValues,
    nadded: I,
}

impl Master for BenchMaster {
    fn is_feasible(&self) -> bool {
        true
    }

    fn dual_values(&self) -> DualValues {
        self.duals.clone()
    }

    fn objective_value(&self) -> E {
        0.0
    }

    fn node_number(&self) -> i64 {
        1
    }

    fn depth(&self) -> I {
        1
    }

    fn lowerbound(&self) -> E {
        E::NEG_INFINITY
    }

    fn update_lowerbound(&mut self, _lowerbound: E) {}

    fn lp_iterations(&self) -> I {
        100
    }

    fn branching_conss(&self, _block: I) -> Vec<BranchingCons> {
        Vec::new()
    }

    fn add_priced_var(&mut self, _var: PricedVar) -> Result<I, Problem> {
        self.nadded += 1;
        Ok(self.nadded - 1)
    }
}

/// Minimizes the pricing objective over the variable box.
#[derive(Clone)]
struct BoxRelaxation {}

impl PricingSolver for BoxRelaxation {
    fn name(&self) -> &'static str {
        "box-relaxation"
    }

    fn can_handle(&self, model: &BlockModel) -> bool {
        model.rows().is_empty()
    }

    fn solve_exact(
        &mut self,
        model: &BlockModel,
        objective: faer::ColRef<'_, E>,
        _limits: &SolveLimits,
    ) -> Result<SolveOutcome, Problem> {
        let n = model.nvars();
        let mut vals = vec![0.0; n];
        let mut objval = 0.0;
        for v in 0..n {
            vals[v] = if objective[v] < 0. {
                model.ub(v)
            } else {
                model.lb(v)
            };
            objval += objective[v] * vals[v];
        }
        let col = Column::from_solution(model, &vals, false)?;
        Ok(SolveOutcome {
            status: Status::Optimal,
            lowerbound: Some(objval),
            cols: vec![col],
        })
    }
}

#[divan::bench(args = [10, 50])]
fn pricing_round(bencher: divan::Bencher, nblocks: I) {
    bencher
        .with_inputs(|| {
            let ctx = context(nblocks, 10);
            let duals = DualValues {
                pi: Col::from_fn(ctx.nmasterconss(), |i| 0.01 * i as E),
                conv: Col::<E>::zeros(nblocks),
                cuts: Vec::new(),
                farkas: false,
            };
            let pricer = Pricer::new(
                ctx,
                PricingOptions::default(),
                vec![Box::new(BoxRelaxation {}) as Box<dyn PricingSolver>],
                PricingHooks::quiet(),
            )
            .unwrap();
            (pricer, BenchMaster { duals, nadded: 0 })
        })
        .bench_values(|(mut pricer, mut master)| {
            pricer.perform_pricing(&mut master).unwrap();
            master.nadded
        });
}

//! Per-round staging buffer for generated columns.
//!
//! Columns collected during a pricing round are not injected into the master
//! one by one; the store ranks them and applies a small, mutually diverse
//! subset. The score combines the (normalized) reduced cost, the parallelism
//! of the column to the master right-hand side, and the orthogonality to the
//! columns already picked this round. Farkas rounds switch to a
//! coefficient-norm efficacy suitable for infeasibility rays.

use faer::Col;
use problemo::Problem;

use crate::column::Column;
use crate::interface::decomp::DecompContext;
use crate::interface::master::{DualValues, Master, PricedVar};
use crate::linalg::vector_ops::{cosine, norm2};
use crate::{E, EPS, EfficacyChoice, I, PricingOptions};

struct StoreEntry {
    col: Column,
    force: bool,
}

/// Staging buffer with efficacy/orthogonality filtering; see the
/// [module docs](self).
pub struct PriceStore {
    entries: Vec<StoreEntry>,
    redcostfac: E,
    objparalfac: E,
    orthofac: E,
    mincolorth: E,
    maxcolsroot: I,
    maxcols: I,
    maxcolsfarkas: I,
    efficacy_choice: EfficacyChoice,
    in_farkas: bool,
}

impl PriceStore {
    pub fn new(options: &PricingOptions) -> Self {
        Self {
            entries: Vec::new(),
            redcostfac: options.redcostfac,
            objparalfac: options.objparalfac,
            orthofac: options.orthofac,
            mincolorth: options.mincolorth,
            maxcolsroot: options.maxcolsroot,
            maxcols: options.maxcols,
            maxcolsfarkas: options.maxcolsfarkas,
            efficacy_choice: options.efficacy_choice,
            in_farkas: false,
        }
    }

    pub fn len(&self) -> I {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cols(&self) -> impl Iterator<Item = &Column> {
        self.entries.iter().map(|e| &e.col)
    }

    /// Switches scoring to the Farkas efficacy (coefficient-norm scaled,
    /// no objective-parallelism term).
    pub fn start_farkas(&mut self) {
        self.in_farkas = true;
    }

    pub fn end_farkas(&mut self) {
        self.in_farkas = false;
    }

    pub fn in_farkas(&self) -> bool {
        self.in_farkas
    }

    /// Stages a column for the remainder of the round. `force = true`
    /// bypasses scoring, caps, and efficacy filtering.
    pub fn add_col(&mut self, col: Column, force: bool) {
        self.entries.push(StoreEntry { col, force });
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops stored columns whose efficacy is non-positive. Forced columns
    /// are kept. Returns the number of columns removed.
    pub fn remove_inefficacious_cols(
        &mut self,
        ctx: &DecompContext,
        duals: &DualValues,
    ) -> Result<I, Problem> {
        for entry in &mut self.entries {
            entry.col.compute_master_coefs(ctx)?;
        }

        let before = self.entries.len();
        let in_farkas = self.in_farkas;
        let choice = self.efficacy_choice;
        self.entries
            .retain(|e| e.force || efficacy(&e.col, duals, in_farkas, choice) > 0.);
        Ok(before - self.entries.len())
    }

    /// Applies the selected columns to the master and releases them: forced
    /// columns unconditionally, then improving columns greedily by score,
    /// each keeping at least `mincolorth` orthogonality to the columns
    /// already picked, up to the per-round cap. Unpicked columns stay in the
    /// store. Returns the number of master variables created.
    pub fn apply_cols(
        &mut self,
        master: &mut dyn Master,
        ctx: &DecompContext,
        duals: &DualValues,
    ) -> Result<I, Problem> {
        let cap = if self.in_farkas {
            self.maxcolsfarkas
        } else if master.depth() == 0 {
            self.maxcolsroot
        } else {
            self.maxcols
        };

        for entry in &mut self.entries {
            entry.col.compute_master_coefs(ctx)?;
        }

        let mut picked: Vec<Col<E>> = Vec::new();
        let mut napplied = 0;

        // Forced columns bypass scoring and do not count against the cap.
        let mut pos = 0;
        while pos < self.entries.len() {
            if self.entries[pos].force {
                let entry = self.entries.remove(pos);
                picked.push(entry.col.mastercoefs().unwrap().clone());
                self.apply_to_master(master, ctx, entry.col)?;
                napplied += 1;
            } else {
                pos += 1;
            }
        }

        let mut nscored = 0;
        while nscored < cap {
            let mut best: Option<(I, E)> = None;
            for (i, entry) in self.entries.iter().enumerate() {
                if !entry.col.is_improving() {
                    continue;
                }
                let orth = min_orthogonality(&entry.col, &picked);
                if orth < self.mincolorth {
                    continue;
                }
                let score = self.base_score(&entry.col, ctx, duals) + self.orthofac * orth;
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((i, score));
                }
            }

            let Some((i, _)) = best else { break };
            let entry = self.entries.remove(i);
            picked.push(entry.col.mastercoefs().unwrap().clone());
            self.apply_to_master(master, ctx, entry.col)?;
            napplied += 1;
            nscored += 1;
        }

        Ok(napplied)
    }

    fn apply_to_master(
        &self,
        master: &mut dyn Master,
        ctx: &DecompContext,
        col: Column,
    ) -> Result<I, Problem> {
        let objcoef = col.objective_value(ctx);
        let mastercoefs = col.mastercoefs().unwrap().clone();
        master.add_priced_var(PricedVar {
            block: col.block(),
            vars: col.vars().to_vec(),
            vals: col.vals().to_vec(),
            objcoef,
            mastercoefs,
            is_ray: col.is_ray(),
            lb: 0.,
            ub: E::INFINITY,
        })
    }

    fn base_score(&self, col: &Column, ctx: &DecompContext, duals: &DualValues) -> E {
        let eff = efficacy(col, duals, self.in_farkas, self.efficacy_choice);
        if self.in_farkas {
            // Rays are ranked by efficacy alone.
            return self.redcostfac * eff;
        }

        let objpara = cosine(
            col.mastercoefs().unwrap().as_ref(),
            ctx.rhs().as_ref(),
        );
        self.redcostfac * eff + self.objparalfac * objpara
    }
}

/// Efficacy of a column under the given evaluation mode: the negated reduced
/// cost, scaled by the norm selected through the efficacy choice.
fn efficacy(col: &Column, duals: &DualValues, in_farkas: bool, choice: EfficacyChoice) -> E {
    let redcost = col.redcost();
    let coefnorm = col
        .mastercoefs()
        .map(|c| norm2(c.as_ref()))
        .unwrap_or(0.);

    if in_farkas {
        return -redcost / coefnorm.max(1.);
    }

    match choice {
        EfficacyChoice::Dual => -redcost / norm2(duals.pi.as_ref()).max(1.),
        EfficacyChoice::Redcost => -redcost,
        EfficacyChoice::MasterCoef => {
            if coefnorm <= EPS {
                -redcost
            } else {
                -redcost / coefnorm
            }
        }
    }
}

/// Orthogonality of a column to the picked set in master-coefficient space:
/// `1 - |cos|` against the closest picked column, `1` when nothing is picked.
fn min_orthogonality(col: &Column, picked: &[Col<E>]) -> E {
    let coefs = col.mastercoefs().unwrap();
    picked
        .iter()
        .map(|p| 1. - cosine(coefs.as_ref(), p.as_ref()).abs())
        .fold(1., E::min)
}

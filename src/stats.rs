//! Pricing statistics reported to the host.

use serde::Serialize;

use crate::{E, I, Status};

/// Summary of one pricing round, handed to the round callback and kept as
/// `lastround` in [`PricingStats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoundStats {
    /// Round counter (1-based, counts both Farkas and reduced-cost rounds).
    pub round: I,
    pub farkas: bool,
    /// Solver invocations this round.
    pub nsolves: I,
    /// How many of them were heuristic.
    pub nheursolves: I,
    /// Columns returned by solvers.
    pub ncolsfound: I,
    /// Columns with dual-feasibly negative reduced cost.
    pub ncolsimproving: I,
    /// Duplicates dropped against buffers and the pool.
    pub ncolsduplicate: I,
    /// Columns harvested from the pool without solving.
    pub ncolsharvested: I,
    /// Non-improving columns archived into the pool.
    pub ncolspooled: I,
    /// Master variables created this round.
    pub ncolsapplied: I,
    /// Lagrangian lower bound, when the round proved one.
    pub lowerbound: Option<E>,
    /// Round status as reported to the host.
    pub status: Status,
    /// Wall-clock seconds spent inside solver calls.
    pub solvetime: E,
}

/// Cumulative solver activity for one block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlockStats {
    pub nsolves: I,
    pub nheursolves: I,
    /// Extreme points generated by this block's solvers.
    pub npoints: I,
    /// Extreme rays generated by this block's solvers.
    pub nrays: I,
    /// Wall-clock seconds spent solving this block.
    pub solvetime: E,
}

/// Cumulative pricing statistics since construction of the pricer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PricingStats {
    pub nrounds: I,
    pub nfarkasrounds: I,
    pub nsolves: I,
    pub nheursolves: I,
    pub ncolsfound: I,
    pub ncolsduplicate: I,
    pub ncolsapplied: I,
    pub blocks: Vec<BlockStats>,
    pub lastround: RoundStats,
}

impl PricingStats {
    pub fn new(nblocks: I) -> Self {
        Self {
            blocks: vec![BlockStats::default(); nblocks],
            ..Default::default()
        }
    }

    /// Folds a finished round into the cumulative counters.
    pub(crate) fn record_round(&mut self, round: RoundStats) {
        self.nrounds += 1;
        if round.farkas {
            self.nfarkasrounds += 1;
        }
        self.nsolves += round.nsolves;
        self.nheursolves += round.nheursolves;
        self.ncolsfound += round.ncolsfound;
        self.ncolsduplicate += round.ncolsduplicate;
        self.ncolsapplied += round.ncolsapplied;
        self.lastround = round;
    }
}

//! Boundary to the master LP.
//!
//! The pricing core reads dual (or Farkas) values, node identity, and depth
//! from the master, and hands back newly priced variables. The master LP
//! itself (its simplex, its locking) lives outside this crate.

use faer::Col;
use problemo::Problem;

use crate::column::BlockRef;
use crate::interface::decomp::BranchingCons;
use crate::{E, I};

/// Dual information of one master LP solve. In Farkas mode the entries are
/// the Farkas multipliers of the infeasible LP instead of the duals, and the
/// block objective contribution is dropped from reduced costs.
#[derive(Debug, Clone)]
pub struct DualValues {
    /// Dual value per master constraint.
    pub pi: Col<E>,
    /// Convexity-constraint dual per block.
    pub conv: Col<E>,
    /// Dual value per registered master cut row.
    pub cuts: Vec<E>,
    /// Whether these are Farkas multipliers.
    pub farkas: bool,
}

impl DualValues {
    /// Convexity dual of a column's block; zero for directly transferred and
    /// linking columns, which have no convexity constraint.
    pub fn convexity(&self, block: BlockRef) -> E {
        match block {
            BlockRef::Block(b) => self.conv[b],
            BlockRef::NoBlock | BlockRef::Linking => 0.,
        }
    }
}

/// A new master variable produced from a priced column.
#[derive(Debug, Clone)]
pub struct PricedVar {
    pub block: BlockRef,
    /// Original-variable expansion of the column, sorted.
    pub vars: Vec<I>,
    pub vals: Vec<E>,
    /// Objective coefficient in the master (original cost of the column).
    pub objcoef: E,
    /// Coefficient per master constraint.
    pub mastercoefs: Col<E>,
    pub is_ray: bool,
    pub lb: E,
    pub ub: E,
}

/// What the pricing core needs from the host master problem. Read-only
/// during a round except for [`add_priced_var`](Master::add_priced_var) and
/// [`update_lowerbound`](Master::update_lowerbound).
pub trait Master {
    /// Whether the master LP is feasible; an infeasible LP switches the
    /// round to Farkas pricing.
    fn is_feasible(&self) -> bool;

    /// Current duals, or Farkas multipliers when the LP is infeasible.
    fn dual_values(&self) -> DualValues;

    /// Objective value of the current master LP solution.
    fn objective_value(&self) -> E;

    /// Identity of the active branch-and-bound node; a change invalidates
    /// the column pool.
    fn node_number(&self) -> i64;

    /// Depth of the active node (0 = root).
    fn depth(&self) -> I;

    /// Current lower bound of the active node.
    fn lowerbound(&self) -> E;

    /// Reports an improved Lagrangian lower bound for the active node.
    fn update_lowerbound(&mut self, lowerbound: E);

    /// LP iterations spent on the current node, for the pricing iteration
    /// budget.
    fn lp_iterations(&self) -> I;

    /// Generic-branching constraints active for the given block at the
    /// current node, ordered; supplied by the branching collaborator.
    fn branching_conss(&self, block: I) -> Vec<BranchingCons>;

    /// Absorbs a priced column as a new master variable; returns its index
    /// in the master.
    fn add_priced_var(&mut self, var: PricedVar) -> Result<I, Problem>;
}

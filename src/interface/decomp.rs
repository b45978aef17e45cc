//! Block-decomposition input of the pricing subsystem.
//!
//! The decomposition detection (out of scope here) produces a set of `K`
//! independent blocks, a master coupling matrix over the original variables,
//! and an affine map from each block's pricing variables back to original
//! variables. [`DecompContext`] captures that structure read-only for the
//! duration of a pricing round; [`BlockModel`] is the per-block subproblem
//! handle consumed by pricing solvers.
//!
//! Branching constraints and bound changes are applied to a [`BlockModel`]
//! through a [`ProbingScope`], which restores the model on drop on every exit
//! path (limit, interrupt, error) so a solver always sees the model frozen
//! for the duration of one call.

use derive_more::{Display, Error};
use faer::{Col, sparse::SparseColMat};
use problemo::Problem;

use crate::{E, I};

#[derive(Debug, Display, Error, PartialEq)]
pub enum DecompError {
    #[display("Affine map scalar must be nonzero")]
    ZeroScalar,

    #[display("Block multiplicity must be at least one")]
    ZeroMultiplicity,

    #[display("Entry refers to an unknown original variable")]
    UnknownOriginalVariable,

    #[display("Right-hand side length does not match the master rows")]
    RhsDimensionMismatch,

    #[display("Linking marks do not cover the original variables")]
    LinkingDimensionMismatch,

    #[display("Bound vectors do not match the block variables")]
    BoundDimensionMismatch,

    #[display("Constraint entries must be sorted with matching coefficients")]
    MalformedConstraint,

    #[display("Bound change refers to an unknown pricing variable")]
    UnknownPricingVariable,
}

/// Sense of a linear constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsSense {
    Le,
    Ge,
    Eq,
}

/// Sparse linear constraint over a block's pricing variables.
#[derive(Debug, Clone)]
pub struct ConsData {
    pub vars: Vec<I>,
    pub coefs: Vec<E>,
    pub sense: ConsSense,
    pub rhs: E,
}

impl ConsData {
    fn validate(&self, nvars: I) -> Result<(), Problem> {
        if self.vars.len() != self.coefs.len() {
            return Err(DecompError::MalformedConstraint)?;
        }
        for w in self.vars.windows(2) {
            if w[0] >= w[1] {
                return Err(DecompError::MalformedConstraint)?;
            }
        }
        if self.vars.last().is_some_and(|&v| v >= nvars) {
            return Err(DecompError::UnknownPricingVariable)?;
        }
        Ok(())
    }
}

/// A generic-branching constraint together with its master dual value,
/// supplied by the branching collaborator at the current node.
#[derive(Debug, Clone)]
pub struct BranchingCons {
    pub cons: ConsData,
    pub dual: E,
}

/// One pricing variable of a block: the original variable it stands for and
/// the affine map `pricing = scalar * original + constant`.
#[derive(Debug, Clone)]
pub struct PricingVar {
    pub origvar: I,
    pub obj: E,
    pub scalar: E,
    pub constant: E,
}

/// Subproblem handle for one block. The pricing core never interprets the
/// rows beyond handing them to solvers; the affine map is used to transform
/// solver solutions back into original-variable space.
#[derive(Debug, Clone)]
pub struct BlockModel {
    probnr: I,
    vars: Vec<PricingVar>,
    lbs: Col<E>,
    ubs: Col<E>,
    integral: Vec<bool>,
    rows: Vec<ConsData>,
    /// Rows pushed by the active probing scope, after `rows`.
    proberows: Vec<ConsData>,
    /// Bound changes pushed by the active probing scope, newest last.
    boundstack: Vec<(I, E, E)>,
}

impl BlockModel {
    pub fn new(
        probnr: I,
        vars: Vec<PricingVar>,
        lbs: Col<E>,
        ubs: Col<E>,
        integral: Vec<bool>,
        rows: Vec<ConsData>,
    ) -> Result<Self, Problem> {
        let n = vars.len();
        if lbs.nrows() != n || ubs.nrows() != n || integral.len() != n {
            return Err(DecompError::BoundDimensionMismatch)?;
        }
        for var in &vars {
            if var.scalar == 0. {
                return Err(DecompError::ZeroScalar)?;
            }
        }
        for row in &rows {
            row.validate(n)?;
        }
        Ok(Self {
            probnr,
            vars,
            lbs,
            ubs,
            integral,
            rows,
            proberows: Vec::new(),
            boundstack: Vec::new(),
        })
    }

    /// Convenience constructor for a continuous block with plain bounds and
    /// identity objective mapping (`pricing var == original var`).
    pub fn continuous(probnr: I, origvars: &[I], obj: &[E], lbs: Col<E>, ubs: Col<E>) -> Result<Self, Problem> {
        let vars = origvars
            .iter()
            .zip(obj.iter())
            .map(|(&origvar, &obj)| PricingVar {
                origvar,
                obj,
                scalar: 1.,
                constant: 0.,
            })
            .collect::<Vec<_>>();
        let n = vars.len();
        Self::new(probnr, vars, lbs, ubs, vec![false; n], Vec::new())
    }

    pub fn probnr(&self) -> I {
        self.probnr
    }

    pub fn nvars(&self) -> I {
        self.vars.len()
    }

    pub fn vars(&self) -> &[PricingVar] {
        &self.vars
    }

    pub fn lb(&self, var: I) -> E {
        self.lbs[var]
    }

    pub fn ub(&self, var: I) -> E {
        self.ubs[var]
    }

    pub fn integral(&self, var: I) -> bool {
        self.integral[var]
    }

    /// Structural rows of the block, excluding probing additions.
    pub fn rows(&self) -> &[ConsData] {
        &self.rows
    }

    /// Rows currently pushed by a probing scope (branching constraints).
    pub fn active_branch_rows(&self) -> &[ConsData] {
        &self.proberows
    }

    /// Opens a probing scope. All bound changes and constraint additions made
    /// through the scope are undone when it is dropped.
    pub fn probe(&mut self) -> ProbingScope<'_> {
        let bounds_mark = self.boundstack.len();
        let rows_mark = self.proberows.len();
        ProbingScope {
            model: self,
            bounds_mark,
            rows_mark,
        }
    }
}

/// Scoped probing on a [`BlockModel`]: bound changes and extra rows pushed
/// through the scope are popped when the scope is dropped, also on early
/// returns and propagated errors.
pub struct ProbingScope<'a> {
    model: &'a mut BlockModel,
    bounds_mark: I,
    rows_mark: I,
}

impl<'a> ProbingScope<'a> {
    pub fn model(&self) -> &BlockModel {
        self.model
    }

    pub fn change_lb(&mut self, var: I, lb: E) -> Result<(), Problem> {
        if var >= self.model.nvars() {
            return Err(DecompError::UnknownPricingVariable)?;
        }
        self.model.boundstack.push((var, self.model.lbs[var], self.model.ubs[var]));
        self.model.lbs[var] = lb;
        Ok(())
    }

    pub fn change_ub(&mut self, var: I, ub: E) -> Result<(), Problem> {
        if var >= self.model.nvars() {
            return Err(DecompError::UnknownPricingVariable)?;
        }
        self.model.boundstack.push((var, self.model.lbs[var], self.model.ubs[var]));
        self.model.ubs[var] = ub;
        Ok(())
    }

    pub fn fix(&mut self, var: I, val: E) -> Result<(), Problem> {
        if var >= self.model.nvars() {
            return Err(DecompError::UnknownPricingVariable)?;
        }
        self.model.boundstack.push((var, self.model.lbs[var], self.model.ubs[var]));
        self.model.lbs[var] = val;
        self.model.ubs[var] = val;
        Ok(())
    }

    pub fn add_cons(&mut self, cons: ConsData) -> Result<(), Problem> {
        cons.validate(self.model.nvars())?;
        self.model.proberows.push(cons);
        Ok(())
    }
}

impl Drop for ProbingScope<'_> {
    fn drop(&mut self) {
        self.model.proberows.truncate(self.rows_mark);
        while self.model.boundstack.len() > self.bounds_mark {
            if let Some((var, lb, ub)) = self.model.boundstack.pop() {
                self.model.lbs[var] = lb;
                self.model.ubs[var] = ub;
            }
        }
    }
}

/// One block of the decomposition: its multiplicity (identical blocks are
/// represented once and scaled) and its subproblem model.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub multiplicity: I,
    pub model: BlockModel,
}

/// A cut row separated in the master mid-solve, over original variables.
#[derive(Debug, Clone)]
pub struct CutRow {
    pub vars: Vec<I>,
    pub coefs: Vec<E>,
}

/// Read-only decomposition context of a pricing round: the original
/// objective, the master coupling matrix (rows = master constraints,
/// columns = original variables), the block structure, and the linking
/// variable marks. Master cut rows may grow between rounds.
pub struct DecompContext {
    obj: Col<E>,
    coupling: SparseColMat<I, E>,
    rhs: Col<E>,
    blocks: Vec<BlockInfo>,
    linking: Vec<bool>,
    cuts: Vec<CutRow>,
}

impl DecompContext {
    pub fn new(
        obj: Col<E>,
        coupling: SparseColMat<I, E>,
        rhs: Col<E>,
        blocks: Vec<BlockInfo>,
        linking: Vec<bool>,
    ) -> Result<Self, Problem> {
        let norig = obj.nrows();
        if coupling.ncols() != norig {
            return Err(DecompError::UnknownOriginalVariable)?;
        }
        if rhs.nrows() != coupling.nrows() {
            return Err(DecompError::RhsDimensionMismatch)?;
        }
        if linking.len() != norig {
            return Err(DecompError::LinkingDimensionMismatch)?;
        }
        for block in &blocks {
            if block.multiplicity == 0 {
                return Err(DecompError::ZeroMultiplicity)?;
            }
            for var in block.model.vars() {
                if var.origvar >= norig {
                    return Err(DecompError::UnknownOriginalVariable)?;
                }
            }
        }
        Ok(Self {
            obj,
            coupling,
            rhs,
            blocks,
            linking,
            cuts: Vec::new(),
        })
    }

    pub fn norigvars(&self) -> I {
        self.obj.nrows()
    }

    pub fn nmasterconss(&self) -> I {
        self.coupling.nrows()
    }

    pub fn nblocks(&self) -> I {
        self.blocks.len()
    }

    pub fn obj(&self) -> &Col<E> {
        &self.obj
    }

    pub fn coupling(&self) -> &SparseColMat<I, E> {
        &self.coupling
    }

    pub fn rhs(&self) -> &Col<E> {
        &self.rhs
    }

    pub fn block(&self, b: I) -> &BlockInfo {
        &self.blocks[b]
    }

    pub fn block_model_mut(&mut self, b: I) -> &mut BlockModel {
        &mut self.blocks[b].model
    }

    pub fn multiplicity(&self, b: I) -> I {
        self.blocks[b].multiplicity
    }

    pub fn is_linking(&self, origvar: I) -> bool {
        self.linking[origvar]
    }

    pub fn cuts(&self) -> &[CutRow] {
        &self.cuts
    }

    /// Registers a cut row separated in the master. Entries must be sorted by
    /// original variable.
    pub fn add_cut(&mut self, cut: CutRow) -> Result<(), Problem> {
        if cut.vars.len() != cut.coefs.len() {
            return Err(DecompError::MalformedConstraint)?;
        }
        for w in cut.vars.windows(2) {
            if w[0] >= w[1] {
                return Err(DecompError::MalformedConstraint)?;
            }
        }
        if cut.vars.last().is_some_and(|&v| v >= self.norigvars()) {
            return Err(DecompError::UnknownOriginalVariable)?;
        }
        self.cuts.push(cut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_var_model() -> BlockModel {
        BlockModel::continuous(
            0,
            &[0, 1],
            &[1.0, 2.0],
            Col::from_fn(2, |_| 0.0),
            Col::from_fn(2, |_| 10.0),
        )
        .unwrap()
    }

    #[test]
    fn test_probing_scope_restores_bounds() {
        let mut model = two_var_model();
        {
            let mut scope = model.probe();
            scope.change_lb(0, 5.0).unwrap();
            scope.change_ub(1, 3.0).unwrap();
            scope.fix(0, 7.0).unwrap();
            assert_eq!(scope.model().lb(0), 7.0);
            assert_eq!(scope.model().ub(1), 3.0);
        }
        assert_eq!(model.lb(0), 0.0);
        assert_eq!(model.ub(0), 10.0);
        assert_eq!(model.ub(1), 10.0);
    }

    #[test]
    fn test_probing_scope_restores_on_error_path() {
        let mut model = two_var_model();
        let result: Result<(), Problem> = (|| {
            let mut scope = model.probe();
            scope.change_lb(0, 1.0)?;
            scope.change_lb(99, 1.0)?; // propagates an error mid-scope
            Ok(())
        })();
        assert!(result.is_err());
        assert_eq!(model.lb(0), 0.0);
        assert!(model.active_branch_rows().is_empty());
    }

    #[test]
    fn test_probing_scope_pops_constraints() {
        let mut model = two_var_model();
        {
            let mut scope = model.probe();
            scope
                .add_cons(ConsData {
                    vars: vec![0, 1],
                    coefs: vec![1.0, 1.0],
                    sense: ConsSense::Le,
                    rhs: 1.0,
                })
                .unwrap();
            assert_eq!(scope.model().active_branch_rows().len(), 1);
        }
        assert!(model.active_branch_rows().is_empty());
    }

    #[test]
    fn test_zero_scalar_rejected() {
        let vars = vec![PricingVar {
            origvar: 0,
            obj: 1.0,
            scalar: 0.,
            constant: 0.,
        }];
        let result = BlockModel::new(
            0,
            vars,
            Col::from_fn(1, |_| 0.0),
            Col::from_fn(1, |_| 1.0),
            vec![false],
            Vec::new(),
        );
        assert!(result.is_err());
    }
}

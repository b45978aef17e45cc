//! Candidate master columns.
//!
//! A [`Column`] is a sparse vector over one block's original variables,
//! interpreted as an extreme point (or, with `is_ray`, an extreme ray) of
//! that block's relaxation. Columns are created by pricing solvers from
//! subproblem solutions, cached in the [`pool`], staged in the [`store`],
//! and finally absorbed into the master LP as new variables.
//!
//! A column's structure (`vars`, `vals`, `block`, `is_ray`) is immutable
//! after creation; only the evaluation state (`redcost`, `age`) and the
//! lazily cached master coefficients change. Ownership is exclusive at every
//! point: a column lives in the pool, the store, a problem's round buffer,
//! or in transit, never in two places.

pub mod pool;
pub mod store;

use std::hash::{DefaultHasher, Hash, Hasher};

use derive_more::{Display, Error};
use faer::Col;
use problemo::Problem;

use crate::interface::decomp::{BlockModel, DecompContext};
use crate::interface::master::DualValues;
use crate::linalg::vector_ops::{dot, sparse_dot, sparse_to_dense};
use crate::{E, EPS, I, REDCOST_EPS};

#[derive(Debug, Display, Error, PartialEq)]
pub enum ColumnError {
    #[display("Column entries must be strictly sorted by variable")]
    UnsortedEntries,

    #[display("Entry and value lengths differ")]
    LengthMismatch,

    #[display("Two pricing variables map to the same original variable")]
    DuplicateVariable,

    #[display("Column entry refers to an unknown original variable")]
    UnknownVariable,

    #[display("Solution length does not match the block variables")]
    SolutionDimensionMismatch,
}

/// Provenance of a column: a proper block, a directly transferred original
/// variable, or a linking variable shared between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRef {
    Block(I),
    NoBlock,
    Linking,
}

impl BlockRef {
    pub fn index(self) -> Option<I> {
        match self {
            BlockRef::Block(b) => Some(b),
            BlockRef::NoBlock | BlockRef::Linking => None,
        }
    }
}

/// A candidate master column. See the [module docs](self) for the ownership
/// and mutability rules.
#[derive(Debug, Clone)]
pub struct Column {
    block: BlockRef,
    vars: Vec<I>,
    vals: Vec<E>,
    is_ray: bool,
    redcost: E,
    age: I,
    mastercoefs: Option<Col<E>>,
    mastercuts: Vec<E>,
    linkvars: Vec<I>,
}

impl Column {
    /// Creates a column from an already transformed original-variable
    /// expansion. Entries must be strictly sorted; zero values are dropped.
    pub fn new(block: BlockRef, vars: Vec<I>, vals: Vec<E>, is_ray: bool) -> Result<Self, Problem> {
        if vars.len() != vals.len() {
            return Err(ColumnError::LengthMismatch)?;
        }
        for w in vars.windows(2) {
            if w[0] >= w[1] {
                return Err(ColumnError::UnsortedEntries)?;
            }
        }

        let (vars, vals): (Vec<I>, Vec<E>) = vars
            .into_iter()
            .zip(vals)
            .filter(|&(_, v)| v.abs() > EPS)
            .unzip();

        Ok(Self {
            block,
            vars,
            vals,
            is_ray,
            redcost: 0.,
            age: 0,
            mastercoefs: None,
            mastercuts: Vec::new(),
            linkvars: Vec::new(),
        })
    }

    /// Creates a column from a solver solution in subproblem space.
    ///
    /// Each pricing variable is transformed back to its original variable via
    /// the block's affine map: `(val - constant) / scalar` for points, and
    /// `val / scalar` for rays (a ray is a direction, so offsets do not
    /// apply). Zero entries are dropped, the result is sorted by original
    /// variable, and a duplicate original variable is an invariant violation.
    pub fn from_solution(model: &BlockModel, vals: &[E], is_ray: bool) -> Result<Self, Problem> {
        if vals.len() != model.nvars() {
            return Err(ColumnError::SolutionDimensionMismatch)?;
        }

        let mut entries: Vec<(I, E)> = model
            .vars()
            .iter()
            .zip(vals.iter())
            .map(|(var, &val)| {
                let origval = if is_ray {
                    val / var.scalar
                } else {
                    (val - var.constant) / var.scalar
                };
                (var.origvar, origval)
            })
            .filter(|&(_, v)| v.abs() > EPS)
            .collect();
        entries.sort_by_key(|&(j, _)| j);

        for w in entries.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(ColumnError::DuplicateVariable)?;
            }
        }

        let (vars, vals) = entries.into_iter().unzip();
        Ok(Self {
            block: BlockRef::Block(model.probnr()),
            vars,
            vals,
            is_ray,
            redcost: 0.,
            age: 0,
            mastercoefs: None,
            mastercuts: Vec::new(),
            linkvars: Vec::new(),
        })
    }

    pub fn block(&self) -> BlockRef {
        self.block
    }

    pub fn vars(&self) -> &[I] {
        &self.vars
    }

    pub fn vals(&self) -> &[E] {
        &self.vals
    }

    pub fn nvars(&self) -> I {
        self.vars.len()
    }

    pub fn is_ray(&self) -> bool {
        self.is_ray
    }

    pub fn redcost(&self) -> E {
        self.redcost
    }

    pub fn set_redcost(&mut self, redcost: E) {
        self.redcost = redcost;
    }

    pub fn age(&self) -> I {
        self.age
    }

    /// Whether the last evaluated reduced cost is dual-feasibly negative.
    pub fn is_improving(&self) -> bool {
        self.redcost < -REDCOST_EPS
    }

    /// Cached master-constraint coefficients; `None` until computed.
    pub fn mastercoefs(&self) -> Option<&Col<E>> {
        self.mastercoefs.as_ref()
    }

    /// Cached cut-row coefficients, parallel to the context's cut rows.
    pub fn mastercuts(&self) -> &[E] {
        &self.mastercuts
    }

    /// Original variables of this column that are linking variables.
    pub fn linkvars(&self) -> &[I] {
        &self.linkvars
    }

    /// Original objective value `c . x` of the column.
    pub fn objective_value(&self, ctx: &DecompContext) -> E {
        sparse_dot(&self.vars, &self.vals, ctx.obj().as_ref())
    }

    /// Computes and caches the master coefficients, cut coefficients, and
    /// linking-variable indices. Idempotent; use
    /// [`refresh_master_coefs`](Self::refresh_master_coefs) after the master
    /// row set changed.
    pub fn compute_master_coefs(&mut self, ctx: &DecompContext) -> Result<(), Problem> {
        if self.mastercoefs.is_some() && self.mastercuts.len() == ctx.cuts().len() {
            return Ok(());
        }
        self.refresh_master_coefs(ctx)
    }

    /// Unconditionally recomputes the cached master data.
    pub fn refresh_master_coefs(&mut self, ctx: &DecompContext) -> Result<(), Problem> {
        if self.vars.last().is_some_and(|&j| j >= ctx.norigvars()) {
            return Err(ColumnError::UnknownVariable)?;
        }

        let dense = sparse_to_dense(&self.vars, &self.vals, ctx.norigvars());
        self.mastercoefs = Some(ctx.coupling() * &dense);
        self.mastercuts = ctx
            .cuts()
            .iter()
            .map(|cut| sparse_dot(&cut.vars, &cut.coefs, dense.as_ref()))
            .collect();
        self.linkvars = self
            .vars
            .iter()
            .copied()
            .filter(|&j| ctx.is_linking(j))
            .collect();
        Ok(())
    }

    /// Evaluates the reduced cost against the given duals and stores it:
    /// `c.x - pi^T (A x) - pi_conv` in reduced-cost mode, with the objective
    /// term dropped under Farkas pricing.
    pub fn compute_redcost(&mut self, ctx: &DecompContext, duals: &DualValues) -> Result<E, Problem> {
        self.compute_master_coefs(ctx)?;

        let base = if duals.farkas {
            0.
        } else {
            self.objective_value(ctx)
        };
        let coefs = self.mastercoefs.as_ref().unwrap();
        let mut redcost = base - dot(duals.pi.as_ref(), coefs.as_ref()) - duals.convexity(self.block);
        for (coef, dual) in self.mastercuts.iter().zip(duals.cuts.iter()) {
            redcost -= coef * dual;
        }

        self.redcost = redcost;
        Ok(redcost)
    }

    /// Ages the column: non-improving columns grow older, improving or used
    /// columns are reset to age zero.
    pub fn update_age(&mut self, grow: bool) {
        if grow && !self.is_improving() {
            self.age += 1;
        } else {
            self.age = 0;
        }
    }

    /// Hash over `(block, is_ray, nvars)`; the full structural comparison is
    /// [`is_equal`](Self::is_equal).
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.block.hash(&mut hasher);
        self.is_ray.hash(&mut hasher);
        self.vars.len().hash(&mut hasher);
        hasher.finish()
    }

    /// Structural equality: same provenance and componentwise equal entries
    /// within tolerance. Reduced cost and age do not participate.
    pub fn is_equal(&self, other: &Column) -> bool {
        if self.block != other.block
            || self.is_ray != other.is_ray
            || self.vars.len() != other.vars.len()
        {
            return false;
        }
        self.vars
            .iter()
            .zip(other.vars.iter())
            .all(|(a, b)| a == b)
            && self
                .vals
                .iter()
                .zip(other.vals.iter())
                .all(|(a, b)| (a - b).abs() <= EPS)
    }
}

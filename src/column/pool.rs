//! Content-addressed cache of generated columns.
//!
//! Solvers revisit the same extreme points across rounds; the pool
//! deduplicates them so the master never re-absorbs a column it has already
//! seen. Entries age while their reduced cost stays non-negative and are
//! evicted once they outlive the age limit. The pool is valid for one
//! branch-and-bound node and clears itself when the node changes.

use std::collections::HashMap;

use derive_more::{Display, Error};
use problemo::Problem;

use crate::column::Column;
use crate::column::store::PriceStore;
use crate::interface::decomp::DecompContext;
use crate::interface::master::DualValues;
use crate::I;

#[derive(Debug, Display, Error, PartialEq)]
pub enum PoolError {
    #[display("Column is not in the pool")]
    NotFound,

    #[display("Hash index out of sync with the column sequence")]
    IndexOutOfSync,
}

/// Deduplicating, aging cache of [`Column`]s, keyed by content fingerprint.
pub struct ColumnPool {
    cols: Vec<Column>,
    /// Fingerprint -> positions in `cols`; buckets are scanned with the full
    /// structural equality, so hash collisions are harmless.
    index: HashMap<u64, Vec<I>>,
    agelimit: i64,
    node_number: i64,
    in_farkas: bool,
}

impl ColumnPool {
    /// Creates an empty pool. `agelimit = -1` disables aging entirely.
    pub fn new(agelimit: i64) -> Self {
        Self {
            cols: Vec::new(),
            index: HashMap::new(),
            agelimit,
            node_number: -1,
            in_farkas: false,
        }
    }

    pub fn len(&self) -> I {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn cols(&self) -> &[Column] {
        &self.cols
    }

    /// Selects Farkas vs reduced-cost evaluation for subsequent
    /// [`price`](Self::price) and
    /// [`update_redcost_and_coefs`](Self::update_redcost_and_coefs) calls.
    pub fn set_farkas(&mut self, on: bool) {
        self.in_farkas = on;
    }

    pub fn in_farkas(&self) -> bool {
        self.in_farkas
    }

    /// Inserts a column unless an equal one is already stored. Returns the
    /// column back to the caller when it is a duplicate (or empty), `None`
    /// when the pool took ownership.
    pub fn add(&mut self, mut col: Column) -> Result<Option<Column>, Problem> {
        if col.nvars() == 0 {
            // The zero column can never price out; reject it outright.
            return Ok(Some(col));
        }
        if self.position(&col).is_some() {
            return Ok(Some(col));
        }

        col.update_age(false);
        let key = col.fingerprint();
        self.index.entry(key).or_default().push(self.cols.len());
        self.cols.push(col);
        Ok(None)
    }

    /// Removes the column at `pos` and returns it.
    pub fn remove(&mut self, pos: I) -> Result<Column, Problem> {
        if pos >= self.cols.len() {
            return Err(PoolError::NotFound)?;
        }

        let key = self.cols[pos].fingerprint();
        self.unindex(key, pos)?;

        let last = self.cols.len() - 1;
        let col = self.cols.swap_remove(pos);
        if pos != last {
            // The former last column moved into `pos`; fix its index entry.
            let moved_key = self.cols[pos].fingerprint();
            let bucket = self
                .index
                .get_mut(&moved_key)
                .ok_or(PoolError::IndexOutOfSync)?;
            let slot = bucket
                .iter_mut()
                .find(|p| **p == last)
                .ok_or(PoolError::IndexOutOfSync)?;
            *slot = pos;
        }
        Ok(col)
    }

    /// Destroys all contents.
    pub fn clear(&mut self) {
        self.cols.clear();
        self.index.clear();
    }

    /// Clears the pool when the active branch-and-bound node changed since
    /// the last call; a no-op within the same node.
    pub fn update_node(&mut self, node_number: i64) {
        if self.node_number != node_number {
            self.clear();
            self.node_number = node_number;
        }
    }

    /// Recomputes master coefficients and reduced costs of every entry
    /// against the current duals and evaluation mode.
    pub fn update_redcost_and_coefs(
        &mut self,
        ctx: &DecompContext,
        duals: &DualValues,
    ) -> Result<(), Problem> {
        debug_assert_eq!(self.in_farkas, duals.farkas);
        for col in &mut self.cols {
            col.refresh_master_coefs(ctx)?;
            col.compute_redcost(ctx, duals)?;
        }
        Ok(())
    }

    /// Harvests the pool: entries whose reduced cost is dual-feasibly
    /// negative move to the price store with their age reset; the rest age
    /// and are evicted once `age > agelimit`. Returns the number of columns
    /// moved.
    ///
    /// Reduced costs must be current, see
    /// [`update_redcost_and_coefs`](Self::update_redcost_and_coefs).
    pub fn price(&mut self, store: &mut PriceStore) -> Result<I, Problem> {
        let mut moved = 0;

        for pos in (0..self.cols.len()).rev() {
            if self.cols[pos].is_improving() {
                let mut col = self.remove(pos)?;
                col.update_age(false);
                store.add_col(col, false);
                moved += 1;
            } else {
                self.cols[pos].update_age(true);
                if self.agelimit >= 0 && self.cols[pos].age() as i64 > self.agelimit {
                    self.remove(pos)?;
                }
            }
        }

        Ok(moved)
    }

    fn position(&self, col: &Column) -> Option<I> {
        self.index
            .get(&col.fingerprint())?
            .iter()
            .copied()
            .find(|&p| self.cols[p].is_equal(col))
    }

    fn unindex(&mut self, key: u64, pos: I) -> Result<(), Problem> {
        let bucket = self.index.get_mut(&key).ok_or(PoolError::IndexOutOfSync)?;
        let slot = bucket
            .iter()
            .position(|&p| p == pos)
            .ok_or(PoolError::IndexOutOfSync)?;
        bucket.swap_remove(slot);
        if bucket.is_empty() {
            self.index.remove(&key);
        }
        Ok(())
    }
}

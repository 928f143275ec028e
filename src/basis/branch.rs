//! A single claim on a slice of a transaction's inflow.
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::basis::flow::Flow;
use crate::model::transaction::Transaction;

/// A branch is owned by exactly one account's tracker list at a time. Its
/// `prev`/`txn` fields never change after construction; only `amt` moves,
/// and only downward (decrement or depreciate).
#[derive(Debug, Clone)]
pub struct Branch {
    prev: Option<Rc<Branch>>,
    txn: Rc<Transaction>,
    amt: Decimal,
}

impl Branch {
    /// A root branch: money enters the tracked perimeter at `txn`.
    pub fn root(txn: Rc<Transaction>) -> Self {
        let amt = txn.amt_in;
        Self { prev: None, txn, amt }
    }

    pub fn child(prev: Rc<Branch>, txn: Rc<Transaction>, amt: Decimal) -> Self {
        Self { prev: Some(prev), txn, amt }
    }

    /// A root branch for an explicit amount, used when only a slice of
    /// `txn.amt_in` re-enters tracking (the untracked-remainder branches of
    /// boundary rules).
    pub fn root_partial(txn: Rc<Transaction>, amt: Decimal) -> Self {
        Self { prev: None, txn, amt }
    }

    /// A sibling of some other branch, sharing its `prev`/`txn` pointers but
    /// carrying a smaller `amt` (a LIFO split).
    pub fn split_sibling(of: &Branch, amt: Decimal) -> Self {
        Self { prev: of.prev.clone(), txn: Rc::clone(&of.txn), amt }
    }

    pub fn amt(&self) -> Decimal {
        self.amt
    }

    pub fn txn(&self) -> &Rc<Transaction> {
        &self.txn
    }

    pub fn prev(&self) -> Option<&Rc<Branch>> {
        self.prev.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.prev.is_none()
    }

    /// Precondition: `x <= self.amt`. Used only by the LIFO tracker.
    pub fn decrement(&mut self, x: Decimal) {
        debug_assert!(x <= self.amt, "decrement past zero: {x} > {}", self.amt);
        self.amt -= x;
    }

    /// Precondition: `0 <= f <= 1`. Used only by the well-mixed tracker.
    pub fn depreciate(&mut self, f: Decimal) {
        debug_assert!(f >= Decimal::ZERO && f <= Decimal::ONE, "depreciation factor out of range: {f}");
        self.amt *= f;
    }

    /// Recursively reconstructs the [`Flow`] this branch belongs to, for the
    /// slice `amt` of it that is leaving the tracked perimeter now. When
    /// `fee` is omitted it is derived from `txn.fee_scaling()`.
    pub fn follow_back(&self, amt: Decimal, fee: Option<Decimal>) -> Flow {
        let fee = fee.unwrap_or_else(|| amt * self.txn.fee_scaling());
        match &self.prev {
            Some(prev) => {
                let mut flow = prev.follow_back(amt + fee, None);
                flow.extend(self, amt);
                flow
            }
            None => Flow::seed(self, amt, fee),
        }
    }
}

/// Walks each branch in `branches` back into a [`Flow`] without retaining
/// any of them. When `skip_leaf` is set, the branch itself is elided: the
/// walk starts one hop further back, at its parent, crediting the parent's
/// own surviving amount rather than this (synthetic) leaf's.
pub fn new_leaves(branches: Vec<Branch>, skip_leaf: bool) -> Vec<Flow> {
    if skip_leaf {
        branches
            .into_iter()
            .filter_map(|b| b.prev.map(|prev| {
                let amt = prev.amt();
                prev.follow_back(amt, None)
            }))
            .collect()
    } else {
        branches
            .into_iter()
            .map(|b| {
                let amt = b.amt();
                b.follow_back(amt, None)
            })
            .collect()
    }
}

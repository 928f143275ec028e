//! The per-account ordered collection of live branches, generic over the
//! extension policy. Modeled as `Tracker<P: Policy>` rather than
//! a tagged enum over `Box<dyn Policy>`, since the three heuristics differ
//! only in `extend_branches` — a small-trait-plus-generic-container split
//! that avoids boxing three interchangeable strategies.
use std::marker::PhantomData;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::basis::branch::{new_leaves, Branch};
use crate::basis::flow::Flow;
use crate::model::transaction::{Category, Transaction, INFERRED_TYPE};

pub mod greedy;
pub mod no_tracking;
pub mod well_mixed;

pub use greedy::Greedy;
pub use no_tracking::NoTracking;
pub use well_mixed::WellMixed;

/// The capability every heuristic (including "no tracking") implements.
/// Everything but `extend_branches` is shared by `Tracker<P>` directly.
pub trait Policy: std::fmt::Debug {
    fn extend_branches(
        branches: &mut Vec<Branch>,
        account_balance: Decimal,
        txn: &Rc<Transaction>,
        resolution_limit: Decimal,
    ) -> (Vec<Branch>, Vec<Flow>);
}

#[derive(Debug)]
pub struct Tracker<P: Policy> {
    branches: Vec<Branch>,
    pub time_cutoff: Option<Duration>,
    pub resolution_limit: Decimal,
    pub infer: bool,
    _policy: PhantomData<P>,
}

impl<P: Policy> Tracker<P> {
    /// Instantiates a tracker for an account whose current balance is
    /// `account_balance`. When `infer` is set, that balance is immediately
    /// backfilled as an inferred root branch, at the point the tracker is
    /// lazily created (see `DESIGN.md`).
    pub fn new(
        time_cutoff: Option<Duration>,
        resolution_limit: Decimal,
        infer: bool,
        account_balance: Decimal,
        acct_id: &str,
        window_start: DateTime<Utc>,
    ) -> Self {
        let mut tracker =
            Self { branches: Vec::new(), time_cutoff, resolution_limit, infer, _policy: PhantomData };
        if infer {
            tracker.infer_deposit(account_balance, acct_id, window_start);
        }
        tracker
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn tracked_total(&self) -> Decimal {
        self.branches.iter().map(Branch::amt).sum()
    }

    pub fn add_branches(&mut self, bs: impl IntoIterator<Item = Branch>) {
        self.branches.extend(bs);
    }

    pub fn extend_branches(&mut self, account_balance: Decimal, txn: &Rc<Transaction>) -> (Vec<Branch>, Vec<Flow>) {
        P::extend_branches(&mut self.branches, account_balance, txn, self.resolution_limit)
    }

    /// `ts = Some(_)`: drop every branch older than `time_cutoff`, following
    /// each back. `ts = None`: flush everything. Mirrors `stop_tracking`.
    pub fn stop_tracking(&mut self, ts: Option<DateTime<Utc>>) -> Vec<Flow> {
        match (ts, self.time_cutoff) {
            (Some(ts), Some(cutoff)) => {
                let mut flows = Vec::new();
                self.branches.retain(|b| {
                    if ts - b.txn().timestamp > cutoff {
                        flows.push(b.follow_back(b.amt(), None));
                        false
                    } else {
                        true
                    }
                });
                flows
            }
            (Some(_), None) => Vec::new(),
            (None, _) => self.branches.drain(..).map(|b| {
                let amt = b.amt();
                b.follow_back(amt, None)
            }).collect(),
        }
    }

    /// Synthesizes a deposit at the window start.
    pub fn infer_deposit(&mut self, amt: Decimal, acct_id: &str, window_start: DateTime<Utc>) {
        if amt > self.resolution_limit {
            let txn = Rc::new(Transaction::inferred(acct_id, window_start, amt, Category::Deposit));
            self.branches.push(Branch::root(txn));
        }
    }

    /// Synthesizes a withdraw of `amt` (plus `fee`) tagged `type_tag`, runs
    /// it through `extend_branches`, and always discards the resulting
    /// branches — they never rejoin a tracker. When `track` is false the
    /// synthetic hop itself is skipped (`skip_leaf`) so the emitted flow
    /// credits the real parent branch instead of this synthetic withdraw.
    pub fn infer_withdraw(
        &mut self,
        amt: Decimal,
        fee: Decimal,
        type_tag: &str,
        track: bool,
        account_balance: Decimal,
        acct_id: &str,
        window_end: DateTime<Utc>,
    ) -> Vec<Flow> {
        if amt + fee <= self.resolution_limit {
            return Vec::new();
        }
        let txn = Rc::new(Transaction::inferred_withdraw(acct_id, window_end, amt, fee, type_tag));
        let (new_branches, mut flows) = self.extend_branches(account_balance, &txn);
        flows.extend(new_leaves(new_branches, !track));
        flows
    }

    /// `if self.infer { infer_deposit(missing) }` during the pre-phase.
    pub fn adjust_up(&mut self, missing: Decimal, acct_id: &str, window_start: DateTime<Utc>) {
        if self.infer {
            self.infer_deposit(missing, acct_id, window_start);
        }
    }

    /// Always pulls `extra` out of the tracker (to keep the conservation
    /// invariant after the balance is corrected downward); `self.infer` only
    /// decides whether the synthetic hop is credited in the output
    /// (`track = self.infer`) or elided (`skip_leaf`). See `DESIGN.md`.
    pub fn adjust_down(
        &mut self,
        extra: Decimal,
        account_balance: Decimal,
        acct_id: &str,
        window_end: DateTime<Utc>,
    ) -> Vec<Flow> {
        let infer = self.infer;
        self.infer_withdraw(extra, Decimal::ZERO, INFERRED_TYPE, infer, account_balance, acct_id, window_end)
    }
}

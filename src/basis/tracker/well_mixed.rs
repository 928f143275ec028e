//! Well-mixed extension: every live branch contributes its share to every outflow.
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::basis::branch::Branch;
use crate::basis::flow::Flow;
use crate::basis::tracker::Policy;
use crate::model::transaction::Transaction;

#[derive(Debug)]
pub struct WellMixed;

impl Policy for WellMixed {
    fn extend_branches(
        branches: &mut Vec<Branch>,
        account_balance: Decimal,
        txn: &Rc<Transaction>,
        resolution_limit: Decimal,
    ) -> (Vec<Branch>, Vec<Flow>) {
        // A non-positive running balance (the spec does not validate
        // overdrafts, §1 non-goal) makes the proportional split undefined —
        // `Decimal` panics on division by zero. Treat the outflow as fully
        // untracked instead: live branches are left untouched and the whole
        // inflow becomes a fresh untracked root, same as when every branch
        // falls below the resolution limit further down.
        if account_balance <= Decimal::ZERO {
            let mut new_pool = Vec::new();
            if txn.amt_in > resolution_limit {
                new_pool.push(Branch::root_partial(Rc::clone(txn), txn.amt_in));
            }
            return (new_pool, Vec::new());
        }

        let track_factor = txn.amt_out / account_balance;
        let split_factor = txn.amt_in / account_balance;
        let stay_factor = (account_balance - txn.amt_out) / account_balance;

        let mut new_pool = Vec::new();
        let mut new_flows = Vec::new();

        // Every branch is extended by its proportional share. A branch's
        // snapshot here is a frozen parent reference for the new child; the
        // same branch is independently depreciated below. Flow
        // reconstruction never re-reads a live ancestor's `amt` along this
        // path, so the two copies diverging after this point is invisible —
        // see `DESIGN.md`.
        for branch in branches.iter() {
            if track_factor * branch.amt() <= resolution_limit {
                continue;
            }
            let parent = Rc::new(branch.clone());
            let child_amt = split_factor * branch.amt();
            let child = Branch::child(parent, Rc::clone(txn), child_amt);
            if child.amt() > resolution_limit {
                new_pool.push(child);
            } else {
                let fee = track_factor * branch.amt() - child.amt();
                new_flows.push(child.follow_back(child.amt(), Some(fee)));
            }
        }

        let amt_untracked = txn.amt_in - new_pool.iter().map(Branch::amt).sum::<Decimal>();
        if amt_untracked > resolution_limit {
            new_pool.push(Branch::root_partial(Rc::clone(txn), amt_untracked));
        } else {
            let tot_untracked = txn.amt_out - branches.iter().map(Branch::amt).sum::<Decimal>();
            if tot_untracked > resolution_limit {
                let continues = txn.amt_in / txn.amt_out;
                let scaled = tot_untracked * continues;
                let fee = tot_untracked - scaled;
                let new_branch = Branch::root_partial(Rc::clone(txn), scaled);
                new_flows.push(new_branch.follow_back(scaled, Some(fee)));
            }
        }

        branches.retain_mut(|b| {
            if stay_factor * b.amt() < resolution_limit {
                false
            } else {
                b.depreciate(stay_factor);
                true
            }
        });

        (new_pool, new_flows)
    }
}

//! LIFO extension: the most recently deposited money is spent first.
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::basis::branch::Branch;
use crate::basis::flow::Flow;
use crate::basis::tracker::Policy;
use crate::model::transaction::Transaction;

#[derive(Debug)]
pub struct Greedy;

impl Policy for Greedy {
    fn extend_branches(
        branches: &mut Vec<Branch>,
        _account_balance: Decimal,
        txn: &Rc<Transaction>,
        resolution_limit: Decimal,
    ) -> (Vec<Branch>, Vec<Flow>) {
        let tracked: Decimal = branches.iter().map(Branch::amt).sum();
        let mut amt = txn.amt_out.min(tracked);

        // Pop branches off the tail (newest first) until `amt` is covered.
        let mut popped: Vec<Branch> = Vec::new();
        while amt > resolution_limit {
            let last_amt = branches.last().expect("tracked total guarantees a branch remains").amt();
            if last_amt < amt + resolution_limit {
                let b = branches.pop().expect("checked above");
                amt -= last_amt;
                popped.push(b);
            } else {
                let last = branches.last().expect("checked above");
                let split = Branch::split_sibling(last, amt);
                branches.last_mut().expect("checked above").decrement(amt);
                popped.push(split);
                amt = Decimal::ZERO;
            }
        }

        let mut new_stack = Vec::new();
        let mut new_flows = Vec::new();
        let continues = txn.amt_in / txn.amt_out;
        // `popped` is newest-first; extend oldest-popped first so the newest
        // ends up at the tail of `new_stack`, preserving LIFO order.
        for branch in popped.into_iter().rev() {
            let branch_amt = branch.amt();
            let branch_rc = Rc::new(branch);
            let child = Branch::child(Rc::clone(&branch_rc), Rc::clone(txn), branch_amt * continues);
            if child.amt() > resolution_limit {
                new_stack.push(child);
            } else {
                let fee = branch_amt - child.amt();
                new_flows.push(child.follow_back(child.amt(), Some(fee)));
            }
        }

        let amt_untracked = txn.amt_in - new_stack.iter().map(Branch::amt).sum::<Decimal>();
        if amt_untracked > resolution_limit {
            new_stack.push(Branch::root_partial(Rc::clone(txn), amt_untracked));
        } else {
            let tot_untracked = txn.amt_out - tracked;
            if tot_untracked > resolution_limit {
                // This root represents the as-yet-untracked sliver of the
                // transaction; it never enters `new_stack`, only `follow_back`.
                let scaled = tot_untracked * continues;
                let fee = tot_untracked - scaled;
                let new_branch = Branch::root_partial(Rc::clone(txn), scaled);
                new_flows.push(new_branch.follow_back(scaled, Some(fee)));
            }
        }

        (new_stack, new_flows)
    }
}

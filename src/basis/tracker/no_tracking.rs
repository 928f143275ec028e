//! The abstract tracker contract applied directly: no history is kept.
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::basis::branch::Branch;
use crate::basis::flow::Flow;
use crate::basis::tracker::Policy;
use crate::model::transaction::Transaction;

/// Every outgoing transaction is its own one-hop flow: a fresh root branch
/// is constructed and immediately followed back.
#[derive(Debug)]
pub struct NoTracking;

impl Policy for NoTracking {
    fn extend_branches(
        _branches: &mut Vec<Branch>,
        _account_balance: Decimal,
        txn: &Rc<Transaction>,
        resolution_limit: Decimal,
    ) -> (Vec<Branch>, Vec<Flow>) {
        let new_branch = Branch::root(Rc::clone(txn));
        if txn.amt_in > resolution_limit {
            (vec![new_branch], Vec::new())
        } else {
            let flow = new_branch.follow_back(txn.amt_in, Some(txn.amt_out - txn.amt_in));
            (Vec::new(), vec![flow])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transaction::Category;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn txn() -> Rc<Transaction> {
        Rc::new(Transaction {
            txn_id: "t1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            src_id: "A".to_string(),
            tgt_id: "B".to_string(),
            type_tag: "withdraw".to_string(),
            categ: Category::Withdraw,
            amt_out: dec!(100),
            amt_in: dec!(100),
            fee: dec!(0),
        })
    }

    #[test]
    fn produces_one_root_branch_above_resolution_limit() {
        let mut branches = Vec::new();
        let (new_branches, flows) = NoTracking::extend_branches(&mut branches, dec!(0), &txn(), dec!(0.01));
        assert_eq!(new_branches.len(), 1);
        assert!(flows.is_empty());
    }
}

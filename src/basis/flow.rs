//! A completed trajectory, reconstructed by walking a branch chain to its root.
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::basis::branch::Branch;
use crate::model::transaction::Category;

#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub timestamp: DateTime<Utc>,
    pub amt: Decimal,
    pub frac_root: Decimal,
    pub txn_ids: Vec<String>,
    pub acct_ids: Vec<String>,
    pub txn_types: Vec<String>,
    pub durations: Vec<Duration>,
    pub duration: Duration,
    pub rev_fracs: Vec<Decimal>,
    pub beg_categ: Category,
    pub end_categ: Category,
    pub length: u32,
    pub length_wrev: Decimal,
}

impl Flow {
    /// Seeds a flow at a root branch. `amt` is the net
    /// amount surviving at the root; `fee` is the sliver consumed by the
    /// root transaction's own fee accounting.
    pub(crate) fn seed(root: &Branch, amt: Decimal, fee: Decimal) -> Self {
        let txn = root.txn();
        let total = amt + fee;
        let rev_frac = if total.is_zero() { Decimal::ZERO } else { fee / total };
        let is_transfer = txn.categ == Category::Transfer;
        Self {
            timestamp: txn.timestamp,
            amt: total,
            frac_root: if txn.amt_out.is_zero() { Decimal::ZERO } else { total / txn.amt_out },
            txn_ids: vec![txn.txn_id.clone()],
            acct_ids: vec![txn.src_id.clone(), txn.tgt_id.clone()],
            txn_types: vec![txn.type_tag.clone()],
            durations: Vec::new(),
            duration: Duration::zero(),
            rev_fracs: vec![rev_frac],
            beg_categ: txn.categ,
            end_categ: txn.categ,
            length: u32::from(is_transfer),
            length_wrev: if is_transfer { txn.amt_in / txn.amt_out } else { Decimal::ZERO },
        }
    }

    /// Extends the flow by one hop: `branch` is a non-root branch whose
    /// surviving amount `a` is carried forward into this flow's running total.
    pub(crate) fn extend(&mut self, branch: &Branch, a: Decimal) {
        let txn = branch.txn();
        let prev_ts = branch
            .prev()
            .expect("extend is only called with non-root branches")
            .txn()
            .timestamp;

        self.txn_ids.push(txn.txn_id.clone());
        self.acct_ids.push(txn.tgt_id.clone());
        self.txn_types.push(txn.type_tag.clone());
        self.end_categ = txn.categ;

        let rev_frac = if self.amt.is_zero() { Decimal::ZERO } else { Decimal::ONE - a / self.amt };
        self.rev_fracs.push(rev_frac);

        let hop = txn.timestamp - prev_ts;
        self.durations.push(hop);
        self.duration = self.duration + hop;

        if txn.categ == Category::Transfer {
            self.length += 1;
            if !self.amt.is_zero() {
                self.length_wrev += a / self.amt;
            }
        }
    }

    /// True when every hop in this flow is an inferred transaction, i.e. the
    /// flow never touched an observed transfer. Used to suppress
    /// inference-only flows from output when `infer = true`.
    pub fn all_hops_inferred(&self) -> bool {
        self.txn_types.iter().all(|t| t == "inferred")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::transaction::Transaction;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::rc::Rc;

    fn txn(id: &str, src: &str, tgt: &str, hour: u32, amt_out: Decimal, amt_in: Decimal, categ: Category) -> Rc<Transaction> {
        Rc::new(Transaction {
            txn_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, hour, 0, 0).unwrap(),
            src_id: src.to_string(),
            tgt_id: tgt.to_string(),
            type_tag: "transfer".to_string(),
            categ,
            amt_out,
            amt_in,
            fee: amt_out - amt_in,
        })
    }

    #[test]
    fn seeded_flow_has_one_txn_and_two_accounts() {
        let root = Branch::root(txn("t1", "A", "B", 1, dec!(100), dec!(100), Category::Deposit));
        let flow = Flow::seed(&root, dec!(100), dec!(0));
        assert_eq!(flow.txn_ids.len(), 1);
        assert_eq!(flow.acct_ids, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(flow.rev_fracs.len(), 1);
        assert!(flow.durations.is_empty());
    }

    #[test]
    fn extend_appends_one_hop_and_accumulates_duration() {
        let root = Branch::root(txn("t1", "A", "B", 1, dec!(100), dec!(100), Category::Deposit));
        let mut flow = Flow::seed(&root, dec!(100), dec!(0));
        let root_rc = Rc::new(root);
        let child = Branch::child(root_rc, txn("t2", "B", "C", 5, dec!(100), dec!(100), Category::Withdraw), dec!(100));
        flow.extend(&child, dec!(100));
        assert_eq!(flow.txn_ids.len(), 2);
        assert_eq!(flow.acct_ids, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(flow.duration, Duration::hours(4));
        assert_eq!(flow.durations, vec![Duration::hours(4)]);
        assert_eq!(flow.rev_fracs, vec![dec!(0), dec!(0)]);
    }
}

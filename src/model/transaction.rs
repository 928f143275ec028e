//! The transaction: a single observed movement of money between two accounts.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::TransactionError;
use crate::model::config::FeeConvention;

/// Assigned by the configured boundary rule, not derived from the raw
/// record alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Deposit,
    Transfer,
    Withdraw,
    System,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Deposit => "deposit",
            Category::Transfer => "transfer",
            Category::Withdraw => "withdraw",
            Category::System => "system",
        }
    }
}

/// Immutable once constructed, save for the one-time "negative amt_in"
/// correction the engine applies before the transaction is shared via `Rc`.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub txn_id: String,
    pub timestamp: DateTime<Utc>,
    pub src_id: String,
    pub tgt_id: String,
    pub type_tag: String,
    pub categ: Category,
    pub amt_out: Decimal,
    pub amt_in: Decimal,
    pub fee: Decimal,
}

/// A transaction with `type = "inferred"` synthesized by a tracker's
/// `infer_deposit`/`infer_withdraw`, not read off the input stream.
pub const INFERRED_TYPE: &str = "inferred";

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        txn_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        src_id: impl Into<String>,
        tgt_id: impl Into<String>,
        type_tag: impl Into<String>,
        categ: Category,
        amt: Decimal,
        src_fee: Decimal,
        tgt_fee: Decimal,
        fee_convention: FeeConvention,
    ) -> Result<Self, TransactionError> {
        let (amt_out, amt_in, fee) = fee_convention.apply(amt, src_fee, tgt_fee);
        let txn_id = txn_id.into();
        if amt_out < amt_in {
            return Err(TransactionError::AmountSentLessThanReceived { txn_id, amt_out, amt_in });
        }
        Ok(Self {
            txn_id,
            timestamp,
            src_id: src_id.into(),
            tgt_id: tgt_id.into(),
            type_tag: type_tag.into(),
            categ,
            amt_out,
            amt_in,
            fee,
        })
    }

    /// A synthesized deposit or withdraw used by tracker inference. Always
    /// zero-fee; never fails the `amt_out >= amt_in` check since both are
    /// set to `amt`.
    pub fn inferred(acct_id: impl Into<String>, timestamp: DateTime<Utc>, amt: Decimal, categ: Category) -> Self {
        let acct_id = acct_id.into();
        Self {
            txn_id: format!("inferred-{acct_id}-{timestamp}"),
            timestamp,
            src_id: acct_id.clone(),
            tgt_id: acct_id,
            type_tag: INFERRED_TYPE.to_string(),
            categ,
            amt_out: amt,
            amt_in: amt,
            fee: Decimal::ZERO,
        }
    }

    /// `fee / amt_in` when `amt_in > 0`; undefined (and never consulted) at
    /// `amt_in == 0`, where it resolves to zero rather than panicking.
    pub fn fee_scaling(&self) -> Decimal {
        if self.amt_in.is_zero() {
            Decimal::ZERO
        } else {
            self.fee / self.amt_in
        }
    }

    /// A synthesized withdraw used by tracker inference (`infer_withdraw`):
    /// `amt_out = amt + fee`, `amt_in = amt`, `fee = fee`. Bypasses the
    /// configured fee convention since the amounts are already given in
    /// net/gross terms, not raw ledger fields (see `DESIGN.md`).
    pub fn inferred_withdraw(
        acct_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        amt: Decimal,
        fee: Decimal,
        type_tag: impl Into<String>,
    ) -> Self {
        let acct_id = acct_id.into();
        Self {
            txn_id: format!("inferred-{acct_id}-{timestamp}"),
            timestamp,
            src_id: acct_id.clone(),
            tgt_id: acct_id,
            type_tag: type_tag.into(),
            categ: Category::Withdraw,
            amt_out: amt + fee,
            amt_in: amt,
            fee,
        }
    }

    /// An over-large fee can drive `amt_in` negative. Clamp it to zero,
    /// crediting the excess back to the target
    /// balance, and returns the excess so the caller can emit an
    /// inferred-withdraw flow for it when the target is tracked.
    pub fn clamp_negative_amt_in(&mut self) -> Option<Decimal> {
        if self.amt_in < Decimal::ZERO {
            let excess = -self.amt_in;
            self.amt_in = Decimal::ZERO;
            self.fee = self.amt_out;
            Some(excess)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn sender_convention_matches_scenario_4() {
        let txn = Transaction::new(
            "t1", ts(), "A", "B", "transfer", Category::Transfer,
            dec!(100), dec!(10), dec!(0), FeeConvention::Sender,
        )
        .unwrap();
        assert_eq!(txn.amt_out, dec!(110));
        assert_eq!(txn.amt_in, dec!(100));
        assert_eq!(txn.fee_scaling(), dec!(0.1));
    }

    #[test]
    fn amt_out_below_amt_in_is_rejected() {
        let err = Transaction::new(
            "t1", ts(), "A", "B", "transfer", Category::Transfer,
            dec!(100), dec!(0), dec!(50), FeeConvention::Recipient,
        );
        assert!(err.is_err());
    }

    #[test]
    fn negative_amt_in_is_clamped() {
        let mut txn = Transaction::new(
            "t1", ts(), "A", "B", "transfer", Category::Transfer,
            dec!(100), dec!(0), dec!(150), FeeConvention::Recipient,
        )
        .unwrap();
        assert_eq!(txn.amt_in, dec!(-50));
        let excess = txn.clamp_negative_amt_in().unwrap();
        assert_eq!(excess, dec!(50));
        assert_eq!(txn.amt_in, dec!(0));
        assert_eq!(txn.fee, txn.amt_out);
    }
}

//! The per-transaction processing pipeline, generic over the tracking
//! heuristic so dispatch is a monomorphization rather than a `dyn Policy`
//! call.
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::basis::{new_leaves, Branch, Flow, Greedy, NoTracking, Policy, WellMixed};
use crate::model::account::Account;
use crate::model::config::{Config, Heuristic};
use crate::model::report::Report;
use crate::model::transaction::{Category, Transaction};

/// One transaction after the boundary rule has assigned it a category (and,
/// for the `+otc` variants, possibly retyped it), ready to be processed.
/// Produced by `crate::io::transactions`.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub txn_id: String,
    pub timestamp: DateTime<Utc>,
    pub src_id: String,
    pub tgt_id: String,
    pub type_tag: String,
    pub categ: Category,
    pub amt: Decimal,
    pub src_fee: Decimal,
    pub tgt_fee: Decimal,
    pub src_balance: Option<Decimal>,
    pub tgt_balance: Option<Decimal>,
    pub src_categ: Option<String>,
    pub tgt_categ: Option<String>,
}

/// Whether the source/target side of a category is tracked.
fn dispatch(categ: Category) -> (bool, bool) {
    match categ {
        Category::Deposit => (false, true),
        Category::Transfer => (true, true),
        Category::Withdraw => (true, false),
        Category::System => (false, false),
    }
}

pub struct Engine<P: Policy> {
    config: Config,
    accounts: HashMap<String, Account<P>>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

impl<P: Policy> Engine<P> {
    pub fn new(config: Config) -> Result<Self, crate::errors::ConfigError> {
        let (window_start, window_end) = config.window()?;
        Ok(Self { config, accounts: HashMap::new(), window_start, window_end })
    }

    pub fn accounts(&self) -> &HashMap<String, Account<P>> {
        &self.accounts
    }

    fn ensure_account(&mut self, acct_id: &str) -> &mut Account<P> {
        self.accounts
            .entry(acct_id.to_string())
            .or_insert_with(|| Account::new(acct_id, Decimal::ZERO))
    }

    /// Records an account's resolved boundary category tag, the first time
    /// it is seen (a later conflicting tag is not re-resolved — the boundary
    /// pre-scan already picked one tag per account by priority order).
    pub fn note_account_categ(&mut self, acct_id: &str, categ: Option<&str>) {
        let Some(categ) = categ else { return };
        let acct = self.ensure_account(acct_id);
        if acct.categ.is_none() {
            acct.categ = Some(categ.to_string());
        }
    }

    /// Boundary-consistency bookkeeping (spec.md §4.6 step 2): a deposit
    /// whose source has ever been tracked, a withdraw whose target has ever
    /// been tracked, or a `system` transaction touching a tracked account on
    /// either side, is recorded as a boundary inconsistency. `transfer`
    /// transactions never trigger this — both sides are expected to be
    /// tracked.
    fn check_consistency(&self, src_id: &str, tgt_id: &str, categ: Category, report: &mut Report) {
        let tracked = |id: &str| self.accounts.get(id).map(|a| a.tracked).unwrap_or(false);
        match categ {
            Category::Transfer => {}
            Category::Deposit => {
                if tracked(src_id) {
                    report.boundary_inconsistent(src_id);
                }
            }
            Category::Withdraw => {
                if tracked(tgt_id) {
                    report.boundary_inconsistent(tgt_id);
                }
            }
            Category::System => {
                if tracked(src_id) {
                    report.boundary_inconsistent(src_id);
                }
                if tracked(tgt_id) {
                    report.boundary_inconsistent(tgt_id);
                }
            }
        }
    }

    /// Sweeps the source and target trackers of an about-to-be-processed
    /// transaction for branches past the configured time cutoff as of `ts`,
    /// emitting a flow for each expired branch. Mirrors `check_trackers`:
    /// only the two accounts actually party to the transaction are swept,
    /// not every tracked account in the system.
    pub fn sweep_time_cutoff(&mut self, ts: DateTime<Utc>, src_id: &str, tgt_id: &str, sink: &mut dyn FnMut(Flow)) {
        for acct_id in [src_id, tgt_id] {
            if let Some(account) = self.accounts.get_mut(acct_id) {
                if let Some(tracker) = account.tracker.as_mut() {
                    for flow in tracker.stop_tracking(Some(ts)) {
                        sink(flow);
                    }
                }
            }
        }
    }

    /// Drains every remaining tracker at end of stream.
    pub fn finish(&mut self, report: &mut Report, sink: &mut dyn FnMut(Flow)) {
        for (acct_id, account) in self.accounts.iter_mut() {
            if let Some(tracker) = account.tracker.as_mut() {
                let remaining = tracker.branches().len();
                if remaining > 0 && (account.balance - tracker.tracked_total()).abs() > self.config.resolution_limit {
                    report.flush_failure(acct_id, &crate::errors::ProcessingError::BalanceReconciliation(acct_id.clone()));
                }
                for flow in tracker.stop_tracking(None) {
                    sink(flow);
                }
            }
            account.close_out();
        }
    }

    /// Reconciles `acct_id`'s internally tracked balance against the
    /// `expected` balance a transaction record reports, backfilling a
    /// missing deposit or withdrawing an untracked surplus during the
    /// pre-phase.
    fn reconcile(&mut self, acct_id: &str, expected: Decimal, sink: &mut dyn FnMut(Flow)) {
        let window_start = self.window_start;
        let window_end = self.window_end;
        let resolution_limit = self.config.resolution_limit;
        let acct = self.ensure_account(acct_id);
        let diff = expected - acct.balance;
        if diff > resolution_limit {
            acct.adjust_balance_up(diff, window_start);
        } else if diff < -resolution_limit {
            for flow in acct.adjust_balance_down(-diff, window_end) {
                sink(flow);
            }
        }
    }

    /// Processes one transaction: balance reconciliation, the negative
    /// `amt_in` correction, tracker extension along the dispatch table, and
    /// the final balance update. Failures are recorded to `report` and the
    /// transaction is otherwise skipped rather than aborting the run.
    pub fn process(&mut self, raw: RawTransaction, report: &mut Report, sink: &mut dyn FnMut(Flow)) {
        let mut txn = match Transaction::new(
            &raw.txn_id, raw.timestamp, &raw.src_id, &raw.tgt_id, &raw.type_tag,
            raw.categ, raw.amt, raw.src_fee, raw.tgt_fee, self.config.fee_convention,
        ) {
            Ok(txn) => txn,
            Err(err) => {
                report.pre_check_failure(&raw.txn_id, &err);
                return;
            }
        };

        self.check_consistency(&raw.src_id, &raw.tgt_id, txn.categ, report);

        // Every account that appears as a src or tgt exists from that point
        // on, whether or not it ever picks up a tracker, so balance updates
        // below always land and a later tracked appearance keeps its history.
        self.ensure_account(&raw.src_id);
        self.ensure_account(&raw.tgt_id);

        if !self.config.no_balance {
            if let (Some(src_balance), Some(tgt_balance)) = (raw.src_balance, raw.tgt_balance) {
                let (expect_src, expect_tgt) = self.config.balance_convention.pre_balances(
                    src_balance, tgt_balance, txn.amt_out, txn.amt_in,
                );
                self.reconcile(&raw.src_id, expect_src, sink);
                self.reconcile(&raw.tgt_id, expect_tgt, sink);
            }
        }

        if let Some(excess) = txn.clamp_negative_amt_in() {
            let (_, tgt_track) = dispatch(txn.categ);
            if tgt_track {
                let resolution_limit = self.config.resolution_limit;
                let time_cutoff = self.config.time_cutoff_duration();
                let infer = self.config.infer;
                let window_start = self.window_start;
                let tgt = self.ensure_account(&raw.tgt_id);
                tgt.tracked = true;
                let balance = tgt.balance;
                let tracker = tgt.ensure_tracker(time_cutoff, resolution_limit, infer, window_start);
                for flow in tracker.infer_withdraw(Decimal::ZERO, excess, "fee", true, balance, &raw.tgt_id, raw.timestamp) {
                    sink(flow);
                }
            }
            // `amt_in` is now clamped to zero for every downstream purpose
            // (tracker extension, output), but the target still actually
            // lost `excess` net — apply that balance effect now, since the
            // ordinary end-of-pipeline `tgt.balance += amt_in` below will
            // add zero instead.
            self.ensure_account(&raw.tgt_id).balance -= excess;
        }

        let resolution_limit = self.config.resolution_limit;
        let txn = Rc::new(txn);
        let (src_track, tgt_track) = dispatch(txn.categ);
        let mut new_branches: Vec<Branch> = Vec::new();

        if txn.amt_out > resolution_limit {
            let time_cutoff = self.config.time_cutoff_duration();
            let infer = self.config.infer;
            let window_start = self.window_start;

            if src_track {
                let src = self.ensure_account(&raw.src_id);
                src.tracked = true;
                let balance = src.balance;
                let tracker = src.ensure_tracker(time_cutoff, resolution_limit, infer, window_start);
                let (branches, flows) = tracker.extend_branches(balance, &txn);
                for flow in flows {
                    sink(flow);
                }
                new_branches = branches;
            } else {
                if let Some(src) = self.accounts.get_mut(&raw.src_id) {
                    if src.has_tracker() {
                        let balance = src.balance;
                        let tracker = src.tracker.as_mut().expect("has_tracker just checked");
                        let (branches, flows) = tracker.extend_branches(balance, &txn);
                        for flow in new_leaves(branches, true) {
                            sink(flow);
                        }
                        for flow in flows {
                            sink(flow);
                        }
                    }
                }
                if tgt_track {
                    if txn.amt_in > resolution_limit {
                        new_branches = vec![Branch::root_partial(Rc::clone(&txn), txn.amt_in)];
                    } else if txn.amt_out - txn.amt_in > resolution_limit {
                        let branch = Branch::root_partial(Rc::clone(&txn), txn.amt_in);
                        sink(branch.follow_back(txn.amt_in, Some(txn.amt_out - txn.amt_in)));
                    }
                }
            }

            if tgt_track {
                let tgt = self.ensure_account(&raw.tgt_id);
                tgt.tracked = true;
                tgt.ensure_tracker(time_cutoff, resolution_limit, infer, window_start)
                    .add_branches(new_branches);
            } else {
                for flow in new_leaves(new_branches, false) {
                    sink(flow);
                }
            }
        }

        if let Some(src) = self.accounts.get_mut(&raw.src_id) {
            src.balance -= txn.amt_out;
        }
        if let Some(tgt) = self.accounts.get_mut(&raw.tgt_id) {
            tgt.balance += txn.amt_in;
        }
    }
}

/// Selects the configured heuristic and runs `transactions` through a
/// monomorphized `Engine<P>`, avoiding a `Box<dyn Policy>` indirection.
pub fn run(
    config: Config,
    transactions: impl Iterator<Item = RawTransaction>,
    report: &mut Report,
    mut sink: impl FnMut(Flow),
) -> Result<(), crate::errors::ConfigError> {
    match config.follow_heuristic {
        Heuristic::NoTracking => run_with::<NoTracking>(config, transactions, report, &mut sink),
        Heuristic::Greedy => run_with::<Greedy>(config, transactions, report, &mut sink),
        Heuristic::WellMixed => run_with::<WellMixed>(config, transactions, report, &mut sink),
    }
}

fn run_with<P: Policy>(
    config: Config,
    transactions: impl Iterator<Item = RawTransaction>,
    report: &mut Report,
    sink: &mut dyn FnMut(Flow),
) -> Result<(), crate::errors::ConfigError> {
    let mut engine = Engine::<P>::new(config)?;
    for raw in transactions {
        engine.note_account_categ(&raw.src_id, raw.src_categ.as_deref());
        engine.note_account_categ(&raw.tgt_id, raw.tgt_categ.as_deref());
        engine.sweep_time_cutoff(raw.timestamp, &raw.src_id, &raw.tgt_id, sink);
        engine.process(raw, report, sink);
    }
    engine.finish(report, sink);
    Ok(())
}

#[cfg(test)]
mod prop_tests;

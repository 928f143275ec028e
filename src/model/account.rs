//! An account: running balance, optional tracker, category tag.
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::basis::{Flow, Policy, Tracker};

#[derive(Debug)]
pub struct Account<P: Policy> {
    pub id: String,
    pub starting_balance: Decimal,
    pub balance: Decimal,
    pub categ: Option<String>,
    pub tracked: bool,
    pub tracker: Option<Tracker<P>>,
}

impl<P: Policy> Account<P> {
    pub fn new(id: impl Into<String>, starting_balance: Decimal) -> Self {
        Self {
            id: id.into(),
            starting_balance,
            balance: starting_balance,
            categ: None,
            tracked: false,
            tracker: None,
        }
    }

    pub fn has_tracker(&self) -> bool {
        self.tracker.is_some()
    }

    /// Lazily instantiates the tracker on first appearance as a tracked
    /// side of a transaction.
    pub fn ensure_tracker(
        &mut self,
        time_cutoff: Option<Duration>,
        resolution_limit: Decimal,
        infer: bool,
        window_start: DateTime<Utc>,
    ) -> &mut Tracker<P> {
        let balance = self.balance;
        let id = self.id.clone();
        self.tracker
            .get_or_insert_with(|| Tracker::new(time_cutoff, resolution_limit, infer, balance, &id, window_start))
    }

    pub fn adjust_balance_up(&mut self, missing: Decimal, window_start: DateTime<Utc>) {
        if let Some(tracker) = &mut self.tracker {
            tracker.adjust_up(missing, &self.id, window_start);
        }
        self.starting_balance += missing;
        self.balance += missing;
    }

    pub fn adjust_balance_down(&mut self, extra: Decimal, window_end: DateTime<Utc>) -> Vec<Flow> {
        let flows = if let Some(tracker) = &mut self.tracker {
            tracker.adjust_down(extra, self.balance, &self.id, window_end)
        } else {
            Vec::new()
        };
        self.balance -= extra;
        flows
    }

    pub fn close_out(&mut self) {
        self.balance = Decimal::ZERO;
        self.tracker = None;
    }
}

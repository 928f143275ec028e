//! Run configuration: the knobs governing a single run, loaded once at setup.
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::ConfigError;
use crate::model::boundary::Boundary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Heuristic {
    #[serde(rename = "no-tracking")]
    NoTracking,
    #[serde(rename = "greedy")]
    Greedy,
    #[serde(rename = "well-mixed")]
    WellMixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeConvention {
    Sender,
    Recipient,
    Split,
}

impl FeeConvention {
    /// Returns `(amt_out, amt_in, fee)`.
    pub fn apply(&self, amt: Decimal, src_fee: Decimal, tgt_fee: Decimal) -> (Decimal, Decimal, Decimal) {
        match self {
            FeeConvention::Sender => (amt + src_fee, amt, src_fee),
            FeeConvention::Recipient => (amt, amt - tgt_fee, tgt_fee),
            FeeConvention::Split => (amt + src_fee, amt - tgt_fee, src_fee + tgt_fee),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceConvention {
    Pre,
    Post,
}

impl BalanceConvention {
    /// Recovers the pre-transaction `(src_balance, tgt_balance)` a record
    /// reports.
    pub fn pre_balances(
        &self,
        src_balance: Decimal,
        tgt_balance: Decimal,
        amt_out: Decimal,
        amt_in: Decimal,
    ) -> (Decimal, Decimal) {
        match self {
            BalanceConvention::Pre => (src_balance, tgt_balance),
            BalanceConvention::Post => (src_balance + amt_out, tgt_balance - amt_in),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub follow_heuristic: Heuristic,
    #[serde(default)]
    pub time_cutoff: Option<f64>,
    #[serde(default = "default_resolution_limit")]
    pub resolution_limit: Decimal,
    #[serde(default)]
    pub infer: bool,
    #[serde(default)]
    pub no_balance: bool,
    pub fee_convention: FeeConvention,
    pub boundary: Boundary,
    pub balance_convention: BalanceConvention,
    pub timeformat: String,
    pub timewindow: (String, String),
    pub transaction_header: Vec<String>,
}

fn default_resolution_limit() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

impl Config {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(ConfigError::Json)
    }

    pub fn time_cutoff_duration(&self) -> Option<chrono::Duration> {
        self.time_cutoff.map(|hours| chrono::Duration::milliseconds((hours * 3_600_000.0) as i64))
    }

    pub fn window(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ConfigError> {
        let parse = |s: &str| -> Result<DateTime<Utc>, ConfigError> {
            NaiveDateTime::parse_from_str(s, &self.timeformat)
                .map(|naive| naive.and_utc())
                .map_err(|e| ConfigError::TimeWindow(s.to_string(), self.timeformat.clone(), e))
        };
        Ok((parse(&self.timewindow.0)?, parse(&self.timewindow.1)?))
    }
}

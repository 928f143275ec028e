//! CSV ingestion: raw rows (keyed by the configured `transaction_header`,
//! mirroring `csv.DictReader(txn_file, system.txn_header, ...)` in the
//! original) are parsed into `RawTransaction`s, resolving each side's
//! boundary category along the way.
use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::engine::RawTransaction;
use crate::errors::{CsvError, TransactionError};
use crate::model::boundary::{Boundary, CategoryInference};
use crate::model::config::Config;
use crate::model::report::Report;

/// One un-typed row, keyed by the column names in `Config::transaction_header`.
#[derive(Debug, Clone, Default)]
struct Row(HashMap<String, String>);

impl Row {
    fn from_record(header: &[String], record: &csv::StringRecord) -> Self {
        Row(header.iter().cloned().zip(record.iter().map(str::to_string)).collect())
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }

    fn required(&self, key: &str, txn_id: &str) -> Result<&str, TransactionError> {
        self.field(key).ok_or_else(|| TransactionError::MalformedRow(format!("txn `{txn_id}`: missing `{key}`")))
    }

    fn decimal(&self, key: &str, default: Decimal) -> Result<Decimal, TransactionError> {
        match self.field(key) {
            Some(s) => s.parse().map_err(|e| TransactionError::Decimal(s.to_string(), e)),
            None => Ok(default),
        }
    }

    fn opt_decimal(&self, key: &str) -> Result<Option<Decimal>, TransactionError> {
        match self.field(key) {
            Some(s) => Ok(Some(s.parse().map_err(|e| TransactionError::Decimal(s.to_string(), e))?)),
            None => Ok(None),
        }
    }

    /// Tries each key in order, falling back to `default` if none are present.
    fn decimal_any(&self, keys: &[&str], default: Decimal) -> Result<Decimal, TransactionError> {
        for key in keys {
            if let Some(s) = self.field(key) {
                return s.parse().map_err(|e| TransactionError::Decimal(s.to_string(), e));
            }
        }
        Ok(default)
    }
}

fn parse_timestamp(row: &Row, timeformat: &str) -> Result<DateTime<Utc>, TransactionError> {
    let raw = row.required("timestamp", "<unknown>")?;
    NaiveDateTime::parse_from_str(raw, timeformat)
        .map(|naive| naive.and_utc())
        .map_err(|e| TransactionError::Timestamp(raw.to_string(), timeformat.to_string(), e))
}

/// Reads every row from `path`, resolving categories via `boundary` (with a
/// pre-scan for the `inferred_accounts[+otc]` variants, per
/// `infer_account_categories` in the original), and returns them in file
/// order, ready for `crate::engine::run`. A row that fails to parse (bad CSV
/// syntax, or a missing/malformed field) is logged to `report` and skipped
/// rather than aborting the whole read.
pub fn read_transactions(
    path: impl AsRef<Path>,
    config: &Config,
    report: &mut Report,
) -> Result<Vec<RawTransaction>, CsvError> {
    let resolved_categs = if config.boundary.needs_inference() {
        let mut inference = CategoryInference::new();
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path.as_ref())?;
        for result in reader.records() {
            let Ok(record) = result else { continue };
            let row = Row::from_record(&config.transaction_header, &record);
            let Some(src_id) = row.field("src_ID") else { continue };
            let Some(tgt_id) = row.field("tgt_ID") else { continue };
            let Some(type_tag) = row.field("type") else { continue };
            inference.observe(&config.boundary, src_id, tgt_id, type_tag);
        }
        inference.resolve(&config.boundary)
    } else {
        HashMap::new()
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path.as_ref())?;
    let mut out = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                report.malformed_row(row_no, &err);
                continue;
            }
        };
        let row = Row::from_record(&config.transaction_header, &record);
        debug!("Deserialized row: {row:?}");
        match parse_row(&row, &config.boundary, &resolved_categs, &config.timeformat) {
            Ok(txn) => out.push(txn),
            Err(err) => report.malformed_row(row_no, &err),
        }
    }
    Ok(out)
}

fn parse_row(
    row: &Row,
    boundary: &Boundary,
    resolved_categs: &HashMap<String, String>,
    timeformat: &str,
) -> Result<RawTransaction, TransactionError> {
    let src_id = row.required("src_ID", "<unknown>")?.to_string();
    let tgt_id = row.required("tgt_ID", "<unknown>")?.to_string();
    let txn_id = row.field("txn_ID").unwrap_or("").to_string();
    let timestamp = parse_timestamp(row, timeformat)?;
    let type_tag = row.field("type").unwrap_or("transfer").to_string();
    let amt = row.decimal("amt", Decimal::ZERO)?;
    let src_fee = row.decimal_any(&["src_fee", "fee"], Decimal::ZERO)?;
    let tgt_fee = row.decimal("tgt_fee", Decimal::ZERO)?;
    let src_balance = row.opt_decimal("src_balance")?;
    let tgt_balance = row.opt_decimal("tgt_balance")?;

    let src_categ = row
        .field("src_categ")
        .map(str::to_string)
        .or_else(|| resolved_categs.get(&src_id).cloned());
    let tgt_categ = row
        .field("tgt_categ")
        .map(str::to_string)
        .or_else(|| resolved_categs.get(&tgt_id).cloned());

    let (categ, retyped) = boundary.categorize(&type_tag, src_categ.as_deref(), tgt_categ.as_deref());
    let type_tag = retyped.unwrap_or(type_tag);

    Ok(RawTransaction {
        txn_id,
        timestamp,
        src_id,
        tgt_id,
        type_tag,
        categ,
        amt,
        src_fee,
        tgt_fee,
        src_balance,
        tgt_balance,
        src_categ,
        tgt_categ,
    })
}

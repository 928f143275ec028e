//! The run report: an append-only sink for diagnostics.
use std::collections::BTreeSet;
use std::fmt;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub txn_id: String,
    pub phase: &'static str,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct Report {
    pub input_file: String,
    pub output_file: String,
    entries: Vec<ReportEntry>,
    inconsistents: BTreeSet<String>,
    flush_failures: Vec<String>,
}

impl Report {
    pub fn new(input_file: impl Into<String>, output_file: impl Into<String>) -> Self {
        Self { input_file: input_file.into(), output_file: output_file.into(), ..Self::default() }
    }

    pub fn pre_check_failure(&mut self, txn_id: impl Into<String>, err: &(dyn std::error::Error)) {
        let txn_id = txn_id.into();
        warn!(txn_id = %txn_id, phase = "pre-check", error = %err, "transaction pre-check failed");
        self.entries.push(ReportEntry { txn_id, phase: "pre-check", detail: err.to_string() });
    }

    pub fn malformed_row(&mut self, row_no: usize, err: &(dyn std::error::Error)) {
        warn!(row = row_no, error = %err, "malformed transaction row, skipped");
        self.entries.push(ReportEntry { txn_id: format!("row {row_no}"), phase: "ingestion", detail: err.to_string() });
    }

    pub fn boundary_inconsistent(&mut self, acct_id: impl Into<String>) {
        self.inconsistents.insert(acct_id.into());
    }

    pub fn flush_failure(&mut self, acct_id: impl Into<String>, err: &(dyn std::error::Error)) {
        let acct_id = acct_id.into();
        warn!(acct_id = %acct_id, error = %err, "end-of-stream flush failed");
        self.flush_failures.push(acct_id);
    }

    pub fn inconsistents(&self) -> &BTreeSet<String> {
        &self.inconsistents
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Running 'follow the money' for: {}", self.input_file)?;
        writeln!(f, "Output written to: {}", self.output_file)?;
        if !self.entries.is_empty() {
            writeln!(f, "UNTRACKED TRANSACTIONS:")?;
            for entry in &self.entries {
                writeln!(f, "  [{}] {}: {}", entry.phase, entry.txn_id, entry.detail)?;
            }
        }
        if !self.inconsistents.is_empty() {
            writeln!(f, "INCONSISTENT BOUNDARY AT ACCOUNTS:")?;
            for acct_id in &self.inconsistents {
                writeln!(f, "  {acct_id}")?;
            }
        }
        if !self.flush_failures.is_empty() {
            writeln!(f, "FAILED: REMAINING FUNDS:")?;
            for acct_id in &self.flush_failures {
                writeln!(f, "  {acct_id}")?;
            }
        }
        Ok(())
    }
}

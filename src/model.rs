//! Domain types: transactions, accounts, boundary rules, configuration, reporting.
pub mod account;
pub mod boundary;
pub mod config;
pub mod report;
pub mod transaction;

pub use account::Account;
pub use boundary::{Boundary, CategoryInference};
pub use config::{BalanceConvention, Config, FeeConvention, Heuristic};
pub use report::Report;
pub use transaction::{Category, Transaction};

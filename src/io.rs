//! CSV boundary: transaction ingestion and flow emission.
pub mod flows;
pub mod transactions;

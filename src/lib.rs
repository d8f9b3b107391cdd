//! Quotation, invoice, and receipt ledger with a small customer CRM.
//!
//! Documents of one project share a `base_id`; balances are derived from
//! the records on every read. Storage is a directory of CSV tables.

pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod settings;

pub use error::{ConfigError, DatabaseError, LedgerError};
pub use ledger::Ledger;

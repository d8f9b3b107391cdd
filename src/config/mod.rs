//! Runtime configuration.
//!
//! Values come from `settings.toml` in the data directory, overridden by
//! `LEDGER_*` environment variables (a `.env` file is loaded first by the
//! binary).

pub(crate) mod helpers;
mod ledger;

pub use ledger::{ActivityConfig, BaseIdStrategy, LedgerConfig, default_data_dir};

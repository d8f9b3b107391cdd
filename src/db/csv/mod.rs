//! File-backed document store.
//!
//! Each table is one CSV file in the data directory. Reads are tolerant: a
//! missing file is an empty table and a file that is not valid CSV is an
//! empty table plus a warning. The corrupt file is moved aside to
//! `<file>.corrupt-<timestamp>` before the next write replaces it. Every
//! write is a whole-table snapshot written to `<file>.tmp` and renamed into
//! place.

mod customers;
mod products;
mod records;
mod users;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::Mutex;

use crate::db::{Database, User};
use crate::error::DatabaseError;

/// Static description of one CSV table.
pub(crate) struct Table {
    pub name: &'static str,
    pub file: &'static str,
    /// Column order used when writing.
    pub columns: &'static [&'static str],
    /// Columns that must be present in an existing header.
    pub required: &'static [&'static str],
}

#[derive(Debug, Default)]
struct TableState {
    corrupt: bool,
}

/// One data row, values aligned to [`Table::columns`].
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub line: u64,
    columns: &'static [&'static str],
    values: Vec<String>,
}

impl Row {
    /// Trimmed value of `column`, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

enum Parsed {
    Rows(Vec<Row>),
    Corrupt(String),
}

/// CSV storage rooted at a data directory.
pub struct CsvBackend {
    dir: PathBuf,
    records: Mutex<TableState>,
    customers: Mutex<TableState>,
    products: Mutex<TableState>,
    users: Mutex<TableState>,
}

impl CsvBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            records: Mutex::new(TableState::default()),
            customers: Mutex::new(TableState::default()),
            products: Mutex::new(TableState::default()),
            users: Mutex::new(TableState::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, table: &Table) -> PathBuf {
        self.dir.join(table.file)
    }

    async fn read_rows(
        &self,
        table: &Table,
        state: &mut TableState,
    ) -> Result<Vec<Row>, DatabaseError> {
        let path = self.path_for(table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(table = table.name, "Table file missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(DatabaseError::io(path, e)),
        };

        match parse_rows(table, &bytes)? {
            Parsed::Rows(rows) => {
                tracing::debug!(table = table.name, rows = rows.len(), "Loaded table");
                Ok(rows)
            }
            Parsed::Corrupt(reason) => {
                tracing::warn!(
                    table = table.name,
                    path = %path.display(),
                    "Table file is not valid CSV, treating as empty: {}",
                    reason
                );
                state.corrupt = true;
                Ok(Vec::new())
            }
        }
    }

    async fn write_rows(
        &self,
        table: &Table,
        state: &mut TableState,
        rows: &[Vec<String>],
    ) -> Result<(), DatabaseError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DatabaseError::io(&self.dir, e))?;

        let path = self.path_for(table);
        if state.corrupt {
            self.preserve_corrupt(table, &path).await?;
            state.corrupt = false;
        }

        let body = encode_rows(table, rows)?;
        let tmp = self.dir.join(format!("{}.tmp", table.file));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| DatabaseError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| DatabaseError::io(&path, e))?;
        tracing::debug!(table = table.name, rows = rows.len(), "Wrote table");
        Ok(())
    }

    async fn preserve_corrupt(&self, table: &Table, path: &Path) -> Result<(), DatabaseError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        let backup = self.dir.join(format!(
            "{}.corrupt-{}",
            table.file,
            Local::now().format("%Y%m%d%H%M%S")
        ));
        tokio::fs::rename(path, &backup)
            .await
            .map_err(|e| DatabaseError::io(&backup, e))?;
        tracing::warn!(
            table = table.name,
            backup = %backup.display(),
            "Preserved corrupt table file before overwrite"
        );
        Ok(())
    }

    /// Create `table` holding `seed` when its file does not exist yet.
    async fn ensure_table(
        &self,
        table: &Table,
        state: &Mutex<TableState>,
        seed: &[Vec<String>],
    ) -> Result<(), DatabaseError> {
        let mut state = state.lock().await;
        let path = self.path_for(table);
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| DatabaseError::io(&path, e))?
        {
            return Ok(());
        }
        self.write_rows(table, &mut state, seed).await
    }
}

fn parse_rows(table: &Table, bytes: &[u8]) -> Result<Parsed, DatabaseError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Parsed::Rows(Vec::new()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return Ok(Parsed::Corrupt(e.to_string())),
    };

    let positions: Vec<Option<usize>> = table
        .columns
        .iter()
        .map(|column| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
        })
        .collect();

    for required in table.required {
        let present = table
            .columns
            .iter()
            .zip(&positions)
            .any(|(column, pos)| column == required && pos.is_some());
        if !present {
            return Err(DatabaseError::SchemaMismatch {
                table: table.name.to_string(),
                column: (*required).to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => return Ok(Parsed::Corrupt(e.to_string())),
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let values = positions
            .iter()
            .map(|pos| {
                pos.and_then(|idx| record.get(idx))
                    .unwrap_or("")
                    .to_string()
            })
            .collect();
        rows.push(Row {
            line: record
                .position()
                .map(|p| p.line())
                .unwrap_or(i as u64 + 2),
            columns: table.columns,
            values,
        });
    }
    Ok(Parsed::Rows(rows))
}

fn encode_rows(table: &Table, rows: &[Vec<String>]) -> Result<Vec<u8>, DatabaseError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.columns)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| DatabaseError::Serialization(e.error().to_string()))
}

/// Accept `YYYY-MM-DD`, or a longer timestamp by its date prefix.
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a stored amount. Blank is zero. Thousands separators and a leading
/// currency code (`AED 1,350.00`) are tolerated. `None` means unparseable.
pub(crate) fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim();
    if trimmed.is_empty() {
        return Some(Decimal::ZERO);
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

pub(crate) fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Whole non-negative number; `2.0` (as spreadsheets export it) reads as 2.
pub(crate) fn parse_count(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    trimmed
        .parse::<u32>()
        .ok()
        .or_else(|| parse_amount(trimmed).and_then(|d| d.trunc().to_u32()))
}

#[async_trait]
impl Database for CsvBackend {
    async fn ensure_tables(&self) -> Result<(), DatabaseError> {
        self.ensure_table(&records::RECORDS, &self.records, &[]).await?;
        self.ensure_table(&customers::CUSTOMERS, &self.customers, &[])
            .await?;
        self.ensure_table(&products::PRODUCTS, &self.products, &[])
            .await?;

        let users_path = self.path_for(&users::USERS);
        if !tokio::fs::try_exists(&users_path)
            .await
            .map_err(|e| DatabaseError::io(&users_path, e))?
        {
            tracing::warn!(
                path = %users_path.display(),
                "Creating users table with the default PINs; change them before sharing this data directory"
            );
        }
        let seed: Vec<Vec<String>> = User::defaults().iter().map(users::user_to_values).collect();
        self.ensure_table(&users::USERS, &self.users, &seed).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_amount_tolerates_currency_and_separators() {
        assert_eq!(parse_amount("AED 1,350.00"), Some(dec!(1350.00)));
        assert_eq!(parse_amount(" 500 "), Some(dec!(500)));
        assert_eq!(parse_amount(""), Some(Decimal::ZERO));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn parse_date_accepts_timestamp_prefix() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert_eq!(parse_date("2025-01-01"), expected);
        assert_eq!(parse_date("2025-01-01 00:00:00"), expected);
        assert_eq!(parse_date("01/01/2025"), None);
    }

    #[test]
    fn parse_count_reads_spreadsheet_floats() {
        assert_eq!(parse_count("2"), Some(2));
        assert_eq!(parse_count("2.0"), Some(2));
        assert_eq!(parse_count(""), Some(0));
        assert_eq!(parse_count("-1"), None);
    }

    #[tokio::test]
    async fn ensure_tables_writes_headers_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = CsvBackend::new(dir.path());
        backend.ensure_tables().await.expect("ensure");

        let raw = std::fs::read_to_string(dir.path().join("customers.csv")).expect("read");
        assert_eq!(
            raw.trim_end(),
            "client_name,phone,location,email,status,notes,tags,next_follow_up,assigned_to,last_activity"
        );
        let products = std::fs::read_to_string(dir.path().join("products.csv")).expect("read");
        assert!(products.starts_with("Device,Description,UnitPrice"));

        std::fs::write(dir.path().join("records.csv"), "base_id,date,type,number,amount,client_name\n20250101-001,2025-01-01,q,Q1,500,Ahmed\n")
            .expect("seed");
        backend.ensure_tables().await.expect("ensure again");
        let records = std::fs::read_to_string(dir.path().join("records.csv")).expect("read");
        assert!(records.contains("Q1"));
    }
}

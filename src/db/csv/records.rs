use std::collections::HashSet;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::db::{DocType, Record, RecordStore};
use crate::error::DatabaseError;

use super::{CsvBackend, Row, Table, format_amount, format_date, parse_amount, parse_date};

pub(super) const RECORDS: Table = Table {
    name: "records",
    file: "records.csv",
    columns: &[
        "base_id",
        "date",
        "type",
        "number",
        "amount",
        "client_name",
        "phone",
        "location",
        "note",
    ],
    required: &["base_id", "date", "type", "number", "amount", "client_name"],
};

fn record_from_row(row: &Row) -> Option<Record> {
    let Some(doc_type) = DocType::from_db_value(row.get("type")) else {
        tracing::warn!(line = row.line, "Skipping record with unknown type '{}'", row.get("type"));
        return None;
    };
    let Some(date) = parse_date(row.get("date")) else {
        tracing::warn!(line = row.line, "Skipping record with invalid date '{}'", row.get("date"));
        return None;
    };
    let amount = parse_amount(row.get("amount")).unwrap_or_else(|| {
        tracing::warn!(line = row.line, "Unparseable amount '{}', using 0", row.get("amount"));
        Decimal::ZERO
    });

    Some(Record {
        base_id: row.get("base_id").to_string(),
        date,
        doc_type,
        number: row.get("number").to_string(),
        amount,
        client_name: row.get("client_name").to_string(),
        phone: row.get("phone").to_string(),
        location: row.get("location").to_string(),
        note: row.get("note").to_string(),
    })
}

fn record_to_values(record: &Record) -> Vec<String> {
    vec![
        record.base_id.clone(),
        format_date(record.date),
        record.doc_type.as_str().to_string(),
        record.number.clone(),
        format_amount(record.amount),
        record.client_name.clone(),
        record.phone.clone(),
        record.location.clone(),
        record.note.clone(),
    ]
}

/// Key of a raw row. Tags compare case-insensitively so `Q` and `q` collide.
fn raw_key(row: &Row) -> (String, String) {
    (
        row.get("type").to_ascii_lowercase(),
        row.get("number").to_string(),
    )
}

#[async_trait]
impl RecordStore for CsvBackend {
    async fn load_records(&self) -> Result<Vec<Record>, DatabaseError> {
        let mut state = self.records.lock().await;
        let rows = self.read_rows(&RECORDS, &mut state).await?;
        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    async fn save_record(&self, record: &Record) -> Result<(), DatabaseError> {
        let mut state = self.records.lock().await;
        let mut rows = self.read_rows(&RECORDS, &mut state).await?;

        // Rows that fail to parse are kept verbatim; only the key matters here.
        let key = (record.doc_type.as_str().to_string(), record.number.trim().to_string());
        rows.retain(|row| raw_key(row) != key);

        let mut seen = HashSet::new();
        let mut kept: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        kept.push(record_to_values(record));
        seen.insert(key);
        for row in rows.into_iter().rev() {
            if seen.insert(raw_key(&row)) {
                kept.push(row.into_values());
            }
        }
        kept.reverse();

        self.write_rows(&RECORDS, &mut state, &kept).await?;
        tracing::info!(
            doc_type = record.doc_type.as_str(),
            number = %record.number,
            base_id = %record.base_id,
            "Saved record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::Database;

    fn record(doc_type: DocType, number: &str, amount: Decimal) -> Record {
        Record {
            base_id: "20250101-001".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
            doc_type,
            number: number.to_string(),
            amount,
            client_name: "Ahmed Omer".to_string(),
            phone: "0501234567".to_string(),
            location: "Dubai - Marina".to_string(),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn save_record_replaces_same_type_and_number() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = CsvBackend::new(dir.path());

        backend
            .save_record(&record(DocType::Quotation, "Q1", dec!(500)))
            .await
            .expect("save");
        backend
            .save_record(&record(DocType::Invoice, "Q1", dec!(500)))
            .await
            .expect("save");
        backend
            .save_record(&record(DocType::Quotation, "Q2", dec!(100)))
            .await
            .expect("save");
        backend
            .save_record(&record(DocType::Quotation, "Q1", dec!(750)))
            .await
            .expect("save");

        let records = backend.load_records().await.expect("load");
        let keys: Vec<_> = records.iter().map(|r| (r.doc_type, r.number.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (DocType::Invoice, "Q1"),
                (DocType::Quotation, "Q2"),
                (DocType::Quotation, "Q1"),
            ]
        );
        assert_eq!(records[2].amount, dec!(750));
    }

    #[tokio::test]
    async fn save_record_collapses_duplicates_already_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("records.csv"),
            "base_id,date,type,number,amount,client_name,phone,location,note\n\
             20250101-001,2025-01-01,q,Q1,100,A,,,\n\
             20250101-001,2025-01-01,Q,Q1,200,A,,,\n\
             20250101-002,2025-01-01,q,Q2,300,B,,,\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        backend
            .save_record(&record(DocType::Invoice, "I1", dec!(300)))
            .await
            .expect("save");

        let records = backend.load_records().await.expect("load");
        assert_eq!(records.len(), 3);
        let q1: Vec<_> = records.iter().filter(|r| r.number == "Q1").collect();
        assert_eq!(q1.len(), 1);
        assert_eq!(q1[0].amount, dec!(200));
    }

    #[tokio::test]
    async fn load_accepts_spreadsheet_style_headers_and_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("records.csv"),
            " Base_ID ,Date,TYPE,Number,Amount,Client_Name\n\
             20250101-001,2025-01-01 00:00:00,I,INV-20250101-001,\"1,350.00\",Ahmed\n\
             20250101-002,not-a-date,i,INV-20250101-002,10,Bad\n\
             20250101-003,2025-01-01,x,X-1,10,Bad\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        let records = backend.load_records().await.expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doc_type, DocType::Invoice);
        assert_eq!(records[0].amount, dec!(1350.00));
        assert_eq!(records[0].phone, "");
    }

    #[tokio::test]
    async fn missing_required_column_is_schema_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("records.csv"),
            "base_id,date,number,amount,client_name\n20250101-001,2025-01-01,Q1,5,A\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        let err = backend.load_records().await.expect_err("must fail");
        let DatabaseError::SchemaMismatch { table, column } = err else {
            panic!("expected SchemaMismatch");
        };
        assert_eq!(table, "records");
        assert_eq!(column, "type");
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty_and_is_preserved_on_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("records.csv"), [0xff, 0xfe, 0x00, 0x41, 0x0a])
            .expect("seed");
        let backend = CsvBackend::new(dir.path());

        assert!(backend.load_records().await.expect("load").is_empty());

        backend
            .save_record(&record(DocType::Quotation, "Q1", dec!(500)))
            .await
            .expect("save");
        assert_eq!(backend.load_records().await.expect("load").len(), 1);

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("records.csv.corrupt-")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(!dir.path().join("records.csv.tmp").exists());
    }

    #[tokio::test]
    async fn ensure_tables_then_load_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = CsvBackend::new(dir.path().join("nested"));
        backend.ensure_tables().await.expect("ensure");
        assert!(backend.load_records().await.expect("load").is_empty());
    }
}

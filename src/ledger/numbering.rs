//! Base id and document number minting.

use chrono::NaiveDate;

use crate::config::BaseIdStrategy;
use crate::db::{DocType, Record};

/// `YYYYMMDD` form of a date, the prefix of every id minted that day.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Next project id for `date`, `YYYYMMDD-NNN`.
///
/// With [`BaseIdStrategy::Count`] the sequence is the number of records
/// whose base id contains the date key, plus one. Records of one project
/// share a base id, so a day with one quotation and its invoice yields
/// `-003` next. [`BaseIdStrategy::MaxPlusOne`] uses the highest same-day
/// sequence instead.
pub fn next_base_id(records: &[Record], date: NaiveDate, strategy: BaseIdStrategy) -> String {
    let key = date_key(date);
    let seq = match strategy {
        BaseIdStrategy::Count => {
            records
                .iter()
                .filter(|r| r.base_id.contains(&key))
                .count()
                + 1
        }
        BaseIdStrategy::MaxPlusOne => {
            let prefix = format!("{key}-");
            records
                .iter()
                .filter_map(|r| r.base_id.strip_prefix(&prefix))
                .filter_map(|tail| tail.trim().parse::<usize>().ok())
                .max()
                .unwrap_or(0)
                + 1
        }
    };
    format!("{key}-{seq:03}")
}

fn next_document_number(records: &[Record], date: NaiveDate, doc_type: DocType, prefix: &str) -> String {
    let key = date_key(date);
    let mut seq = records.iter().filter(|r| r.doc_type == doc_type).count() + 1;
    loop {
        let candidate = format!("{prefix}-{key}-{seq:03}");
        let taken = records
            .iter()
            .any(|r| r.doc_type == doc_type && r.number == candidate);
        if !taken {
            return candidate;
        }
        seq += 1;
    }
}

/// `QUO-YYYYMMDD-NNN`, NNN = stored quotations + 1, skipping numbers in use.
pub fn next_quotation_number(records: &[Record], date: NaiveDate) -> String {
    next_document_number(records, date, DocType::Quotation, "QUO")
}

/// `INV-YYYYMMDD-NNN`, NNN = stored invoices + 1, skipping numbers in use.
pub fn next_invoice_number(records: &[Record], date: NaiveDate) -> String {
    next_document_number(records, date, DocType::Invoice, "INV")
}

/// `R-YYYYMMDD-<base_id>-<seq>`, seq = prior receipts of the project + 1.
pub fn next_receipt_number(records: &[Record], date: NaiveDate, base_id: &str) -> String {
    let seq = receipts_for(records, base_id).count() + 1;
    format!("R-{}-{}-{}", date_key(date), base_id, seq)
}

pub(crate) fn receipts_for<'a>(
    records: &'a [Record],
    base_id: &'a str,
) -> impl Iterator<Item = &'a Record> + 'a {
    records
        .iter()
        .filter(move |r| r.doc_type == DocType::Receipt && r.base_id == base_id)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn rec(doc_type: DocType, base_id: &str, number: &str) -> Record {
        Record {
            base_id: base_id.to_string(),
            date: day(2025, 1, 1),
            doc_type,
            number: number.to_string(),
            amount: Decimal::ZERO,
            client_name: "A".to_string(),
            phone: String::new(),
            location: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn count_strategy_counts_records_carrying_the_date() {
        let records = vec![
            rec(DocType::Quotation, "20250101-001", "QUO-20250101-001"),
            rec(DocType::Invoice, "20250101-001", "INV-20250101-001"),
            rec(DocType::Quotation, "20241231-001", "QUO-20241231-001"),
        ];
        assert_eq!(
            next_base_id(&records, day(2025, 1, 1), BaseIdStrategy::Count),
            "20250101-003"
        );
        assert_eq!(
            next_base_id(&[], day(2025, 1, 1), BaseIdStrategy::Count),
            "20250101-001"
        );
    }

    #[test]
    fn max_plus_one_ignores_linked_records() {
        let records = vec![
            rec(DocType::Quotation, "20250101-001", "Q1"),
            rec(DocType::Invoice, "20250101-001", "I1"),
            rec(DocType::Receipt, "20250101-001", "R1"),
            rec(DocType::Quotation, "20250101-004", "Q2"),
        ];
        assert_eq!(
            next_base_id(&records, day(2025, 1, 1), BaseIdStrategy::MaxPlusOne),
            "20250101-005"
        );
        assert_eq!(
            next_base_id(&records, day(2025, 1, 2), BaseIdStrategy::MaxPlusOne),
            "20250102-001"
        );
    }

    #[test]
    fn invoice_numbers_skip_numbers_in_use() {
        let records = vec![
            rec(DocType::Invoice, "20250101-001", "INV-20250101-002"),
            rec(DocType::Quotation, "20250101-001", "INV-20250101-003"),
        ];
        assert_eq!(next_invoice_number(&records, day(2025, 1, 1)), "INV-20250101-003");

        let records = vec![rec(DocType::Invoice, "20250101-001", "INV-20250101-001")];
        assert_eq!(next_invoice_number(&records, day(2025, 1, 1)), "INV-20250101-002");
        assert_eq!(next_quotation_number(&records, day(2025, 1, 1)), "QUO-20250101-001");
    }

    #[test]
    fn receipt_numbers_count_per_project() {
        let records = vec![
            rec(DocType::Receipt, "20250101-001", "R-20250101-20250101-001-1"),
            rec(DocType::Receipt, "20250101-002", "R-20250101-20250101-002-1"),
        ];
        assert_eq!(
            next_receipt_number(&records, day(2025, 1, 3), "20250101-001"),
            "R-20250103-20250101-001-2"
        );
        assert_eq!(
            next_receipt_number(&records, day(2025, 1, 3), "20250101-009"),
            "R-20250103-20250101-009-1"
        );
    }
}

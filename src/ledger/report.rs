//! Reports over the ledger: filters, summary, project lifecycle, top
//! customers, and monthly totals.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{DocType, Record};
use crate::error::LedgerError;
use crate::ledger::balance::{difference, sum_of};

/// Record filter. All set bounds are inclusive; a zero amount bound is
/// treated as unset.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub doc_type: Option<DocType>,
    pub name_contains: Option<String>,
    /// Exact location label.
    pub location: Option<String>,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        if self.start.is_some_and(|start| record.date < start) {
            return false;
        }
        if self.end.is_some_and(|end| record.date > end) {
            return false;
        }
        if self.doc_type.is_some_and(|t| t != record.doc_type) {
            return false;
        }
        if let Some(needle) = self.name_contains.as_deref().map(str::trim)
            && !needle.is_empty()
            && !record
                .client_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        {
            return false;
        }
        if let Some(location) = self.location.as_deref()
            && record.location != location
        {
            return false;
        }
        if self.min_amount > Decimal::ZERO && record.amount < self.min_amount {
            return false;
        }
        if self.max_amount > Decimal::ZERO && record.amount > self.max_amount {
            return false;
        }
        true
    }

    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub quotations: usize,
    pub invoices: usize,
    pub receipts: usize,
    pub invoiced: Decimal,
    pub received: Decimal,
    pub outstanding: Decimal,
    pub projects: usize,
}

pub fn summary(records: &[Record]) -> Result<Summary, LedgerError> {
    let count = |t: DocType| records.iter().filter(|r| r.doc_type == t).count();
    let invoiced = sum_of(records, DocType::Invoice)?;
    let received = sum_of(records, DocType::Receipt)?;
    Ok(Summary {
        quotations: count(DocType::Quotation),
        invoices: count(DocType::Invoice),
        receipts: count(DocType::Receipt),
        invoiced,
        received,
        outstanding: difference(invoiced, received, "outstanding")?,
        projects: records
            .iter()
            .map(|r| r.base_id.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub base_id: String,
    pub client_name: String,
    pub phone: String,
    pub location: String,
    pub has_quotation: bool,
    pub has_invoice: bool,
    pub has_receipt: bool,
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
    pub last_update: NaiveDate,
}

/// One row per base id, ordered by base id. Client details come from the
/// project's first record.
pub fn project_lifecycle(records: &[Record]) -> Result<Vec<ProjectRow>, LedgerError> {
    let mut groups: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for record in records {
        groups.entry(record.base_id.as_str()).or_default().push(record);
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (base_id, group) in groups {
        let Some(first) = group.first() else {
            continue;
        };
        let has = |t: DocType| group.iter().any(|r| r.doc_type == t);
        let invoiced = sum_of(group.iter().copied(), DocType::Invoice)?;
        let paid = sum_of(group.iter().copied(), DocType::Receipt)?;
        rows.push(ProjectRow {
            base_id: base_id.to_string(),
            client_name: first.client_name.clone(),
            phone: first.phone.clone(),
            location: first.location.clone(),
            has_quotation: has(DocType::Quotation),
            has_invoice: has(DocType::Invoice),
            has_receipt: has(DocType::Receipt),
            invoiced,
            paid,
            remaining: difference(invoiced, paid, "remaining")?,
            last_update: group.iter().map(|r| r.date).max().unwrap_or(first.date),
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerTotals {
    pub client_name: String,
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
}

/// Invoiced and paid per client name, highest invoiced first.
pub fn top_customers(records: &[Record]) -> Result<Vec<CustomerTotals>, LedgerError> {
    let mut by_name: HashMap<&str, (Decimal, Decimal)> = HashMap::new();
    for record in records {
        let entry = by_name.entry(record.client_name.as_str()).or_default();
        let slot = match record.doc_type {
            DocType::Invoice => &mut entry.0,
            DocType::Receipt => &mut entry.1,
            DocType::Quotation => continue,
        };
        *slot = add(*slot, record.amount, "customer totals")?;
    }

    let mut rows = Vec::new();
    for name in records
        .iter()
        .filter(|r| r.doc_type != DocType::Quotation)
        .map(|r| r.client_name.as_str())
        .collect::<BTreeSet<_>>()
    {
        let (invoiced, paid) = by_name.get(name).copied().unwrap_or_default();
        rows.push(CustomerTotals {
            client_name: name.to_string(),
            invoiced,
            paid,
            balance: difference(invoiced, paid, "customer balance")?,
        });
    }
    rows.sort_by(|a, b| {
        b.invoiced
            .cmp(&a.invoiced)
            .then_with(|| a.client_name.cmp(&b.client_name))
    });
    Ok(rows)
}

fn add(total: Decimal, amount: Decimal, what: &'static str) -> Result<Decimal, LedgerError> {
    total
        .checked_add(amount)
        .ok_or(LedgerError::AmountOutOfRange(what))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthTotals {
    /// `YYYY-MM`.
    pub month: String,
    pub invoiced: Decimal,
    pub received: Decimal,
}

pub fn monthly_totals(records: &[Record]) -> Result<Vec<MonthTotals>, LedgerError> {
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for record in records {
        if record.doc_type == DocType::Quotation {
            continue;
        }
        let (invoiced, received) = months
            .entry(record.date.format("%Y-%m").to_string())
            .or_default();
        if record.doc_type == DocType::Invoice {
            *invoiced = add(*invoiced, record.amount, "monthly totals")?;
        } else {
            *received = add(*received, record.amount, "monthly totals")?;
        }
    }
    Ok(months
        .into_iter()
        .map(|(month, (invoiced, received))| MonthTotals {
            month,
            invoiced,
            received,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn rec(doc_type: DocType, base_id: &str, date: (i32, u32, u32), amount: Decimal, name: &str) -> Record {
        Record {
            base_id: base_id.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("date"),
            doc_type,
            number: format!("{}-{base_id}-{amount}", doc_type.as_str()),
            amount,
            client_name: name.to_string(),
            phone: "0501234567".to_string(),
            location: "Dubai - Marina".to_string(),
            note: String::new(),
        }
    }

    fn ledger() -> Vec<Record> {
        vec![
            rec(DocType::Quotation, "20250105-001", (2025, 1, 5), dec!(500), "Ahmed"),
            rec(DocType::Invoice, "20250105-001", (2025, 1, 6), dec!(500), "Ahmed"),
            rec(DocType::Receipt, "20250105-001", (2025, 2, 1), dec!(300), "Ahmed"),
            rec(DocType::Invoice, "20250210-001", (2025, 2, 10), dec!(1200), "Sara"),
            rec(DocType::Quotation, "20250301-001", (2025, 3, 1), dec!(80), "Omar"),
        ]
    }

    #[test]
    fn summary_counts_and_sums() {
        assert_eq!(
            summary(&ledger()).expect("summary"),
            Summary {
                quotations: 2,
                invoices: 2,
                receipts: 1,
                invoiced: dec!(1700),
                received: dec!(300),
                outstanding: dec!(1400),
                projects: 3,
            }
        );
    }

    #[test]
    fn lifecycle_rows_track_each_stage() {
        let rows = project_lifecycle(&ledger()).expect("lifecycle");
        assert_eq!(rows.len(), 3);
        let first = &rows[0];
        assert_eq!(first.base_id, "20250105-001");
        assert!(first.has_quotation && first.has_invoice && first.has_receipt);
        assert_eq!(first.remaining, dec!(200));
        assert_eq!(first.last_update, NaiveDate::from_ymd_opt(2025, 2, 1).expect("date"));
        assert!(!rows[2].has_invoice);
    }

    #[test]
    fn top_customers_sorted_by_invoiced() {
        let rows = top_customers(&ledger()).expect("top customers");
        let names: Vec<_> = rows.iter().map(|r| r.client_name.as_str()).collect();
        assert_eq!(names, vec!["Sara", "Ahmed"]);
        assert_eq!(rows[1].balance, dec!(200));
    }

    #[test]
    fn monthly_totals_group_by_month() {
        let months = monthly_totals(&ledger()).expect("monthly");
        assert_eq!(
            months,
            vec![
                MonthTotals {
                    month: "2025-01".to_string(),
                    invoiced: dec!(500),
                    received: Decimal::ZERO,
                },
                MonthTotals {
                    month: "2025-02".to_string(),
                    invoiced: dec!(1200),
                    received: dec!(300),
                },
            ]
        );
    }

    #[test]
    fn filter_combines_bounds() {
        let filter = RecordFilter {
            start: NaiveDate::from_ymd_opt(2025, 1, 6),
            end: NaiveDate::from_ymd_opt(2025, 2, 28),
            name_contains: Some("AH".to_string()),
            min_amount: dec!(400),
            ..RecordFilter::default()
        };
        let hits = filter.apply(&ledger());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_type, DocType::Invoice);

        let by_type = RecordFilter {
            doc_type: Some(DocType::Quotation),
            location: Some("Dubai - Marina".to_string()),
            ..RecordFilter::default()
        };
        assert_eq!(by_type.apply(&ledger()).len(), 2);
    }

    #[test]
    fn oversized_amounts_fail_every_report() {
        let records = vec![
            rec(DocType::Invoice, "20250105-001", (2025, 1, 5), Decimal::MAX, "Ahmed"),
            rec(DocType::Invoice, "20250105-001", (2025, 1, 6), Decimal::MAX, "Ahmed"),
        ];
        assert!(matches!(summary(&records), Err(LedgerError::AmountOutOfRange(_))));
        assert!(matches!(
            project_lifecycle(&records),
            Err(LedgerError::AmountOutOfRange(_))
        ));
        assert!(matches!(
            top_customers(&records),
            Err(LedgerError::AmountOutOfRange("customer totals"))
        ));
        assert!(matches!(
            monthly_totals(&records),
            Err(LedgerError::AmountOutOfRange("monthly totals"))
        ));
    }
}

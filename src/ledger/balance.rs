//! Running balances per customer, project, and invoice.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{DocType, Record, normalize_name, normalize_phone};
use crate::error::LedgerError;
use crate::ledger::numbering::receipts_for;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CustomerFinances {
    pub total_quoted: Decimal,
    pub total_invoiced: Decimal,
    pub total_received: Decimal,
    /// Invoiced minus received. Negative when a customer paid ahead.
    pub outstanding: Decimal,
}

impl CustomerFinances {
    pub fn as_tuple(&self) -> (Decimal, Decimal, Decimal, Decimal) {
        (
            self.total_quoted,
            self.total_invoiced,
            self.total_received,
            self.outstanding,
        )
    }
}

/// Sum of `amount` over records of one type. A stored amount large enough
/// to overflow the sum is `AmountOutOfRange`.
pub fn sum_of<'a>(
    records: impl IntoIterator<Item = &'a Record>,
    doc_type: DocType,
) -> Result<Decimal, LedgerError> {
    records
        .into_iter()
        .filter(|r| r.doc_type == doc_type)
        .try_fold(Decimal::ZERO, |acc, r| {
            acc.checked_add(r.amount)
                .ok_or(LedgerError::AmountOutOfRange(doc_type.label()))
        })
}

pub(crate) fn difference(
    minuend: Decimal,
    subtrahend: Decimal,
    what: &'static str,
) -> Result<Decimal, LedgerError> {
    minuend
        .checked_sub(subtrahend)
        .ok_or(LedgerError::AmountOutOfRange(what))
}

/// Whether a record belongs to the customer identified by `name` or `phone`.
///
/// Either signal is enough: records match on the normalized name, or on the
/// normalized phone when one is given.
pub fn matches_customer(record: &Record, name: &str, phone: Option<&str>) -> bool {
    let wanted_name = normalize_name(name);
    if !wanted_name.is_empty() && normalize_name(&record.client_name) == wanted_name {
        return true;
    }
    let wanted_phone = phone.map(normalize_phone).unwrap_or_default();
    !wanted_phone.is_empty() && normalize_phone(&record.phone) == wanted_phone
}

pub fn customer_finances(
    records: &[Record],
    name: &str,
    phone: Option<&str>,
) -> Result<CustomerFinances, LedgerError> {
    let matched: Vec<&Record> = records
        .iter()
        .filter(|r| matches_customer(r, name, phone))
        .collect();
    let total_invoiced = sum_of(matched.iter().copied(), DocType::Invoice)?;
    let total_received = sum_of(matched.iter().copied(), DocType::Receipt)?;
    Ok(CustomerFinances {
        total_quoted: sum_of(matched.iter().copied(), DocType::Quotation)?,
        total_invoiced,
        total_received,
        outstanding: difference(total_invoiced, total_received, "outstanding")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceBalance {
    pub number: String,
    pub base_id: String,
    pub invoice_total: Decimal,
    pub paid: Decimal,
    /// Never negative.
    pub remaining: Decimal,
}

/// Balance of one invoice. Receipts are linked by the invoice's base id.
pub fn invoice_balance(records: &[Record], invoice: &Record) -> Result<InvoiceBalance, LedgerError> {
    let paid = sum_of(receipts_for(records, &invoice.base_id), DocType::Receipt)?;
    Ok(InvoiceBalance {
        number: invoice.number.clone(),
        base_id: invoice.base_id.clone(),
        invoice_total: invoice.amount,
        paid,
        remaining: difference(invoice.amount, paid, "remaining")?.max(Decimal::ZERO),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectBalance {
    pub base_id: String,
    pub client_name: String,
    pub quoted: Decimal,
    pub invoiced: Decimal,
    pub paid: Decimal,
    pub remaining: Decimal,
}

/// Totals for all records sharing `base_id`; `Ok(None)` when there are none.
pub fn project_balance(
    records: &[Record],
    base_id: &str,
) -> Result<Option<ProjectBalance>, LedgerError> {
    let project: Vec<&Record> = records.iter().filter(|r| r.base_id == base_id).collect();
    let Some(first) = project.first() else {
        return Ok(None);
    };
    let invoiced = sum_of(project.iter().copied(), DocType::Invoice)?;
    let paid = sum_of(project.iter().copied(), DocType::Receipt)?;
    Ok(Some(ProjectBalance {
        base_id: base_id.to_string(),
        client_name: first.client_name.clone(),
        quoted: sum_of(project.iter().copied(), DocType::Quotation)?,
        invoiced,
        paid,
        remaining: difference(invoiced, paid, "remaining")?.max(Decimal::ZERO),
    }))
}

/// Result of fitting a payment request into an invoice's remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentCap {
    pub remaining_before: Decimal,
    pub accepted: Decimal,
    pub capped: bool,
    pub remaining_after: Decimal,
}

/// Clamp `requested` to `max(invoice_total - previous_paid, 0)`.
pub fn cap_payment(
    invoice_total: Decimal,
    previous_paid: Decimal,
    requested: Decimal,
) -> Result<PaymentCap, LedgerError> {
    let remaining_before =
        difference(invoice_total, previous_paid, "remaining")?.max(Decimal::ZERO);
    let accepted = requested.min(remaining_before);
    Ok(PaymentCap {
        remaining_before,
        accepted,
        capped: accepted < requested,
        remaining_after: difference(remaining_before, accepted, "remaining")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    fn rec(doc_type: DocType, base_id: &str, amount: Decimal, name: &str, phone: &str) -> Record {
        Record {
            base_id: base_id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
            doc_type,
            number: format!("{}-{}", doc_type.as_str(), base_id),
            amount,
            client_name: name.to_string(),
            phone: phone.to_string(),
            location: String::new(),
            note: String::new(),
        }
    }

    #[test]
    fn finances_match_on_name_or_phone() {
        let records = vec![
            rec(DocType::Quotation, "B1", dec!(500), "Ahmed Omer", "0501234567"),
            rec(DocType::Invoice, "B1", dec!(500), " ahmed omer ", ""),
            rec(DocType::Receipt, "B1", dec!(300), "A. Omer", "+971 50 123 4567"),
            rec(DocType::Invoice, "B2", dec!(900), "Someone Else", "0559999999"),
        ];
        let finances =
            customer_finances(&records, "Ahmed Omer", Some("0501234567")).expect("finances");
        assert_eq!(finances.as_tuple(), (dec!(500), dec!(500), dec!(300), dec!(200)));

        let by_name_only = customer_finances(&records, "AHMED OMER", None).expect("finances");
        assert_eq!(by_name_only.total_received, Decimal::ZERO);
        assert_eq!(by_name_only.outstanding, dec!(500));
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        assert_eq!(
            customer_finances(&[], "Nobody", Some("")).expect("finances"),
            CustomerFinances::default()
        );
    }

    #[test]
    fn outstanding_can_go_negative_but_remaining_cannot() {
        let records = vec![
            rec(DocType::Invoice, "B1", dec!(100), "A", ""),
            rec(DocType::Receipt, "B1", dec!(150), "A", ""),
        ];
        assert_eq!(
            customer_finances(&records, "a", None).expect("finances").outstanding,
            dec!(-50)
        );
        assert_eq!(
            invoice_balance(&records, &records[0]).expect("balance").remaining,
            Decimal::ZERO
        );
        assert_eq!(
            project_balance(&records, "B1")
                .expect("project")
                .map(|p| p.remaining),
            Some(Decimal::ZERO)
        );
        assert_eq!(project_balance(&records, "B9").expect("project"), None);
    }

    #[test]
    fn cap_payment_clamps_to_remaining() {
        let cap = cap_payment(dec!(1000), dec!(800), dec!(500)).expect("cap");
        assert_eq!(cap.accepted, dec!(200));
        assert!(cap.capped);
        assert_eq!(cap.remaining_after, Decimal::ZERO);

        let cap = cap_payment(dec!(1000), dec!(0), dec!(250)).expect("cap");
        assert_eq!(cap.accepted, dec!(250));
        assert!(!cap.capped);
        assert_eq!(cap.remaining_after, dec!(750));
    }

    #[test]
    fn oversized_stored_amounts_are_an_error() {
        let records = vec![
            rec(DocType::Invoice, "B1", Decimal::MAX, "A", ""),
            rec(DocType::Invoice, "B2", Decimal::MAX, "A", ""),
        ];
        assert!(matches!(
            customer_finances(&records, "A", None),
            Err(LedgerError::AmountOutOfRange(_))
        ));
        assert!(matches!(
            sum_of(&records, DocType::Invoice),
            Err(LedgerError::AmountOutOfRange("Invoice"))
        ));
        assert!(project_balance(&records, "B1").is_ok());

        let paid_ahead = vec![
            rec(DocType::Invoice, "B1", Decimal::MIN, "A", ""),
            rec(DocType::Receipt, "B1", Decimal::MAX, "A", ""),
        ];
        assert!(matches!(
            invoice_balance(&paid_ahead, &paid_ahead[0]),
            Err(LedgerError::AmountOutOfRange("remaining"))
        ));
        assert!(matches!(
            cap_payment(Decimal::MIN, Decimal::MAX, dec!(1)),
            Err(LedgerError::AmountOutOfRange(_))
        ));
    }
}

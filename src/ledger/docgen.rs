//! Document rendering: key/value contexts for quotations, invoices, and
//! receipts, filled into `tera` templates.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tera::{Context, Tera};

use crate::db::{Record, format_phone_display};
use crate::error::LedgerError;
use crate::ledger::pricing::{LineItem, Totals};
use crate::settings::Settings;

pub const DEFAULT_QUOTATION_TEMPLATE: &str = include_str!("../../templates/quotation.html");
pub const DEFAULT_INVOICE_TEMPLATE: &str = include_str!("../../templates/invoice.html");
pub const DEFAULT_RECEIPT_TEMPLATE: &str = include_str!("../../templates/receipt.html");

/// `1350.5` -> `1,350.50`.
pub fn format_money(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.round_dp(2));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac}")
}

fn phone_for_print(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "N/A".to_string();
    }
    format_phone_display(raw).unwrap_or_else(|| raw.trim().to_string())
}

fn company(settings: &Settings) -> Value {
    serde_json::json!({
        "name": settings.company_name,
        "email": settings.contact_email,
        "phone": settings.contact_phone,
        "bank_account": settings.bank_account,
    })
}

fn items_value(items: &[LineItem]) -> Value {
    Value::Array(
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::json!({
                    "item_no": i + 1,
                    "device": item.device,
                    "description": item.description,
                    "qty": item.qty.normalize().to_string(),
                    "unit_price": format_money(item.unit_price),
                    "line_total": item.total().map(format_money).unwrap_or_default(),
                    "warranty_years": item.warranty_years,
                    "image": item.image,
                })
            })
            .collect(),
    )
}

/// Totals for a stored record with no line-level breakdown.
fn flat_totals(amount: Decimal) -> Totals {
    Totals {
        subtotal: amount,
        installation: Decimal::ZERO,
        total_discount: Decimal::ZERO,
        grand_total: amount,
    }
}

pub struct QuotationDoc<'a> {
    pub record: &'a Record,
    pub items: &'a [LineItem],
    pub totals: Option<&'a Totals>,
    pub discount_value: Decimal,
    pub discount_percent: Decimal,
    pub prepared_by: &'a str,
    pub approved_by: &'a str,
}

pub fn quotation_context(doc: &QuotationDoc<'_>, settings: &Settings) -> Value {
    let flat = flat_totals(doc.record.amount);
    let totals = doc.totals.unwrap_or(&flat);
    serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "currency": settings.currency,
        "company": company(settings),
        "date": doc.record.date.to_string(),
        "base_id": doc.record.base_id,
        "client_name": doc.record.client_name,
        "quote_no": doc.record.number,
        "client_location": doc.record.location,
        "client_phone": phone_for_print(&doc.record.phone),
        "client_email": "N/A",
        "prepared_by": doc.prepared_by,
        "approved_by": doc.approved_by,
        "items": items_value(doc.items),
        "total1": format_money(totals.subtotal),
        "Price": format_money(totals.subtotal),
        "installation_cost": format_money(totals.installation),
        "discount_value": format_money(doc.discount_value),
        "discount_percent": doc.discount_percent.round().to_string(),
        "total_discount": format_money(totals.total_discount),
        "Total": format_money(totals.grand_total),
        "grand_total": format_money(totals.grand_total),
        "grand_total_value": totals.grand_total,
    })
}

pub struct InvoiceDoc<'a> {
    pub record: &'a Record,
    pub items: &'a [LineItem],
    pub totals: Option<&'a Totals>,
    pub discount_value: Decimal,
    pub discount_percent: Decimal,
}

pub fn invoice_context(doc: &InvoiceDoc<'_>, settings: &Settings) -> Value {
    let flat = flat_totals(doc.record.amount);
    let totals = doc.totals.unwrap_or(&flat);
    serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "currency": settings.currency,
        "company": company(settings),
        "date": doc.record.date.to_string(),
        "base_id": doc.record.base_id,
        "client_name": doc.record.client_name,
        "invoice_no": doc.record.number,
        "quotation_no": doc.record.note,
        "client_location": doc.record.location,
        "client_phone": phone_for_print(&doc.record.phone),
        "items": items_value(doc.items),
        "total_products": format_money(totals.subtotal),
        "installation": format_money(totals.installation),
        "discount_value": format_money(doc.discount_value),
        "discount_percent": doc.discount_percent.round().to_string(),
        "total_discount": format_money(totals.total_discount),
        "grand_total": format_money(totals.grand_total),
        "grand_total_value": totals.grand_total,
    })
}

pub fn receipt_context(
    receipt: &Record,
    invoice_no: &str,
    remaining: Decimal,
    settings: &Settings,
) -> Value {
    serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "currency": settings.currency,
        "company": company(settings),
        "date": receipt.date.to_string(),
        "base_id": receipt.base_id,
        "client_name": receipt.client_name,
        "invoice_no": invoice_no,
        "receipt_no": receipt.number,
        "client_phone": phone_for_print(&receipt.phone),
        "client_location": receipt.location,
        "amount": format_money(receipt.amount),
        "amount_value": receipt.amount,
        "balance": format_money(remaining),
        "balance_value": remaining,
    })
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            Decimal::from_str(cleaned.trim()).ok()
        }
        _ => None,
    }
}

/// `{{ amount | currency }}` -> `AED 1,350.00`. `code` overrides the code.
fn currency_filter(
    value: &Value,
    args: &HashMap<String, Value>,
    default_code: &str,
) -> tera::Result<Value> {
    let amount = decimal_from_value(value)
        .ok_or_else(|| tera::Error::msg(format!("currency filter expects a number, got {value}")))?;
    let code = args
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or(default_code);
    Ok(Value::String(format!("{} {}", code, format_money(amount))))
}

/// Render `body` with `context`. Names ending `.html`, `.htm`, or `.xml`
/// autoescape.
pub fn render_template(name: &str, body: &str, context: &Value) -> Result<String, LedgerError> {
    let map = context.as_object().ok_or_else(|| {
        LedgerError::Render("template context must be a JSON object at the root".to_string())
    })?;
    let mut tera_context = Context::new();
    for (key, value) in map {
        tera_context.insert(key, value);
    }

    let default_code = map
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or("AED")
        .to_string();
    let mut tera = Tera::default();
    tera.register_filter(
        "currency",
        move |value: &Value, args: &HashMap<String, Value>| {
            currency_filter(value, args, &default_code)
        },
    );
    tera.add_raw_template(name, body)
        .map_err(|err| LedgerError::Render(format!("invalid template '{name}': {err}")))?;
    tera.render(name, &tera_context)
        .map_err(|err| LedgerError::Render(format!("failed to render '{name}': {err:?}")))
}

//! Line items and document totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::Product;
use crate::error::LedgerError;
use crate::ledger::catalog::image_data_uri;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub device: String,
    #[serde(default)]
    pub description: String,
    pub qty: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub warranty_years: u32,
    /// `data:` URI of the product picture, when the catalog has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl LineItem {
    /// One unit-priced line taken from the catalog.
    pub fn from_product(product: &Product, qty: Decimal) -> Self {
        Self {
            device: product.device.clone(),
            description: product.description.clone(),
            qty,
            unit_price: product.unit_price,
            warranty_years: product.warranty_years,
            image: image_data_uri(product),
        }
    }

    /// `qty * unit_price`, or `None` when the product overflows.
    pub fn total(&self) -> Option<Decimal> {
        self.qty
            .checked_mul(self.unit_price)
            .map(|total| total.round_dp(2))
    }
}

/// Inputs to a document total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub items: Vec<LineItem>,
    pub installation: Decimal,
    pub discount_value: Decimal,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub installation: Decimal,
    pub total_discount: Decimal,
    pub grand_total: Decimal,
}

impl Pricing {
    /// A document entered as a single amount.
    pub fn lump_sum(amount: Decimal) -> Self {
        Self {
            items: vec![LineItem {
                device: "Lump sum".to_string(),
                description: String::new(),
                qty: Decimal::ONE,
                unit_price: amount,
                warranty_years: 0,
                image: None,
            }],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        for item in &self.items {
            if item.qty < Decimal::ZERO || item.unit_price < Decimal::ZERO {
                return Err(LedgerError::Validation(format!(
                    "line '{}' must not have a negative quantity or price",
                    item.device
                )));
            }
        }
        if self.installation < Decimal::ZERO || self.discount_value < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "installation and discount must not be negative".to_string(),
            ));
        }
        if self.discount_percent < Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err(LedgerError::Validation(format!(
                "discount percent {} is outside 0..=100",
                self.discount_percent
            )));
        }
        Ok(())
    }

    /// `grand_total = (subtotal + installation) * (1 - pct/100) - discount_value`.
    ///
    /// A discount larger than `subtotal + installation` and any intermediate
    /// value outside the `Decimal` range are `Validation` errors.
    pub fn totals(&self) -> Result<Totals, LedgerError> {
        self.validate()?;
        let mut subtotal = Decimal::ZERO;
        for item in &self.items {
            let line = item.total().ok_or_else(|| out_of_range(&item.device))?;
            subtotal = subtotal
                .checked_add(line)
                .ok_or_else(|| out_of_range("subtotal"))?;
        }
        let subtotal = subtotal.round_dp(2);
        let base = subtotal
            .checked_add(self.installation)
            .ok_or_else(|| out_of_range("installation"))?;
        let total_discount = base
            .checked_mul(self.discount_percent)
            .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
            .and_then(|d| d.checked_add(self.discount_value))
            .ok_or_else(|| out_of_range("discount"))?
            .round_dp(2);
        if total_discount > base {
            return Err(LedgerError::Validation(format!(
                "discount {total_discount} exceeds the document total {base}"
            )));
        }
        Ok(Totals {
            subtotal,
            installation: self.installation,
            total_discount,
            grand_total: (base - total_discount).round_dp(2),
        })
    }
}

fn out_of_range(what: &str) -> LedgerError {
    LedgerError::Validation(format!("amount for '{what}' is out of range"))
}

//! Storage abstraction layer.
//!
//! Typed rows for the four tables (ledger records, customers, products,
//! users),
//! the identity normalization shared by every caller, and a backend-agnostic
//! `Database` supertrait. The only backend is the CSV document store in
//! [`csv`].

pub mod csv;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::error::DatabaseError;

/// Open the store for `config.data_dir`, creating missing tables.
pub async fn connect_from_config(config: &LedgerConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    let backend = csv::CsvBackend::new(config.data_dir.clone());
    backend.ensure_tables().await?;
    tracing::debug!(dir = %config.data_dir.display(), "Opened CSV store");
    Ok(Arc::new(backend))
}

/// Kind of ledger entry. Stored as the literal tags `q`, `i`, `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "q")]
    Quotation,
    #[serde(rename = "i")]
    Invoice,
    #[serde(rename = "r")]
    Receipt,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quotation => "q",
            Self::Invoice => "i",
            Self::Receipt => "r",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "q" => Some(Self::Quotation),
            "i" => Some(Self::Invoice),
            "r" => Some(Self::Receipt),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Quotation => "Quotation",
            Self::Invoice => "Invoice",
            Self::Receipt => "Receipt",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One ledger entry: a quotation, an invoice, or a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub base_id: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub number: String,
    pub amount: Decimal,
    pub client_name: String,
    pub phone: String,
    pub location: String,
    pub note: String,
}

impl Record {
    /// Natural key. At most one stored record exists per key.
    pub fn key(&self) -> (DocType, &str) {
        (self.doc_type, self.number.as_str())
    }
}

/// CRM pipeline stage of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerStatus {
    New,
    #[serde(rename = "Follow-up")]
    FollowUp,
    Active,
    Done,
    Lost,
}

impl CustomerStatus {
    pub const ALL: [CustomerStatus; 5] = [
        Self::New,
        Self::FollowUp,
        Self::Active,
        Self::Done,
        Self::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::FollowUp => "Follow-up",
            Self::Active => "Active",
            Self::Done => "Done",
            Self::Lost => "Lost",
        }
    }

    /// Case-insensitive label lookup; `followup` and `follow up` also match.
    pub fn from_label(value: &str) -> Option<Self> {
        let folded: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "new" => Some(Self::New),
            "followup" => Some(Self::FollowUp),
            "active" => Some(Self::Active),
            "done" => Some(Self::Done),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }
}

/// Customer row. `status` keeps the stored label verbatim, including blank
/// and labels outside [`CustomerStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub client_name: String,
    pub phone: String,
    pub location: String,
    pub email: String,
    pub status: String,
    pub notes: String,
    pub tags: String,
    pub next_follow_up: Option<NaiveDate>,
    pub assigned_to: String,
    pub last_activity: Option<NaiveDate>,
}

impl Customer {
    pub fn status_kind(&self) -> Option<CustomerStatus> {
        CustomerStatus::from_label(&self.status)
    }
}

/// Catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub device: String,
    pub description: String,
    pub unit_price: Decimal,
    pub warranty_years: u32,
    pub image_base64: String,
    pub image_path: String,
}

/// Access role of an operator. Admins may use every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Viewer => "viewer",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "staff" => Some(Self::Staff),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Pages granted to a new user of this role when none are given.
    pub fn default_pages(self) -> &'static [&'static str] {
        match self {
            Self::Admin => &[
                "dashboard",
                "quotation",
                "invoice",
                "receipt",
                "customers",
                "products",
                "reports",
                "settings",
            ],
            Self::Staff => &["dashboard", "quotation", "invoice", "customers"],
            Self::Viewer => &["dashboard", "reports"],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator account. The PIN is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub name: String,
    #[serde(skip_serializing)]
    pub pin: String,
    pub role: Role,
    /// Lowercase page names.
    pub allowed_pages: Vec<String>,
}

impl User {
    pub fn new(name: impl Into<String>, pin: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            pin: pin.into(),
            role,
            allowed_pages: role.default_pages().iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Accounts written when the users table is first created.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Admin", "1234", Role::Admin),
            Self::new("Staff", "5678", Role::Staff),
            Self::new("Viewer", "9999", Role::Viewer),
        ]
    }
}

/// Reduce a phone number to the local 10-digit mobile form.
///
/// `+971 50 123 4567`, `971501234567`, `501234567` and `0501234567` all
/// become `0501234567`. Anything else keeps its last ten digits. Input
/// without digits yields an empty string.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    if digits.starts_with("971") && digits.len() >= 12 && digits.as_bytes()[3] == b'5' {
        return format!("0{}", &digits[3..12]);
    }
    if digits.len() == 9 && digits.starts_with('5') {
        return format!("0{digits}");
    }
    if digits.len() == 10 && digits.starts_with("05") {
        return digits;
    }
    let skip = digits.len().saturating_sub(10);
    digits[skip..].to_string()
}

/// Pretty form `+971 5X XXX XXXX` for local mobile numbers, `None` otherwise.
pub fn format_phone_display(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let local = digits.strip_prefix('0').unwrap_or(&digits);
    if local.len() == 9 && local.starts_with('5') {
        Some(format!(
            "+971 {} {} {}",
            &local[0..2],
            &local[2..5],
            &local[5..9]
        ))
    } else {
        None
    }
}

/// Title-case each word: the first letter of every alphabetic run is
/// uppercased, the rest lowercased. Surrounding whitespace is trimmed.
pub fn proper_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Comparison key for customer names: trimmed and lowercased.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All stored records in file order.
    async fn load_records(&self) -> Result<Vec<Record>, DatabaseError>;
    /// Insert `record`, replacing any stored record with the same
    /// `(type, number)`.
    async fn save_record(&self, record: &Record) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn load_customers(&self) -> Result<Vec<Customer>, DatabaseError>;
    /// Replace the whole customer table.
    async fn save_customers(&self, customers: &[Customer]) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn load_products(&self) -> Result<Vec<Product>, DatabaseError>;
    /// Replace the whole catalog.
    async fn save_products(&self, products: &[Product]) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load_users(&self) -> Result<Vec<User>, DatabaseError>;
    /// Replace the whole users table.
    async fn save_users(&self, users: &[User]) -> Result<(), DatabaseError>;
}

/// Backend-agnostic storage supertrait.
#[async_trait]
pub trait Database: RecordStore + CustomerStore + ProductStore + UserStore + Send + Sync {
    /// Create the backing tables if they do not exist yet. A new users
    /// table is seeded with [`User::defaults`].
    async fn ensure_tables(&self) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_reduces_uae_forms_to_local() {
        assert_eq!(normalize_phone("+971 50 123 4567"), "0501234567");
        assert_eq!(normalize_phone("0501234567"), "0501234567");
        assert_eq!(normalize_phone("501234567"), "0501234567");
        assert_eq!(normalize_phone("971-52-779-0975"), "0527790975");
    }

    #[test]
    fn normalize_phone_falls_back_to_last_ten_digits() {
        assert_eq!(normalize_phone("+44 20 7946 0958"), "2079460958");
        assert_eq!(normalize_phone("971 4 123 4567"), "7141234567");
        assert_eq!(normalize_phone("12345"), "12345");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn format_phone_display_only_handles_local_mobiles() {
        assert_eq!(
            format_phone_display("0501234567").as_deref(),
            Some("+971 50 123 4567")
        );
        assert_eq!(
            format_phone_display("52 779 0975").as_deref(),
            Some("+971 52 779 0975")
        );
        assert_eq!(format_phone_display("042345678"), None);
        assert_eq!(format_phone_display(""), None);
    }

    #[test]
    fn proper_case_titles_each_word() {
        assert_eq!(proper_case("  ahmed OMER "), "Ahmed Omer");
        assert_eq!(proper_case("dubai - marina"), "Dubai - Marina");
        assert_eq!(proper_case("o'neil"), "O'Neil");
    }

    #[test]
    fn doc_type_tags_are_case_insensitive() {
        assert_eq!(DocType::from_db_value(" I "), Some(DocType::Invoice));
        assert_eq!(DocType::from_db_value("x"), None);
        assert_eq!(DocType::Receipt.as_str(), "r");
    }

    #[test]
    fn customer_status_accepts_loose_spellings() {
        assert_eq!(
            CustomerStatus::from_label("follow up"),
            Some(CustomerStatus::FollowUp)
        );
        assert_eq!(CustomerStatus::from_label("FOLLOW-UP"), Some(CustomerStatus::FollowUp));
        assert_eq!(CustomerStatus::from_label(""), None);
    }

    #[test]
    fn role_defaults_grant_expected_pages() {
        assert_eq!(Role::from_label(" Staff "), Some(Role::Staff));
        assert_eq!(Role::from_label("owner"), None);
        assert_eq!(Role::Viewer.default_pages(), &["dashboard", "reports"]);

        let users = User::defaults();
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[0].allowed_pages.len(), 8);
    }

    #[test]
    fn user_json_omits_pin() {
        let json = serde_json::to_value(User::new("Sara", "4321", Role::Staff)).expect("json");
        assert!(json.get("pin").is_none());
        assert_eq!(json["role"], "staff");
    }
}

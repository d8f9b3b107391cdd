//! The `Ledger` service: quotation -> invoice -> receipt flows.
//!
//! Each flow loads a snapshot, mints ids, saves the document, and touches
//! the customer table. All of that runs under one writer lock so ids and
//! upserts stay consistent when several tasks share a `Ledger`.
//!
//! A `Ledger` opened with a PIN acts as that user: operations check the
//! user's page permissions and activity events carry the user's name.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::LedgerConfig;
use crate::db::{Customer, CustomerStatus, Database, DocType, Product, Record, User};
use crate::error::LedgerError;
use crate::ledger::activity::ActivityLogger;
use crate::ledger::balance::{self, CustomerFinances, InvoiceBalance, ProjectBalance};
use crate::ledger::catalog::{self, ProductUpdate};
use crate::ledger::customers::{self, CustomerFilter, CustomerUpdate, NewCustomer, UpsertOutcome};
use crate::ledger::docgen::{self, InvoiceDoc, QuotationDoc};
use crate::ledger::numbering;
use crate::ledger::pricing::{Pricing, Totals};
use crate::ledger::report::{self, CustomerTotals, MonthTotals, ProjectRow, RecordFilter, Summary};
use crate::ledger::users::{self, NewUser, Page, UserUpdate};
use crate::settings::Settings;

/// A quotation as entered by the operator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuotationDraft {
    pub client_name: String,
    pub phone: String,
    pub location: String,
    /// Explicit number; minted when absent. Reusing a number replaces the
    /// stored quotation.
    pub number: Option<String>,
    pub pricing: Pricing,
    pub note: String,
    pub prepared_by: Option<String>,
    pub approved_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotationOutcome {
    pub record: Record,
    pub pricing: Pricing,
    pub totals: Totals,
    pub prepared_by: String,
    pub approved_by: String,
    pub customer: Option<UpsertOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum InvoiceSource {
    /// Convert a stored quotation, keeping its base id.
    FromQuotation(String),
    Standalone,
}

/// An invoice as entered by the operator. Blank client fields are taken
/// from the source quotation.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceDraft {
    pub source: InvoiceSource,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub number: Option<String>,
    /// Required for a standalone invoice; a converted quotation keeps its
    /// amount when absent.
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub note: String,
}

impl InvoiceDraft {
    pub fn from_quotation(number: impl Into<String>) -> Self {
        Self {
            source: InvoiceSource::FromQuotation(number.into()),
            client_name: String::new(),
            phone: String::new(),
            location: String::new(),
            number: None,
            pricing: None,
            note: String::new(),
        }
    }

    pub fn standalone(client_name: impl Into<String>, pricing: Pricing) -> Self {
        Self {
            source: InvoiceSource::Standalone,
            client_name: client_name.into(),
            phone: String::new(),
            location: String::new(),
            number: None,
            pricing: Some(pricing),
            note: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceOutcome {
    pub record: Record,
    pub pricing: Pricing,
    pub totals: Totals,
    pub customer: Option<UpsertOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptRequest {
    pub invoice_number: String,
    pub amount: Decimal,
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptOutcome {
    pub receipt: Record,
    pub invoice_total: Decimal,
    pub previous_paid: Decimal,
    pub accepted: Decimal,
    /// The request exceeded the remaining balance and was reduced.
    pub capped: bool,
    pub remaining: Decimal,
}

fn explicit_number(number: Option<&str>) -> Option<String> {
    number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

fn kind_of(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Quotation => "quotation",
        DocType::Invoice => "invoice",
        DocType::Receipt => "receipt",
    }
}

fn page_of(doc_type: DocType) -> Page {
    match doc_type {
        DocType::Quotation => Page::Quotation,
        DocType::Invoice => Page::Invoice,
        DocType::Receipt => Page::Receipt,
    }
}

fn pick<'a>(given: &'a str, fallback: &'a str) -> &'a str {
    let given = given.trim();
    if given.is_empty() { fallback.trim() } else { given }
}

pub struct Ledger {
    db: Arc<dyn Database>,
    config: LedgerConfig,
    writer: Mutex<()>,
    activity: Option<ActivityLogger>,
    session: Option<User>,
    operator: String,
}

impl Ledger {
    /// Open the CSV store under `config.data_dir`, sign in with
    /// `config.pin` when one is set, and start this ledger's activity log.
    pub async fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        let db = crate::db::connect_from_config(&config).await?;
        let session = match config.pin.as_deref() {
            Some(pin) => Some(users::sign_in(db.as_ref(), pin).await?),
            None if config.require_pin => {
                return Err(LedgerError::AccessDenied(
                    "a PIN is required to open this ledger".to_string(),
                ));
            }
            None => None,
        };
        let mut ledger = Self::with_database(db, config);
        if let Some(user) = session {
            ledger.operator = user.name.clone();
            ledger.session = Some(user);
        }
        Ok(ledger)
    }

    /// No user is signed in, so every page is open.
    pub fn with_database(db: Arc<dyn Database>, config: LedgerConfig) -> Self {
        Self {
            db,
            activity: ActivityLogger::from_config(&config.activity),
            session: None,
            operator: config.operator.clone(),
            config,
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn database(&self) -> &dyn Database {
        self.db.as_ref()
    }

    /// Name recorded on activity events.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn activity(&self) -> Option<&ActivityLogger> {
        self.activity.as_ref()
    }

    fn authorize(&self, page: Page) -> Result<(), LedgerError> {
        match self.session {
            Some(ref user) if !users::can_access(Some(user), page) => Err(
                LedgerError::AccessDenied(format!("{} may not use {}", user.name, page)),
            ),
            _ => Ok(()),
        }
    }

    /// Fails when the signed-in user is not an admin.
    pub fn require_admin(&self) -> Result<(), LedgerError> {
        match self.session {
            Some(ref user) if !users::is_admin(Some(user)) => Err(LedgerError::AccessDenied(
                format!("{} is not an administrator", user.name),
            )),
            _ => Ok(()),
        }
    }

    fn log(&self, page: Page, action: &str, details: &str) {
        if let Some(ref logger) = self.activity {
            logger.record(&self.operator, page.as_str(), action, details);
        }
    }

    /// Settings with the resolved currency, for rendering.
    fn render_settings(&self) -> Settings {
        Settings {
            currency: self.config.currency.clone(),
            ..self.config.settings.clone()
        }
    }

    // ---- documents ----

    /// Save a quotation and upsert its customer.
    ///
    /// The customer table is read before the record is saved, so a
    /// customer schema mismatch aborts with nothing written. A failure
    /// while saving the customer leaves the record stored.
    pub async fn create_quotation(
        &self,
        draft: QuotationDraft,
        date: NaiveDate,
    ) -> Result<QuotationOutcome, LedgerError> {
        self.authorize(Page::Quotation)?;
        if draft.client_name.trim().is_empty() {
            return Err(LedgerError::Validation("client name is required".to_string()));
        }
        let totals = draft.pricing.totals()?;

        let _guard = self.writer.lock().await;
        let records = self.db.load_records().await?;
        let number = explicit_number(draft.number.as_deref())
            .unwrap_or_else(|| numbering::next_quotation_number(&records, date));
        let base_id = records
            .iter()
            .find(|r| r.doc_type == DocType::Quotation && r.number == number)
            .map(|r| r.base_id.clone())
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| numbering::next_base_id(&records, date, self.config.base_id_strategy));

        let record = Record {
            base_id,
            date,
            doc_type: DocType::Quotation,
            number,
            amount: totals.grand_total,
            client_name: draft.client_name.trim().to_string(),
            phone: draft.phone.trim().to_string(),
            location: draft.location.trim().to_string(),
            note: draft.note.trim().to_string(),
        };
        self.db.load_customers().await?;
        self.db.save_record(&record).await?;
        let customer = customers::upsert_customer(
            self.db.as_ref(),
            &record.client_name,
            &record.phone,
            &record.location,
            CustomerStatus::New,
            date,
        )
        .await?;

        tracing::info!(number = %record.number, base_id = %record.base_id, amount = %record.amount, "Created quotation");
        self.log(
            Page::Quotation,
            "quotation_created",
            &format!("{} for {} ({})", record.number, record.client_name, record.amount),
        );

        let settings = &self.config.settings;
        Ok(QuotationOutcome {
            prepared_by: draft
                .prepared_by
                .unwrap_or_else(|| settings.default_prepared_by.clone()),
            approved_by: draft
                .approved_by
                .unwrap_or_else(|| settings.default_approved_by.clone()),
            record,
            pricing: draft.pricing,
            totals,
            customer,
        })
    }

    /// Save an invoice and upsert its customer. Like
    /// [`Ledger::create_quotation`], the customer table is checked first.
    pub async fn create_invoice(
        &self,
        draft: InvoiceDraft,
        date: NaiveDate,
    ) -> Result<InvoiceOutcome, LedgerError> {
        self.authorize(Page::Invoice)?;
        let _guard = self.writer.lock().await;
        let records = self.db.load_records().await?;

        let (base_id, quotation, pricing) = match draft.source {
            InvoiceSource::FromQuotation(ref quote_no) => {
                let quote_no = quote_no.trim();
                let quotation = records
                    .iter()
                    .find(|r| r.doc_type == DocType::Quotation && r.number == quote_no)
                    .cloned()
                    .ok_or_else(|| LedgerError::not_found("quotation", quote_no))?;
                let base_id = if quotation.base_id.trim().is_empty() {
                    numbering::next_base_id(&records, date, self.config.base_id_strategy)
                } else {
                    quotation.base_id.clone()
                };
                let pricing = draft
                    .pricing
                    .clone()
                    .unwrap_or_else(|| Pricing::lump_sum(quotation.amount));
                (base_id, Some(quotation), pricing)
            }
            InvoiceSource::Standalone => {
                let pricing = draft.pricing.clone().ok_or_else(|| {
                    LedgerError::Validation("a standalone invoice needs pricing".to_string())
                })?;
                (
                    numbering::next_base_id(&records, date, self.config.base_id_strategy),
                    None,
                    pricing,
                )
            }
        };
        let totals = pricing.totals()?;

        let (client_name, phone, location) = match quotation {
            Some(ref q) => (
                pick(&draft.client_name, &q.client_name),
                pick(&draft.phone, &q.phone),
                pick(&draft.location, &q.location),
            ),
            None => (
                draft.client_name.trim(),
                draft.phone.trim(),
                draft.location.trim(),
            ),
        };
        if client_name.is_empty() {
            return Err(LedgerError::Validation("client name is required".to_string()));
        }

        let note = match quotation {
            Some(ref q) => q.number.clone(),
            None => draft.note.trim().to_string(),
        };
        let record = Record {
            base_id,
            date,
            doc_type: DocType::Invoice,
            number: explicit_number(draft.number.as_deref())
                .unwrap_or_else(|| numbering::next_invoice_number(&records, date)),
            amount: totals.grand_total,
            client_name: client_name.to_string(),
            phone: phone.to_string(),
            location: location.to_string(),
            note,
        };
        self.db.load_customers().await?;
        self.db.save_record(&record).await?;
        let customer = customers::upsert_customer(
            self.db.as_ref(),
            &record.client_name,
            &record.phone,
            &record.location,
            CustomerStatus::Active,
            date,
        )
        .await?;

        tracing::info!(number = %record.number, base_id = %record.base_id, amount = %record.amount, "Created invoice");
        self.log(
            Page::Invoice,
            "invoice_created",
            &format!("{} for {} ({})", record.number, record.client_name, record.amount),
        );
        Ok(InvoiceOutcome {
            record,
            pricing,
            totals,
            customer,
        })
    }

    /// Record a payment against an invoice, capped at its remaining balance.
    pub async fn record_receipt(
        &self,
        request: ReceiptRequest,
        date: NaiveDate,
    ) -> Result<ReceiptOutcome, LedgerError> {
        self.authorize(Page::Receipt)?;
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "payment must be positive, got {}",
                request.amount
            )));
        }

        let _guard = self.writer.lock().await;
        let records = self.db.load_records().await?;
        let invoice_no = request.invoice_number.trim();
        let invoice = records
            .iter()
            .find(|r| r.doc_type == DocType::Invoice && r.number == invoice_no)
            .ok_or_else(|| LedgerError::not_found("invoice", invoice_no))?;

        let previous_paid = balance::invoice_balance(&records, invoice)?.paid;
        let cap = balance::cap_payment(invoice.amount, previous_paid, request.amount)?;
        if cap.remaining_before <= Decimal::ZERO {
            return Err(LedgerError::InvoiceSettled(invoice.number.clone()));
        }
        if cap.capped {
            tracing::warn!(
                invoice = %invoice.number,
                requested = %request.amount,
                accepted = %cap.accepted,
                "Payment exceeds remaining balance; capped"
            );
        }

        let receipt = Record {
            base_id: invoice.base_id.clone(),
            date,
            doc_type: DocType::Receipt,
            number: explicit_number(request.number.as_deref())
                .unwrap_or_else(|| numbering::next_receipt_number(&records, date, &invoice.base_id)),
            amount: cap.accepted,
            client_name: invoice.client_name.clone(),
            phone: invoice.phone.clone(),
            location: invoice.location.clone(),
            note: invoice.number.clone(),
        };
        self.db.save_record(&receipt).await?;

        tracing::info!(number = %receipt.number, invoice = %invoice.number, amount = %receipt.amount, "Recorded receipt");
        self.log(
            Page::Receipt,
            "receipt_created",
            &format!(
                "{} against {} ({}, remaining {})",
                receipt.number, invoice.number, receipt.amount, cap.remaining_after
            ),
        );
        Ok(ReceiptOutcome {
            invoice_total: invoice.amount,
            previous_paid,
            accepted: cap.accepted,
            capped: cap.capped,
            remaining: cap.remaining_after,
            receipt,
        })
    }

    // ---- balances ----

    pub async fn records(&self, filter: &RecordFilter) -> Result<Vec<Record>, LedgerError> {
        self.authorize(Page::Reports)?;
        Ok(filter.apply(&self.db.load_records().await?))
    }

    pub async fn find_record(&self, doc_type: DocType, number: &str) -> Result<Record, LedgerError> {
        self.authorize(page_of(doc_type))?;
        self.lookup_record(doc_type, number).await
    }

    async fn lookup_record(&self, doc_type: DocType, number: &str) -> Result<Record, LedgerError> {
        let number = number.trim();
        self.db
            .load_records()
            .await?
            .into_iter()
            .find(|r| r.doc_type == doc_type && r.number == number)
            .ok_or_else(|| LedgerError::not_found(kind_of(doc_type), number))
    }

    pub async fn invoice_balance(&self, number: &str) -> Result<InvoiceBalance, LedgerError> {
        self.authorize(Page::Dashboard)?;
        let invoice = self.lookup_record(DocType::Invoice, number).await?;
        let records = self.db.load_records().await?;
        balance::invoice_balance(&records, &invoice)
    }

    pub async fn project_balance(&self, base_id: &str) -> Result<ProjectBalance, LedgerError> {
        self.authorize(Page::Dashboard)?;
        let records = self.db.load_records().await?;
        balance::project_balance(&records, base_id.trim())?
            .ok_or_else(|| LedgerError::not_found("project", base_id.trim()))
    }

    pub async fn customer_finances(
        &self,
        name: &str,
        phone: Option<&str>,
    ) -> Result<CustomerFinances, LedgerError> {
        self.authorize(Page::Dashboard)?;
        let records = self.db.load_records().await?;
        balance::customer_finances(&records, name, phone)
    }

    // ---- customers ----

    pub async fn upsert_customer(
        &self,
        name: &str,
        phone: &str,
        location: &str,
        default_status: CustomerStatus,
        today: NaiveDate,
    ) -> Result<Option<UpsertOutcome>, LedgerError> {
        self.authorize(Page::Customers)?;
        let _guard = self.writer.lock().await;
        let outcome =
            customers::upsert_customer(self.db.as_ref(), name, phone, location, default_status, today)
                .await?;
        if let Some(ref outcome) = outcome {
            let action = if outcome.created { "customer_created" } else { "customer_updated" };
            self.log(Page::Customers, action, &outcome.customer.client_name);
        }
        Ok(outcome)
    }

    pub async fn add_customer(&self, new: NewCustomer, today: NaiveDate) -> Result<Customer, LedgerError> {
        self.authorize(Page::Customers)?;
        let _guard = self.writer.lock().await;
        let customer = customers::add_customer(self.db.as_ref(), new, today).await?;
        self.log(Page::Customers, "customer_created", &customer.client_name);
        Ok(customer)
    }

    pub async fn update_customer(
        &self,
        name: &str,
        update: CustomerUpdate,
        today: NaiveDate,
    ) -> Result<Customer, LedgerError> {
        self.authorize(Page::Customers)?;
        let _guard = self.writer.lock().await;
        let customer = customers::update_customer(self.db.as_ref(), name, update, today).await?;
        self.log(Page::Customers, "customer_updated", &customer.client_name);
        Ok(customer)
    }

    pub async fn delete_customer(&self, name: &str) -> Result<Customer, LedgerError> {
        self.authorize(Page::Customers)?;
        let _guard = self.writer.lock().await;
        let customer = customers::delete_customer(self.db.as_ref(), name).await?;
        self.log(Page::Customers, "customer_deleted", &customer.client_name);
        Ok(customer)
    }

    pub async fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, LedgerError> {
        self.authorize(Page::Customers)?;
        customers::list_customers(self.db.as_ref(), filter).await
    }

    pub async fn follow_ups(&self, today: NaiveDate) -> Result<Vec<Customer>, LedgerError> {
        self.authorize(Page::Customers)?;
        customers::follow_ups(self.db.as_ref(), today).await
    }

    // ---- catalog ----
    // Lookups stay open to every page; quotations price from the catalog.

    pub async fn add_product(&self, product: Product) -> Result<Product, LedgerError> {
        self.authorize(Page::Products)?;
        let _guard = self.writer.lock().await;
        let product = catalog::add_product(self.db.as_ref(), product).await?;
        self.log(Page::Products, "product_created", &product.device);
        Ok(product)
    }

    pub async fn update_product(&self, device: &str, update: ProductUpdate) -> Result<Product, LedgerError> {
        self.authorize(Page::Products)?;
        let _guard = self.writer.lock().await;
        let product = catalog::update_product(self.db.as_ref(), device, update).await?;
        self.log(Page::Products, "product_updated", &product.device);
        Ok(product)
    }

    pub async fn delete_product(&self, device: &str) -> Result<Product, LedgerError> {
        self.authorize(Page::Products)?;
        let _guard = self.writer.lock().await;
        let product = catalog::delete_product(self.db.as_ref(), device).await?;
        self.log(Page::Products, "product_deleted", &product.device);
        Ok(product)
    }

    pub async fn find_product(&self, device: &str) -> Result<Option<Product>, LedgerError> {
        catalog::find_product(self.db.as_ref(), device).await
    }

    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>, LedgerError> {
        catalog::search_products(self.db.as_ref(), query).await
    }

    // ---- reports ----

    pub async fn summary(&self, filter: &RecordFilter) -> Result<Summary, LedgerError> {
        report::summary(&self.records(filter).await?)
    }

    pub async fn project_lifecycle(&self, filter: &RecordFilter) -> Result<Vec<ProjectRow>, LedgerError> {
        report::project_lifecycle(&self.records(filter).await?)
    }

    pub async fn top_customers(&self, filter: &RecordFilter) -> Result<Vec<CustomerTotals>, LedgerError> {
        report::top_customers(&self.records(filter).await?)
    }

    pub async fn monthly_totals(&self, filter: &RecordFilter) -> Result<Vec<MonthTotals>, LedgerError> {
        report::monthly_totals(&self.records(filter).await?)
    }

    // ---- users ----

    pub async fn list_users(&self) -> Result<Vec<User>, LedgerError> {
        self.require_admin()?;
        users::list_users(self.db.as_ref()).await
    }

    pub async fn add_user(&self, new: NewUser) -> Result<User, LedgerError> {
        self.require_admin()?;
        let _guard = self.writer.lock().await;
        let user = users::add_user(self.db.as_ref(), new).await?;
        self.log(
            Page::Settings,
            "user_created",
            &format!("User: {}, Role: {}", user.name, user.role),
        );
        Ok(user)
    }

    pub async fn update_user(&self, name: &str, update: UserUpdate) -> Result<User, LedgerError> {
        self.require_admin()?;
        let _guard = self.writer.lock().await;
        let user = users::update_user(self.db.as_ref(), name, update).await?;
        self.log(
            Page::Settings,
            "user_updated",
            &format!("User: {}, Role: {}", user.name, user.role),
        );
        Ok(user)
    }

    pub async fn delete_user(&self, name: &str) -> Result<User, LedgerError> {
        self.require_admin()?;
        let _guard = self.writer.lock().await;
        let user = users::delete_user(self.db.as_ref(), name).await?;
        self.log(Page::Settings, "user_deleted", &format!("User: {}", user.name));
        Ok(user)
    }

    // ---- rendering ----

    /// Render a freshly created quotation with its line items.
    pub fn render_quotation(
        &self,
        outcome: &QuotationOutcome,
        template: Option<&str>,
    ) -> Result<String, LedgerError> {
        let context = docgen::quotation_context(
            &QuotationDoc {
                record: &outcome.record,
                items: &outcome.pricing.items,
                totals: Some(&outcome.totals),
                discount_value: outcome.pricing.discount_value,
                discount_percent: outcome.pricing.discount_percent,
                prepared_by: &outcome.prepared_by,
                approved_by: &outcome.approved_by,
            },
            &self.render_settings(),
        );
        docgen::render_template(
            "quotation.html",
            template.unwrap_or(docgen::DEFAULT_QUOTATION_TEMPLATE),
            &context,
        )
    }

    pub fn render_invoice(
        &self,
        outcome: &InvoiceOutcome,
        template: Option<&str>,
    ) -> Result<String, LedgerError> {
        let context = docgen::invoice_context(
            &InvoiceDoc {
                record: &outcome.record,
                items: &outcome.pricing.items,
                totals: Some(&outcome.totals),
                discount_value: outcome.pricing.discount_value,
                discount_percent: outcome.pricing.discount_percent,
            },
            &self.render_settings(),
        );
        docgen::render_template(
            "invoice.html",
            template.unwrap_or(docgen::DEFAULT_INVOICE_TEMPLATE),
            &context,
        )
    }

    pub fn render_receipt(
        &self,
        outcome: &ReceiptOutcome,
        template: Option<&str>,
    ) -> Result<String, LedgerError> {
        let context = docgen::receipt_context(
            &outcome.receipt,
            &outcome.receipt.note,
            outcome.remaining,
            &self.render_settings(),
        );
        docgen::render_template(
            "receipt.html",
            template.unwrap_or(docgen::DEFAULT_RECEIPT_TEMPLATE),
            &context,
        )
    }

    /// Render a stored document. Line items are not stored, so quotations
    /// and invoices render as a single total; a receipt shows the current
    /// balance of its invoice.
    pub async fn render_stored(
        &self,
        doc_type: DocType,
        number: &str,
        template: Option<&str>,
    ) -> Result<String, LedgerError> {
        let record = self.find_record(doc_type, number).await?;
        let settings = self.render_settings();
        let (name, default_body, context) = match doc_type {
            DocType::Quotation => (
                "quotation.html",
                docgen::DEFAULT_QUOTATION_TEMPLATE,
                docgen::quotation_context(
                    &QuotationDoc {
                        record: &record,
                        items: &[],
                        totals: None,
                        discount_value: Decimal::ZERO,
                        discount_percent: Decimal::ZERO,
                        prepared_by: &settings.default_prepared_by,
                        approved_by: &settings.default_approved_by,
                    },
                    &settings,
                ),
            ),
            DocType::Invoice => (
                "invoice.html",
                docgen::DEFAULT_INVOICE_TEMPLATE,
                docgen::invoice_context(
                    &InvoiceDoc {
                        record: &record,
                        items: &[],
                        totals: None,
                        discount_value: Decimal::ZERO,
                        discount_percent: Decimal::ZERO,
                    },
                    &settings,
                ),
            ),
            DocType::Receipt => {
                let records = self.db.load_records().await?;
                let invoice = records
                    .iter()
                    .find(|r| r.doc_type == DocType::Invoice && r.number == record.note);
                let remaining = match invoice {
                    Some(invoice) => balance::invoice_balance(&records, invoice)?.remaining,
                    None => balance::project_balance(&records, &record.base_id)?
                        .map(|p| p.remaining)
                        .unwrap_or(Decimal::ZERO),
                };
                (
                    "receipt.html",
                    docgen::DEFAULT_RECEIPT_TEMPLATE,
                    docgen::receipt_context(&record, &record.note, remaining, &settings),
                )
            }
        };
        docgen::render_template(name, template.unwrap_or(default_body), &context)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::{CustomerStore, Role};
    use crate::ledger::activity::{EventFilter, load_events};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).expect("date")
    }

    async fn ledger(dir: &std::path::Path) -> Ledger {
        Ledger::open(LedgerConfig::for_data_dir(dir))
            .await
            .expect("open ledger")
    }

    fn draft(name: &str, amount: Decimal) -> QuotationDraft {
        QuotationDraft {
            client_name: name.to_string(),
            phone: "+971 50 123 4567".to_string(),
            location: "dubai - marina".to_string(),
            pricing: Pricing::lump_sum(amount),
            ..QuotationDraft::default()
        }
    }

    #[tokio::test]
    async fn quotation_mints_ids_and_upserts_customer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger(dir.path()).await;

        let first = ledger
            .create_quotation(draft("ahmed omer", dec!(500)), day())
            .await
            .expect("quotation");
        assert_eq!(first.record.base_id, "20250101-001");
        assert_eq!(first.record.number, "QUO-20250101-001");
        assert_eq!(first.record.amount, dec!(500));
        assert_eq!(first.prepared_by, "Sales Team");

        let customers = ledger.database().load_customers().await.expect("customers");
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].client_name, "Ahmed Omer");
        assert_eq!(customers[0].location, "Dubai - Marina");
        assert_eq!(customers[0].status, "New");
    }

    #[tokio::test]
    async fn resaving_a_quotation_number_keeps_its_base_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger(dir.path()).await;
        let first = ledger
            .create_quotation(draft("Ahmed", dec!(500)), day())
            .await
            .expect("quotation");

        let revised = ledger
            .create_quotation(
                QuotationDraft {
                    number: Some(first.record.number.clone()),
                    ..draft("Ahmed", dec!(650))
                },
                day(),
            )
            .await
            .expect("revision");
        assert_eq!(revised.record.base_id, first.record.base_id);

        let stored = ledger.records(&RecordFilter::default()).await.expect("records");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, dec!(650));
    }

    #[tokio::test]
    async fn standalone_invoice_requires_pricing_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger(dir.path()).await;

        let mut no_pricing = InvoiceDraft::standalone("Sara", Pricing::default());
        no_pricing.pricing = None;
        let err = ledger.create_invoice(no_pricing, day()).await.expect_err("no pricing");
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .create_invoice(InvoiceDraft::standalone("  ", Pricing::lump_sum(dec!(10))), day())
            .await
            .expect_err("no name");
        assert!(matches!(err, LedgerError::Validation(_)));

        let created = ledger
            .create_invoice(InvoiceDraft::standalone("Sara", Pricing::lump_sum(dec!(1200))), day())
            .await
            .expect("invoice");
        assert_eq!(created.record.number, "INV-20250101-001");
        assert_eq!(created.customer.map(|c| c.customer.status), Some("Active".to_string()));
    }

    #[tokio::test]
    async fn receipt_for_missing_invoice_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger(dir.path()).await;
        let err = ledger
            .record_receipt(
                ReceiptRequest {
                    invoice_number: "INV-X".to_string(),
                    amount: dec!(10),
                    number: None,
                },
                day(),
            )
            .await
            .expect_err("missing");
        assert!(matches!(err, LedgerError::NotFound { kind: "invoice", .. }));
    }

    #[tokio::test]
    async fn render_stored_receipt_shows_invoice_balance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger(dir.path()).await;
        let invoice = ledger
            .create_invoice(InvoiceDraft::standalone("Sara", Pricing::lump_sum(dec!(1000))), day())
            .await
            .expect("invoice");
        let receipt = ledger
            .record_receipt(
                ReceiptRequest {
                    invoice_number: invoice.record.number.clone(),
                    amount: dec!(400),
                    number: None,
                },
                day(),
            )
            .await
            .expect("receipt");

        let html = ledger
            .render_stored(DocType::Receipt, &receipt.receipt.number, None)
            .await
            .expect("render");
        assert!(html.contains(&receipt.receipt.number));
        assert!(html.contains("600.00"));
    }

    fn signed_in(dir: &std::path::Path, pin: &str) -> LedgerConfig {
        let mut config = LedgerConfig::for_data_dir(dir);
        config.pin = Some(pin.to_string());
        config.activity.enabled = true;
        config
    }

    #[tokio::test]
    async fn pin_signs_in_and_names_activity_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = Ledger::open(signed_in(dir.path(), "5678"))
            .await
            .expect("open as staff");
        assert_eq!(ledger.operator(), "Staff");
        assert_eq!(ledger.session().map(|u| u.role), Some(Role::Staff));

        ledger
            .create_quotation(draft("Ahmed", dec!(500)), day())
            .await
            .expect("staff may quote");

        let path = ledger.activity().expect("activity on").path().to_path_buf();
        let events = load_events(&path, &EventFilter::default()).expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user, "Staff");
        assert_eq!(events[0].page, "quotation");
    }

    #[tokio::test]
    async fn pages_outside_the_account_are_denied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let viewer = Ledger::open(signed_in(dir.path(), "9999"))
            .await
            .expect("open as viewer");

        let err = viewer
            .create_quotation(draft("Ahmed", dec!(500)), day())
            .await
            .expect_err("viewer cannot quote");
        assert!(matches!(err, LedgerError::AccessDenied(_)));
        assert!(viewer.records(&RecordFilter::default()).await.expect("reports").is_empty());
        assert!(matches!(viewer.list_users().await, Err(LedgerError::AccessDenied(_))));
        assert!(matches!(viewer.require_admin(), Err(LedgerError::AccessDenied(_))));

        let admin = Ledger::open(signed_in(dir.path(), "1234"))
            .await
            .expect("open as admin");
        let created = admin
            .add_user(NewUser {
                name: "Cashier".to_string(),
                pin: "2468".to_string(),
                role: Role::Staff,
                allowed_pages: Some(vec!["receipt".to_string()]),
            })
            .await
            .expect("admin adds user");
        assert_eq!(created.allowed_pages, vec!["receipt"]);
        assert_eq!(admin.list_users().await.expect("users").len(), 4);
    }

    #[tokio::test]
    async fn open_rejects_bad_or_missing_pin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Ledger::open(signed_in(dir.path(), "0000"))
            .await
            .err()
            .expect("bad pin");
        assert!(matches!(err, LedgerError::AccessDenied(_)));

        let mut config = LedgerConfig::for_data_dir(dir.path());
        config.require_pin = true;
        let err = Ledger::open(config).await.err().expect("pin required");
        assert!(matches!(err, LedgerError::AccessDenied(_)));

        let open = ledger(dir.path()).await;
        assert_eq!(open.operator(), "System");
        assert!(open.session().is_none());
    }
}

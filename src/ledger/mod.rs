//! Ledger domain: numbering, pricing, balances, customers, catalog,
//! reports, rendering, users, and the `Ledger` service that ties them
//! together.

pub mod activity;
pub mod balance;
pub mod catalog;
pub mod customers;
pub mod docgen;
pub mod lifecycle;
pub mod numbering;
pub mod pricing;
pub mod report;
pub mod users;

pub use balance::{CustomerFinances, InvoiceBalance, PaymentCap, ProjectBalance};
pub use customers::{CustomerFilter, CustomerUpdate, NewCustomer, UpsertOutcome};
pub use lifecycle::{
    InvoiceDraft, InvoiceOutcome, InvoiceSource, Ledger, QuotationDraft, QuotationOutcome,
    ReceiptOutcome, ReceiptRequest,
};
pub use pricing::{LineItem, Pricing, Totals};
pub use report::RecordFilter;
pub use users::{NewUser, Page, UserUpdate};

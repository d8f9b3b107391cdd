//! Customer identity resolution and CRM edits.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::{Customer, CustomerStatus, Database, normalize_name, normalize_phone, proper_case};
use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub customer: Customer,
    pub created: bool,
}

/// Index of the customer `name`/`phone` resolves to.
///
/// Exact name match (trimmed, case-insensitive) wins; otherwise the first
/// customer with the same normalized phone, when a phone is given.
pub fn find_customer(customers: &[Customer], name: &str, phone: Option<&str>) -> Option<usize> {
    let key = normalize_name(name);
    if !key.is_empty()
        && let Some(idx) = customers
            .iter()
            .position(|c| normalize_name(&c.client_name) == key)
    {
        return Some(idx);
    }
    let target = phone.map(normalize_phone).unwrap_or_default();
    if target.is_empty() {
        return None;
    }
    customers
        .iter()
        .position(|c| normalize_phone(&c.phone) == target)
}

/// Merge a document's client details into the customer table in memory.
///
/// Returns `None` for a blank name. Repeating the call with the same inputs
/// leaves the table unchanged apart from `last_activity`.
pub fn apply_upsert(
    customers: &mut Vec<Customer>,
    name: &str,
    phone: &str,
    location: &str,
    default_status: CustomerStatus,
    today: NaiveDate,
) -> Option<UpsertOutcome> {
    if name.trim().is_empty() {
        return None;
    }
    let phone = phone.trim();
    let location = location.trim();
    let lookup_phone = (!phone.is_empty()).then_some(phone);

    match find_customer(customers, name, lookup_phone) {
        Some(idx) => {
            let existing = &mut customers[idx];
            existing.client_name = proper_case(name);
            if !phone.is_empty() {
                existing.phone = phone.to_string();
            }
            if !location.is_empty() {
                existing.location = proper_case(location);
            }
            if existing.status.trim().is_empty() {
                existing.status = default_status.as_str().to_string();
            }
            existing.last_activity = Some(today);
            Some(UpsertOutcome {
                customer: existing.clone(),
                created: false,
            })
        }
        None => {
            let customer = Customer {
                client_name: proper_case(name),
                phone: phone.to_string(),
                location: proper_case(location),
                status: default_status.as_str().to_string(),
                last_activity: Some(today),
                ..Customer::default()
            };
            customers.push(customer.clone());
            Some(UpsertOutcome {
                customer,
                created: true,
            })
        }
    }
}

pub async fn upsert_customer(
    db: &dyn Database,
    name: &str,
    phone: &str,
    location: &str,
    default_status: CustomerStatus,
    today: NaiveDate,
) -> Result<Option<UpsertOutcome>, LedgerError> {
    if name.trim().is_empty() {
        return Ok(None);
    }
    let mut customers = db.load_customers().await?;
    let outcome = apply_upsert(&mut customers, name, phone, location, default_status, today);
    if let Some(ref outcome) = outcome {
        db.save_customers(&customers).await?;
        tracing::info!(
            customer = %outcome.customer.client_name,
            created = outcome.created,
            "Upserted customer"
        );
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewCustomer {
    pub client_name: String,
    pub phone: String,
    pub location: String,
    pub email: String,
    pub status: Option<CustomerStatus>,
    pub notes: String,
    pub tags: String,
    pub next_follow_up: Option<NaiveDate>,
    pub assigned_to: String,
}

/// Create a customer by hand. Rejects a name or phone that already
/// resolves to someone.
pub async fn add_customer(
    db: &dyn Database,
    new: NewCustomer,
    today: NaiveDate,
) -> Result<Customer, LedgerError> {
    if new.client_name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "customer name is required".to_string(),
        ));
    }
    let mut customers = db.load_customers().await?;
    let phone = new.phone.trim();
    if let Some(idx) = find_customer(&customers, &new.client_name, (!phone.is_empty()).then_some(phone)) {
        return Err(LedgerError::DuplicateCustomer(
            customers[idx].client_name.clone(),
        ));
    }

    let customer = Customer {
        client_name: proper_case(&new.client_name),
        phone: phone.to_string(),
        location: proper_case(&new.location),
        email: new.email.trim().to_string(),
        status: new.status.unwrap_or(CustomerStatus::New).as_str().to_string(),
        notes: new.notes,
        tags: new.tags.trim().to_string(),
        next_follow_up: new.next_follow_up,
        assigned_to: new.assigned_to.trim().to_string(),
        last_activity: Some(today),
    };
    customers.push(customer.clone());
    db.save_customers(&customers).await?;
    tracing::info!(customer = %customer.client_name, "Added customer");
    Ok(customer)
}

/// Field edits for one customer. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerUpdate {
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    /// `Some(None)` clears the follow-up date.
    pub next_follow_up: Option<Option<NaiveDate>>,
    pub assigned_to: Option<String>,
}

pub async fn update_customer(
    db: &dyn Database,
    name: &str,
    update: CustomerUpdate,
    today: NaiveDate,
) -> Result<Customer, LedgerError> {
    let mut customers = db.load_customers().await?;
    let key = normalize_name(name);
    let idx = customers
        .iter()
        .position(|c| normalize_name(&c.client_name) == key)
        .ok_or_else(|| LedgerError::not_found("customer", name.trim()))?;

    if let Some(ref new_name) = update.client_name {
        let new_key = normalize_name(new_name);
        if new_key.is_empty() {
            return Err(LedgerError::Validation(
                "customer name must not be blank".to_string(),
            ));
        }
        let clash = customers
            .iter()
            .enumerate()
            .any(|(i, c)| i != idx && normalize_name(&c.client_name) == new_key);
        if clash {
            return Err(LedgerError::DuplicateCustomer(proper_case(new_name)));
        }
    }

    let customer = &mut customers[idx];
    if let Some(new_name) = update.client_name {
        customer.client_name = proper_case(&new_name);
    }
    if let Some(phone) = update.phone {
        customer.phone = phone.trim().to_string();
    }
    if let Some(location) = update.location {
        customer.location = proper_case(&location);
    }
    if let Some(email) = update.email {
        customer.email = email.trim().to_string();
    }
    if let Some(status) = update.status {
        customer.status = status.as_str().to_string();
    }
    if let Some(notes) = update.notes {
        customer.notes = notes;
    }
    if let Some(tags) = update.tags {
        customer.tags = tags.trim().to_string();
    }
    if let Some(next) = update.next_follow_up {
        customer.next_follow_up = next;
    }
    if let Some(assigned_to) = update.assigned_to {
        customer.assigned_to = assigned_to.trim().to_string();
    }
    customer.last_activity = Some(today);
    let updated = customer.clone();

    db.save_customers(&customers).await?;
    tracing::info!(customer = %updated.client_name, "Updated customer");
    Ok(updated)
}

pub async fn delete_customer(db: &dyn Database, name: &str) -> Result<Customer, LedgerError> {
    let mut customers = db.load_customers().await?;
    let key = normalize_name(name);
    let idx = customers
        .iter()
        .position(|c| normalize_name(&c.client_name) == key)
        .ok_or_else(|| LedgerError::not_found("customer", name.trim()))?;
    let removed = customers.remove(idx);
    db.save_customers(&customers).await?;
    tracing::info!(customer = %removed.client_name, "Deleted customer");
    Ok(removed)
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    pub status: Option<CustomerStatus>,
    /// Case-insensitive substring of name, phone, location, email, or tags.
    pub query: Option<String>,
}

impl CustomerFilter {
    pub fn matches(&self, customer: &Customer) -> bool {
        if let Some(status) = self.status
            && customer.status_kind() != Some(status)
        {
            return false;
        }
        match self.query.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(query) => {
                let needle = query.to_lowercase();
                [
                    &customer.client_name,
                    &customer.phone,
                    &customer.location,
                    &customer.email,
                    &customer.tags,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

pub async fn list_customers(
    db: &dyn Database,
    filter: &CustomerFilter,
) -> Result<Vec<Customer>, LedgerError> {
    Ok(db
        .load_customers()
        .await?
        .into_iter()
        .filter(|c| filter.matches(c))
        .collect())
}

/// Customers marked `Follow-up`, or whose follow-up date is due.
pub fn due_follow_ups(customers: &[Customer], today: NaiveDate) -> Vec<Customer> {
    customers
        .iter()
        .filter(|c| {
            c.status_kind() == Some(CustomerStatus::FollowUp)
                || c.next_follow_up.is_some_and(|next| next <= today)
        })
        .cloned()
        .collect()
}

pub async fn follow_ups(db: &dyn Database, today: NaiveDate) -> Result<Vec<Customer>, LedgerError> {
    let customers = db.load_customers().await?;
    Ok(due_follow_ups(&customers, today))
}

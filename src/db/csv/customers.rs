use async_trait::async_trait;

use crate::db::{Customer, CustomerStore};
use crate::error::DatabaseError;

use super::{CsvBackend, Row, Table, format_date, parse_date};

pub(super) const CUSTOMERS: Table = Table {
    name: "customers",
    file: "customers.csv",
    columns: &[
        "client_name",
        "phone",
        "location",
        "email",
        "status",
        "notes",
        "tags",
        "next_follow_up",
        "assigned_to",
        "last_activity",
    ],
    required: &["client_name"],
};

fn customer_from_row(row: &Row) -> Customer {
    Customer {
        client_name: row.get("client_name").to_string(),
        phone: row.get("phone").to_string(),
        location: row.get("location").to_string(),
        email: row.get("email").to_string(),
        status: row.get("status").to_string(),
        notes: row.get("notes").to_string(),
        tags: row.get("tags").to_string(),
        next_follow_up: parse_date(row.get("next_follow_up")),
        assigned_to: row.get("assigned_to").to_string(),
        last_activity: parse_date(row.get("last_activity")),
    }
}

fn customer_to_values(customer: &Customer) -> Vec<String> {
    vec![
        customer.client_name.clone(),
        customer.phone.clone(),
        customer.location.clone(),
        customer.email.clone(),
        customer.status.clone(),
        customer.notes.clone(),
        customer.tags.clone(),
        customer.next_follow_up.map(format_date).unwrap_or_default(),
        customer.assigned_to.clone(),
        customer.last_activity.map(format_date).unwrap_or_default(),
    ]
}

#[async_trait]
impl CustomerStore for CsvBackend {
    async fn load_customers(&self) -> Result<Vec<Customer>, DatabaseError> {
        let mut state = self.customers.lock().await;
        let rows = self.read_rows(&CUSTOMERS, &mut state).await?;
        Ok(rows.iter().map(customer_from_row).collect())
    }

    async fn save_customers(&self, customers: &[Customer]) -> Result<(), DatabaseError> {
        let mut state = self.customers.lock().await;
        let rows: Vec<Vec<String>> = customers.iter().map(customer_to_values).collect();
        self.write_rows(&CUSTOMERS, &mut state, &rows).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn older_file_without_crm_columns_loads_blank_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("customers.csv"),
            "Client_Name,Phone,Location,Last_Activity\nAhmed Omer,0501234567,Dubai,2025-03-04 10:00:00\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        let customers = backend.load_customers().await.expect("load");
        assert_eq!(
            customers,
            vec![Customer {
                client_name: "Ahmed Omer".to_string(),
                phone: "0501234567".to_string(),
                location: "Dubai".to_string(),
                last_activity: NaiveDate::from_ymd_opt(2025, 3, 4),
                ..Customer::default()
            }]
        );
    }

    #[tokio::test]
    async fn save_customers_writes_full_column_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = CsvBackend::new(dir.path());
        let customer = Customer {
            client_name: "Sara Khan".to_string(),
            status: "Follow-up".to_string(),
            notes: "Prefers calls, after 5pm".to_string(),
            next_follow_up: NaiveDate::from_ymd_opt(2025, 2, 1),
            ..Customer::default()
        };

        backend
            .save_customers(std::slice::from_ref(&customer))
            .await
            .expect("save");

        let raw = std::fs::read_to_string(dir.path().join("customers.csv")).expect("read");
        assert!(raw.starts_with("client_name,phone,location,email,status,notes,tags,next_follow_up"));
        assert_eq!(backend.load_customers().await.expect("load"), vec![customer]);
    }
}

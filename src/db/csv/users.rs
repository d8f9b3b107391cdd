use async_trait::async_trait;

use crate::db::{Role, User, UserStore};
use crate::error::DatabaseError;

use super::{CsvBackend, Row, Table};

pub(super) const USERS: Table = Table {
    name: "users",
    file: "users.csv",
    columns: &["name", "pin", "role", "allowed_pages"],
    required: &["name", "pin"],
};

fn user_from_row(row: &Row) -> Option<User> {
    let name = row.get("name");
    if name.is_empty() {
        tracing::warn!(line = row.line, "Skipping user without a name");
        return None;
    }
    let role = Role::from_label(row.get("role")).unwrap_or_else(|| {
        tracing::warn!(line = row.line, "Unknown role '{}', using viewer", row.get("role"));
        Role::Viewer
    });
    Some(User {
        name: name.to_string(),
        pin: row.get("pin").to_string(),
        role,
        allowed_pages: row
            .get("allowed_pages")
            .split(',')
            .map(|page| page.trim().to_lowercase())
            .filter(|page| !page.is_empty())
            .collect(),
    })
}

pub(super) fn user_to_values(user: &User) -> Vec<String> {
    vec![
        user.name.clone(),
        user.pin.clone(),
        user.role.as_str().to_string(),
        user.allowed_pages.join(","),
    ]
}

#[async_trait]
impl UserStore for CsvBackend {
    async fn load_users(&self) -> Result<Vec<User>, DatabaseError> {
        let mut state = self.users.lock().await;
        let rows = self.read_rows(&USERS, &mut state).await?;
        Ok(rows.iter().filter_map(user_from_row).collect())
    }

    async fn save_users(&self, users: &[User]) -> Result<(), DatabaseError> {
        let mut state = self.users.lock().await;
        let rows: Vec<Vec<String>> = users.iter().map(user_to_values).collect();
        self.write_rows(&USERS, &mut state, &rows).await?;
        tracing::info!(users = users.len(), "Saved users");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn new_table_is_seeded_with_default_accounts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = CsvBackend::new(dir.path());
        backend.ensure_tables().await.expect("ensure");

        let users = backend.load_users().await.expect("load");
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Admin", "Staff", "Viewer"]);
        assert_eq!(users[1].allowed_pages, vec!["dashboard", "quotation", "invoice", "customers"]);

        backend.save_users(&users[..1]).await.expect("save");
        backend.ensure_tables().await.expect("ensure again");
        assert_eq!(backend.load_users().await.expect("load").len(), 1);
    }

    #[tokio::test]
    async fn spreadsheet_export_loads_with_loose_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("users.csv"),
            "Name,PIN,Role,Allowed_Pages\n\
             Sara,4321,Staff,\" Dashboard , receipt,\"\n\
             ,1111,admin,\n\
             Omar,2222,owner,reports\n",
        )
        .expect("seed");
        let backend = CsvBackend::new(dir.path());

        let users = backend.load_users().await.expect("load");
        assert_eq!(
            users,
            vec![
                User {
                    name: "Sara".to_string(),
                    pin: "4321".to_string(),
                    role: Role::Staff,
                    allowed_pages: vec!["dashboard".to_string(), "receipt".to_string()],
                },
                User {
                    name: "Omar".to_string(),
                    pin: "2222".to_string(),
                    role: Role::Viewer,
                    allowed_pages: vec!["reports".to_string()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_pin_column_is_schema_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("users.csv"), "name,role\nSara,staff\n").expect("seed");
        let backend = CsvBackend::new(dir.path());

        let err = backend.load_users().await.expect_err("must fail");
        assert!(matches!(err, DatabaseError::SchemaMismatch { ref column, .. } if column == "pin"));
    }
}

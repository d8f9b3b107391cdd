//! Operators, PIN sign-in, and page permissions.
//!
//! A user signs in with a PIN of at least four digits. Admins may use every
//! page; other roles only the pages listed on their account.

use serde::{Deserialize, Serialize};

use crate::db::{Database, Role, User, normalize_name};
use crate::error::LedgerError;

/// Areas of the ledger an account can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Dashboard,
    Quotation,
    Invoice,
    Receipt,
    Customers,
    Products,
    Reports,
    Settings,
}

impl Page {
    pub const ALL: [Page; 8] = [
        Self::Dashboard,
        Self::Quotation,
        Self::Invoice,
        Self::Receipt,
        Self::Customers,
        Self::Products,
        Self::Reports,
        Self::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Quotation => "quotation",
            Self::Invoice => "invoice",
            Self::Receipt => "receipt",
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Reports => "reports",
            Self::Settings => "settings",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|page| page.as_str().eq_ignore_ascii_case(value))
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const MIN_PIN_LEN: usize = 4;
const MAX_PIN_LEN: usize = 6;

/// A PIN being set must be 4 to 6 ASCII digits.
pub fn check_pin_format(pin: &str) -> Result<(), LedgerError> {
    let pin = pin.trim();
    if (MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(LedgerError::Validation(format!(
            "PIN must be {MIN_PIN_LEN} to {MAX_PIN_LEN} digits"
        )))
    }
}

/// The account holding `pin`. PINs shorter than four characters never match.
pub fn validate_pin<'a>(users: &'a [User], pin: &str) -> Option<&'a User> {
    let pin = pin.trim();
    if pin.len() < MIN_PIN_LEN {
        return None;
    }
    users.iter().find(|user| user.pin.trim() == pin)
}

pub fn is_admin(user: Option<&User>) -> bool {
    user.is_some_and(|user| user.role == Role::Admin)
}

/// Admins bypass the page list.
pub fn can_access(user: Option<&User>, page: Page) -> bool {
    match user {
        None => false,
        Some(user) if user.role == Role::Admin => true,
        Some(user) => user.allowed_pages.iter().any(|p| p == page.as_str()),
    }
}

fn parse_pages(pages: &[String]) -> Result<Vec<String>, LedgerError> {
    let mut parsed: Vec<String> = Vec::with_capacity(pages.len());
    for raw in pages.iter().filter(|p| !p.trim().is_empty()) {
        let page = Page::from_label(raw).ok_or_else(|| {
            let known: Vec<&str> = Page::ALL.iter().map(|p| p.as_str()).collect();
            LedgerError::Validation(format!(
                "unknown page '{}' (expected one of {})",
                raw.trim(),
                known.join(", ")
            ))
        })?;
        if !parsed.iter().any(|p| p == page.as_str()) {
            parsed.push(page.as_str().to_string());
        }
    }
    Ok(parsed)
}

fn position_of(users: &[User], name: &str) -> Option<usize> {
    let wanted = normalize_name(name);
    users.iter().position(|u| normalize_name(&u.name) == wanted)
}

fn admin_count(users: &[User]) -> usize {
    users.iter().filter(|u| u.role == Role::Admin).count()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub pin: String,
    pub role: Role,
    /// Role defaults when absent.
    #[serde(default)]
    pub allowed_pages: Option<Vec<String>>,
}

/// Fields to change; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub pin: Option<String>,
    pub role: Option<Role>,
    pub allowed_pages: Option<Vec<String>>,
}

pub async fn list_users(db: &dyn Database) -> Result<Vec<User>, LedgerError> {
    Ok(db.load_users().await?)
}

/// Resolve a PIN to its account.
pub async fn sign_in(db: &dyn Database, pin: &str) -> Result<User, LedgerError> {
    let users = db.load_users().await?;
    match validate_pin(&users, pin) {
        Some(user) => {
            tracing::debug!(user = %user.name, role = %user.role, "Signed in");
            Ok(user.clone())
        }
        None => Err(LedgerError::AccessDenied("invalid PIN".to_string())),
    }
}

pub async fn add_user(db: &dyn Database, new: NewUser) -> Result<User, LedgerError> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(LedgerError::Validation("user name is required".to_string()));
    }
    check_pin_format(&new.pin)?;

    let mut users = db.load_users().await?;
    if position_of(&users, name).is_some() {
        return Err(LedgerError::DuplicateUser(name.to_string()));
    }
    let pin = new.pin.trim();
    if users.iter().any(|u| u.pin.trim() == pin) {
        return Err(LedgerError::Validation(
            "this PIN is already in use".to_string(),
        ));
    }

    let allowed_pages = match new.allowed_pages {
        Some(ref pages) => parse_pages(pages)?,
        None => new
            .role
            .default_pages()
            .iter()
            .map(|p| p.to_string())
            .collect(),
    };
    let user = User {
        name: name.to_string(),
        pin: pin.to_string(),
        role: new.role,
        allowed_pages,
    };
    users.push(user.clone());
    db.save_users(&users).await?;
    tracing::info!(user = %user.name, role = %user.role, "Created user");
    Ok(user)
}

pub async fn update_user(
    db: &dyn Database,
    name: &str,
    update: UserUpdate,
) -> Result<User, LedgerError> {
    let mut users = db.load_users().await?;
    let idx = position_of(&users, name).ok_or_else(|| LedgerError::not_found("user", name.trim()))?;

    if let Some(ref rename) = update.name {
        let rename = rename.trim();
        if rename.is_empty() {
            return Err(LedgerError::Validation("user name is required".to_string()));
        }
        if position_of(&users, rename).is_some_and(|other| other != idx) {
            return Err(LedgerError::DuplicateUser(rename.to_string()));
        }
    }
    if let Some(ref pin) = update.pin {
        check_pin_format(pin)?;
        let pin = pin.trim();
        if users
            .iter()
            .enumerate()
            .any(|(i, u)| i != idx && u.pin.trim() == pin)
        {
            return Err(LedgerError::Validation(
                "this PIN is already in use".to_string(),
            ));
        }
    }
    if update.role.is_some_and(|role| role != Role::Admin)
        && users[idx].role == Role::Admin
        && admin_count(&users) == 1
    {
        return Err(LedgerError::Validation(
            "the last admin cannot be demoted".to_string(),
        ));
    }
    let allowed_pages = update.allowed_pages.as_deref().map(parse_pages).transpose()?;

    let user = &mut users[idx];
    if let Some(rename) = update.name {
        user.name = rename.trim().to_string();
    }
    if let Some(pin) = update.pin {
        user.pin = pin.trim().to_string();
    }
    if let Some(role) = update.role {
        user.role = role;
    }
    if let Some(pages) = allowed_pages {
        user.allowed_pages = pages;
    }
    let updated = user.clone();
    db.save_users(&users).await?;
    tracing::info!(user = %updated.name, role = %updated.role, "Updated user");
    Ok(updated)
}

pub async fn delete_user(db: &dyn Database, name: &str) -> Result<User, LedgerError> {
    let mut users = db.load_users().await?;
    let idx = position_of(&users, name).ok_or_else(|| LedgerError::not_found("user", name.trim()))?;
    if users[idx].role == Role::Admin && admin_count(&users) == 1 {
        return Err(LedgerError::Validation(
            "the last admin cannot be deleted".to_string(),
        ));
    }
    let removed = users.remove(idx);
    db.save_users(&users).await?;
    tracing::info!(user = %removed.name, "Deleted user");
    Ok(removed)
}

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::repo_types::{Contact, ContactPatch, ContactSearch, NewContact};
use crate::error::{AppError, AppResult};
use crate::validation::{normalize_email, require_email, require_len};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

const NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 100;
const PHONE_MAX: usize = 20;

fn check_name(name: &str) -> AppResult<()> {
    require_len("name", name.trim(), 1, NAME_MAX)
}

fn check_email(email: &str) -> AppResult<()> {
    require_len("email", email, 1, EMAIL_MAX)?;
    require_email(email)
}

fn check_phone(phone: &str) -> AppResult<()> {
    require_len("phone", phone.trim(), 1, PHONE_MAX)
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(with = "iso_date")]
    pub birthdate: Date,
}

impl ContactRequest {
    pub fn into_new(self) -> AppResult<NewContact> {
        let email = normalize_email(&self.email);
        check_name(&self.name)?;
        check_email(&email)?;
        check_phone(&self.phone)?;
        Ok(NewContact {
            name: self.name.trim().to_string(),
            email,
            phone: self.phone.trim().to_string(),
            birthdate: self.birthdate,
        })
    }
}

/// Partial update; absent fields stay as stored.
#[derive(Debug, Default, Deserialize)]
pub struct ContactUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub birthdate: Option<Date>,
}

impl ContactUpdateRequest {
    pub fn into_patch(self) -> AppResult<ContactPatch> {
        let name = self.name.map(|n| n.trim().to_string());
        let email = self.email.as_deref().map(normalize_email);
        let phone = self.phone.map(|p| p.trim().to_string());
        if let Some(n) = &name {
            check_name(n)?;
        }
        if let Some(e) = &email {
            check_email(e)?;
        }
        if let Some(p) = &phone {
            check_phone(p)?;
        }
        Ok(ContactPatch {
            name,
            email,
            phone,
            birthdate: self.birthdate,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(with = "iso_date")]
    pub birthdate: Date,
    pub avatar: Option<String>,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            phone: c.phone,
            birthdate: c.birthdate,
            avatar: c.avatar,
        }
    }
}

pub const DEFAULT_LIMIT: i64 = 25;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub skip: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            skip: 0,
        }
    }
}

impl Pagination {
    /// `(limit, skip)` after range checks.
    pub fn bounds(&self) -> AppResult<(i64, i64)> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(AppError::bad_request(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        if self.skip < 0 {
            return Err(AppError::bad_request("skip must not be negative"));
        }
        Ok((self.limit, self.skip))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<SearchQuery> for ContactSearch {
    fn from(q: SearchQuery) -> Self {
        ContactSearch::new(q.name, q.email, q.phone)
    }
}

#[derive(Debug, Deserialize)]
pub struct BirthdayQuery {
    #[serde(default = "default_days")]
    pub days: u16,
}

fn default_days() -> u16 {
    7
}

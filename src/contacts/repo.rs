use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{BirthdayWindow, Contact, ContactPatch, ContactSearch, NewContact};

/// Returned by [`ContactRepository::update`] when the new email is already
/// used by another contact of the same owner.
#[derive(Debug, thiserror::Error)]
#[error("contact email already in use")]
pub struct DuplicateContactEmail;

const CONTACT_COLUMNS: &str = "id, user_id, name, email, phone, birthdate, avatar, created_at";

/// Every query is scoped to `owner`; rows of other users are invisible.
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn get_all(&self, owner: Uuid, limit: i64, skip: i64) -> anyhow::Result<Vec<Contact>>;
    async fn get_by_id(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>>;
    async fn get_by_email(&self, owner: Uuid, email: &str) -> anyhow::Result<Option<Contact>>;
    /// `None` when the owner already has a contact with this email.
    async fn create(&self, owner: Uuid, new: NewContact) -> anyhow::Result<Option<Contact>>;
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>>;
    async fn set_avatar(&self, owner: Uuid, id: Uuid, url: &str) -> anyhow::Result<Option<Contact>>;
    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>>;
    async fn search(&self, owner: Uuid, filter: &ContactSearch) -> anyhow::Result<Vec<Contact>>;
    async fn upcoming_birthdays(
        &self,
        owner: Uuid,
        window: &BirthdayWindow,
    ) -> anyhow::Result<Vec<Contact>>;
}

#[derive(Clone)]
pub struct PgContactRepository {
    db: PgPool,
}

impl PgContactRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn get_all(&self, owner: Uuid, limit: i64, skip: i64) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
              FROM contacts
             WHERE user_id = $1
             ORDER BY name, id
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await
        .context("list contacts")?;
        Ok(rows)
    }

    async fn get_by_id(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("get contact by id")?;
        Ok(row)
    }

    async fn get_by_email(&self, owner: Uuid, email: &str) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = $1 AND email = $2"
        ))
        .bind(owner)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("get contact by email")?;
        Ok(row)
    }

    async fn create(&self, owner: Uuid, new: NewContact) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            INSERT INTO contacts (user_id, name, email, phone, birthdate)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, email) DO NOTHING
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.birthdate)
        .fetch_optional(&self.db)
        .await
        .context("insert contact")?;
        Ok(row)
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            r#"
            UPDATE contacts
               SET name      = COALESCE($3, name),
                   email     = COALESCE($4, email),
                   phone     = COALESCE($5, phone),
                   birthdate = COALESCE($6, birthdate)
             WHERE id = $1 AND user_id = $2
            RETURNING {CONTACT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.phone)
        .bind(patch.birthdate)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => anyhow::Error::new(DuplicateContactEmail),
            _ => anyhow::Error::new(e).context("update contact"),
        })?;
        Ok(row)
    }

    async fn set_avatar(&self, owner: Uuid, id: Uuid, url: &str) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts SET avatar = $3 WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(url)
        .fetch_optional(&self.db)
        .await
        .context("set contact avatar")?;
        Ok(row)
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&format!(
            "DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await
        .context("delete contact")?;
        Ok(row)
    }

    async fn search(&self, owner: Uuid, filter: &ContactSearch) -> anyhow::Result<Vec<Contact>> {
        let (name, email, phone) = filter.like_patterns();
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
              FROM contacts
             WHERE user_id = $1
               AND ($2::text IS NULL OR name  ILIKE $2 ESCAPE '\')
               AND ($3::text IS NULL OR email ILIKE $3 ESCAPE '\')
               AND ($4::text IS NULL OR phone ILIKE $4 ESCAPE '\')
             ORDER BY name, id
            "#
        ))
        .bind(owner)
        .bind(name)
        .bind(email)
        .bind(phone)
        .fetch_all(&self.db)
        .await
        .context("search contacts")?;
        Ok(rows)
    }

    async fn upcoming_birthdays(
        &self,
        owner: Uuid,
        window: &BirthdayWindow,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&format!(
            r#"
            SELECT {CONTACT_COLUMNS}
              FROM contacts
             WHERE user_id = $1
               AND (EXTRACT(MONTH FROM birthdate)::int, EXTRACT(DAY FROM birthdate)::int)
                   IN (SELECT m, d FROM UNNEST($2::int4[], $3::int4[]) AS w(m, d))
            "#
        ))
        .bind(owner)
        .bind(window.months())
        .bind(window.days_of_month())
        .fetch_all(&self.db)
        .await
        .context("upcoming birthdays")?;
        Ok(rows)
    }
}

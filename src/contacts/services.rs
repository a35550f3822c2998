use std::sync::Arc;

use axum::extract::FromRef;
use time::Date;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::ContactResponse,
    repo::{ContactRepository, DuplicateContactEmail},
    repo_types::{
        BirthdayWindow, Contact, ContactPatch, ContactSearch, NewContact,
        MAX_BIRTHDAY_WINDOW_DAYS,
    },
};
use crate::{
    avatars::{store_avatar, AvatarUpload},
    error::{AppError, AppResult},
    state::AppState,
    storage::{contact_avatar_key, StorageClient},
};

#[derive(Clone)]
pub struct ContactService {
    contacts: Arc<dyn ContactRepository>,
    storage: Arc<dyn StorageClient>,
}

impl FromRef<AppState> for ContactService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            contacts: state.contacts.clone(),
            storage: state.storage.clone(),
        }
    }
}

fn contact_not_found() -> AppError {
    AppError::not_found("Contact not found")
}

fn duplicate_email() -> AppError {
    AppError::conflict("Contact with this email already exists")
}

/// Rejects rows that slipped past the owner filter.
fn ensure_owned(owner: Uuid, contact: Contact) -> AppResult<Contact> {
    if contact.user_id != owner {
        warn!(contact_id = %contact.id, "contact owner mismatch");
        return Err(AppError::forbidden("Not allowed to access this contact"));
    }
    Ok(contact)
}

fn owned_list(owner: Uuid, rows: Vec<Contact>) -> AppResult<Vec<ContactResponse>> {
    rows.into_iter()
        .map(|c| ensure_owned(owner, c).map(ContactResponse::from))
        .collect()
}

impl ContactService {
    pub async fn list(&self, owner: Uuid, limit: i64, skip: i64) -> AppResult<Vec<ContactResponse>> {
        let rows = self.contacts.get_all(owner, limit, skip).await?;
        owned_list(owner, rows)
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> AppResult<Contact> {
        let contact = self
            .contacts
            .get_by_id(owner, id)
            .await?
            .ok_or_else(contact_not_found)?;
        ensure_owned(owner, contact)
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> AppResult<ContactResponse> {
        self.find(owner, id).await.map(ContactResponse::from)
    }

    #[instrument(skip(self, new))]
    pub async fn create(&self, owner: Uuid, new: NewContact) -> AppResult<ContactResponse> {
        if self.contacts.get_by_email(owner, &new.email).await?.is_some() {
            return Err(duplicate_email());
        }
        let contact = self
            .contacts
            .create(owner, new)
            .await?
            .ok_or_else(duplicate_email)?;
        let contact = ensure_owned(owner, contact)?;
        info!(contact_id = %contact.id, "contact created");
        Ok(contact.into())
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, owner: Uuid, id: Uuid, patch: ContactPatch) -> AppResult<ContactResponse> {
        let current = self.find(owner, id).await?;
        if let Some(email) = patch.email.as_deref() {
            if email != current.email {
                let taken = self.contacts.get_by_email(owner, email).await?;
                if taken.is_some_and(|other| other.id != id) {
                    return Err(duplicate_email());
                }
            }
        }
        let contact = self
            .contacts
            .update(owner, id, patch)
            .await
            .map_err(|e| {
                if e.downcast_ref::<DuplicateContactEmail>().is_some() {
                    warn!("contact email taken concurrently");
                    duplicate_email()
                } else {
                    AppError::from(e)
                }
            })?
            .ok_or_else(contact_not_found)?;
        let contact = ensure_owned(owner, contact)?;
        info!("contact updated");
        Ok(contact.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> AppResult<()> {
        let removed = self
            .contacts
            .delete(owner, id)
            .await?
            .ok_or_else(contact_not_found)?;
        let removed = ensure_owned(owner, removed)?;
        if removed.avatar.is_some() {
            let key = contact_avatar_key(owner, id);
            if let Err(e) = self.storage.delete_object(&key).await {
                warn!(error = ?e, key, "failed to delete contact avatar");
            }
        }
        info!("contact deleted");
        Ok(())
    }

    pub async fn search(&self, owner: Uuid, filter: ContactSearch) -> AppResult<Vec<ContactResponse>> {
        let rows = self.contacts.search(owner, &filter).await?;
        owned_list(owner, rows)
    }

    /// Contacts with a birthday in `[today, today + days]`, soonest first.
    #[instrument(skip(self))]
    pub async fn upcoming_birthdays(
        &self,
        owner: Uuid,
        days: u16,
        today: Date,
    ) -> AppResult<Vec<ContactResponse>> {
        if days > MAX_BIRTHDAY_WINDOW_DAYS {
            return Err(AppError::bad_request(format!(
                "days must be between 0 and {}",
                MAX_BIRTHDAY_WINDOW_DAYS
            )));
        }
        let window = BirthdayWindow::new(today, days);
        let mut rows = self.contacts.upcoming_birthdays(owner, &window).await?;
        rows.sort_by_key(|c| (window.offset_of(c.birthdate), c.name.clone()));
        owned_list(owner, rows)
    }

    #[instrument(skip(self, upload))]
    pub async fn update_avatar(
        &self,
        owner: Uuid,
        id: Uuid,
        upload: AvatarUpload,
    ) -> AppResult<ContactResponse> {
        self.find(owner, id).await?;
        let url = store_avatar(self.storage.as_ref(), &contact_avatar_key(owner, id), upload).await?;
        let contact = self
            .contacts
            .set_avatar(owner, id, &url)
            .await?
            .ok_or_else(contact_not_found)?;
        Ok(ensure_owned(owner, contact)?.into())
    }
}

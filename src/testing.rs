//! In-memory backends and a pre-wired `AppState` for unit and router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use axum::async_trait;
use bytes::Bytes;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::cache::Cache;
use crate::config::AppConfig;
use crate::contacts::repo::{ContactRepository, DuplicateContactEmail};
use crate::contacts::repo_types::{BirthdayWindow, Contact, ContactPatch, ContactSearch, NewContact};
use crate::mail::Mailer;
use crate::state::AppState;
use crate::storage::StorageClient;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{NewUser, User, UserPatch, UserRole};

/// Case-insensitive substring match, the in-memory counterpart of the `ILIKE` query.
fn search_matches(filter: &ContactSearch, c: &Contact) -> bool {
    fn hit(filter: &Option<String>, value: &str) -> bool {
        filter
            .as_deref()
            .map_or(true, |f| value.to_lowercase().contains(&f.to_lowercase()))
    }
    hit(&filter.name, &c.name) && hit(&filter.email, &c.email) && hit(&filter.phone, &c.phone)
}

#[derive(Default)]
pub struct InMemoryContacts {
    rows: Mutex<Vec<Contact>>,
}

impl InMemoryContacts {
    pub fn count_for(&self, owner: Uuid) -> usize {
        self.rows.lock().unwrap().iter().filter(|c| c.user_id == owner).count()
    }

    fn remove_owner(&self, owner: Uuid) {
        self.rows.lock().unwrap().retain(|c| c.user_id != owner);
    }

    fn insert(&self, owner: Uuid, new: NewContact) -> Option<Contact> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|c| c.user_id == owner && c.email == new.email) {
            return None;
        }
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id: owner,
            name: new.name,
            email: new.email,
            phone: new.phone,
            birthdate: new.birthdate,
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(contact.clone());
        Some(contact)
    }

    fn owned_sorted(&self, owner: Uuid) -> Vec<Contact> {
        let mut rows: Vec<Contact> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rows
    }

    fn modify<F>(&self, owner: Uuid, id: Uuid, f: F) -> Option<Contact>
    where
        F: FnOnce(&mut Contact),
    {
        let mut rows = self.rows.lock().unwrap();
        let contact = rows.iter_mut().find(|c| c.id == id && c.user_id == owner)?;
        f(contact);
        Some(contact.clone())
    }
}

#[async_trait]
impl ContactRepository for InMemoryContacts {
    async fn get_all(&self, owner: Uuid, limit: i64, skip: i64) -> anyhow::Result<Vec<Contact>> {
        Ok(self
            .owned_sorted(owner)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_by_id(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        Ok(self.owned_sorted(owner).into_iter().find(|c| c.id == id))
    }

    async fn get_by_email(&self, owner: Uuid, email: &str) -> anyhow::Result<Option<Contact>> {
        Ok(self.owned_sorted(owner).into_iter().find(|c| c.email == email))
    }

    async fn create(&self, owner: Uuid, new: NewContact) -> anyhow::Result<Option<Contact>> {
        Ok(self.insert(owner, new))
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: ContactPatch,
    ) -> anyhow::Result<Option<Contact>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = patch.email.as_deref() {
            if rows
                .iter()
                .any(|c| c.user_id == owner && c.id != id && c.email == email)
            {
                return Err(DuplicateContactEmail.into());
            }
        }
        let Some(c) = rows.iter_mut().find(|c| c.id == id && c.user_id == owner) else {
            return Ok(None);
        };
        if let Some(v) = patch.name {
            c.name = v;
        }
        if let Some(v) = patch.email {
            c.email = v;
        }
        if let Some(v) = patch.phone {
            c.phone = v;
        }
        if let Some(v) = patch.birthdate {
            c.birthdate = v;
        }
        Ok(Some(c.clone()))
    }

    async fn set_avatar(&self, owner: Uuid, id: Uuid, url: &str) -> anyhow::Result<Option<Contact>> {
        Ok(self.modify(owner, id, |c| c.avatar = Some(url.to_string())))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|c| c.id == id && c.user_id == owner);
        Ok(pos.map(|i| rows.remove(i)))
    }

    async fn search(&self, owner: Uuid, filter: &ContactSearch) -> anyhow::Result<Vec<Contact>> {
        Ok(self
            .owned_sorted(owner)
            .into_iter()
            .filter(|c| search_matches(filter, c))
            .collect())
    }

    async fn upcoming_birthdays(
        &self,
        owner: Uuid,
        window: &BirthdayWindow,
    ) -> anyhow::Result<Vec<Contact>> {
        Ok(self
            .owned_sorted(owner)
            .into_iter()
            .filter(|c| window.contains(c.birthdate))
            .collect())
    }
}

/// Users table with the contacts cascade wired in.
pub struct InMemoryUsers {
    rows: Mutex<Vec<User>>,
    contacts: Arc<InMemoryContacts>,
}

impl InMemoryUsers {
    pub fn new(contacts: Arc<InMemoryContacts>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            contacts,
        }
    }

    pub fn find(&self, id: Uuid) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn find_by<P: Fn(&User) -> bool>(&self, pred: P) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| pred(u)).cloned()
    }

    fn insert(&self, new: NewUser) -> Option<User> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == new.email) {
            return None;
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            surname: new.surname,
            email: new.email,
            hashed_password: new.hashed_password,
            role: new.role,
            is_verified: false,
            avatar: new.avatar,
            refresh_token: None,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Some(user)
    }

    fn modify<P, F>(&self, pred: P, f: F) -> Option<User>
    where
        P: Fn(&User) -> bool,
        F: FnOnce(&mut User),
    {
        let mut rows = self.rows.lock().unwrap();
        let user = rows.iter_mut().find(|u| pred(u))?;
        f(user);
        Some(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn get_all(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.find(id))
    }

    async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_by(|u| u.email == email))
    }

    async fn get_by_refresh_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_by(|u| u.refresh_token.as_deref() == Some(token)))
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        Ok(self.insert(new))
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> anyhow::Result<Option<User>> {
        Ok(self.modify(
            |u| u.id == id,
            |u| {
                if let Some(v) = patch.name {
                    u.name = v;
                }
                if let Some(v) = patch.surname {
                    u.surname = v;
                }
                if let Some(v) = patch.role {
                    u.role = v;
                }
                if let Some(v) = patch.is_verified {
                    u.is_verified = v;
                }
            },
        ))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let removed = {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|u| u.id != id);
            rows.len() != before
        };
        if removed {
            self.contacts.remove_owner(id);
        }
        Ok(removed)
    }

    async fn confirm_email(&self, email: &str) -> anyhow::Result<()> {
        self.modify(|u| u.email == email, |u| u.is_verified = true);
        Ok(())
    }

    async fn update_avatar_url(&self, email: &str, url: &str) -> anyhow::Result<Option<User>> {
        Ok(self.modify(|u| u.email == email, |u| u.avatar = Some(url.to_string())))
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        self.modify(|u| u.id == id, |u| u.refresh_token = token.map(str::to_string));
        Ok(())
    }

    async fn update_password(&self, id: Uuid, hashed_password: &str) -> anyhow::Result<()> {
        self.modify(
            |u| u.id == id,
            |u| {
                u.hashed_password = hashed_password.to_string();
                u.refresh_token = None;
            },
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, u64)>>,
}

impl MemoryCache {
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, ttl_secs));
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Cache whose backend is always unreachable.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl_secs: u64) -> anyhow::Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn delete(&self, _key: &str) -> anyhow::Result<()> {
        Err(anyhow!("connection refused"))
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeStorage {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://fake.local/{}", key)
    }
}

/// Keeps `(email, link)` for every verification mail.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, email: &str, _name: &str, link: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<InMemoryUsers>,
    pub contacts: Arc<InMemoryContacts>,
    pub cache: Arc<MemoryCache>,
    pub storage: Arc<FakeStorage>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Same wiring, but every cache call fails.
    pub fn with_failing_cache() -> Self {
        Self::build(Some(Arc::new(FailingCache)))
    }

    fn build(cache_override: Option<Arc<dyn Cache>>) -> Self {
        let config = AppConfig::from_lookup(|_| None).expect("default config");
        let contacts = Arc::new(InMemoryContacts::default());
        let users = Arc::new(InMemoryUsers::new(contacts.clone()));
        let cache = Arc::new(MemoryCache::default());
        let storage = Arc::new(FakeStorage::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState::with_repositories(
            config,
            users.clone(),
            contacts.clone(),
            cache_override.unwrap_or_else(|| cache.clone() as Arc<dyn Cache>),
            storage.clone(),
            mailer.clone(),
        );

        Self {
            state,
            users,
            contacts,
            cache,
            storage,
            mailer,
        }
    }

    pub fn seed_user(&self, email: &str, password: &str, role: UserRole, verified: bool) -> User {
        let user = self
            .users
            .insert(NewUser {
                name: "Test".into(),
                surname: "User".into(),
                email: email.to_string(),
                hashed_password: hash_password(password).expect("hash"),
                role,
                avatar: None,
            })
            .expect("seed user");
        if verified {
            return self
                .users
                .modify(|u| u.id == user.id, |u| u.is_verified = true)
                .expect("seeded user exists");
        }
        user
    }

    pub fn seed_contact(
        &self,
        owner: Uuid,
        name: &str,
        email: &str,
        phone: &str,
        (year, month, day): (i32, u8, u8),
    ) -> Contact {
        let month = Month::try_from(month).expect("month");
        let birthdate = Date::from_calendar_date(year, month, day).expect("date");
        self.contacts
            .insert(
                owner,
                NewContact {
                    name: name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                    birthdate,
                },
            )
            .expect("unique contact email")
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{User, UserPatch, UserRole};
use crate::error::AppResult;
use crate::validation::require_len;

/// Public part of the user returned to the client. Also the cached `/users/me` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub role: UserRole,
    pub avatar: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            surname: u.surname.clone(),
            email: u.email.clone(),
            role: u.role,
            avatar: u.avatar.clone(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self::from(&u)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar: Option<String>,
}

/// Admin-side partial update of a user.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub role: Option<UserRole>,
    pub is_verified: Option<bool>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> AppResult<UserPatch> {
        if let Some(name) = &self.name {
            require_len("name", name, 2, 50)?;
        }
        if let Some(surname) = &self.surname {
            require_len("surname", surname, 2, 50)?;
        }
        Ok(UserPatch {
            name: self.name,
            surname: self.surname,
            role: self.role,
            is_verified: self.is_verified,
        })
    }
}

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::users::repo_types::UserRole;
use crate::validation::{normalize_email, require_email, require_len};

pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 100;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

impl SignupRequest {
    /// Normalizes the email in place and checks every field.
    pub fn validate(&mut self) -> AppResult<()> {
        self.email = normalize_email(&self.email);
        self.name = self.name.trim().to_string();
        self.surname = self.surname.trim().to_string();
        require_len("name", &self.name, 2, 50)?;
        require_len("surname", &self.surname, 2, 50)?;
        require_len("email", &self.email, 3, 255)?;
        require_email(&self.email)?;
        require_len("password", &self.password, PASSWORD_MIN, PASSWORD_MAX)?;
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestEmail {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

/// Access/refresh pair returned after login or refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

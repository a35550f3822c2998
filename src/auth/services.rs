use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use super::{
    claims::TokenKind,
    dto::{
        LoginRequest, MessageResponse, ResetPasswordRequest, SignupRequest, TokenResponse,
        PASSWORD_MAX, PASSWORD_MIN,
    },
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};
use crate::{
    cache::{cache_delete, user_key, Cache},
    error::{AppError, AppResult},
    mail::{verification_link, Mailer},
    state::AppState,
    users::{
        repo::UserRepository,
        repo_types::{NewUser, User, UserRole},
    },
    validation::{normalize_email, require_len},
};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
    mailer: Arc<dyn Mailer>,
    jwt: JwtKeys,
    api_url: String,
    allow_admin_signup: bool,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            cache: state.cache.clone(),
            mailer: state.mailer.clone(),
            jwt: state.jwt.clone(),
            api_url: state.config.api_url.clone(),
            allow_admin_signup: state.config.allow_admin_signup,
        }
    }
}

fn bad_credentials() -> AppError {
    AppError::unauthenticated("Incorrect email or password")
}

impl AuthService {
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn signup(&self, mut req: SignupRequest) -> AppResult<User> {
        req.validate()?;

        if req.role == UserRole::Admin && !self.allow_admin_signup {
            warn!("admin signup refused");
            return Err(AppError::forbidden("Cannot self-register as admin"));
        }

        if self.users.get_by_email(&req.email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::conflict("User with this email already exists"));
        }

        let hashed_password = hash_password(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                name: req.name,
                surname: req.surname,
                email: req.email,
                hashed_password,
                role: req.role,
                avatar: None,
            })
            .await?
            .ok_or_else(|| {
                warn!("email registered concurrently");
                AppError::conflict("User with this email already exists")
            })?;

        self.send_verification(&user).await;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Delivery failures are logged; the user can ask for another link.
    async fn send_verification(&self, user: &User) {
        let token = match self.jwt.create_verification_token(&user.email) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "verification token not created");
                return;
            }
        };
        let link = verification_link(&self.api_url, &token);
        if let Err(e) = self
            .mailer
            .send_verification(&user.email, &user.name, &link)
            .await
        {
            warn!(error = %e, user_id = %user.id, "verification email not sent");
        }
    }

    #[instrument(skip(self, req))]
    pub async fn login(&self, req: LoginRequest) -> AppResult<TokenResponse> {
        let email = normalize_email(&req.email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!("login unknown email");
            return Err(bad_credentials());
        };

        if !verify_password(&req.password, &user.hashed_password)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(bad_credentials());
        }

        if !user.is_verified {
            warn!(user_id = %user.id, "login before email verification");
            return Err(AppError::unauthenticated("Email not verified"));
        }

        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(tokens)
    }

    /// Signs a fresh pair and stores the refresh half on the user row.
    async fn issue_tokens(&self, user: &User) -> AppResult<TokenResponse> {
        let access_token = self.jwt.create_access_token(&user.email)?;
        let refresh_token = self.jwt.create_refresh_token(&user.email)?;
        self.users
            .set_refresh_token(user.id, Some(&refresh_token))
            .await?;
        Ok(TokenResponse::bearer(access_token, refresh_token))
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse> {
        let claims = self
            .jwt
            .decode_kind(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                warn!(error = %e, "refresh token rejected");
                AppError::unauthenticated("Invalid refresh token")
            })?;

        let user = self
            .users
            .get_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthenticated("Invalid refresh token"))?;

        if user.refresh_token.as_deref() != Some(refresh_token) {
            warn!(user_id = %user.id, "refresh token does not match stored token");
            return Err(AppError::unauthenticated("Invalid refresh token"));
        }

        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, "tokens refreshed");
        Ok(tokens)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn logout(&self, user: &User) -> AppResult<()> {
        self.users.set_refresh_token(user.id, None).await?;
        info!("user logged out");
        Ok(())
    }

    #[instrument(skip(self, token))]
    pub async fn confirm_email(&self, token: &str) -> AppResult<MessageResponse> {
        let claims = self
            .jwt
            .decode_kind(token, TokenKind::EmailVerification)
            .map_err(|e| {
                warn!(error = %e, "verification token rejected");
                AppError::bad_request("Invalid token for email verification")
            })?;

        let user = self
            .users
            .get_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::bad_request("Verification error"))?;

        if user.is_verified {
            return Ok(MessageResponse::new("Your email is already confirmed"));
        }

        self.users.confirm_email(&user.email).await?;
        cache_delete(self.cache.as_ref(), &user_key(user.id)).await;
        info!(user_id = %user.id, "email confirmed");
        Ok(MessageResponse::new("Email confirmed"))
    }

    /// Same answer whether or not the address is known.
    #[instrument(skip(self, email))]
    pub async fn request_email(&self, email: &str) -> AppResult<MessageResponse> {
        let email = normalize_email(email);
        match self.users.get_by_email(&email).await? {
            Some(user) if user.is_verified => {
                return Ok(MessageResponse::new("Your email is already confirmed"));
            }
            Some(user) => self.send_verification(&user).await,
            None => {}
        }
        Ok(MessageResponse::new("Check your email for confirmation"))
    }

    #[instrument(skip(self, req))]
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> AppResult<MessageResponse> {
        require_len("new_password", &req.new_password, PASSWORD_MIN, PASSWORD_MAX)?;

        let email = normalize_email(&req.email);
        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or_else(bad_credentials)?;

        if !verify_password(&req.old_password, &user.hashed_password)? {
            warn!(user_id = %user.id, "password reset with wrong old password");
            return Err(bad_credentials());
        }

        let hashed = hash_password(&req.new_password)?;
        self.users.update_password(user.id, &hashed).await?;
        info!(user_id = %user.id, "password changed");
        Ok(MessageResponse::new("Password updated"))
    }
}

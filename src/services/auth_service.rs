// AuthService - signup, login and current-user lookup

use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::validation::{validate_email, validate_password};
use crate::core::EntityId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{Database, PasswordService};
use crate::models::{LoginRequest, NewUser, PublicUser, SignupRequest, UserEdges};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    passwords: Arc<PasswordService>,
}

impl AuthService {
    pub fn new(db: Arc<Database>, passwords: Arc<PasswordService>) -> Self {
        Self { db, passwords }
    }

    /// Checks run in a fixed order: email format, required names, username
    /// uniqueness, email uniqueness, password length.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn signup(&self, request: SignupRequest) -> AppResult<PublicUser> {
        let SignupRequest {
            full_name,
            username,
            email,
            password,
        } = request;
        let full_name = full_name.trim().to_string();
        let username = username.trim().to_string();
        let email = email.trim().to_string();

        validate_email(&email)?;
        if full_name.is_empty() || username.is_empty() {
            return Err(AppError::BadRequest("Full name and username are required".to_string()));
        }
        if self.db.find_user_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }
        if self.db.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email is already taken".to_string()));
        }
        validate_password(&password)?;

        let password_hash = self.passwords.hash(&password)?;
        let record = self
            .db
            .insert_user(NewUser {
                full_name,
                username,
                email,
                password_hash,
            })
            .await?;

        info!("Created user {} ({})", record.username, record.id);
        Ok(PublicUser::from_record(record, UserEdges::default()))
    }

    /// Unknown usernames and wrong passwords fail identically, and both pay
    /// for one password verification.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> AppResult<PublicUser> {
        let user = self.db.find_user_by_username(request.username.trim()).await?;

        let verified = match &user {
            Some(user) => self.passwords.verify(&request.password, &user.password_hash)?,
            None => self.passwords.verify_decoy(&request.password)?,
        };

        match user {
            Some(user) if verified => {
                info!("User {} logged in", user.id);
                self.current_user(user.id).await
            }
            _ => Err(AppError::BadRequest(INVALID_CREDENTIALS.to_string())),
        }
    }

    pub async fn current_user(&self, user_id: EntityId) -> AppResult<PublicUser> {
        self.db
            .public_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

//! Credential store
//!
//! Looks up staff accounts by username and verifies passwords against the
//! stored Argon2id hash. Unknown usernames and wrong passwords look the same
//! to callers.

use std::sync::Arc;

use crate::config::BootstrapUser;
use crate::db::repositories::UserRepository;
use crate::models::User;
use crate::services::password::{hash_password, verify_password};

/// Error types for credential operations
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Input rejected before touching the store
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

const MIN_PASSWORD_LEN: usize = 8;

/// Credential verifier and account creation
pub struct CredentialService {
    users: Arc<dyn UserRepository>,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Return the user when `username` exists and `password` matches.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Option<User>, CredentialError> {
        let Some(user) = self.users.get_by_username(username.trim()).await? else {
            tracing::debug!("Login failed: unknown user {}", username);
            return Ok(None);
        };

        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            tracing::debug!("Login failed: wrong password for {}", username);
            Ok(None)
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>, CredentialError> {
        Ok(self.users.get_by_id(id).await?)
    }

    /// Create a staff account. `name` defaults to the username.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, CredentialError> {
        let username = username.trim();
        if username.len() < 3 || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.') {
            return Err(CredentialError::ValidationError(
                "Username must be at least 3 characters of letters, digits, '.', '_' or '-'".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.users.get_by_username(username).await?.is_some() {
            return Err(CredentialError::UserExists(username.to_string()));
        }

        let display_name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(username)
            .to_string();
        let user = User::new(username.to_string(), hash_password(password)?, display_name);
        let created = self.users.create(&user).await?;
        tracing::info!("Created user {}", created.username);
        Ok(created)
    }

    /// Replace a user's password
    pub async fn set_password(&self, username: &str, password: &str) -> Result<User, CredentialError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let mut user = self
            .users
            .get_by_username(username.trim())
            .await?
            .ok_or_else(|| CredentialError::ValidationError(format!("No such user: {}", username)))?;

        user.password_hash = hash_password(password)?;
        self.users.update_password(&user.id, &user.password_hash).await?;
        tracing::info!("Password changed for {}", user.username);
        Ok(user)
    }

    /// Create the configured account on first start. Existing accounts are left alone.
    pub async fn ensure_bootstrap_user(&self, bootstrap: &BootstrapUser) -> Result<bool, CredentialError> {
        if self.users.get_by_username(bootstrap.username.trim()).await?.is_some() {
            tracing::debug!("Bootstrap user {} already exists", bootstrap.username);
            return Ok(false);
        }
        self.create_user(&bootstrap.username, &bootstrap.password, bootstrap.name.as_deref())
            .await?;
        Ok(true)
    }

    pub async fn count(&self) -> Result<i64, CredentialError> {
        Ok(self.users.count().await?)
    }
}

//! Credential store: account creation and password checks

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{NewUser, Role, User};
use crate::validation::Registration;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Compare a password against a stored PHC hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Invalid password hash in store: {}", e);
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[derive(Clone)]
pub struct Credentials {
    users: Arc<dyn UserStore>,
}

impl Credentials {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Self-service registration always yields a regular user
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        self.create_user(registration, Role::User).await
    }

    pub async fn create_user(&self, registration: Registration, role: Role) -> Result<User, AppError> {
        let password_hash = hash_password(&registration.password)
            .map_err(|e| AppError::internal(format!("password hashing failed: {}", e)))?;

        let user = self
            .users
            .create(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!("Registered user {} with role {}", user.username, role.as_str());
        Ok(user)
    }

    /// Look up by username or email and check the password.
    /// Never reveals which of the two was wrong.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, AppError> {
        let identifier = identifier.trim();
        let user = self
            .users
            .find_by_login(identifier)
            .await?
            .ok_or_else(|| AppError::unauthenticated(INVALID_CREDENTIALS))?;

        if !verify_password(password, &user.password_hash) {
            return Err(AppError::unauthenticated(INVALID_CREDENTIALS));
        }

        Ok(user)
    }

    /// Authenticate and require the stored role to match the one the client selected
    pub async fn login(&self, identifier: &str, password: &str, role: Role) -> Result<User, AppError> {
        let user = self.authenticate(identifier, password).await?;
        if user.role != role {
            tracing::info!("Login for {} refused: role mismatch", user.username);
            return Err(AppError::forbidden(
                "Access denied for the selected role. Please try again.",
            ));
        }
        Ok(user)
    }
}

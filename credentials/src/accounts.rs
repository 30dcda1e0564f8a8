//! Registration and login flows on top of the credential core.
//!
//! The store is an explicitly constructed handle passed into `Authenticator`,
//! never a process-wide client. Every KDF call runs on tokio's blocking pool so
//! request tasks are not stalled by scrypt.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::crypto::passwords::PasswordHasher;
use crate::error::CredentialError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Credential record, persisted verbatim as returned by the hasher.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("username already exists: {0}")]
    Duplicate(String),
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Persistence for user rows. Implementations own their connection handles.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new user; fails with `StoreError::Duplicate` if the username exists.
    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Replaces the stored credential record wholesale.
    async fn update_password(&self, username: &str, password: String) -> Result<(), StoreError>;

    async fn delete(&self, username: &str) -> Result<(), StoreError>;
}

/// In-process store keyed by username.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(StoreError::Duplicate(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn update_password(&self, username: &str, password: String) -> Result<(), StoreError> {
        match self.users.write().get_mut(username) {
            Some(user) => {
                user.password = password;
                Ok(())
            }
            None => Err(StoreError::NotFound(username.to_string())),
        }
    }

    async fn delete(&self, username: &str) -> Result<(), StoreError> {
        self.users
            .write()
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(username.to_string()))
    }
}

/// What callers of the account flows get to see. Login-side failures are all
/// `InvalidCredentials`; the reason only goes to the logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("username must not be empty")]
    InvalidUsername,
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("internal error")]
    Internal,
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AuthError::UsernameTaken,
            // A row vanishing between lookup and write reads like a failed login.
            StoreError::NotFound(_) => AuthError::InvalidCredentials,
            StoreError::Backend(msg) => AuthError::Storage(msg),
        }
    }
}

pub struct Authenticator<S> {
    store: Arc<S>,
    hasher: PasswordHasher,
    /// Verified against when the username is unknown so that path costs one
    /// derivation like every other login.
    decoy_record: String,
}

impl<S: UserStore> Authenticator<S> {
    pub fn new(store: Arc<S>, hasher: PasswordHasher) -> Result<Self, AuthError> {
        let decoy_record = hasher.hash(&Uuid::new_v4().to_string()).map_err(|err| {
            error!(error = %err, "failed to prepare decoy credential");
            AuthError::Internal
        })?;
        Ok(Self {
            store,
            hasher,
            decoy_record,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidUsername);
        }
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let record = self.hash_blocking(password).await?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password: record,
            created_at: Utc::now(),
        };
        self.store.insert(user.clone()).await?;

        info!(username = %user.username, user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();
        let Some(user) = self.store.find_by_username(username).await? else {
            // Burn the same KDF cost as a real check; the outcome is ignored.
            let _ = self.verify_blocking(password, &self.decoy_record).await;
            warn!(username = %username, "login attempt for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        match self.verify_blocking(password, &user.password).await? {
            Ok(true) => {
                info!(username = %user.username, user_id = %user.id, "login succeeded");
                Ok(user)
            }
            Ok(false) => {
                warn!(username = %user.username, "login attempt with wrong password");
                Err(AuthError::InvalidCredentials)
            }
            Err(CredentialError::MalformedHash(err)) => {
                warn!(
                    username = %user.username,
                    user_id = %user.id,
                    error = %err,
                    "stored credential record is malformed; data integrity fault"
                );
                Err(AuthError::InvalidCredentials)
            }
            Err(CredentialError::KeyDerivation(err)) => {
                error!(username = %user.username, error = %err, "key derivation failed during login");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Replaces the credential record after re-checking the current password.
    pub async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<User, AuthError> {
        let user = self.login(username, current_password).await?;
        let record = self.hash_blocking(new_password).await?;
        self.store.update_password(&user.username, record.clone()).await?;

        info!(username = %user.username, user_id = %user.id, "password changed");
        Ok(User {
            password: record,
            ..user
        })
    }

    /// Deletes the user, and with it the credential record, after re-checking
    /// the password.
    pub async fn delete(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let user = self.login(username, password).await?;
        self.store.delete(&user.username).await?;
        info!(username = %user.username, user_id = %user.id, "user deleted");
        Ok(())
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let result = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|err| {
                error!(error = %err, "hashing task panicked");
                AuthError::Internal
            })?;
        result.map_err(|err| {
            error!(error = %err, "password hashing failed");
            AuthError::Internal
        })
    }

    /// Outer error is a task failure; inner result is the verifier's verdict.
    async fn verify_blocking(
        &self,
        password: &str,
        stored: &str,
    ) -> Result<Result<bool, CredentialError>, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let stored = stored.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|err| {
                error!(error = %err, "verification task panicked");
                AuthError::InvalidCredentials
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::KdfParams;

    fn authenticator() -> Authenticator<MemoryUserStore> {
        let hasher = PasswordHasher::new(KdfParams {
            log_n: 8,
            r: 8,
            p: 1,
            ..KdfParams::default()
        })
        .expect("cheap params are valid");
        Authenticator::new(Arc::new(MemoryUserStore::new()), hasher).expect("authenticator")
    }

    #[tokio::test]
    async fn registers_and_logs_in() {
        let auth = authenticator();
        let user = auth.register("amara", "s3cret-pass").await.expect("register");
        assert_eq!(user.username, "amara");
        assert_eq!(user.password.len(), 161);
        assert_ne!(user.password, "s3cret-pass");

        let logged_in = auth.login("amara", "s3cret-pass").await.expect("login");
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn rejects_duplicate_and_empty_usernames() {
        let auth = authenticator();
        auth.register("amara", "pw").await.unwrap();
        assert_eq!(auth.register("amara", "other").await.unwrap_err(), AuthError::UsernameTaken);
        assert_eq!(auth.register("  ", "pw").await.unwrap_err(), AuthError::InvalidUsername);
        assert_eq!(auth.store().len(), 1);
    }

    #[tokio::test]
    async fn every_login_failure_looks_the_same() {
        let auth = authenticator();
        auth.register("amara", "right").await.unwrap();

        let wrong_password = auth.login("amara", "wrong").await.unwrap_err();
        let unknown_user = auth.login("nobody", "right").await.unwrap_err();

        auth.store()
            .update_password("amara", "not-a-record".to_string())
            .await
            .unwrap();
        let malformed = auth.login("amara", "right").await.unwrap_err();

        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(unknown_user, AuthError::InvalidCredentials);
        assert_eq!(malformed, AuthError::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), malformed.to_string());
    }

    #[tokio::test]
    async fn change_password_writes_a_new_record() {
        let auth = authenticator();
        let before = auth.register("amara", "old-pass").await.unwrap();

        assert_eq!(
            auth.change_password("amara", "wrong", "new-pass").await.unwrap_err(),
            AuthError::InvalidCredentials
        );

        let after = auth.change_password("amara", "old-pass", "new-pass").await.unwrap();
        assert_ne!(after.password, before.password);
        assert_eq!(after.id, before.id);
        assert!(auth.login("amara", "old-pass").await.is_err());
        assert!(auth.login("amara", "new-pass").await.is_ok());
    }

    #[tokio::test]
    async fn delete_removes_the_user() {
        let auth = authenticator();
        auth.register("amara", "pw").await.unwrap();
        assert_eq!(auth.delete("amara", "nope").await.unwrap_err(), AuthError::InvalidCredentials);
        auth.delete("amara", "pw").await.unwrap();
        assert!(auth.store().is_empty());
        assert_eq!(auth.login("amara", "pw").await.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn concurrent_logins_are_independent() {
        let auth = Arc::new(authenticator());
        auth.register("amara", "pw-a").await.unwrap();
        auth.register("bo", "pw-b").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    auth.login("amara", "pw-a").await.is_ok()
                } else {
                    auth.login("bo", "pw-a").await.is_err()
                }
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn memory_store_reports_missing_rows() {
        let store = MemoryUserStore::new();
        assert_eq!(
            store.update_password("ghost", String::new()).await.unwrap_err(),
            StoreError::NotFound("ghost".to_string())
        );
        assert_eq!(
            store.delete("ghost").await.unwrap_err(),
            StoreError::NotFound("ghost".to_string())
        );
        assert_eq!(store.find_by_username("ghost").await.unwrap(), None);
    }
}

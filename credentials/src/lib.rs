//! Credential handling for Migrale: scrypt-based password records, their
//! constant-time verification, and the account flows that sit on top.
//! Plaintext passwords are only ever held in memory for the length of a call.

pub mod accounts;
pub mod config;
pub mod crypto;
pub mod error;
pub mod telemetry;

pub use crypto::passwords::{hash_password, verify_password, PasswordHasher};
pub use error::{CredentialError, KeyDerivationError, MalformedHashError};

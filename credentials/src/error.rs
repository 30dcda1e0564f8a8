//! Error types shared by the hashing and verification paths.
//! Messages never carry plaintext passwords or key material.

use thiserror::Error;

/// The KDF step could not run. Never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyDerivationError {
    #[error("invalid scrypt parameters: {0}")]
    InvalidParams(String),
    #[error("scrypt needs {required} bytes of memory; limit is {limit}")]
    MemoryLimitExceeded { required: u64, limit: u64 },
    #[error("scrypt derivation failed: {0}")]
    DerivationFailed(String),
}

/// Which half of a `<key>.<salt>` record failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPart {
    DerivedKey,
    Salt,
}

impl std::fmt::Display for RecordPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordPart::DerivedKey => f.write_str("derived key"),
            RecordPart::Salt => f.write_str("salt"),
        }
    }
}

/// The stored credential string does not have the `<hex-key>.<hex-salt>` shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedHashError {
    #[error("stored hash has no '.' delimiter")]
    MissingDelimiter,
    #[error("{part} is not valid hex")]
    InvalidHex { part: RecordPart },
    #[error("{part} has {actual} hex characters, expected {expected}")]
    InvalidLength {
        part: RecordPart,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),
    #[error(transparent)]
    MalformedHash(#[from] MalformedHashError),
}

//! Password hashing and verification built around scrypt.
//! The parameters are centralized in `KdfParams` so every stored credential is
//! derived with the same work factors; the record format lives in `record`.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{error, warn};

use crate::crypto::compare::constant_time_eq;
use crate::crypto::kdf::{derive_key, KdfParams, SaltInput, SALT_LEN};
use crate::crypto::record::StoredHash;
use crate::error::{CredentialError, KeyDerivationError};

/// Hashes and verifies credential records with one fixed set of KDF parameters.
/// Holds no state besides the parameters, so it is cheap to clone into
/// blocking tasks.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    params: KdfParams,
}

impl PasswordHasher {
    pub fn new(params: KdfParams) -> Result<Self, KeyDerivationError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Derives a record for `plaintext` under a fresh random salt. Two calls
    /// with the same plaintext return different strings.
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let salt_text = hex::encode(salt);

        let key = derive_key(plaintext.as_bytes(), self.salt_material(&salt, &salt_text), &self.params)?;
        Ok(StoredHash::new(&key, salt).to_string())
    }

    /// Checks `plaintext` against a stored record.
    ///
    /// Unparseable records always come back as `CredentialError::MalformedHash`;
    /// a wrong password is `Ok(false)`.
    pub fn verify(&self, plaintext: &str, stored: &str) -> Result<bool, CredentialError> {
        let record: StoredHash = stored.parse()?;
        self.verify_record(plaintext, &record)
    }

    pub fn verify_record(&self, plaintext: &str, record: &StoredHash) -> Result<bool, CredentialError> {
        let key = derive_key(
            plaintext.as_bytes(),
            self.salt_material(record.salt(), record.salt_text()),
            &self.params,
        )?;
        Ok(constant_time_eq(record.derived_key(), &key[..]))
    }

    fn salt_material<'a>(&self, salt: &'a [u8], salt_text: &'a str) -> &'a [u8] {
        match self.params.salt_input {
            SaltInput::Raw => salt,
            SaltInput::HexText => salt_text.as_bytes(),
        }
    }
}

/// Hashes a password with the default parameters and returns the
/// `<hex-key>.<hex-salt>` record to persist verbatim.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    PasswordHasher::default().hash(plaintext)
}

/// Verifies a plaintext password against a stored record with the default
/// parameters. Returns `true` only on a match; malformed records and KDF
/// failures are logged and reported as `false`.
pub fn verify_password(plaintext: &str, stored_hash: &str) -> bool {
    match_or_log(PasswordHasher::default().verify(plaintext, stored_hash))
}

fn match_or_log(outcome: Result<bool, CredentialError>) -> bool {
    match outcome {
        Ok(matches) => matches,
        Err(CredentialError::MalformedHash(err)) => {
            warn!(error = %err, "stored credential record is malformed");
            false
        }
        Err(CredentialError::KeyDerivation(err)) => {
            error!(error = %err, "key derivation failed during verification");
            false
        }
    }
}

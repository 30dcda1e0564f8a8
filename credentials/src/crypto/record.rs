//! The persisted credential record: `<hex derived key>.<hex salt>`.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroize;

use crate::crypto::kdf::{DERIVED_KEY_LEN, SALT_LEN};
use crate::error::{MalformedHashError, RecordPart};

pub const DELIMITER: char = '.';
pub const KEY_HEX_LEN: usize = DERIVED_KEY_LEN * 2;
pub const SALT_HEX_LEN: usize = SALT_LEN * 2;
/// Full length of a well-formed record.
pub const RECORD_LEN: usize = KEY_HEX_LEN + 1 + SALT_HEX_LEN;

/// A parsed credential record. `salt_text` keeps the salt exactly as stored so
/// the record renders back byte-for-byte and hex-text salting sees the
/// original characters.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredHash {
    derived_key: [u8; DERIVED_KEY_LEN],
    salt: [u8; SALT_LEN],
    salt_text: String,
}

impl StoredHash {
    /// Copies `derived_key` straight into the record; the caller keeps
    /// ownership of (and wipes) its own buffer.
    pub(crate) fn new(derived_key: &[u8; DERIVED_KEY_LEN], salt: [u8; SALT_LEN]) -> Self {
        let mut record = Self {
            derived_key: [0u8; DERIVED_KEY_LEN],
            salt,
            salt_text: hex::encode(salt),
        };
        record.derived_key.copy_from_slice(derived_key);
        record
    }

    pub fn derived_key(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.derived_key
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn salt_text(&self) -> &str {
        &self.salt_text
    }
}

fn decode_part<const N: usize>(text: &str, part: RecordPart) -> Result<[u8; N], MalformedHashError> {
    if text.len() != N * 2 {
        return Err(MalformedHashError::InvalidLength {
            part,
            expected: N * 2,
            actual: text.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out).map_err(|_| MalformedHashError::InvalidHex { part })?;
    Ok(out)
}

impl FromStr for StoredHash {
    type Err = MalformedHashError;

    fn from_str(stored: &str) -> Result<Self, Self::Err> {
        let (key_hex, salt_hex) = stored
            .split_once(DELIMITER)
            .ok_or(MalformedHashError::MissingDelimiter)?;
        let derived_key = decode_part::<DERIVED_KEY_LEN>(key_hex, RecordPart::DerivedKey)?;
        let salt = decode_part::<SALT_LEN>(salt_hex, RecordPart::Salt)?;
        Ok(Self {
            derived_key,
            salt,
            salt_text: salt_hex.to_string(),
        })
    }
}

impl fmt::Display for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", hex::encode(self.derived_key), DELIMITER, self.salt_text)
    }
}

// Key material stays out of debug output.
impl fmt::Debug for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredHash")
            .field("derived_key", &"<redacted>")
            .field("salt", &self.salt_text)
            .finish()
    }
}

impl Drop for StoredHash {
    fn drop(&mut self) {
        self.derived_key.zeroize();
    }
}

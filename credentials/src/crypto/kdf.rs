//! scrypt key derivation with the work factors used for stored credentials.
//! Every hash and every verification goes through `derive_key` with the same
//! `KdfParams`, so changing them here invalidates existing records.

use scrypt::Params;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::KeyDerivationError;

/// Length of the derived key in bytes (128 hex characters once encoded).
pub const DERIVED_KEY_LEN: usize = 64;
/// Length of the random salt in bytes (32 hex characters once encoded).
pub const SALT_LEN: usize = 16;

/// scrypt cost parameters matching the stored records:
/// - N = 2^14 work factor
/// - r = 8 block size
/// - p = 1 lane
/// - 32 MiB ceiling on the memory a single derivation may request
pub const DEFAULT_LOG_N: u8 = 14;
pub const DEFAULT_R: u32 = 8;
pub const DEFAULT_P: u32 = 1;
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 32 * 1024 * 1024;

/// What gets handed to scrypt as the salt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaltInput {
    /// The decoded 16 salt bytes.
    #[default]
    Raw,
    /// The 32 hex characters exactly as stored. Needed for records written by
    /// stacks that salt with the encoded string.
    HexText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KdfParams {
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
    pub max_memory_bytes: u64,
    pub salt_input: SaltInput,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: DEFAULT_LOG_N,
            r: DEFAULT_R,
            p: DEFAULT_P,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            salt_input: SaltInput::Raw,
        }
    }
}

impl KdfParams {
    /// Bytes of working memory one derivation needs: the `128 * r * N`
    /// scratch table plus the `128 * r * p` block buffer.
    pub fn memory_required(&self) -> Option<u64> {
        let n = 1u64.checked_shl(u32::from(self.log_n))?;
        let block = 128u64.checked_mul(u64::from(self.r))?;
        let blocks = n.checked_add(u64::from(self.p))?;
        block.checked_mul(blocks)
    }

    /// Checks the parameters without deriving anything.
    pub fn validate(&self) -> Result<(), KeyDerivationError> {
        if self.log_n == 0 || self.log_n >= 64 {
            return Err(KeyDerivationError::InvalidParams(format!(
                "log_n must be between 1 and 63, got {}",
                self.log_n
            )));
        }
        if self.r == 0 || self.p == 0 {
            return Err(KeyDerivationError::InvalidParams(
                "r and p must be non-zero".to_string(),
            ));
        }
        let required = self.memory_required().ok_or_else(|| {
            KeyDerivationError::InvalidParams("memory requirement overflows u64".to_string())
        })?;
        if required > self.max_memory_bytes {
            return Err(KeyDerivationError::MemoryLimitExceeded {
                required,
                limit: self.max_memory_bytes,
            });
        }
        self.scrypt_params().map(|_| ())
    }

    fn scrypt_params(&self) -> Result<Params, KeyDerivationError> {
        Params::new(self.log_n, self.r, self.p, DERIVED_KEY_LEN)
            .map_err(|e| KeyDerivationError::InvalidParams(format!("{e}")))
    }
}

/// Derives a 64-byte key from `password` and `salt_material`. The buffer is
/// wiped when the returned value is dropped.
pub fn derive_key(
    password: &[u8],
    salt_material: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, KeyDerivationError> {
    params.validate()?;
    let scrypt_params = params.scrypt_params()?;

    let mut output = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    scrypt::scrypt(password, salt_material, &scrypt_params, &mut output[..])
        .map_err(|e| KeyDerivationError::DerivationFailed(format!("{e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfParams {
        KdfParams {
            log_n: 4,
            r: 1,
            p: 1,
            ..KdfParams::default()
        }
    }

    #[test]
    fn defaults_fit_under_memory_ceiling() {
        let params = KdfParams::default();
        assert_eq!(params.memory_required(), Some(16 * 1024 * 1024 + 1024));
        params.validate().expect("defaults should be valid");
    }

    #[test]
    fn matches_scrypt_reference_vector() {
        // RFC 7914 section 12, second vector.
        let params = KdfParams {
            log_n: 10,
            r: 8,
            p: 16,
            ..KdfParams::default()
        };
        let key = derive_key(b"password", b"NaCl", &params).expect("derivation should succeed");
        assert_eq!(
            hex::encode(&key[..]),
            "fdbabe1c9d3472007856e7190d01e9fe7c6ad7cbc8237830e77376634b373162\
             2eaf30d92e22a3886ff109279d9830dac727afb94a83ee6d8360cbdfa2cc0640"
        );
    }

    #[test]
    fn derivation_is_deterministic_for_same_inputs() {
        let a = derive_key(b"pw", b"salt", &cheap()).unwrap();
        let b = derive_key(b"pw", b"salt", &cheap()).unwrap();
        let c = derive_key(b"pw", b"other-salt", &cheap()).unwrap();
        assert_eq!(a[..], b[..]);
        assert_ne!(a[..], c[..]);
    }

    #[test]
    fn rejects_zero_cost_parameters() {
        let params = KdfParams {
            r: 0,
            ..cheap()
        };
        assert!(matches!(
            derive_key(b"pw", b"salt", &params),
            Err(KeyDerivationError::InvalidParams(_))
        ));

        let params = KdfParams {
            log_n: 0,
            ..cheap()
        };
        assert!(matches!(
            params.validate(),
            Err(KeyDerivationError::InvalidParams(_))
        ));
    }

    #[test]
    fn rejects_parameters_over_memory_ceiling() {
        let params = KdfParams {
            log_n: 20,
            r: 8,
            p: 1,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            salt_input: SaltInput::Raw,
        };
        let err = derive_key(b"pw", b"salt", &params).unwrap_err();
        assert_eq!(
            err,
            KeyDerivationError::MemoryLimitExceeded {
                required: 1024 * 1024 * 1024 + 1024,
                limit: DEFAULT_MAX_MEMORY_BYTES,
            }
        );
    }

    #[test]
    fn parallelism_counts_toward_memory_ceiling() {
        let params = KdfParams {
            log_n: 10,
            r: 8,
            p: 4_000_000,
            ..KdfParams::default()
        };
        assert_eq!(params.memory_required(), Some(1024 * (1024 + 4_000_000)));
        assert!(matches!(
            derive_key(b"pw", b"salt", &params),
            Err(KeyDerivationError::MemoryLimitExceeded { .. })
        ));
    }

    #[test]
    fn salt_input_uses_kebab_case_names() {
        let parsed: SaltInput = serde_json::from_str("\"hex-text\"").unwrap();
        assert_eq!(parsed, SaltInput::HexText);
        assert_eq!(serde_json::to_string(&SaltInput::Raw).unwrap(), "\"raw\"");
    }
}

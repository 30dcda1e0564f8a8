//! Credential cryptography: scrypt derivation, the stored record format, and
//! constant-time comparison. `passwords` is the entry point; the other
//! submodules each cover one step so the hashing path stays easy to audit.

pub mod compare;
pub mod kdf;
pub mod passwords;
pub mod record;

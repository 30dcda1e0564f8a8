//! Constant-time comparison of derived keys.

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Compares `candidate` against `expected` in time that depends only on
/// `expected.len()`.
///
/// A length mismatch yields `false` through the same path: the candidate is
/// copied into a buffer sized like `expected` (truncated or zero-padded) and the
/// length check is folded in as a constant-time `Choice`.
pub fn constant_time_eq(expected: &[u8], candidate: &[u8]) -> bool {
    let mut padded = Zeroizing::new(vec![0u8; expected.len()]);
    let shared = expected.len().min(candidate.len());
    padded[..shared].copy_from_slice(&candidate[..shared]);

    let bytes_equal = expected.ct_eq(padded.as_slice());
    let lengths_equal = (expected.len() as u64).ct_eq(&(candidate.len() as u64));
    (bytes_equal & lengths_equal).into()
}

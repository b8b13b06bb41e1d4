//! Constant-time pre-key verification.

use subtle::ConstantTimeEq;

/// Upper bound on a candidate pre-key presented by a client.
///
/// Enforced before the constant-time path; an oversized candidate reveals
/// only that it crossed a coarse bound, never where it differs.
pub const MAX_PRE_KEY_LEN: usize = 256;

/// Compare a presented pre-key against the expected one without leaking
/// timing correlated to where or whether the values differ.
///
/// Both inputs are copied into fixed-width buffers no smaller than
/// `expected`, zero-padded, and compared byte-wise in constant time. The
/// original lengths are compared in constant time as well and ANDed in, so a
/// short candidate can never match a key that happens to end in zero bytes.
#[must_use]
pub fn authenticate(candidate: &[u8], expected: &[u8]) -> bool {
    if candidate.is_empty() || candidate.len() > MAX_PRE_KEY_LEN {
        return false;
    }

    let width = MAX_PRE_KEY_LEN.max(expected.len());
    let mut lhs = vec![0u8; width];
    let mut rhs = vec![0u8; width];
    lhs[..candidate.len()].copy_from_slice(candidate);
    rhs[..expected.len()].copy_from_slice(expected);

    let bytes_equal = lhs.ct_eq(&rhs);
    let lengths_equal = candidate.len().ct_eq(&expected.len());

    bool::from(bytes_equal & lengths_equal)
}

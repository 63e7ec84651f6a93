//! 2-bit DNA sequence codec.
//!
//! Each base takes two bits, `a=00 c=01 g=10 t=11`, with the last base in the
//! lowest bits. A sequence of `k` bases therefore encodes to a number below
//! `4^k`, and sequences of equal length sort the same as their keys.

use crate::common::{Error, Result};

/// Longest sequence that fits in a `u64` key.
pub const MAX_BASES: usize = 32;

/// Two-bit code of a base, case-insensitive.
#[inline]
pub fn base_code(base: u8) -> Option<u64> {
    match base.to_ascii_lowercase() {
        b'a' => Some(0),
        b'c' => Some(1),
        b'g' => Some(2),
        b't' => Some(3),
        _ => None,
    }
}

/// Encode a sequence into its key.
///
/// # Errors
/// - `Error::InvalidSymbol` for anything other than `a`, `c`, `g`, `t`
/// - `Error::InvalidConfig` if the sequence is longer than 32 bases
///
/// # Example
/// ```
/// use genebank::genbank::sequence::{decode, encode};
///
/// let key = encode("gattaca").unwrap();
/// assert_eq!(decode(key, 7), "gattaca");
/// ```
pub fn encode(sequence: &str) -> Result<u64> {
    if sequence.len() > MAX_BASES {
        return Err(Error::InvalidConfig(format!(
            "sequence of {} bases does not fit in a key",
            sequence.len()
        )));
    }

    sequence.chars().try_fold(0u64, |key, c| {
        let code = u8::try_from(c)
            .ok()
            .and_then(base_code)
            .ok_or(Error::InvalidSymbol(c))?;
        Ok((key << 2) | code)
    })
}

/// Decode the low `2 * length` bits of `key` back into lowercase bases.
pub fn decode(key: u64, length: u32) -> String {
    (0..length)
        .rev()
        .map(|i| match (key >> (2 * i)) & 0b11 {
            0 => 'a',
            1 => 'c',
            2 => 'g',
            _ => 't',
        })
        .collect()
}

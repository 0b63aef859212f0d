//! Field encoding, hashing and hex helpers shared by client and server.

use crate::error::ProtocolError;
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::{Field, PrimeField};
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};

/// Hex length of a canonical field element encoding.
pub const FIELD_HEX_LEN: usize = 64;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

pub(crate) fn strip_hex_prefix(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Strips an optional `0x` prefix and checks the remaining digits.
///
/// # Errors
/// Returns [`ProtocolError::InvalidEncoding`] if the string has the wrong
/// length or contains non-hex characters.
///
/// # Examples
///
/// ```
/// use zkp_anon_signal::utils::validate_and_strip_hex;
///
/// assert_eq!(validate_and_strip_hex("0x1234abcd", 8).unwrap(), "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<&str, ProtocolError> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(ProtocolError::InvalidEncoding(format!(
            "hex string must be {expected_len} characters (got {})",
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(ProtocolError::InvalidEncoding(
            "hex string contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped)
}

/// Returns true if the input is a non-empty hex string (prefix allowed).
#[must_use]
pub fn validate_hex_string(input: &str) -> bool {
    let stripped = strip_hex_prefix(input);
    !stripped.is_empty() && is_valid_hex_string(stripped)
}

const BASE_U64: u64 = 256;

/// Reduces 32 big-endian bytes into a Pallas base field element.
///
/// The mapping is many-to-one above the field modulus, which is fine for
/// hashing digests into the field. Use [`field_from_hex`] for canonical
/// wire values.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; 32]) -> pallas::Base {
    let base = pallas::Base::from(BASE_U64);
    bytes.iter().fold(pallas::Base::ZERO, |acc, &byte| {
        acc * base + pallas::Base::from(u64::from(byte))
    })
}

/// Canonical little-endian encoding of a field element.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(field.to_repr().as_ref());
    bytes
}

/// Hex form of [`field_to_bytes`], as published in group files and payloads.
#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a canonical field element from 64 hex characters.
///
/// # Errors
/// Returns [`ProtocolError::InvalidEncoding`] for malformed hex or a value
/// that is not below the field modulus.
pub fn field_from_hex(input: &str) -> Result<pallas::Base, ProtocolError> {
    let stripped = validate_and_strip_hex(input, FIELD_HEX_LEN)?;
    let bytes = hex::decode(stripped)
        .map_err(|e| ProtocolError::InvalidEncoding(format!("invalid field hex: {e}")))?;

    let mut repr = [0u8; 32];
    repr.copy_from_slice(&bytes);
    Option::from(pallas::Base::from_repr(repr)).ok_or_else(|| {
        ProtocolError::InvalidEncoding(format!("'{input}' is not a canonical field element"))
    })
}

/// Hashes arbitrary bytes into the field, keeping 248 bits of SHA3-256 so
/// the value is always below the modulus.
#[must_use]
pub fn hash_to_field(parts: &[&[u8]]) -> pallas::Base {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest: [u8; 32] = hasher.finalize().into();

    let mut truncated = [0u8; 32];
    truncated[1..].copy_from_slice(&digest[..31]);
    bytes_to_field(&truncated)
}

/// Two-to-one Poseidon (`P128Pow5T3`, width 3, rate 2).
///
/// This is the same instance the circuit uses through `Pow5Chip`, so native
/// and in-circuit hashes agree.
///
/// ```
/// use zkp_anon_signal::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let h = poseidon_hash(pallas::Base::from(1), pallas::Base::from(2));
/// assert_ne!(h, poseidon_hash(pallas::Base::from(2), pallas::Base::from(1)));
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash([left, right])
}

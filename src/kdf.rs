//! Key derivation for accounts and attestations.
//!
//! Two one-way derivations, both plain SHA-256 over a fixed byte layout:
//! ```text,ignore
//! account_subkey  = SHA256(account_key || email || LE64(account_id))
//! attestation_key = SHA256(account_subkey || LE64(block_height) || LE64(account_id))
//! ```
//! The account subkey is long-lived and shared between custodian and user.
//! The attestation key is specific to one published attestation and is the
//! HMAC key that binds a leaf to an account.

use primitive_types::H256;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::hasher::Hasher;

/// A 256-bit derived or shared key.
///
/// Wrapper around the storage array so that key material moves through the
/// code as one opaque type. The same type serves the user's `account_key`,
/// the derived `account_subkey` and the per-attestation `attestation_key`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key(H256);

impl Key {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_fixed_bytes()
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0.into()
    }

    /// The all-zero key, carried by dummy padding liabilities.
    pub fn zero() -> Self {
        Key(H256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<[u8; 32]> for Key {
    fn from(bytes: [u8; 32]) -> Self {
        Key(H256(bytes))
    }
}

impl From<Key> for [u8; 32] {
    fn from(key: Key) -> Self {
        key.0.into()
    }
}

impl FromStr for Key {
    type Err = KeyParserError;

    /// Parse from exactly 64 lowercase hex characters.
    ///
    /// Uppercase input is rejected rather than normalized so that a key
    /// string has exactly one accepted spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(KeyParserError::IncorrectLength { len: s.len() });
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(KeyParserError::NotLowercaseHex);
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Key(H256(bytes)))
    }
}

impl std::fmt::Debug for Key {
    /// Abbreviated hex form, enough to eyeball a key in logs without
    /// spilling the whole value.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({}..)", hex::encode(&self.as_bytes()[..4]))
    }
}

// -------------------------------------------------------------------------------------------------
// Derivations.

/// Derive the long-lived per-account subkey.
///
/// `SHA256(account_key || email_utf8_bytes || LE64(account_id))`. The email
/// bytes are used verbatim, with no normalization.
pub fn derive_account_subkey(account_key: &Key, email: &str, account_id: u64) -> Key {
    let mut hasher = Hasher::new();
    hasher.update(account_key.as_bytes());
    hasher.update(email.as_bytes());
    hasher.update(&account_id.to_le_bytes());
    Key(hasher.finalize())
}

/// Derive the key binding an account to one attestation.
///
/// `SHA256(account_subkey || LE64(block_height) || LE64(account_id))`.
pub fn derive_attestation_key(account_subkey: &Key, block_height: u64, account_id: u64) -> Key {
    let mut hasher = Hasher::new();
    hasher.update(account_subkey.as_bytes());
    hasher.update(&block_height.to_le_bytes());
    hasher.update(&account_id.to_le_bytes());
    Key(hasher.finalize())
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when parsing [Key].
#[derive(Debug, thiserror::Error)]
pub enum KeyParserError {
    #[error("A key must be exactly 64 hex characters, got {len}")]
    IncorrectLength { len: usize },
    #[error("A key must contain only lowercase hex characters")]
    NotLowercaseHex,
    #[error("Malformed hex string")]
    MalformedHex(#[from] hex::FromHexError),
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_KEY_HEX: &str =
        "abababababababababababababababababababababababababababababababab";

    // Byte-layout regression vectors, cross-checked against a python
    // reimplementation of the derivations.
    #[test]
    fn account_subkey_vector() {
        let account_key = Key::from_str(ACCOUNT_KEY_HEX).unwrap();
        let subkey = derive_account_subkey(&account_key, "john.doe@example.com", 1234);
        assert_eq!(
            subkey,
            Key::from_str("5e9c8174e6ba5ab7e1efff32963c519fb79715e95b9272cd6b3ef5cc3976566b")
                .unwrap()
        );
    }

    #[test]
    fn attestation_key_vector() {
        let subkey =
            Key::from_str("5e9c8174e6ba5ab7e1efff32963c519fb79715e95b9272cd6b3ef5cc3976566b")
                .unwrap();
        let attestation_key = derive_attestation_key(&subkey, 1000, 1234);
        assert_eq!(
            attestation_key,
            Key::from_str("9ca431138d946502a6c7d45607552cf08394b5d9a6e61bf204e322bbb716f59f")
                .unwrap()
        );
    }

    #[test]
    fn derivations_are_deterministic() {
        let account_key = Key::from_str(ACCOUNT_KEY_HEX).unwrap();
        let a = derive_account_subkey(&account_key, "a@b.c", 7);
        let b = derive_account_subkey(&account_key, "a@b.c", 7);
        assert_eq!(a, b);
    }

    #[test]
    fn email_is_part_of_the_subkey_preimage() {
        let account_key = Key::from_str(ACCOUNT_KEY_HEX).unwrap();
        let a = derive_account_subkey(&account_key, "a@b.c", 7);
        let b = derive_account_subkey(&account_key, "x@y.z", 7);
        assert_ne!(a, b);
    }

    #[test]
    fn parser_rejects_uppercase_hex() {
        let upper = ACCOUNT_KEY_HEX.to_ascii_uppercase();
        assert!(matches!(
            Key::from_str(&upper),
            Err(KeyParserError::NotLowercaseHex)
        ));
    }

    #[test]
    fn parser_rejects_short_input() {
        assert!(matches!(
            Key::from_str("abcd"),
            Err(KeyParserError::IncorrectLength { len: 4 })
        ));
    }
}

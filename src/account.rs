//! Account identity on the user (verification) side.
//!
//! A user holds three credentials: an `account_uid` (an unpadded base32
//! string whose decoded big-endian value is the numeric account ID), an
//! `account_key` (64 hex chars of shared secret) and the email address the
//! account was registered with. From these the long-lived account subkey is
//! derived, and from the subkey the per-attestation key used to locate the
//! account's leaves in a published tree.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::kdf::{self, Key};

/// An account's numeric ID, parsed from its base32 `account_uid` form.
///
/// Example:
/// ```
/// use polmst::AccountUid;
/// use std::str::FromStr;
///
/// let uid = AccountUid::from_str("ATJA").unwrap();
/// assert_eq!(uid.as_u64(), 1234);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountUid(u64);

impl AccountUid {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AccountUid {
    fn from(account_id: u64) -> Self {
        AccountUid(account_id)
    }
}

impl FromStr for AccountUid {
    type Err = AccountUidParserError;

    /// Parse an unpadded RFC 4648 base32 string.
    ///
    /// The decoded bytes are interpreted as a big-endian integer, which must
    /// fit in 64 bits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AccountUidParserError::Empty);
        }
        let bytes = data_encoding::BASE32_NOPAD
            .decode(s.to_ascii_uppercase().as_bytes())
            .map_err(AccountUidParserError::MalformedBase32)?;

        let significant = bytes.iter().skip_while(|b| **b == 0).count();
        if significant > 8 {
            return Err(AccountUidParserError::TooLarge { uid: s.to_string() });
        }

        let account_id = bytes
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        Ok(AccountUid(account_id))
    }
}

// -------------------------------------------------------------------------------------------------
// Account.

/// One account to recover balances for: the numeric ID plus the derived
/// subkey.
///
/// The custodian holds these pairs directly; a user constructs one from
/// their credentials via [Account::from_credentials].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub subkey: Key,
}

impl Account {
    pub fn new(id: u64, subkey: Key) -> Self {
        Account { id, subkey }
    }

    /// Derive the subkey from the user-side credential triple.
    pub fn from_credentials(uid: AccountUid, account_key: &Key, email: &str) -> Self {
        let id = uid.as_u64();
        let subkey = kdf::derive_account_subkey(account_key, email, id);
        Account { id, subkey }
    }

    /// The key binding this account to the attestation at `block_height`.
    pub fn attestation_key(&self, block_height: u64) -> Key {
        kdf::derive_attestation_key(&self.subkey, block_height, self.id)
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when parsing [AccountUid].
#[derive(Debug, thiserror::Error)]
pub enum AccountUidParserError {
    #[error("Account UID must not be empty")]
    Empty,
    #[error("Account UID is not valid unpadded base32")]
    MalformedBase32(#[source] data_encoding::DecodeError),
    #[error("Account UID {uid:?} decodes to more than 64 bits")]
    TooLarge { uid: String },
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_parses_small_value() {
        assert_eq!(AccountUid::from_str("AE").unwrap().as_u64(), 1);
    }

    #[test]
    fn uid_parses_leading_zero_bytes() {
        // Same integer as "ATJA", encoded with two leading zero bytes.
        assert_eq!(AccountUid::from_str("AAAAJUQ").unwrap().as_u64(), 1234);
    }

    #[test]
    fn uid_parses_max_u64() {
        assert_eq!(
            AccountUid::from_str("7777777777776").unwrap().as_u64(),
            u64::MAX
        );
    }

    #[test]
    fn uid_accepts_lowercase() {
        assert_eq!(AccountUid::from_str("atja").unwrap().as_u64(), 1234);
    }

    #[test]
    fn uid_rejects_overflow() {
        // 2^64 needs 9 significant bytes.
        assert!(matches!(
            AccountUid::from_str("AEAAAAAAAAAAAAA"),
            Err(AccountUidParserError::TooLarge { .. })
        ));
    }

    #[test]
    fn uid_rejects_invalid_alphabet() {
        assert!(matches!(
            AccountUid::from_str("01!?"),
            Err(AccountUidParserError::MalformedBase32(_))
        ));
    }

    #[test]
    fn from_credentials_matches_direct_derivation() {
        let account_key = Key::from([0xabu8; 32]);
        let uid = AccountUid::from_str("ATJA").unwrap();
        let account = Account::from_credentials(uid, &account_key, "john.doe@example.com");

        assert_eq!(account.id, 1234);
        assert_eq!(
            account.subkey,
            kdf::derive_account_subkey(&account_key, "john.doe@example.com", 1234)
        );
    }
}

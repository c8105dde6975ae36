use serde::{Deserialize, Serialize};

/// The Bitcoin block height identifying one attestation epoch.
///
/// Every attestation is built against the custodian's book at a particular
/// block, and the height feeds into the attestation key derivation, so two
/// attestations at different heights produce unlinkable leaf sets for the
/// same account.
///
/// Example:
/// ```
/// use polmst::BlockHeight;
/// use std::str::FromStr;
///
/// let block_height = BlockHeight::from(820000u64);
/// let block_height = BlockHeight::from_str("820000").unwrap();
/// ```
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockHeight(u64);

impl BlockHeight {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

// -------------------------------------------------------------------------------------------------
// From for u64.

impl From<u64> for BlockHeight {
    fn from(block_height: u64) -> Self {
        Self(block_height)
    }
}

// -------------------------------------------------------------------------------------------------
// From for str, Display.

use std::str::FromStr;

impl FromStr for BlockHeight {
    type Err = BlockHeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BlockHeight(u64::from_str(s)?))
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

#[derive(thiserror::Error, Debug)]
pub enum BlockHeightError {
    #[error("Malformed string input for u64 type")]
    MalformedString(#[from] std::num::ParseIntError),
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let height = BlockHeight::from_str("820000").unwrap();
        assert_eq!(height.as_u64(), 820_000);
        assert_eq!(height.to_string(), "820000");
    }

    #[test]
    fn rejects_negative_input() {
        assert!(BlockHeight::from_str("-1").is_err());
    }
}

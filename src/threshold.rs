use serde::{Deserialize, Serialize};

/// The default maximum per-leaf amount after splitting, in satoshis.
///
/// 5,000,000 satoshis (0.05 BTC) keeps individual leaves small enough that a
/// leaf amount on its own says little about the account behind it, while
/// keeping the leaf count manageable for large books.
pub const DEFAULT_SPLIT_THRESHOLD: u64 = 5_000_000;

/// Abstraction for the split threshold: the maximum amount any single leaf
/// may carry after the liability splitting stage.
///
/// Example:
/// ```
/// use polmst::SplitThreshold;
/// use std::str::FromStr;
///
/// let threshold = SplitThreshold::default();
/// let threshold = SplitThreshold::from(1_000_000u64);
/// let threshold = SplitThreshold::from_str("1000000").unwrap();
/// ```
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd)]
pub struct SplitThreshold(u64);

impl SplitThreshold {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

// -------------------------------------------------------------------------------------------------
// From for u64.

impl From<u64> for SplitThreshold {
    fn from(threshold: u64) -> Self {
        Self(threshold)
    }
}

// -------------------------------------------------------------------------------------------------
// Default.

impl Default for SplitThreshold {
    fn default() -> Self {
        Self(DEFAULT_SPLIT_THRESHOLD)
    }
}

// -------------------------------------------------------------------------------------------------
// From for str.

use std::str::FromStr;

impl FromStr for SplitThreshold {
    type Err = SplitThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let threshold = u64::from_str(s)?;
        if threshold == 0 {
            return Err(SplitThresholdError::Zero);
        }
        Ok(SplitThreshold(threshold))
    }
}

// -------------------------------------------------------------------------------------------------
// Into for OsStr.

use clap::builder::{OsStr, Str};

impl From<SplitThreshold> for OsStr {
    fn from(threshold: SplitThreshold) -> OsStr {
        OsStr::from(Str::from(threshold.as_u64().to_string()))
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

#[derive(thiserror::Error, Debug)]
pub enum SplitThresholdError {
    #[error("Malformed string input for u64 type")]
    MalformedString(#[from] std::num::ParseIntError),
    #[error("The split threshold must be a positive integer")]
    Zero,
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_positive() {
        assert!(SplitThreshold::default().as_u64() > 0);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(matches!(
            SplitThreshold::from_str("0"),
            Err(SplitThresholdError::Zero)
        ));
    }
}

//! Custodian-side liability records and their file parser.

use log::{debug, info};
use rand::{thread_rng, Rng};
use serde::Deserialize;
use std::str::FromStr;
use std::{ffi::OsString, path::PathBuf};

use crate::kdf::Key;

/// A custodian's obligation to one account: the input record for a tree
/// build.
///
/// A liability with a zero amount, a zero subkey and account ID 0 is a
/// *dummy*, used to pad the leaf list up to a power of two. Dummies keep the
/// tree sum intact and cannot be attributed to any account.
#[derive(Clone, PartialEq, Eq)]
pub struct Liability {
    pub account_id: u64,
    pub account_subkey: Key,
    pub amount: u64,
}

impl Liability {
    pub fn new(account_id: u64, account_subkey: Key, amount: u64) -> Self {
        Liability {
            account_id,
            account_subkey,
            amount,
        }
    }

    /// A zero-amount padding entry.
    pub fn dummy() -> Self {
        Liability {
            account_id: 0,
            account_subkey: Key::zero(),
            amount: 0,
        }
    }

    pub fn is_dummy(&self) -> bool {
        self.amount == 0 && self.account_id == 0 && self.account_subkey.is_zero()
    }

    /// Same account, different amount. Used by the splitting stage.
    pub(crate) fn with_amount(&self, amount: u64) -> Self {
        Liability {
            account_id: self.account_id,
            account_subkey: self.account_subkey,
            amount,
        }
    }
}

impl std::fmt::Debug for Liability {
    /// Abbreviated form for debug inspection; the subkey is cut short.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Liability(account={}, subkey={}.., amount={})",
            self.account_id,
            hex::encode(&self.account_subkey.as_bytes()[..4]),
            self.amount
        )
    }
}

// -------------------------------------------------------------------------------------------------
// Parser.

/// Record shape of one CSV row, before the subkey hex is decoded.
#[derive(Deserialize)]
struct LiabilityRecord {
    account_id: u64,
    account_subkey: String,
    amount: u64,
}

/// Supported file types for the parser.
enum FileType {
    Csv,
}

/// Parser for files containing the custodian's liability list.
///
/// CSV file format:
/// ```csv,ignore
/// account_id,account_subkey,amount
/// 1234,5e9c8174...566b,20000000
/// ```
/// The subkey column is 64 lowercase hex characters.
///
/// As an alternative to a file the parser can generate a number of random
/// liabilities, which is useful for testing and benchmarking.
pub struct LiabilitiesParser {
    path: Option<PathBuf>,
    num_random_liabilities: Option<u64>,
}

impl LiabilitiesParser {
    pub fn new() -> Self {
        LiabilitiesParser {
            path: None,
            num_random_liabilities: None,
        }
    }

    pub fn with_path_opt(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    pub fn with_path(self, path: PathBuf) -> Self {
        self.with_path_opt(Some(path))
    }

    pub fn with_num_liabilities_opt(mut self, num_liabilities: Option<u64>) -> Self {
        self.num_random_liabilities = num_liabilities;
        self
    }

    /// Open and parse the file if a path was given, otherwise generate the
    /// requested number of random liabilities.
    ///
    /// An error is returned if:
    /// a) neither a path nor a number of random liabilities was given
    /// b) the file cannot be opened
    /// c) the file type is not supported
    /// d) deserialization of any of the records in the file fails
    pub fn parse_file_or_generate_random(self) -> Result<Vec<Liability>, LiabilitiesParserError> {
        if let Some(path) = self.path {
            LiabilitiesParser::parse_csv(path)
        } else if let Some(n) = self.num_random_liabilities {
            Ok(generate_random_liabilities(n))
        } else {
            Err(LiabilitiesParserError::NeitherPathNorNumLiabilitiesSet)
        }
    }

    fn parse_csv(path: PathBuf) -> Result<Vec<Liability>, LiabilitiesParserError> {
        debug!(
            "Attempting to parse {:?} as a file containing liabilities",
            &path
        );

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or(LiabilitiesParserError::UnknownFileType(
                path.clone().into_os_string(),
            ))?;

        let mut liabilities = Vec::<Liability>::new();

        match FileType::from_str(ext)? {
            FileType::Csv => {
                let mut reader = csv::Reader::from_path(path)?;

                for record in reader.deserialize() {
                    let record: LiabilityRecord = record?;
                    let subkey = Key::from_str(&record.account_subkey).map_err(|source| {
                        LiabilitiesParserError::MalformedSubkey {
                            account_id: record.account_id,
                            source,
                        }
                    })?;
                    liabilities.push(Liability::new(record.account_id, subkey, record.amount));
                }
            }
        };

        info!("Successfully parsed {} liabilities", liabilities.len());

        Ok(liabilities)
    }
}

impl Default for LiabilitiesParser {
    fn default() -> Self {
        LiabilitiesParser::new()
    }
}

impl From<PathBuf> for LiabilitiesParser {
    fn from(path: PathBuf) -> Self {
        LiabilitiesParser::new().with_path(path)
    }
}

impl FromStr for FileType {
    type Err = LiabilitiesParserError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        match ext {
            "csv" => Ok(FileType::Csv),
            _ => Err(LiabilitiesParserError::UnsupportedFileType { ext: ext.into() }),
        }
    }
}

/// Random liabilities with high-entropy subkeys, for tests and benchmarks.
fn generate_random_liabilities(n: u64) -> Vec<Liability> {
    let mut rng = thread_rng();
    (0..n)
        .map(|i| {
            let mut subkey = [0u8; 32];
            rng.fill(&mut subkey);
            Liability::new(i + 1, Key::from(subkey), rng.gen_range(1..=10_000_000u64))
        })
        .collect()
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when handling [LiabilitiesParser].
#[derive(Debug, thiserror::Error)]
pub enum LiabilitiesParserError {
    #[error("Either a file path or a number of random liabilities must be set")]
    NeitherPathNorNumLiabilitiesSet,
    #[error("Unable to find file extension for path {0:?}")]
    UnknownFileType(OsString),
    #[error("The file type with extension {ext:?} is not supported")]
    UnsupportedFileType { ext: String },
    #[error("Error opening or reading CSV file")]
    CsvError(#[from] csv::Error),
    #[error("Malformed account subkey for account {account_id}")]
    MalformedSubkey {
        account_id: u64,
        source: crate::kdf::KeyParserError,
    },
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_csv_str(content: &str) -> Result<Vec<Liability>, LiabilitiesParserError> {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "polmst_liabilities_{}_{}.csv",
            std::process::id(),
            content.len()
        ));
        std::fs::write(&path, content).unwrap();
        let result = LiabilitiesParser::from(path.clone()).parse_file_or_generate_random();
        std::fs::remove_file(path).unwrap();
        result
    }

    #[test]
    fn parser_csv_happy_case() {
        let subkey_hex = "ab".repeat(32);
        let content = format!(
            "account_id,account_subkey,amount\n1234,{subkey_hex},2\n77,{subkey_hex},5000000\n"
        );
        let liabilities = parse_csv_str(&content).unwrap();

        assert_eq!(liabilities.len(), 2);
        assert_eq!(liabilities[0].account_id, 1234);
        assert_eq!(liabilities[0].amount, 2);
        assert_eq!(liabilities[1].account_id, 77);
        assert_eq!(liabilities[1].amount, 5_000_000);
    }

    #[test]
    fn parser_rejects_bad_subkey() {
        let content = "account_id,account_subkey,amount\n1,nothex,2\n";
        assert!(matches!(
            parse_csv_str(content),
            Err(LiabilitiesParserError::MalformedSubkey { account_id: 1, .. })
        ));
    }

    #[test]
    fn parser_without_inputs_fails() {
        assert!(matches!(
            LiabilitiesParser::new().parse_file_or_generate_random(),
            Err(LiabilitiesParserError::NeitherPathNorNumLiabilitiesSet)
        ));
    }

    #[test]
    fn random_generation_respects_count() {
        let liabilities = LiabilitiesParser::new()
            .with_num_liabilities_opt(Some(10))
            .parse_file_or_generate_random()
            .unwrap();
        assert_eq!(liabilities.len(), 10);
        assert!(liabilities.iter().all(|l| l.amount >= 1));
    }

    #[test]
    fn dummy_is_recognized() {
        assert!(Liability::dummy().is_dummy());
        assert!(!Liability::new(1, Key::zero(), 0).is_dummy());
    }
}

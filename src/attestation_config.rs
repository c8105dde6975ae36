use derive_builder::Builder;
use log::{debug, info};
use serde::Deserialize;
use std::{ffi::OsString, fs::File, io::Read, path::PathBuf, str::FromStr};

use crate::{
    attestation::{Attestation, AttestationError},
    block_height::BlockHeight,
    liability::{LiabilitiesParser, LiabilitiesParserError},
    threshold::SplitThreshold,
    utils::LogOnErr,
};

/// Configuration needed to construct an [Attestation].
///
/// The config is defined by a struct. A builder pattern is used to construct
/// the config, but it can also be constructed by deserializing a file.
/// Currently only TOML files are supported, with the following format:
///
/// ```toml,ignore
/// # Block height that the attestation is published against.
/// # This value must be set.
/// block-height = 820000
///
/// # Maximum per-leaf amount after splitting, in satoshis.
/// # If not set the default threshold will be used.
/// threshold = 5000000
///
/// # At least one of file-path & num-random-liabilities must be present.
/// # If both are given then file-path is preferred.
/// [liabilities]
///
/// # Path to a CSV file of account_id,account_subkey,amount records.
/// file-path = "./liabilities.csv"
///
/// # Generate the given number of liabilities, with random subkeys &
/// # amounts. This is useful for testing.
/// num-random-liabilities = 100
/// ```
///
/// Example how to use the builder:
/// ```
/// use std::path::PathBuf;
/// use polmst::{AttestationConfigBuilder, BlockHeight, SplitThreshold};
///
/// let config = AttestationConfigBuilder::default()
///     .block_height(BlockHeight::from(820000u64))
///     .threshold(SplitThreshold::from(5_000_000u64))
///     .liabilities_path(PathBuf::from("./liabilities.csv"))
///     .build();
/// ```
#[derive(Deserialize, Debug, Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(build_fn(skip))]
pub struct AttestationConfig {
    block_height: BlockHeight,
    #[serde(default)]
    threshold: SplitThreshold,
    #[serde(default)]
    #[builder(private)]
    liabilities: LiabilityConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct LiabilityConfig {
    file_path: Option<PathBuf>,
    num_random_liabilities: Option<u64>,
}

// -------------------------------------------------------------------------------------------------
// Builder.

impl AttestationConfigBuilder {
    /// Set the path for the file containing the liability records.
    ///
    /// Wrapped in an option to provide ease of use if the PathBuf is already
    /// an option.
    pub fn liabilities_path_opt(&mut self, path: Option<PathBuf>) -> &mut Self {
        match &mut self.liabilities {
            None => {
                self.liabilities = Some(LiabilityConfig {
                    file_path: path,
                    num_random_liabilities: None,
                })
            }
            Some(liabilities) => liabilities.file_path = path,
        }
        self
    }

    /// Set the path for the file containing the liability records.
    pub fn liabilities_path(&mut self, path: PathBuf) -> &mut Self {
        self.liabilities_path_opt(Some(path))
    }

    /// Set the number of liabilities that will be generated randomly.
    ///
    /// If a path is also given for the liabilities then that is used
    /// instead, i.e. they are not combined.
    ///
    /// Wrapped in an option to provide ease of use if the value is already
    /// an option.
    pub fn num_random_liabilities_opt(&mut self, num_liabilities: Option<u64>) -> &mut Self {
        match &mut self.liabilities {
            None => {
                self.liabilities = Some(LiabilityConfig {
                    file_path: None,
                    num_random_liabilities: num_liabilities,
                })
            }
            Some(liabilities) => liabilities.num_random_liabilities = num_liabilities,
        }
        self
    }

    /// Set the number of liabilities that will be generated randomly.
    pub fn num_random_liabilities(&mut self, num_liabilities: u64) -> &mut Self {
        self.num_random_liabilities_opt(Some(num_liabilities))
    }

    /// Build the config struct.
    pub fn build(&self) -> Result<AttestationConfig, AttestationConfigBuilderError> {
        let block_height = self
            .block_height
            .ok_or(AttestationConfigBuilderError::UninitializedField(
                "block_height",
            ))?;

        let threshold = self.threshold.unwrap_or_default();

        let liabilities = LiabilityConfig {
            file_path: self.liabilities.clone().and_then(|l| l.file_path),
            num_random_liabilities: self
                .liabilities
                .clone()
                .and_then(|l| l.num_random_liabilities),
        };

        Ok(AttestationConfig {
            block_height,
            threshold,
            liabilities,
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Deserialization & parsing.

impl AttestationConfig {
    /// Open the file, then try to create the [AttestationConfig] struct.
    ///
    /// An error is returned if:
    /// 1. The file cannot be opened.
    /// 2. The file cannot be read.
    /// 3. The file type is not supported.
    pub fn deserialize(config_file_path: PathBuf) -> Result<Self, AttestationConfigError> {
        debug!(
            "Attempting to deserialize {:?} as a file containing attestation config",
            config_file_path.clone().into_os_string()
        );

        let ext = config_file_path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or(AttestationConfigError::UnknownFileType(
                config_file_path.clone().into_os_string(),
            ))?;

        let config = match FileType::from_str(ext)? {
            FileType::Toml => {
                let mut buf = String::new();
                File::open(config_file_path)?.read_to_string(&mut buf)?;
                let config: AttestationConfig = toml::from_str(&buf)?;
                config
            }
        };

        debug!("Successfully deserialized attestation config file");

        Ok(config)
    }

    /// Try to construct an [Attestation] from the config.
    pub fn parse(self) -> Result<Attestation, AttestationConfigError> {
        debug!("Parsing config to build a new attestation: {:?}", self);

        let liabilities = LiabilitiesParser::new()
            .with_path_opt(self.liabilities.file_path)
            .with_num_liabilities_opt(self.liabilities.num_random_liabilities)
            .parse_file_or_generate_random()?;

        let attestation =
            Attestation::build(self.block_height, self.threshold, liabilities).log_on_err()?;

        info!(
            "Successfully built attestation with root hash {:?} and total liabilities {}",
            attestation.root_hash(),
            attestation.total_liabilities()
        );

        Ok(attestation)
    }
}

/// Supported file types for deserialization.
enum FileType {
    Toml,
}

impl FromStr for FileType {
    type Err = AttestationConfigError;

    fn from_str(ext: &str) -> Result<FileType, Self::Err> {
        match ext {
            "toml" => Ok(FileType::Toml),
            _ => Err(AttestationConfigError::UnsupportedFileType { ext: ext.into() }),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when parsing [AttestationConfig].
#[derive(thiserror::Error, Debug)]
pub enum AttestationConfigError {
    #[error("Liabilities parsing failed while trying to parse the config")]
    LiabilitiesError(#[from] LiabilitiesParserError),
    #[error("Attestation build failed after parsing the config")]
    BuildError(#[from] AttestationError),
    #[error("Unable to find file extension for path {0:?}")]
    UnknownFileType(OsString),
    #[error("The file type with extension {ext:?} is not supported")]
    UnsupportedFileType { ext: String },
    #[error("Error reading the file")]
    FileReadError(#[from] std::io::Error),
    #[error("Deserialization process failed")]
    DeserializationError(#[from] toml::de::Error),
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::DEFAULT_SPLIT_THRESHOLD;

    #[test]
    fn builder_with_random_liabilities() {
        let attestation = AttestationConfigBuilder::default()
            .block_height(BlockHeight::from(820_000u64))
            .num_random_liabilities(10)
            .build()
            .unwrap()
            .parse()
            .unwrap();

        assert_eq!(attestation.block_height(), BlockHeight::from(820_000u64));
        assert!(attestation.verify());
        assert!(attestation.total_liabilities() > 0);
    }

    #[test]
    fn builder_without_threshold_gives_default() {
        let config = AttestationConfigBuilder::default()
            .block_height(BlockHeight::from(1u64))
            .num_random_liabilities(1)
            .build()
            .unwrap();

        assert_eq!(config.threshold, SplitThreshold::from(DEFAULT_SPLIT_THRESHOLD));
    }

    #[test]
    fn builder_without_block_height_fails() {
        let res = AttestationConfigBuilder::default()
            .num_random_liabilities(1)
            .build();
        assert!(matches!(
            res,
            Err(AttestationConfigBuilderError::UninitializedField(
                "block_height"
            ))
        ));
    }

    #[test]
    fn builder_without_liability_source_fails_at_parse() {
        let res = AttestationConfigBuilder::default()
            .block_height(BlockHeight::from(1u64))
            .build()
            .unwrap()
            .parse();
        assert!(matches!(
            res,
            Err(AttestationConfigError::LiabilitiesError(
                LiabilitiesParserError::NeitherPathNorNumLiabilitiesSet
            ))
        ));
    }

    #[test]
    fn toml_deserialization() {
        let content = "block-height = 820000\nthreshold = 1000000\n\n[liabilities]\nnum-random-liabilities = 5\n";
        let path = std::env::temp_dir().join(format!(
            "polmst_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        let config = AttestationConfig::deserialize(path.clone()).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(config.block_height, BlockHeight::from(820_000u64));
        assert_eq!(config.threshold, SplitThreshold::from(1_000_000u64));

        let attestation = config.parse().unwrap();
        assert!(attestation.verify());
    }

    #[test]
    fn unsupported_config_file_type_is_rejected() {
        assert!(matches!(
            AttestationConfig::deserialize(PathBuf::from("config.yaml")),
            Err(AttestationConfigError::UnsupportedFileType { .. })
        ));
    }
}

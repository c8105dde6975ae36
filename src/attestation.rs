use log::{debug, info};
use logging_timer::{time, timer, Level};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{
    account::Account,
    block_height::{BlockHeight, BlockHeightError},
    kdf::Key,
    liability::Liability,
    merkle_sum_tree::{MerkleSumTree, MerkleSumTreeError, Node},
    read_write_utils::{self, ReadWriteError},
    recovery::{self, AccountBalance},
    splitting,
    threshold::SplitThreshold,
};

pub const SERIALIZED_TREE_EXTENSION: &str = "pol";
pub const SERIALIZED_TREE_FILE_PREFIX: &str = "liabilities_";

const BLOCK_HEIGHT_FIELD: &str = "block_height";

/// One published proof of liabilities: a Merkle Sum Tree together with the
/// block height identifying the attestation epoch.
///
/// This is the top-most type in the crate. The custodian side builds one
/// from its liability book and serializes it for publication; the user side
/// deserializes the published file, checks tree consistency and recovers
/// their own balance.
///
/// The on-disk format is a single `block_height:<N>` line followed by the
/// level-ordered tree serialization, root first, one `<hex_hash>,<value>`
/// line per node.
pub struct Attestation {
    block_height: BlockHeight,
    tree: MerkleSumTree,
}

// -------------------------------------------------------------------------------------------------
// Construction.

impl Attestation {
    /// Build the attestation for one liability book.
    ///
    /// The book is obfuscated (split, padded to a power of two, shuffled)
    /// before leaves are constructed, so no leaf amount or position can be
    /// tied to an account without its attestation key. The input list is
    /// consumed; liabilities are not retained after the build.
    pub fn build(
        block_height: BlockHeight,
        threshold: SplitThreshold,
        liabilities: Vec<Liability>,
    ) -> Result<Self, AttestationError> {
        info!(
            "\nBuilding an attestation with the following configuration:\n \
             - block height: {}\n \
             - number of liabilities: {}\n \
             - split threshold: {} satoshis",
            block_height,
            liabilities.len(),
            threshold.as_u64(),
        );

        let tmr = timer!(Level::Debug; "Liability splitting");
        let obfuscated = splitting::obfuscate_liabilities(liabilities, threshold);
        logging_timer::finish!(tmr, "Split and padded into {} entries", obfuscated.len());

        let tmr = timer!(Level::Debug; "Leaf construction");
        let height = block_height.as_u64();
        let leaves: Vec<Node> = obfuscated
            .par_iter()
            .enumerate()
            .map(|(index, liability)| Node::new_leaf(height, index as u64, liability))
            .collect();
        logging_timer::finish!(tmr, "Constructed {} leaves", leaves.len());

        let tmr = timer!(Level::Debug; "Tree build");
        let tree = MerkleSumTree::build(leaves)?;
        logging_timer::finish!(tmr, "Built tree with {} levels", tree.num_levels());

        Ok(Attestation { block_height, tree })
    }
}

// -------------------------------------------------------------------------------------------------
// Accessor methods.

impl Attestation {
    /// The block height identifying the attestation epoch.
    pub fn block_height(&self) -> BlockHeight {
        self.block_height
    }

    pub fn tree(&self) -> &MerkleSumTree {
        &self.tree
    }

    /// Hash digest of the root node, if the tree is non-empty.
    pub fn root_hash(&self) -> Option<primitive_types::H256> {
        self.tree.root().ok().flatten().map(|node| *node.hash())
    }

    /// The custodian's committed total, in satoshis. Zero for an empty book.
    pub fn total_liabilities(&self) -> u64 {
        self.tree
            .root()
            .ok()
            .flatten()
            .map(|node| node.value())
            .unwrap_or(0)
    }

    /// Check that the published levels are consistent with the leaves.
    pub fn verify(&self) -> bool {
        self.tree.verify()
    }
}

// -------------------------------------------------------------------------------------------------
// Balance recovery.

impl Attestation {
    /// Recover the balances of `accounts`, in input order.
    #[time("debug", "Attestation::{}")]
    pub fn recover_balances(&self, accounts: &[Account]) -> Vec<AccountBalance> {
        recovery::recover_balances(self.tree.leaves(), self.block_height.as_u64(), accounts)
    }

    /// Recover the balance of a single account.
    pub fn get_balance(&self, account: &Account) -> u64 {
        let attestation_key = account.attestation_key(self.block_height.as_u64());
        recovery::get_balance(self.tree.leaves(), &attestation_key)
    }

    /// The `(leaf_index, value)` pairs of the leaves bound to
    /// `attestation_key`.
    pub fn find_leaves(&self, attestation_key: &Key) -> Vec<(u64, u64)> {
        recovery::find_leaves(self.tree.leaves(), attestation_key)
    }
}

// -------------------------------------------------------------------------------------------------
// Serialization & deserialization.

impl Attestation {
    /// Parse `path` as one that points to a serialized attestation file.
    ///
    /// `path` may be a directory (a default file name is appended, creating
    /// the directories if needed) or a file path with the
    /// [SERIALIZED_TREE_EXTENSION] extension.
    pub fn parse_serialization_path(path: PathBuf) -> Result<PathBuf, ReadWriteError> {
        read_write_utils::parse_serialization_path(
            path,
            SERIALIZED_TREE_EXTENSION,
            SERIALIZED_TREE_FILE_PREFIX,
        )
    }

    /// Write the attestation to a file in the published text format.
    pub fn serialize(&self, path: PathBuf) -> Result<(), AttestationError> {
        info!(
            "Serializing attestation to file {:?}",
            path.clone().into_os_string()
        );

        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}:{}", BLOCK_HEIGHT_FIELD, self.block_height)?;
        self.tree.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read an attestation from a file in the published text format.
    ///
    /// An error is returned if
    /// 1. The file cannot be opened or does not have the expected extension.
    /// 2. The block height header is missing or malformed.
    /// 3. The tree serialization is malformed.
    pub fn deserialize(path: PathBuf) -> Result<Attestation, AttestationError> {
        debug!(
            "Deserializing attestation from file {:?}",
            path.clone().into_os_string()
        );

        match path.extension() {
            Some(ext) => {
                if ext != SERIALIZED_TREE_EXTENSION {
                    Err(ReadWriteError::UnsupportedFileExtension {
                        expected: SERIALIZED_TREE_EXTENSION.to_owned(),
                        actual: ext.to_os_string(),
                    })?;
                }
            }
            None => Err(ReadWriteError::NotAFile(path.clone().into_os_string()))?,
        }

        let mut buf = String::new();
        File::open(&path)?.read_to_string(&mut buf)?;
        let attestation = Attestation::from_lines(buf.lines())?;

        info!(
            "Successfully deserialized attestation from file {:?} with root hash {:?}",
            path.into_os_string(),
            attestation.root_hash()
        );

        Ok(attestation)
    }

    /// Parse the published text format from a line iterator: the
    /// `block_height:<N>` header followed by the level-ordered tree.
    pub fn from_lines<I, S>(lines: I) -> Result<Attestation, AttestationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let header = lines
            .next()
            .ok_or(AttestationError::MissingBlockHeightHeader)?;
        let block_height = parse_block_height_header(header.as_ref())?;
        let tree = MerkleSumTree::parse(lines)?;
        Ok(Attestation { block_height, tree })
    }
}

fn parse_block_height_header(line: &str) -> Result<BlockHeight, AttestationError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let value = line
        .strip_prefix(BLOCK_HEIGHT_FIELD)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or(AttestationError::MissingBlockHeightHeader)?;
    Ok(BlockHeight::from_str(value)?)
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when handling an [Attestation].
#[derive(thiserror::Error, Debug)]
pub enum AttestationError {
    #[error("Error parsing the serialization path")]
    PathError(#[from] ReadWriteError),
    #[error("Error reading or writing the attestation file")]
    FileError(#[from] std::io::Error),
    #[error("Attestation file must start with a '{BLOCK_HEIGHT_FIELD}:<N>' line")]
    MissingBlockHeightHeader,
    #[error("Malformed block height in the attestation file header")]
    MalformedBlockHeight(#[from] BlockHeightError),
    #[error("Problem constructing or parsing the tree")]
    TreeError(#[from] MerkleSumTreeError),
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Vec<Liability> {
        (1u64..=5)
            .map(|id| Liability::new(id, Key::from([id as u8; 32]), id * 1_000_000))
            .collect()
    }

    fn build() -> Attestation {
        Attestation::build(BlockHeight::from(820_000), SplitThreshold::default(), book()).unwrap()
    }

    #[test]
    fn build_commits_to_the_book_total() {
        let attestation = build();
        assert_eq!(attestation.total_liabilities(), 15_000_000);
        assert!(attestation.verify());
        assert!(attestation.tree().leaves().len().is_power_of_two());
    }

    #[test]
    fn balances_are_recoverable_after_build() {
        let attestation = build();
        for id in 1u64..=5 {
            let account = Account::new(id, Key::from([id as u8; 32]));
            assert_eq!(attestation.get_balance(&account), id * 1_000_000);
        }
    }

    #[test]
    fn text_round_trip() {
        let attestation = build();

        let mut out = Vec::new();
        writeln!(out, "{}:{}", BLOCK_HEIGHT_FIELD, attestation.block_height).unwrap();
        attestation.tree.serialize(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("block_height:820000\n"));

        let parsed = Attestation::from_lines(text.lines()).unwrap();
        assert_eq!(parsed.block_height(), attestation.block_height());
        assert_eq!(parsed.tree(), attestation.tree());
        assert!(parsed.verify());
    }

    #[test]
    fn file_round_trip() {
        let attestation = build();
        let path = std::env::temp_dir().join(format!(
            "liabilities_{}.{}",
            std::process::id(),
            SERIALIZED_TREE_EXTENSION
        ));

        attestation.serialize(path.clone()).unwrap();
        let read_back = Attestation::deserialize(path.clone()).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(read_back.block_height(), attestation.block_height());
        assert_eq!(read_back.root_hash(), attestation.root_hash());
        assert!(read_back.verify());
    }

    #[test]
    fn deserialize_rejects_wrong_extension() {
        assert!(matches!(
            Attestation::deserialize(PathBuf::from("tree.txt")),
            Err(AttestationError::PathError(
                ReadWriteError::UnsupportedFileExtension { .. }
            ))
        ));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(matches!(
            Attestation::from_lines(std::iter::empty::<&str>()),
            Err(AttestationError::MissingBlockHeightHeader)
        ));
        assert!(matches!(
            Attestation::from_lines(["not_a_header:5"]),
            Err(AttestationError::MissingBlockHeightHeader)
        ));
    }

    #[test]
    fn malformed_header_value_is_rejected() {
        assert!(matches!(
            Attestation::from_lines(["block_height:abc"]),
            Err(AttestationError::MalformedBlockHeight(_))
        ));
    }

    #[test]
    fn empty_book_serializes_to_header_only() {
        let attestation = Attestation::build(
            BlockHeight::from(1),
            SplitThreshold::default(),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(attestation.total_liabilities(), 0);
        assert!(attestation.root_hash().is_none());
        assert!(attestation.verify());

        let parsed = Attestation::from_lines(["block_height:1"]).unwrap();
        assert!(parsed.tree().is_empty());
    }
}

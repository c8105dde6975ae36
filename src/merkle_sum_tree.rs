//! The Merkle Sum Tree: construction, verification and the line-oriented
//! serialization format.
//!
//! The tree is stored as a sequence of complete levels, root first. For a
//! tree of height `h` level `k` holds `2^k` nodes and the leaf level holds
//! `2^h`. Every internal node's value is the sum of its children's values,
//! so the root carries the custodian's total liabilities.

use rayon::prelude::*;
use std::io::Write;

pub(crate) mod node;
pub use node::{MergeError, Node};

/// A complete binary Merkle Sum Tree, immutable once built.
///
/// Example:
/// ```
/// use polmst::{MerkleSumTree, Node};
/// use primitive_types::H256;
///
/// let leaves = vec![
///     Node::new(H256::repeat_byte(1), 10),
///     Node::new(H256::repeat_byte(2), 32),
/// ];
/// let tree = MerkleSumTree::build(leaves).unwrap();
/// assert_eq!(tree.root().unwrap().unwrap().value(), 42);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleSumTree {
    /// Levels root-first; empty for the empty tree.
    levels: Vec<Vec<Node>>,
}

impl MerkleSumTree {
    /// Merkleize `leaves` bottom-up.
    ///
    /// The leaf count must be a power of two (an empty list builds the
    /// empty tree). Within each level the pair merges are independent and
    /// run in parallel; pairing is strictly left-to-right.
    pub fn build(leaves: Vec<Node>) -> Result<Self, MerkleSumTreeError> {
        if leaves.is_empty() {
            return Ok(MerkleSumTree { levels: Vec::new() });
        }
        if !leaves.len().is_power_of_two() {
            return Err(MerkleSumTreeError::LeafCountNotPowerOfTwo {
                count: leaves.len(),
            });
        }

        let mut levels = Vec::new();
        let mut current = leaves;
        while current.len() > 1 {
            let next = current
                .par_chunks(2)
                .map(|pair| Node::merge(&pair[0], &pair[1]))
                .collect::<Result<Vec<Node>, MergeError>>()?;
            levels.push(current);
            current = next;
        }
        levels.push(current);
        levels.reverse();

        Ok(MerkleSumTree { levels })
    }

    /// The root node.
    ///
    /// `Ok(None)` for the empty tree. An error is returned if the top level
    /// holds more than one node, which means the tree was parsed from a
    /// truncated or otherwise malformed serialization.
    pub fn root(&self) -> Result<Option<&Node>, MerkleSumTreeError> {
        match self.levels.first() {
            None => Ok(None),
            Some(level) if level.len() == 1 => Ok(Some(&level[0])),
            Some(level) => Err(MerkleSumTreeError::MultiNodeTopLevel { count: level.len() }),
        }
    }

    /// The leaf level, in index order. Empty for the empty tree.
    pub fn leaves(&self) -> &[Node] {
        self.levels.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Check that the published levels are consistent with the leaves.
    ///
    /// Rebuilds the tree from [MerkleSumTree::leaves] and compares level
    /// count and root. Returns `false` on any mismatch; this is the
    /// user-visible verification failure, not an error.
    pub fn verify(&self) -> bool {
        let rebuilt = match MerkleSumTree::build(self.leaves().to_vec()) {
            Ok(tree) => tree,
            Err(_) => return false,
        };
        if rebuilt.num_levels() != self.num_levels() {
            return false;
        }
        match (rebuilt.root(), self.root()) {
            (Ok(rebuilt_root), Ok(own_root)) => rebuilt_root == own_root,
            _ => false,
        }
    }

    /// Write the level-ordered text form: one `<hex_hash>,<value>` line per
    /// node, root first, trailing newline after every node.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for level in &self.levels {
            for node in level {
                writeln!(writer, "{},{}", hex::encode(node.hash().as_bytes()), node.value())?;
            }
        }
        Ok(())
    }

    /// Parse the level-ordered text form.
    ///
    /// Reads `2^k` lines as level `k`, starting at the root and doubling,
    /// until the stream is exhausted. Exhaustion is only legal on a level
    /// boundary; running dry mid-level is an error, as is any malformed
    /// line. An empty stream parses to the empty tree.
    pub fn parse<I, S>(lines: I) -> Result<Self, MerkleSumTreeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let mut levels: Vec<Vec<Node>> = Vec::new();
        let mut expected = 1usize;
        let mut line_num = 0usize;

        loop {
            let mut level = Vec::with_capacity(expected);
            for nodes_read in 0..expected {
                match lines.next() {
                    Some(line) => {
                        line_num += 1;
                        level.push(parse_node_line(line.as_ref(), line_num)?);
                    }
                    None if nodes_read == 0 => return Ok(MerkleSumTree { levels }),
                    None => {
                        return Err(MerkleSumTreeError::IncompleteLevel {
                            level: levels.len(),
                            expected,
                            found: nodes_read,
                        })
                    }
                }
            }
            levels.push(level);
            expected *= 2;
        }
    }
}

/// Parse one `<hex_hash>,<value>` line.
///
/// The hash must be exactly 64 lowercase hex characters; uppercase is
/// rejected so that every tree has a single canonical serialization.
fn parse_node_line(line: &str, line_num: usize) -> Result<Node, MerkleSumTreeError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (hash_str, value_str) = line
        .split_once(',')
        .ok_or(MerkleSumTreeError::MissingDelimiter { line: line_num })?;

    if hash_str.len() != 64 || !hash_str.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(MerkleSumTreeError::MalformedHash { line: line_num });
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hash_str, &mut bytes)
        .map_err(|_| MerkleSumTreeError::MalformedHash { line: line_num })?;

    let value = value_str
        .parse::<u64>()
        .map_err(|source| MerkleSumTreeError::MalformedValue {
            line: line_num,
            source,
        })?;

    Ok(Node::new(primitive_types::H256(bytes), value))
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when building or parsing a [MerkleSumTree].
#[derive(Debug, thiserror::Error)]
pub enum MerkleSumTreeError {
    #[error("number of leaves is not a power of two (got {count})")]
    LeafCountNotPowerOfTwo { count: usize },
    #[error("the top level of the tree has {count} nodes, expected exactly one")]
    MultiNodeTopLevel { count: usize },
    #[error("merging sibling nodes failed")]
    Merge(#[from] MergeError),
    #[error("line {line}: expected '<hex_hash>,<value>'")]
    MissingDelimiter { line: usize },
    #[error("line {line}: hash must be 64 lowercase hex characters")]
    MalformedHash { line: usize },
    #[error("line {line}: malformed node value")]
    MalformedValue {
        line: usize,
        source: std::num::ParseIntError,
    },
    #[error("serialization ended mid-level: level {level} expects {expected} nodes, found {found}")]
    IncompleteLevel {
        level: usize,
        expected: usize,
        found: usize,
    },
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

//! The node type shared by every level of the Merkle Sum Tree.
//!
//! A node is a 32-byte hash plus the sum of the leaf amounts beneath it. All
//! the logic for how node content is computed lives in this file: the
//! HMAC-based leaf hash that binds a leaf to an account, and the merge that
//! combines two siblings into a parent.

use primitive_types::H256;

use crate::{
    hasher::{self, Hasher},
    kdf::{self, Key},
    liability::Liability,
};

/// One node of the Merkle Sum Tree.
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    hash: H256,
    value: u64,
}

impl Node {
    pub fn new(hash: H256, value: u64) -> Self {
        Node { hash, value }
    }

    pub fn hash(&self) -> &H256 {
        &self.hash
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Build the leaf node for one (already split) liability.
    ///
    /// The hash is `HMAC-SHA256(attestation_key, LE64(amount) || LE64(leaf_index))`,
    /// where the attestation key is derived from the liability's subkey, the
    /// block height and the account ID. Only a holder of the account subkey
    /// can recognize the leaf; to everyone else it is a random value.
    ///
    /// `leaf_index` is the node's final zero-based position in the leaf
    /// level, assigned after shuffling.
    pub fn new_leaf(block_height: u64, leaf_index: u64, liability: &Liability) -> Self {
        let attestation_key = kdf::derive_attestation_key(
            &liability.account_subkey,
            block_height,
            liability.account_id,
        );
        Node {
            hash: leaf_hash(&attestation_key, liability.amount, leaf_index),
            value: liability.amount,
        }
    }

    /// Combine two siblings into their parent.
    ///
    /// `value = left.value + right.value` and
    /// `hash = SHA256(left.hash || LE64(left.value) || right.hash || LE64(right.value))`.
    /// Fails if the value sum overflows 64 bits.
    pub fn merge(left: &Node, right: &Node) -> Result<Node, MergeError> {
        let value = left
            .value
            .checked_add(right.value)
            .ok_or(MergeError::SumOverflow)?;

        let mut hasher = Hasher::new();
        hasher.update(left.hash.as_bytes());
        hasher.update(&left.value.to_le_bytes());
        hasher.update(right.hash.as_bytes());
        hasher.update(&right.value.to_le_bytes());

        Ok(Node {
            hash: hasher.finalize(),
            value,
        })
    }
}

/// The keyed leaf hash. Also recomputed during account recovery, which is
/// why it is split out from [Node::new_leaf].
pub(crate) fn leaf_hash(attestation_key: &Key, amount: u64, leaf_index: u64) -> H256 {
    let mut msg = [0u8; 16];
    msg[..8].copy_from_slice(&amount.to_le_bytes());
    msg[8..].copy_from_slice(&leaf_index.to_le_bytes());
    hasher::hmac_sha256(attestation_key.as_bytes(), &msg)
}

impl std::fmt::Debug for Node {
    /// Abbreviated hex form for debug inspection.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Node({}.., {})",
            hex::encode(&self.hash.as_bytes()[..4]),
            self.value
        )
    }
}

// -------------------------------------------------------------------------------------------------
// Errors.

/// Errors encountered when merging two [Node]s.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Sum of child node values overflows 64 bits")]
    SumOverflow,
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

//! Locating an account's leaves in a published tree.
//!
//! A user (or the custodian, on their behalf) recomputes the attestation key
//! for each account of interest and then tests every leaf: a leaf belongs to
//! an account iff its hash equals the HMAC of its `(value, index)` pair
//! under that account's attestation key. The matched values are summed into
//! the recovered balance.
//!
//! The scan costs `O(leaves * accounts)` HMAC computations and is fanned out
//! over leaf ranges with [rayon]; each leaf keeps its absolute index in the
//! overall list, so partitioning does not affect the result.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    account::Account,
    kdf::Key,
    merkle_sum_tree::{node, Node},
};

/// The outcome of recovery for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: u64,
    /// Sum of the values of all leaves bound to the account.
    pub balance: u64,
    /// The key the leaves were matched under, kept so a report can show
    /// which key was searched for.
    pub attestation_key: Key,
}

/// Recover the balances of `accounts` from the leaf level of a tree.
///
/// The output is in the same order as the input accounts. Accounts with no
/// matching leaves recover a balance of zero.
pub fn recover_balances(
    leaves: &[Node],
    block_height: u64,
    accounts: &[Account],
) -> Vec<AccountBalance> {
    let keys: Vec<Key> = accounts
        .iter()
        .map(|account| account.attestation_key(block_height))
        .collect();

    let totals = leaves
        .par_iter()
        .enumerate()
        .fold(
            || vec![0u64; keys.len()],
            |mut totals, (index, leaf)| {
                for (slot, key) in keys.iter().enumerate() {
                    if leaf_matches(key, leaf, index as u64) {
                        totals[slot] += leaf.value();
                    }
                }
                totals
            },
        )
        .reduce(
            || vec![0u64; keys.len()],
            |mut left, right| {
                for (slot, partial) in right.into_iter().enumerate() {
                    left[slot] += partial;
                }
                left
            },
        );

    accounts
        .iter()
        .zip(keys)
        .zip(totals)
        .map(|((account, attestation_key), balance)| AccountBalance {
            account_id: account.id,
            balance,
            attestation_key,
        })
        .collect()
}

/// Sum of the values of the leaves bound to one attestation key.
pub fn get_balance(leaves: &[Node], attestation_key: &Key) -> u64 {
    find_leaves(leaves, attestation_key)
        .into_iter()
        .map(|(_, value)| value)
        .sum()
}

/// The `(leaf_index, value)` pairs of the leaves bound to one attestation
/// key, in index order.
pub fn find_leaves(leaves: &[Node], attestation_key: &Key) -> Vec<(u64, u64)> {
    leaves
        .iter()
        .enumerate()
        .filter(|(index, leaf)| leaf_matches(attestation_key, leaf, *index as u64))
        .map(|(index, leaf)| (index as u64, leaf.value()))
        .collect()
}

fn leaf_matches(attestation_key: &Key, leaf: &Node, index: u64) -> bool {
    node::leaf_hash(attestation_key, leaf.value(), index) == *leaf.hash()
}

// -------------------------------------------------------------------------------------------------
// Unit tests.

// Copyright ⓒ 2023 SilverSixpence
// Licensed under the MIT license
// (see LICENSE or <http://opensource.org/licenses/MIT>) All files in the project carrying such
// notice may not be copied, modified, or distributed except according to those
// terms.

//! # Proof of Liabilities via a Merkle Sum Tree
//!
//! A custodian uses this library to publicly commit to the sum of its user
//! balances at a point in time, while allowing each user to verify privately
//! that their own balance is included in the committed total. The
//! construction is the BitMEX-style Merkle Sum Tree with obfuscation by
//! liability splitting and random shuffling.
//!
//! ## What is contained in this code
//!
//! - Key derivation for the per-account subkey and the per-attestation key
//!   (both plain SHA-256 over fixed byte layouts).
//! - The liability splitting, padding and shuffling stage that masks
//!   individual balances and produces a power-of-two leaf set.
//! - The Merkle Sum Tree itself: parallel construction, root/leaf access,
//!   consistency verification, and the line-oriented text serialization
//!   that custodians publish.
//! - Account balance recovery: locating the leaves bound to an account's
//!   attestation key and summing their values.
//!
//! The tree reveals only hashes, amounts and positions. It is not a
//! zero-knowledge system (leaf amount patterns leak statistical
//! information) and it does not prove asset ownership; that is a separate
//! Proof of Reserves step. Trees are immutable: every attestation rebuilds
//! from scratch.
//!
//! ## How this code can be used
//!
//! There is both a Rust API and a CLI. The typical custodian flow:
//!
//! ```
//! use polmst::{Attestation, BlockHeight, Key, Liability, SplitThreshold};
//!
//! let liabilities = vec![
//!     Liability::new(1, Key::from([1u8; 32]), 10_000_000),
//!     Liability::new(2, Key::from([2u8; 32]), 650_000),
//! ];
//!
//! let attestation = Attestation::build(
//!     BlockHeight::from(820000u64),
//!     SplitThreshold::default(),
//!     liabilities,
//! )
//! .unwrap();
//!
//! assert!(attestation.verify());
//! assert_eq!(attestation.total_liabilities(), 10_650_000);
//! ```
//!
//! A user recovers their balance from a published tree with
//! [Account::from_credentials] and [Attestation::get_balance], or in bulk
//! via [recover_balances].

pub mod cli;
pub mod read_write_utils;
pub mod utils;

mod attestation;
pub use attestation::{
    Attestation, AttestationError, SERIALIZED_TREE_EXTENSION, SERIALIZED_TREE_FILE_PREFIX,
};

mod attestation_config;
pub use attestation_config::{
    AttestationConfig, AttestationConfigBuilder, AttestationConfigBuilderError,
    AttestationConfigError,
};

mod account;
pub use account::{Account, AccountUid, AccountUidParserError};

mod block_height;
pub use block_height::{BlockHeight, BlockHeightError};

mod hasher;
pub use hasher::{hmac_sha256, Hasher};

mod kdf;
pub use kdf::{derive_account_subkey, derive_attestation_key, Key, KeyParserError};

mod liability;
pub use liability::{LiabilitiesParser, LiabilitiesParserError, Liability};

mod merkle_sum_tree;
pub use merkle_sum_tree::{MergeError, MerkleSumTree, MerkleSumTreeError, Node};

mod recovery;
pub use recovery::{find_leaves, get_balance, recover_balances, AccountBalance};

mod splitting;
pub use splitting::{obfuscate_liabilities, obfuscate_liabilities_with_rng};

mod threshold;
pub use threshold::{SplitThreshold, SplitThresholdError, DEFAULT_SPLIT_THRESHOLD};

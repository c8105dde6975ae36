//! Command Line Interface implementation using [clap].
//!
//! See [MAIN_LONG_ABOUT] for more information.

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use patharg::{InputArg, OutputArg};

use std::str::FromStr;

use crate::{AccountUid, BlockHeight, Key, SplitThreshold};

// -------------------------------------------------------------------------------------------------
// Main structs.

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = MAIN_LONG_ABOUT)]
pub struct Cli {
    /// Initial command for the program.
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Construct an attestation tree from the given parameters.
    ///
    /// There are 2 different ways to build a tree:
    /// - new, using CLI options for configuration
    /// - new, using a file for configuration
    BuildTree {
        /// Configure the attestation build.
        #[command(subcommand)]
        build_kind: BuildKindCommand,

        #[arg(short = 'S', long, value_name = "FILE_PATH", global = true, long_help = SERIALIZE_HELP)]
        serialize: Option<OutputArg>,
    },

    /// Verify a published tree and recover the balance of one account.
    ///
    /// The tree file is expected to be in the published text format: a
    /// single block_height header line followed by the level-ordered node
    /// serialization. Verification rebuilds the tree from its leaves and
    /// compares roots before any balance is reported.
    VerifyBalance {
        /// Path to the published tree file.
        #[arg(short, long, value_name = "FILE_PATH")]
        tree_file: InputArg,

        /// Account UID as an unpadded base32 string.
        #[arg(short = 'u', long, value_parser = AccountUid::from_str, value_name = "BASE32")]
        account_uid: AccountUid,

        /// Account key as 64 lowercase hex characters.
        #[arg(short = 'k', long, value_parser = Key::from_str, value_name = "HEX")]
        account_key: Key,

        /// Email address the account was registered with, used verbatim.
        #[arg(short, long)]
        email: String,
    },

    /// Verify the internal consistency of a published tree.
    ///
    /// Rebuilds the tree from its leaf level and checks that the published
    /// root matches; reports the committed total liabilities on success.
    VerifyTree {
        /// Path to the published tree file.
        #[arg(short, long, value_name = "FILE_PATH")]
        tree_file: InputArg,
    },
}

#[derive(Debug, Subcommand)]
pub enum BuildKindCommand {
    /// Create a new attestation using CLI options.
    ///
    /// The options available are similar to those supported by the
    /// configuration file format which can be found in the
    /// `build-tree config-file` command.
    New {
        /// Block height the attestation is published against.
        #[arg(short, long, value_parser = BlockHeight::from_str, value_name = "U64_INT")]
        block_height: BlockHeight,

        /// Maximum per-leaf amount after liability splitting, in satoshis.
        #[arg(short, long, value_parser = SplitThreshold::from_str, default_value = SplitThreshold::default(), value_name = "U64_INT")]
        threshold: SplitThreshold,

        #[command(flatten)]
        liability_source: LiabilitySource,
    },

    #[command(about = COMMAND_CONFIG_FILE_ABOUT, long_about = COMMAND_CONFIG_FILE_LONG_ABOUT)]
    ConfigFile {
        /// Path to the config file (supported file formats: TOML).
        file_path: InputArg,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct LiabilitySource {
    #[arg(short, long, value_name = "FILE_PATH", long_help = LIABILITIES_FILE_HELP)]
    pub liabilities_file: Option<InputArg>,

    /// Randomly generate a number of liabilities.
    #[arg(short, long, value_name = "NUM_LIABILITIES")]
    pub random_liabilities: Option<u64>,
}

// -------------------------------------------------------------------------------------------------
// Long help texts.

pub const MAIN_LONG_ABOUT: &str = "
Merkle Sum Tree Proof of Liabilities for a Bitcoin custodian.

The custodian builds a tree committing to the sum of all user balances at a
given block height and publishes its serialization. Each user can then check
the tree's consistency and privately recover their own balance from the
leaves, using their account UID, account key and email address.

Individual balances are obfuscated before tree construction by splitting
them into threshold-bounded pieces, padding with zero-amount dummies to a
power of two, and shuffling with a cryptographic RNG.";

const SERIALIZE_HELP: &str = "
Serialize the tree to a file. If the path given is a directory then a default
file name will be given. If the path given is a file then that file will be
overwritten (if it exists) or created (if it does not exist). The file
extension must be `.pol`.";

const LIABILITIES_FILE_HELP: &str = "
Path to file containing liability records (supported file types: CSV).

CSV file format:
account_id,account_subkey,amount

where account_subkey is 64 lowercase hex characters and amount is in
satoshis.";

const COMMAND_CONFIG_FILE_ABOUT: &str =
    "Read attestation configuration from a file. Supported file formats: TOML.";

const COMMAND_CONFIG_FILE_LONG_ABOUT: &str = "
Read attestation configuration from a file.
Supported file formats: TOML.

Config file format (TOML):
```
block-height = 820000
threshold = 5000000

[liabilities]
file-path = \"./liabilities.csv\"
# or:
# num-random-liabilities = 100
```";

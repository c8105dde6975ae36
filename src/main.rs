use clap::Parser;
use log::{debug, error, info};

use polmst::{
    cli::{BuildKindCommand, Cli, Command},
    utils::{activate_logging, Consume, IfNoneThen, LogOnErr, LogOnErrUnwrap},
    Account, Attestation, AttestationConfig, AttestationConfigBuilder,
};

fn main() {
    let args = Cli::parse();

    activate_logging(args.verbose.log_level_filter());

    match args.command {
        Command::BuildTree {
            build_kind,
            serialize,
        } => {
            // Do path checks before building so that the build does not
            // have to be repeated for problems with file names etc.
            let serialization_path = match serialize {
                Some(patharg) => {
                    let path = patharg.into_path().expect("Expected a file path, not stdout");
                    Attestation::parse_serialization_path(path).log_on_err().ok()
                }
                None => None,
            };

            let attestation: Attestation = match build_kind {
                BuildKindCommand::New {
                    block_height,
                    threshold,
                    liability_source,
                } => AttestationConfigBuilder::default()
                    .block_height(block_height)
                    .threshold(threshold)
                    .liabilities_path_opt(
                        liability_source
                            .liabilities_file
                            .and_then(|arg| arg.into_path()),
                    )
                    .num_random_liabilities_opt(liability_source.random_liabilities)
                    .build()
                    .log_on_err_unwrap()
                    .parse()
                    .log_on_err_unwrap(),
                BuildKindCommand::ConfigFile { file_path } => AttestationConfig::deserialize(
                    file_path
                        .into_path()
                        .expect("Expected file path, not stdin"),
                )
                .log_on_err_unwrap()
                .parse()
                .log_on_err_unwrap(),
            };

            serialization_path
                .if_none_then(|| {
                    debug!("No serialization path set, skipping serialization of the tree");
                })
                .consume(|path| attestation.serialize(path).log_on_err_unwrap());
        }
        Command::VerifyTree { tree_file } => {
            let attestation = Attestation::deserialize(
                tree_file
                    .into_path()
                    .expect("Expected file path, not stdin"),
            )
            .log_on_err_unwrap();

            report_verification(&attestation);
        }
        Command::VerifyBalance {
            tree_file,
            account_uid,
            account_key,
            email,
        } => {
            let attestation = Attestation::deserialize(
                tree_file
                    .into_path()
                    .expect("Expected file path, not stdin"),
            )
            .log_on_err_unwrap();

            report_verification(&attestation);

            let account = Account::from_credentials(account_uid, &account_key, &email);
            let balance = attestation.get_balance(&account);

            info!(
                "Recovered balance for account {} using attestation key {:?}",
                account.id,
                account.attestation_key(attestation.block_height().as_u64())
            );
            println!(
                "account {} holds {} satoshis at block height {}",
                account.id,
                balance,
                attestation.block_height()
            );
        }
    }
}

/// Check tree consistency, reporting the committed total on success and
/// exiting non-zero on failure.
fn report_verification(attestation: &Attestation) {
    if attestation.verify() {
        println!(
            "tree OK: total liabilities {} satoshis at block height {}",
            attestation.total_liabilities(),
            attestation.block_height()
        );
    } else {
        error!("Tree verification failed: the published levels do not match the leaves");
        std::process::exit(1);
    }
}

//! s3seal - Encrypt-and-replace for object storage.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use s3seal::cli::output;
use s3seal::cli::{execute, Cli};
use s3seal::core::constants::LOG_ENV;
use s3seal::error::{ConfigError, Error, KmsError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("s3seal=debug")
        } else {
            EnvFilter::new("s3seal=info")
        }
    });

    // Logs go to stderr; stdout may carry decrypted plaintext.
    let json = cli.log_json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr)
        }))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            output::error(&format!("failed to start runtime: {}", e));
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(execute(cli)) {
        let suggestion = match &e {
            Error::Config(ConfigError::MissingMasterKey) => {
                Some("set S3SEAL_KMS_KEY, or run: s3seal local-key <path>")
            }
            Error::Config(ConfigError::FeatureDisabled { .. }) => {
                Some("or set S3SEAL_STORE=fs and S3SEAL_FS_ROOT for a local store")
            }
            Error::Kms(KmsError::UnrecognizedKey(_)) => {
                Some("use an AWS key id, alias/<name>, a key ARN, or local:<name>")
            }
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

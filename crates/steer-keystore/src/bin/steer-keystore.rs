use clap::Parser;
use std::process::ExitCode;
use steer_keystore::KeystoreArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = KeystoreArgs::parse();
    steer_core::telemetry::init_logging(&args.log_level);

    match steer_keystore::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "steer-keystore failed");
            ExitCode::FAILURE
        }
    }
}

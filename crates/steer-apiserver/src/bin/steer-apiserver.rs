use clap::Parser;
use std::process::ExitCode;
use steer_apiserver::ApiServerArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ApiServerArgs::parse();
    steer_core::telemetry::init_logging(&args.log_level);

    match steer_apiserver::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "steer-apiserver failed");
            ExitCode::FAILURE
        }
    }
}

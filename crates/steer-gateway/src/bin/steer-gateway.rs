use clap::Parser;
use std::process::ExitCode;
use steer_gateway::GatewayArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = GatewayArgs::parse();
    steer_core::telemetry::init_logging(&args.log_level);

    match steer_gateway::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "steer-gateway failed");
            ExitCode::FAILURE
        }
    }
}

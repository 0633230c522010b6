use portsweep::output;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match portsweep::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

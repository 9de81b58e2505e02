//! spec-factory CLI binary.
//!
//! All logic is in the library; main.rs only drives the async runtime and
//! maps the returned exit code onto the process exit status.

#[tokio::main]
async fn main() {
    match spec_factory::run_cli().await {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(spec_factory::ExitCode::INTERNAL.as_i32());
        }
    }
}

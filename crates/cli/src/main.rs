use std::process::ExitCode;

fn main() -> ExitCode {
    askbridge_cli::run()
}

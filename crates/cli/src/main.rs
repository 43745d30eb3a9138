use std::process::ExitCode;

fn main() -> ExitCode {
    upkeep_cli::run()
}

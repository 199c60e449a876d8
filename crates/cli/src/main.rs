use std::process::ExitCode;

fn main() -> ExitCode {
    adsel_cli::run()
}

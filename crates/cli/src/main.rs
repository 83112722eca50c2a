use std::process::ExitCode;

fn main() -> ExitCode {
    affilink_cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    promolift_cli::run()
}

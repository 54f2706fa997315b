//! gitdeck binary entry point

use std::process::ExitCode;

use gitdeck::ui::output;

fn main() -> ExitCode {
    match gitdeck::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&err);
            ExitCode::from(output::exit_code(&err))
        }
    }
}

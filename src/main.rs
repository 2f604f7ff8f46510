//! cast - grow leveled lists with cloned NPCs

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = cast_of_thousands::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

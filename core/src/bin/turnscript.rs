/// Turnscript CLI
///
/// Runs and checks dialogue transcripts against a domain schema without a
/// language model in the loop. Useful for replaying generated programs and
/// debugging domain schemas.
use turnscript_core::cli;

fn main() {
    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

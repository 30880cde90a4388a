//! Entry point for the command-line interface.
//! Delegates to dedicated modules for argument handling, scanning and
//! rule verification.

use std::process::ExitCode;

use structgrep::args::{parse_cli, Commands, RulesCmd};
use structgrep::rules::verify_rules;
use structgrep::scan::{run_match, run_scan};
use structgrep::EXIT_ERROR;

fn main() -> ExitCode {
    let cli = parse_cli();
    let result = match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Match(args) => run_match(args),
        Commands::Rules(RulesCmd::Verify { path, full }) => verify_rules(&path, full),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

use colored::Colorize;
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();
    if let Err(e) = tokpin::cli::run(args) {
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(e.exit_code());
    }
}

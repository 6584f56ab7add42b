//! OxC Lang front end driver
//!
//! Tokenizes, parses and checks OxC Lang sources.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};

use oxc_lang::feedback::{self, Report, Stage};

/// OxC Lang front end
#[derive(Parser, Debug)]
#[command(name = "oxcc")]
#[command(author = "Z1529")]
#[command(version = "0.1.0")]
#[command(about = "OxC Lang front end - lexer, parser and semantic analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Print the structured report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the token stream
    Tokens {
        /// Input source file
        input: PathBuf,
    },
    /// Parse a source file and print its syntax tree
    Parse {
        /// Input source file
        input: PathBuf,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Returns whether the run was clean
fn execute(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Some(Commands::Tokens { input }) => run_stage(input, Stage::Lexical, cli.json),
        Some(Commands::Parse { input }) => run_stage(input, Stage::Syntax, cli.json),
        Some(Commands::Check { input }) => run_stage(input, Stage::Complete, cli.json),
        Some(Commands::Version) => {
            println!("oxcc {}", env!("CARGO_PKG_VERSION"));
            println!("OxC Lang front end");
            println!("License: Apache-2.0");
            Ok(true)
        }
        None => match &cli.input {
            Some(input) => run_stage(input, Stage::Complete, cli.json),
            None => anyhow::bail!("No input file specified\nUsage: oxcc <FILE> or oxcc check <FILE>"),
        },
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_stage(input: &Path, last: Stage, json: bool) -> Result<bool> {
    let source = read_source(input)?;
    log::debug!("running {} stage(s) over {}", last, input.display());
    let report = feedback::run_until(&source, last);

    if json {
        println!("{}", report.to_json());
    } else {
        print_report(input, last, &report);
    }
    Ok(report.success)
}

fn print_report(input: &Path, last: Stage, report: &Report) {
    if last == Stage::Lexical {
        for token in &report.tokens {
            println!("{:>6}  {:<20} {}", token.span.to_string(), token.tag(), token.lexeme);
        }
    }

    if !report.success {
        for error in &report.errors {
            eprintln!("{} error at {}: {}", report.stage, error.span(), error.message);
        }
        eprintln!("{}: {} error(s)", input.display(), report.errors.len());
        return;
    }

    match last {
        Stage::Syntax => {
            if let Some(ast) = &report.ast {
                print!("{}", ast);
            }
        }
        Stage::Complete => println!("{}: No errors found", input.display()),
        _ => {}
    }
}

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rill::ast_printer::AstPrinter;
use rill::diagnostics::StderrReporter;
use rill::scanner::Scanner;
use rill::{Outcome, Session};

#[derive(ClapParser, Debug)]
#[command(version, about = "rill language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to rill.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a program and prints its syntax tree
    Parse {
        filename: Option<PathBuf>,

        /// Print the syntax tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a rill program
    Run { filename: Option<PathBuf> },
}

/// Reads a whole source file as UTF-8 text.
fn read_source(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rill.log").context("Failed to create rill.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rill::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to rill.log");
    Ok(())
}

fn no_input() -> ! {
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let (tokens, errors) = Scanner::new(source).scan_all();

    for e in &errors {
        debug!("Tokenization debug: {}", e);
        eprintln!("{}", e);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?
        );
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    if !errors.is_empty() {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(Outcome::StaticError.exit_code());
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(source: &str, json: bool) -> Result<()> {
    let mut reporter = StderrReporter::default();

    let Some(statements) = rill::parse(source, &mut reporter) else {
        std::process::exit(Outcome::StaticError.exit_code());
    };

    info!("Program parsed successfully");

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&statements).context("Failed to serialize syntax tree")?
        );
    } else {
        let printed = AstPrinter::print_program(&statements);
        debug!("AST: {}", printed);
        println!("{}", printed);
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");
            let source = read_source(filename.unwrap_or_else(|| no_input()))?;
            tokenize(&source, json)?;
        }

        Commands::Parse { filename, json } => {
            info!("Running Parse subcommand");
            let source = read_source(filename.unwrap_or_else(|| no_input()))?;
            parse(&source, json)?;
        }

        Commands::Evaluate { filename } => {
            info!("Running Evaluate subcommand");
            let source = read_source(filename.unwrap_or_else(|| no_input()))?;

            let mut reporter = StderrReporter::default();
            match Session::new().evaluate(&source, &mut reporter) {
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }
                Err(outcome) => std::process::exit(outcome.exit_code()),
            }

            info!("Evaluate subcommand completed");
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            let filename = filename.unwrap_or_else(|| no_input());

            let mut reporter = StderrReporter::default();
            let outcome = Session::new()
                .run_file(&filename, &mut reporter)
                .context(format!("Failed to run {:?}", filename))?;

            if outcome != Outcome::Completed {
                debug!("Run ended with {:?}", outcome);
                std::process::exit(outcome.exit_code());
            }

            info!("Program executed successfully");
        }
    }

    Ok(())
}

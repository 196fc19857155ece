use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use treelox::interpreter::Interpreter;
use treelox::printer::AstPrinter;
use treelox::scanner::Scanner;
use treelox::{compile, run, RunError};

#[derive(ClapParser, Debug)]
#[command(version, about = "Tree-walking Lox interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses and resolves a file, printing each statement's tree
    Parse {
        filename: PathBuf,

        /// Print the resolved tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Runs a Lox program, or starts a prompt when no file is given
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("treelox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report(err: &RunError) {
    debug!("{} failed, exiting with code {}", err.stage, err.exit_code());

    eprintln!("{}", err);
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let source = read_file(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_tokens();

    for e in &errors {
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
        std::process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: &Path, json: bool) -> Result<()> {
    let source = read_file(filename)?;

    let statements = match compile(&source) {
        Ok(statements) => statements,
        Err(e) => {
            report(&e);
            std::process::exit(e.exit_code());
        }
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&statements).context("Failed to serialize tree")?
        );
    } else {
        println!("{}", AstPrinter::print_program(&statements));
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    let source = read_file(filename)?;
    info!("Provided input:\n {}", source);

    let stdout = io::stdout();
    let mut interpreter = Interpreter::new(stdout.lock());

    if let Err(e) = run(&source, &mut interpreter) {
        interpreter.into_output().flush()?;
        report(&e);
        std::process::exit(e.exit_code());
    }

    info!("Program executed successfully");
    Ok(())
}

/// Line-at-a-time prompt sharing one interpreter, so globals persist.
fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut interpreter = Interpreter::new(io::stdout());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if line.trim() == "exit" {
            break;
        }

        if let Err(e) = run(&line, &mut interpreter) {
            report(&e);
        }
    }

    info!("REPL finished");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match &args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, *json),
        Commands::Parse { filename, json } => parse(filename, *json),
        Commands::Run {
            filename: Some(filename),
        } => run_file(filename),
        Commands::Run { filename: None } => repl(),
    }
}

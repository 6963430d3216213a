use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Once,
};

use clap::{Args, Parser, Subcommand};
use mython::tokenizer::{Lexer, LexerError, Token};

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the token stream of a source file
    Tokens(FileArgs),
    /// Tokenize a source file and report the first error, if any
    Check(FileArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum DriverError {
    #[error("Cannot open {0}: {1}")]
    Open(PathBuf, #[source] std::io::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Lexer(#[from] LexerError),
}

static TRACING_INIT: Once = Once::new();

/// Enable with `RUST_LOG=mython=debug` or `RUST_LOG=mython=trace`.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn main() {
    init_tracing();
    let args = Cli::parse();

    let result = match &args.command {
        Some(Command::Tokens(args)) => open(&args.file).and_then(tokens_command),
        Some(Command::Check(args)) => open(&args.file).and_then(check_command),
        None => tokens_command(std::io::stdin().lock()),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn open(path: &Path) -> Result<BufReader<File>, DriverError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| DriverError::Open(path.to_path_buf(), e))
}

fn tokens_command(input: impl BufRead) -> Result<(), DriverError> {
    let mut lexer = Lexer::new(input)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut line = 0;
    loop {
        if lexer.line_number() != line {
            line = lexer.line_number();
            write!(out, "{:4} ", line)?;
        } else {
            write!(out, "   | ")?;
        }

        let token = lexer.current_token();
        writeln!(out, "{}", token)?;
        if *token == Token::Eof {
            break;
        }
        lexer.next_token()?;
    }

    Ok(())
}

fn check_command(input: impl BufRead) -> Result<(), DriverError> {
    let tokens = Lexer::new(input)?
        .tokens()
        .collect::<Result<Vec<_>, _>>()?;
    println!("ok: {} tokens", tokens.len());
    Ok(())
}

//! Plume front end driver
//!
//! Usage:
//!   plume [OPTIONS] [FILE]
//!
//! Examples:
//!   plume prog.plume                 # Check, print nothing on success
//!   plume --emit=typed prog.plume    # Print the typed tree
//!   plume --emit=tokens < prog.plume # Dump tokens read from stdin

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use plume::{
    checker::Checker,
    lexer,
    parser::{self, Config},
    token::Token,
    util::{
        fmt::{tree, Context, Show},
        intern::Interner,
    },
};

/// Front end for the Plume language: lexes, parses and checks a program.
#[derive(Parser, Debug)]
#[command(name = "plume")]
#[command(version)]
#[command(about = "Lexes, parses and checks Plume programs", long_about = None)]
struct Cli {
    /// Input file (defaults to stdin)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// What to print once the program is accepted
    #[arg(long, default_value = "none")]
    emit: EmitKind,

    /// How deep expressions and blocks may nest
    #[arg(long, default_value_t = Config::default().max_nesting)]
    max_nesting: usize,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmitKind {
    /// Nothing, only report errors
    None,
    /// Token stream, trivia included
    Tokens,
    /// Untyped syntax tree
    Ast,
    /// Typed syntax tree
    Typed,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    debug!("cli: {cli:?}");
    let src = read_input(cli.input.as_ref())?;

    if cli.emit == EmitKind::Tokens {
        for token in lexer::lex_in_new(&src) {
            print_token(&src, token);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config {
        max_nesting: cli.max_nesting,
    };
    let interner = &mut Interner::with_capacity(1024);
    let tokens = &mut Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);

    info!("parsing...");
    let program = match parser::parse_program_with(&src, tokens, interner, &config) {
        Ok(program) => program,
        Err(error) => return Ok(report(interner, &error)),
    };
    info!("parsed {} top-level items", program.len());

    let ctx = Context {
        ident_interner: interner,
    };
    if cli.emit == EmitKind::Ast {
        print!("{}", tree::print_program_string(&ctx, &program));
        return Ok(ExitCode::SUCCESS);
    }

    info!("checking...");
    let (program, registry) = match Checker::with_capacity(256).check(program) {
        Ok(checked) => checked,
        Err(error) => return Ok(report(interner, &error)),
    };
    info!("checked, {} record types", registry.len());

    if cli.emit == EmitKind::Typed {
        print!("{}", tree::print_program_string(&ctx, &program));
    }
    Ok(ExitCode::SUCCESS)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut src = String::new();
            io::stdin()
                .read_to_string(&mut src)
                .context("failed to read stdin")?;
            Ok(src)
        }
    }
}

fn print_token(src: &str, token: Token) {
    match token.lexeme(src) {
        Some(lexeme) => println!("{} {:?} {lexeme:?}", token.span(), token.kind),
        None => println!("{} {:?}", token.span(), token.kind),
    }
}

fn report<E>(interner: &Interner<str>, error: &E) -> ExitCode
where
    E: Show,
{
    let ctx = Context {
        ident_interner: interner,
    };
    eprintln!("error: {:#}", error.display(&ctx));
    ExitCode::FAILURE
}

// File: src/main.rs
//
// Main entry point for the IBTL compiler.
// Handles command-line argument parsing and dispatches to the selected
// operating mode: tokenize only, parse only, or full code generation into
// an output file. On any compile error the partially written artifact is
// deleted and the process exits with a failure status.

use clap::Parser as ClapParser;
use ibtl::generator::{compile, GeneratorConfig};
use ibtl::lexer::{Lexer, TokenKind};
use ibtl::parser::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(
    name = "ibtl",
    about = "IBTL: a compiler for a fully parenthesized stack language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Tokenize only and print the token stream
    #[arg(short = 't', long)]
    tokens: bool,

    /// Tokenize and parse only and print the syntax tree
    #[arg(short = 'p', long)]
    parse: bool,

    /// Reject function declarations
    #[arg(long)]
    no_functions: bool,

    /// Output file for generated code
    #[arg(short, long, default_value = "out.fs")]
    output: PathBuf,

    /// Source files to compile
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = GeneratorConfig { enable_functions: !cli.no_functions };

    let mut out_file: Option<fs::File> = None;
    for path in &cli.files {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(_) => {
                eprintln!("error: could not open file {}", path.display());
                return fail(&mut out_file, &cli.output);
            }
        };

        if cli.tokens {
            if let Err(err) = print_tokens(&source) {
                eprintln!("{}", err);
                return fail(&mut out_file, &cli.output);
            }
            continue;
        }

        if cli.parse {
            match Parser::new(&source).parse() {
                Ok(tree) => {
                    println!("Parse tree for {}:", path.display());
                    print!("{}", tree);
                }
                Err(err) => {
                    eprintln!("{}", err);
                    return fail(&mut out_file, &cli.output);
                }
            }
            continue;
        }

        let code = match compile(&source, config.clone()) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{}", err);
                return fail(&mut out_file, &cli.output);
            }
        };
        if let Err(msg) = write_code(&code, &mut out_file, &cli.output) {
            eprintln!("error: {}", msg);
            return fail(&mut out_file, &cli.output);
        }
    }

    ExitCode::SUCCESS
}

fn print_tokens(source: &str) -> Result<(), ibtl::errors::CompileError> {
    let mut lexer = Lexer::new(source);
    loop {
        let token = lexer.next_token()?;
        if token.kind == TokenKind::Eof {
            return Ok(());
        }
        println!("{}", token);
    }
}

/// Append one unit's code to the output file, creating it on first use
fn write_code(code: &str, out_file: &mut Option<fs::File>, output: &Path) -> Result<(), String> {
    if out_file.is_none() {
        let file = fs::File::create(output)
            .map_err(|_| format!("could not create output file {}", output.display()))?;
        *out_file = Some(file);
    }
    match out_file {
        Some(file) => writeln!(file, "{}", code)
            .map_err(|_| format!("could not write output file {}", output.display())),
        None => Ok(()),
    }
}

/// A partially written artifact is not valid output; drop and delete it
/// before reporting failure
fn fail(out_file: &mut Option<fs::File>, output: &Path) -> ExitCode {
    if out_file.take().is_some() {
        let _ = fs::remove_file(output);
    }
    ExitCode::FAILURE
}

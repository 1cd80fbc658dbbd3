//! Cedar CLI
//!
//! Command-line interface for running .cdr programs and their test
//! files. User-level compile errors exit 0 with the latched code echoed
//! on stderr, so wrappers can inspect it textually; internal faults exit
//! with a distinct nonzero code.

use cedarc::{CompilerConfig, ErrorCode, Lexer, TestRunner, TokenKind};
use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

/// Exit code for compiler- or interpreter-internal faults.
const EXIT_INTERNAL: i32 = 2;

#[derive(ClapParser)]
#[command(name = "cedarc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cedar compiler - run .cdr programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and interpret a source file
    Run {
        /// Input source file
        #[arg(default_value = "test.txt")]
        input: PathBuf,

        /// Path to a configuration file (defaults to ./cedar.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Echo the token stream before parsing
        #[arg(long)]
        dump_tokens: bool,

        /// Pretty-print the decorated AST after type checking
        #[arg(long)]
        dump_ast: bool,
    },

    /// Run expectation tests in test-*.cdr files
    Test {
        /// Files or directories to search (defaults to current directory)
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Only run test files whose path contains this pattern
        #[arg(short, long)]
        filter: Option<String>,

        /// Show per-expectation results for passing files too
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            dump_tokens,
            dump_ast,
        } => run_program(&input, config.as_deref(), dump_tokens, dump_ast),
        Commands::Test {
            paths,
            filter,
            verbose,
        } => run_tests(&paths, filter, verbose),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cedarc", &mut io::stdout());
        }
    }
}

fn load_config(input: &Path, explicit: Option<&Path>) -> CompilerConfig {
    let loaded = match explicit {
        Some(path) => CompilerConfig::load(path),
        None => {
            let dir = input.parent().filter(|p| !p.as_os_str().is_empty());
            CompilerConfig::discover(dir.unwrap_or_else(|| Path::new(".")))
        }
    };

    match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_program(input: &Path, config_path: Option<&Path>, dump_tokens: bool, dump_ast: bool) {
    let mut config = load_config(input, config_path);
    config.merge(CompilerConfig {
        dump_tokens,
        dump_ast,
        max_errors: None,
    });

    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: could not read {}: {}", input.display(), e);
            process::exit(1);
        }
    };

    if config.dump_tokens {
        let mut lexer = Lexer::new(&source);
        loop {
            let token = lexer.scan_token();
            println!("{}", token);
            if token.kind == TokenKind::Eof {
                break;
            }
        }
    }

    let filename = input.to_string_lossy();

    if config.dump_ast {
        let compilation = cedarc::compile(&filename, &source);
        print!("{}", compilation.ast.dump());
        report_error_code(compilation.error_code);
        return;
    }

    match cedarc::run_source_with_config(&filename, &source, &config) {
        Ok(outcome) => report_error_code(outcome.error_code),
        Err(e) => {
            eprintln!("Internal error: {}", e);
            process::exit(EXIT_INTERNAL);
        }
    }
}

/// Echo the latched code so a wrapping harness can read it. The exit
/// code stays 0 either way.
fn report_error_code(code: ErrorCode) {
    if code != ErrorCode::Ok {
        eprintln!("error code: {}", code);
    }
}

fn run_tests(paths: &[PathBuf], filter: Option<String>, verbose: bool) {
    let runner = TestRunner::new(verbose, filter);
    let summary = runner.run(paths);
    runner.print_results(&summary);

    if summary.failed > 0 || summary.file_results.iter().any(|f| f.error.is_some()) {
        process::exit(1);
    }
    if summary.total == 0 {
        eprintln!("No tests found");
        process::exit(2);
    }
}

use std::env;
use std::io::{self, Write};
use std::path::Path;

use bitlang::commands::{repl, run, translate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `BITLANG_LOG=debug`.
const LOG_ENV: &str = "BITLANG_LOG";

fn print_top_usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run       [OPTIONS] "<code>"       # Run BitLang code (args are joined with spaces)
  {0} run       [OPTIONS] --file <PATH>  # Run BitLang code loaded from file
  {0} translate [OPTIONS] [CODE...]      # Print the canonical symbol program
  {0} repl      [OPTIONS]                # Start a BitLang REPL (read-eval-print loop)

Environment:
  BITLANG_LOG         Log filter for stderr diagnostics (default "warn")
  BITLANG_CONFIG      Path to a bitlang.toml (default $XDG_CONFIG_HOME/bitlang.toml)
  BITLANG_TIMEOUT_MS  Wall-clock limit per run in milliseconds
  BITLANG_MAX_STEPS   Instruction limit per run

Run "{0} <subcommand> --help" for more info.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

#[derive(Parser, Debug)]
#[command(name = "bitlang", disable_help_flag = true, disable_help_subcommand = true)]
struct Cli {
    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Run(run::RunArgs),
    Translate(translate::TranslateArgs),
    Repl(repl::ReplArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // Program name without directories, for usage text and error prefixes
    let program = env::args()
        .next()
        .as_deref()
        .and_then(|p| Path::new(p).file_stem())
        .and_then(|s| s.to_str())
        .map_or_else(|| String::from("bitlang"), String::from);

    let cli = Cli::parse();
    init_logging();

    let Some(command) = cli.command.filter(|_| !cli.help) else {
        print_top_usage_and_exit(&program, if cli.help { 0 } else { 2 });
    };

    let code = match command {
        Command::Run(args) => run::run(&program, args),
        Command::Translate(args) => translate::run(&program, args),
        Command::Repl(args) => repl::run(&program, args),
    };

    std::process::exit(code);
}

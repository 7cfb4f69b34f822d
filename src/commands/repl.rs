use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::Args;

use crate::io::{StdinSource, StdoutSink};
use crate::repl::{ModeFlagOverride, ReplMode, execute_bare_once, repl_loop, select_mode};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct ReplArgs {
    /// Force non-interactive bare mode
    #[arg(long = "bare", conflicts_with = "editor")]
    pub bare: bool,

    /// Force interactive mode (errors if stdin is not a TTY)
    #[arg(long = "editor", conflicts_with = "bare")]
    pub editor: bool,

    /// Load NAME=source macro definitions from PATH (repeatable)
    #[arg(short = 'm', long = "macros", value_name = "PATH")]
    pub macros: Vec<PathBuf>,

    /// Number of tape cells (default from config, else 1000)
    #[arg(long = "memory", value_name = "CELLS")]
    pub memory: Option<usize>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

impl ReplArgs {
    pub fn mode_flag(&self) -> ModeFlagOverride {
        match (self.bare, self.editor) {
            (true, _) => ModeFlagOverride::Bare,
            (_, true) => ModeFlagOverride::Editor,
            _ => ModeFlagOverride::None,
        }
    }
}

pub fn run(program: &str, args: ReplArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    // Determine mode: flags -> env -> auto-detect via is_terminal()
    let mode = match select_mode(args.mode_flag()) {
        Ok(m) => m,
        Err(msg) => {
            eprintln!("{program}: {msg}");
            let _ = io::stderr().flush();
            return 1;
        }
    };

    let mut session = match super::build_session(program, args.memory, &args.macros) {
        Ok(session) => session,
        Err(code) => return code,
    };
    session.set_output_sink(StdoutSink);
    session.set_input_source(StdinSource);
    let limits = super::resolve_limits(None, None);

    // Install SIGINT (ctrl+c) handler to flush and exit(0) immediately
    if let Err(e) = ctrlc::set_handler(|| {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
        std::process::exit(0);
    }) {
        eprintln!("{program}: failed to set ctrl+c handler: {e}");
        let _ = io::stderr().flush();
        return 1;
    }

    match mode {
        ReplMode::Editor => {
            // Print banners/prompts only if stderr is a TTY
            if io::stderr().is_terminal() {
                eprintln!("BitLang REPL (interactive editor mode)");
                eprintln!("Ctrl+d/Ctrl+z Enter (Windows) executes the current buffer. Type :help for meta commands, ctrl+c to exit");
                let _ = io::stderr().flush();
            }

            if let Err(e) = repl_loop(&mut session, &limits) {
                eprintln!("{program}: REPL error: {e}");
                let _ = io::stderr().flush();
                return 1;
            }

            0
        }
        ReplMode::Bare => {
            // Bare mode: read stdin until EOF, run it, exit 0
            match execute_bare_once(&mut session, &limits) {
                Ok(_) => 0,
                Err(e) => {
                    eprintln!("{program}: REPL error: {e}");
                    let _ = io::stderr().flush();
                    1
                }
            }
        }
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} repl [OPTIONS]   # Start a BitLang REPL (read-eval-print loop)

Options:
  --help,   -h          Show this help
  --bare                Force non-interactive bare mode
  --editor              Force interactive editor mode (errors if stdin is not a TTY)
  --macros, -m <PATH>   Load NAME=source macro definitions from PATH (repeatable)
  --memory <CELLS>      Number of tape cells (default 1000)

Description:
  Starts a REPL where you can enter BitLang code and execute it live.
  The tape and macros persist between submissions.

Meta commands (line starts with ":")
  :exit                Exit immediately (code 0)
  :help                Show meta command help
  :reset               Zero the tape and move the pointer to cell 0
  :dump                Print the tape page around the pointer (content -> stdout; framing -> stderr)
  :macros              List defined macros as NAME=source
  :define NAME=source  Define or replace a macro

Notes:
    - Ctrl+D executes the current buffer on *nix/macOS.
    - Ctrl+Z and Enter will execute the current buffer on Windows.
    - Ctrl+C exits the REPL immediately.
    - The REPL will print a newline after each execution for readability.
    - The REPL will exit after a single execution if the environment variable `BITLANG_REPL_ONCE` is set to `1`.
    - Limits: BITLANG_TIMEOUT_MS (default 2000) and BITLANG_MAX_STEPS apply to each execution.
    - Mode selection:
        * Flags: --bare|--editor override environment and auto-detection.
        * Env: BITLANG_REPL_MODE=bare|editor overrides auto-detection.
        * Auto-detect: if stdin is a TTY, starts in interactive editor mode; otherwise, bare mode.
        * In bare mode, stdin is read to EOF; code lines run together, meta lines run in place.
        * Prompts/banners suppressed if stderr is not a TTY.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc,
};
use std::thread;

use clap::Args;
use tracing::debug;

use crate::cli_util::{self, Limits};
use crate::io::{ConstantInput, NullSink, StdinSource, StdoutSink};
use crate::{BitLang, BitLangError, Op, Step, StepControl, Tape};

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Print a step-by-step table of operations instead of program output
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Read BitLang source from PATH instead of positional "<code>"
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Load NAME=source macro definitions from PATH (repeatable)
    #[arg(short = 'm', long = "macros", value_name = "PATH")]
    pub macros: Vec<PathBuf>,

    /// Number of tape cells (default from config, else 1000)
    #[arg(long = "memory", value_name = "CELLS")]
    pub memory: Option<usize>,

    /// Source parts, joined with spaces
    #[arg(value_name = "code", trailing_var_arg = true)]
    pub code: Vec<String>,

    /// Wall-clock timeout in milliseconds (fallback BITLANG_TIMEOUT_MS; default 2_000)
    #[arg(long = "timeout", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Maximum interpreter steps before abort (fallback BITLANG_MAX_STEPS; default unlimited)
    #[arg(long = "max-steps", value_name = "N")]
    pub max_steps: Option<usize>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: RunArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let RunArgs {
        debug,
        file,
        macros,
        memory,
        code,
        timeout_ms,
        max_steps,
        ..
    } = args;

    if file.is_none() && code.is_empty() {
        usage_and_exit(program, 2);
    }

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use positional code together with --file");
        usage_and_exit(program, 2);
    }

    let source = if let Some(path) = file {
        match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        }
    } else {
        // Friendly names need a separator, so join with spaces
        code.join(" ")
    };

    let mut session = match super::build_session(program, memory, &macros) {
        Ok(session) => session,
        Err(code) => return code,
    };

    let limits = super::resolve_limits(timeout_ms, max_steps);
    let canonical = cli_util::canonical_code(&session, &source);

    // Execute on a worker thread with cooperative cancellation
    let cancel = Arc::new(AtomicBool::new(false));
    session.set_step_control(Some(StepControl::new(limits.max_steps, Arc::clone(&cancel))));
    session.set_output_sink(StdoutSink);
    session.set_input_source(StdinSource);

    let (tx, rx) = mpsc::channel::<Result<(), BitLangError>>();
    thread::spawn(move || {
        let res = if debug {
            run_debug(&mut session, &source)
        } else {
            session.run(&source).map(|report| {
                debug!(ops = report.ops, steps = report.steps, "program finished");
            })
        };
        let _ = tx.send(res);
    });

    let exit_code = match limits.timeout {
        Some(timeout) => match rx.recv_timeout(timeout) {
            Ok(res) => report(program, &canonical, res, &limits),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                cli_util::report_run_error(Some(program), &canonical, &BitLangError::Canceled, &limits);
                1
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => 1,
        },
        None => match rx.recv() {
            Ok(res) => report(program, &canonical, res, &limits),
            Err(_) => 1,
        },
    };

    println!();
    let _ = io::stdout().flush();
    exit_code
}

fn report(program: &str, canonical: &str, res: Result<(), BitLangError>, limits: &Limits) -> i32 {
    match res {
        Ok(()) => 0,
        Err(err) => {
            cli_util::report_run_error(Some(program), canonical, &err, limits);
            1
        }
    }
}

/// Step through the program printing one table row per instruction.
/// Program output is suppressed and input reads as 0.
fn run_debug(session: &mut BitLang, source: &str) -> Result<(), BitLangError> {
    let program = session.compile(source)?;
    let mut sink = NullSink;
    let mut input = ConstantInput(0);
    let mut engine = session.engine(&program, &mut sink, &mut input);

    println!("STEP | IP  | PTR | CELL | OP | ACTION");
    println!("-----+-----+-----+------+----+------------------------------------------------");

    while let Some(step) = engine.step()? {
        println!(
            "{:<4} | {:<3} | {:<3} | {:<4} | {}  | {}",
            step.index,
            step.ip,
            step.cursor,
            step.cell,
            step.op,
            describe_step(&step, engine.tape(), engine.ip())
        );
    }
    Ok(())
}

/// The ACTION column: what the instruction did, given the tape and
/// instruction pointer after it ran.
fn describe_step(step: &Step, tape: &Tape, next_ip: usize) -> String {
    let after = tape.read();
    match step.op {
        Op::MoveRight | Op::MoveLeft => format!("Moved pointer head to index {}", tape.cursor()),
        Op::Increment => format!("Increment cell[{}] from {} to {}", step.cursor, step.cell, after),
        Op::Decrement => format!("Decrement cell[{}] from {} to {}", step.cursor, step.cell, after),
        Op::Output => format!("Output byte {} (suppressed in debug)", step.cell),
        Op::Input => format!("Read simulated input -> {after}"),
        Op::LoopStart if next_ip != step.ip + 1 => {
            format!("Cell is 0; jump forward past matching ']' to IP {next_ip}")
        }
        Op::LoopEnd if next_ip != step.ip + 1 => {
            format!("Cell != 0; jump back past matching '[' to IP {next_ip}")
        }
        Op::LoopStart => "Cell != 0; enter loop".to_string(),
        Op::LoopEnd => "Cell is 0; exit loop".to_string(),
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} run [OPTIONS] "<code>"
  {0} run [OPTIONS] --file <PATH>

Options:
  --file,   -f <PATH>   Read BitLang source from PATH instead of positional "<code>"
  --macros, -m <PATH>   Load NAME=source macro definitions from PATH (repeatable)
  --memory <CELLS>      Number of tape cells (default 1000)
  --max-steps <N>       Abort after N instructions (fallback BITLANG_MAX_STEPS)
  --timeout <MS>        Abort after MS milliseconds (fallback BITLANG_TIMEOUT_MS; default 2000)
  --debug,  -d          Print a step-by-step table instead of performing I/O
  --help,   -h          Show this help

Notes:
- Friendly names (ON OFF RIGHT LEFT OUTPUT INPUT LOOP_START LOOP_END) and the
  symbols + - > < . , [ ] may be mixed freely; anything else is ignored.
- INPUT reads a single byte from stdin; on EOF the current cell is set to 0.
  Under --debug, INPUT reads 0 and OUTPUT prints nothing.
- Moving the pointer off either end of the tape is a runtime error.

Examples:
- Print "A":
    {0} run "ON ON ON ON ON ON ON ON LOOP_START RIGHT ON ON ON ON ON ON ON ON LEFT OFF LOOP_END RIGHT ON OUTPUT"
- Run a file with a macro library:
    {0} run --macros ./lib.macros --file ./program.bit
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

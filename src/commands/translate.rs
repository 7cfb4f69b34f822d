use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Args;

use crate::Op;
use crate::cli_util;

#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct TranslateArgs {
    /// Read BitLang source from PATH instead of CODE or stdin
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Load NAME=source macro definitions from PATH (repeatable)
    #[arg(short = 'm', long = "macros", value_name = "PATH")]
    pub macros: Vec<PathBuf>,

    /// Keep whitespace and other non-instruction characters
    #[arg(long = "keep-comments")]
    pub keep_comments: bool,

    /// Source parts, joined with spaces. If omitted, reads from stdin.
    #[arg(value_name = "CODE", trailing_var_arg = true)]
    pub code: Vec<String>,

    /// Show this help
    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    pub help: bool,
}

pub fn run(program: &str, args: TranslateArgs) -> i32 {
    if args.help {
        usage_and_exit(program, 0);
    }

    let TranslateArgs {
        file,
        macros,
        keep_comments,
        code,
        ..
    } = args;

    if file.is_some() && !code.is_empty() {
        eprintln!("{program}: cannot use positional CODE together with --file");
        usage_and_exit(program, 2);
    }

    let source = match file {
        Some(path) => match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{program}: failed to read code file as UTF-8: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
        },
        None if !code.is_empty() => code.join(" "),
        None => {
            let mut s = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut s) {
                eprintln!("{program}: failed reading UTF-8 from stdin: {e}");
                let _ = io::stderr().flush();
                return 1;
            }
            s
        }
    };

    let session = match super::build_session(program, None, &macros) {
        Ok(session) => session,
        Err(code) => return code,
    };

    match session.translate(&source) {
        Ok(text) => {
            let out: String = if keep_comments {
                text
            } else {
                text.chars().filter(|c| Op::from_symbol(*c).is_some()).collect()
            };
            println!("{out}");
            let _ = io::stdout().flush();
            0
        }
        Err(err) => {
            cli_util::print_error(Some(program), "", &err);
            1
        }
    }
}

fn usage_and_exit(program: &str, code: i32) -> ! {
    eprintln!(
        r#"Usage:
  {0} translate [OPTIONS] [CODE...]       # Translate CODE, or stdin when no CODE is given
  {0} translate [OPTIONS] --file <PATH>

Options:
  --file,   -f <PATH>   Read BitLang source from PATH
  --macros, -m <PATH>   Load NAME=source macro definitions from PATH (repeatable)
  --keep-comments       Keep whitespace and non-instruction characters
  --help,   -h          Show this help

Description:
  Rewrites friendly names and expands macros, printing the canonical
  symbol program (+ - > < . , [ ]) followed by a newline. Nothing is run,
  so unmatched loops are not reported here.
"#,
        program
    );
    let _ = io::stderr().flush();
    std::process::exit(code);
}

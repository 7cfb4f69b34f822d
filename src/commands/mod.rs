//! Subcommands of the `bitlang` binary.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli_util::{self, Limits};
use crate::config;
use crate::{BitLang, DEFAULT_MEMORY_SIZE};

pub mod repl;
pub mod run;
pub mod translate;

pub const TIMEOUT_ENV: &str = "BITLANG_TIMEOUT_MS";
pub const MAX_STEPS_ENV: &str = "BITLANG_MAX_STEPS";
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Build a session from config plus command-line overrides, loading every
/// macro file in order. On failure the error is printed and the exit code
/// is returned.
pub(crate) fn build_session(
    program: &str,
    memory: Option<usize>,
    macro_files: &[PathBuf],
) -> Result<BitLang, i32> {
    let settings = config::settings();
    let memory_size = memory.or(settings.memory_size).unwrap_or(DEFAULT_MEMORY_SIZE);

    let mut session = match BitLang::builder()
        .memory_size(memory_size)
        .commands(settings.command_table())
        .build()
    {
        Ok(session) => session,
        Err(err) => {
            cli_util::print_error(Some(program), "", &err);
            return Err(2);
        }
    };

    for path in macro_files {
        if let Err(err) = session.load_macros_from_file(path) {
            cli_util::print_error(Some(program), "", &err);
            let _ = io::stderr().flush();
            return Err(1);
        }
    }

    Ok(session)
}

/// Limits: flag -> environment -> config file -> default.
pub(crate) fn resolve_limits(timeout_ms: Option<u64>, max_steps: Option<usize>) -> Limits {
    let settings = config::settings();
    let timeout_ms = config::resolve(timeout_ms, TIMEOUT_ENV, settings.timeout_ms)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    Limits {
        max_steps: config::resolve(max_steps, MAX_STEPS_ENV, settings.max_steps),
        timeout: Some(Duration::from_millis(timeout_ms)),
    }
}

use std::io::{self, Write};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, RecvTimeoutError},
};
use std::thread;
use std::time::Duration;

use crate::{BitLang, BitLangError, Op, RunReport, StepControl};

/// Execution limits resolved from flags, environment and config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: Option<usize>,
    pub timeout: Option<Duration>,
}

/// Run `source` on `session` under `limits`. A watchdog thread raises the
/// cancel flag once the timeout elapses; the engine polls it between steps.
pub fn run_with_limits(
    session: &mut BitLang,
    source: &str,
    limits: &Limits,
) -> Result<RunReport, BitLangError> {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    session.set_step_control(Some(StepControl::new(limits.max_steps, Arc::clone(&cancel_flag))));

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let watchdog = limits.timeout.map(|timeout| {
        let flag = Arc::clone(&cancel_flag);
        thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                flag.store(true, Ordering::Relaxed);
            }
        })
    });

    let result = session.run(source);
    drop(done_tx);
    if let Some(handle) = watchdog {
        let _ = handle.join();
    }
    session.set_step_control(None);
    result
}

/// The canonical symbol string `source` runs as, for caret context.
/// Empty when translation itself fails.
pub fn canonical_code(session: &BitLang, source: &str) -> String {
    session
        .translate(source)
        .map(|text| text.chars().filter(|c| Op::from_symbol(*c).is_some()).collect())
        .unwrap_or_default()
}

/// Like [`print_error`], but a cancelled run under a timeout is reported as
/// a wall-clock timeout.
pub fn report_run_error(program: Option<&str>, code: &str, err: &BitLangError, limits: &Limits) {
    match (err, limits.timeout) {
        (BitLangError::Canceled, Some(timeout)) => {
            let msg = format!(
                "Execution aborted: wall-clock timeout exceeded ({} ms)",
                timeout.as_millis()
            );
            eprintln!("{}", prefix_program(program, &msg));
            let _ = io::stderr().flush();
        }
        _ => print_error(program, code, err),
    }
}

/// Pretty-print a [`BitLangError`], with a caret under the offending
/// instruction when the error carries one.
///
/// `code` must be the canonical program (see [`crate::Program`]'s `Display`)
/// so that instruction indices line up with characters. If `program` is
/// `Some("bitlang")`, messages are prefixed with "bitlang: ...".
pub fn print_error(program: Option<&str>, code: &str, err: &BitLangError) {
    let msg = prefix_program(program, &describe(err));
    match err.ip() {
        Some(ip) if !code.is_empty() => print_error_with_context(&msg, code, ip),
        _ => {
            eprintln!("{msg}");
            let _ = io::stderr().flush();
        }
    }
}

fn prefix_program(program: Option<&str>, msg: &str) -> String {
    match program {
        Some(p) => format!("{p}: {msg}"),
        None => msg.to_string(),
    }
}

/// One-line message grouped by when the error happened.
pub fn describe(err: &BitLangError) -> String {
    match err {
        BitLangError::OutOfBounds { cursor, op, .. } => {
            format!("Runtime error: pointer out of bounds (ptr={cursor}, op={op})")
        }
        BitLangError::UnmatchedLoopStart { .. } => {
            "Parse error: unmatched loop start '['".to_string()
        }
        BitLangError::UnmatchedLoopEnd { .. } => "Parse error: unmatched loop end ']'".to_string(),
        BitLangError::MacroCycle { .. }
        | BitLangError::MacroOverflow { .. }
        | BitLangError::ReservedMacroName { .. } => format!("Macro error: {err}"),
        BitLangError::Callback { source, .. } => format!("I/O error: {source}"),
        BitLangError::StepLimitExceeded { .. } | BitLangError::Canceled => err.to_string(),
        BitLangError::InvalidMemorySize | BitLangError::Io { .. } => format!("error: {err}"),
    }
}

/// Print a concise error with instruction index and a caret context window,
/// working with UTF-8 by slicing using char indices.
pub fn print_error_with_context(prefix: &str, code: &str, pos: usize) {
    eprintln!("{prefix} at instruction {pos}");

    // Show a short window around the position for context
    const WINDOW_CHARS: usize = 32;

    let total_chars = code.chars().count();
    let start_char = pos.saturating_sub(WINDOW_CHARS);
    let end_char = (pos + WINDOW_CHARS + 1).min(total_chars);

    let start_byte = char_to_byte_index(code, start_char);
    let end_byte = char_to_byte_index(code, end_char);
    let slice = &code[start_byte..end_byte];

    eprintln!("  {}", slice);

    let caret_offset_chars = pos.saturating_sub(start_char);
    eprintln!("  {}^", " ".repeat(caret_offset_chars));
    let _ = io::stderr().flush();
}

/// Convert a char index into a byte index in the given UTF-8 string.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map_or(s.len(), |(byte_idx, _)| byte_idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Op;

    #[test]
    fn char_to_byte_index_handles_multibyte() {
        let s = "aé+";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 3), s.len());
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }

    #[test]
    fn describe_groups_errors() {
        let oob = BitLangError::OutOfBounds { ip: 0, cursor: 0, op: Op::MoveLeft };
        assert_eq!(describe(&oob), "Runtime error: pointer out of bounds (ptr=0, op=<)");
        assert!(describe(&BitLangError::UnmatchedLoopEnd { ip: 1 }).starts_with("Parse error"));
        let cycle = BitLangError::MacroCycle { name: "X".into(), passes: 64 };
        assert!(describe(&cycle).starts_with("Macro error"));
    }

    #[test]
    fn step_limit_applies_and_is_cleared() {
        let mut session = BitLang::new();
        let limits = Limits { max_steps: Some(3), timeout: None };
        let err = run_with_limits(&mut session, "ON ON ON ON", &limits).unwrap_err();
        assert!(matches!(err, BitLangError::StepLimitExceeded { limit: 3 }));
        assert_eq!(session.get_memory(0), 3);

        let report = run_with_limits(&mut session, "ON ON ON ON", &Limits::default()).unwrap();
        assert_eq!(report.steps, 4);
    }

    #[test]
    fn timeout_cancels_endless_loop() {
        let mut session = BitLang::new();
        let limits = Limits { max_steps: None, timeout: Some(Duration::from_millis(50)) };
        let err = run_with_limits(&mut session, "ON LOOP_START LOOP_END", &limits).unwrap_err();
        assert!(matches!(err, BitLangError::Canceled));
    }

    #[test]
    fn quick_run_finishes_before_timeout() {
        let mut session = BitLang::new();
        let limits = Limits { max_steps: None, timeout: Some(Duration::from_secs(5)) };
        assert!(run_with_limits(&mut session, "ON", &limits).is_ok());
    }

    #[test]
    fn canonical_code_keeps_symbols_only() {
        let session = BitLang::new();
        assert_eq!(canonical_code(&session, "ON x RIGHT LOOP_START"), "+>[");
    }

    #[test]
    fn prefix_is_optional() {
        assert_eq!(prefix_program(Some("bitlang"), "boom"), "bitlang: boom");
        assert_eq!(prefix_program(None, "boom"), "boom");
    }
}

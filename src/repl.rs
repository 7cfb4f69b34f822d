use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, RwLock};

use nu_ansi_term::Style;
use reedline::{DefaultPrompt, DefaultPromptSegment, Highlighter, HistoryItem, Signal, StyledText};

use crate::cli_util::{self, Limits};
use crate::program::Op;
use crate::tape::Tape;
use crate::{BitLang, theme};

/// Cells shown by `:dump`.
const DUMP_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplMode {
    Bare,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeFlagOverride {
    None,
    Bare,
    Editor,
}

pub fn select_mode(flag: ModeFlagOverride) -> Result<ReplMode, String> {
    // Flag override
    match flag {
        ModeFlagOverride::Bare => return Ok(ReplMode::Bare),
        ModeFlagOverride::Editor => {
            if !io::stdin().is_terminal() {
                return Err("cannot start editor: stdin is not a TTY (use --bare or BITLANG_REPL_MODE=bare)".to_string());
            }
            return Ok(ReplMode::Editor);
        }
        ModeFlagOverride::None => {}
    }

    // Environment override
    if let Ok(val) = env::var("BITLANG_REPL_MODE") {
        let v = val.trim().to_ascii_lowercase();
        return match v.as_str() {
            "bare" => Ok(ReplMode::Bare),
            "editor" => {
                if !io::stdin().is_terminal() {
                    return Err("cannot start editor: stdin is not a TTY (use BITLANG_REPL_MODE=bare)".to_string());
                }
                Ok(ReplMode::Editor)
            }
            _ => Err(format!("invalid BITLANG_REPL_MODE value: {val}, must be 'bare' or 'editor'")),
        };
    }

    // Auto-detect
    if io::stdin().is_terminal() {
        Ok(ReplMode::Editor)
    } else {
        Ok(ReplMode::Bare)
    }
}

/// A line starting with `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Meta {
    Exit,
    Help,
    Reset,
    Dump,
    Macros,
    Define { name: String, source: String },
    Unknown(String),
}

pub fn parse_meta(line: &str) -> Option<Meta> {
    let rest = line.trim().strip_prefix(':')?;
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    Some(match cmd {
        "exit" | "quit" => Meta::Exit,
        "help" => Meta::Help,
        "reset" => Meta::Reset,
        "dump" => Meta::Dump,
        "macros" => Meta::Macros,
        "define" => match arg.split_once('=') {
            Some((name, source)) if !name.trim().is_empty() => Meta::Define {
                name: name.trim().to_string(),
                source: source.trim().to_string(),
            },
            _ => Meta::Unknown(line.trim().to_string()),
        },
        _ => Meta::Unknown(line.trim().to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

fn handle_meta(session: &mut BitLang, meta: Meta, macro_names: &MacroNames) -> Flow {
    match meta {
        Meta::Exit => return Flow::Exit,
        Meta::Help => print_meta_help(),
        Meta::Reset => {
            session.reset_memory();
            if io::stderr().is_terminal() {
                eprintln!("memory reset");
            }
        }
        Meta::Dump => {
            let (ptr, len) = (session.tape().cursor(), session.tape().len());
            eprintln!("-- tape (ptr={ptr}, cells={len}) --");
            println!("{}", format_window(session.tape(), DUMP_WIDTH));
            eprintln!("-- end --");
        }
        Meta::Macros => {
            for (name, source) in session.macros().iter() {
                println!("{name}={source}");
            }
        }
        Meta::Define { name, source } => match session.define_macro(name.clone(), source) {
            Ok(()) => {
                if let Ok(mut names) = macro_names.write() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            Err(err) => cli_util::print_error(None, "", &err),
        },
        Meta::Unknown(line) => {
            eprintln!("unknown meta command: {line} (try :help)");
        }
    }
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    Flow::Continue
}

fn print_meta_help() {
    eprintln!(
        r#"Meta commands (line starts with ":")
  :exit                Exit immediately (code 0)
  :help                Show this help
  :reset               Zero the tape and move the pointer to cell 0
  :dump                Print the tape page around the pointer
  :macros              List defined macros as NAME=source
  :define NAME=source  Define or replace a macro"#
    );
}

/// One page of the tape, the pointer cell in brackets.
pub fn format_window(tape: &Tape, width: usize) -> String {
    let (base, cells) = tape.window(width);
    let mut out = format!("{base:04}:");
    for (i, cell) in cells.iter().enumerate() {
        if base + i == tape.cursor() {
            out.push_str(&format!(" [{cell:03}]"));
        } else {
            out.push_str(&format!(" {cell:03}"));
        }
    }
    out
}

/// Macro names shared with the highlighter so `:define` shows up live.
type MacroNames = Arc<RwLock<Vec<String>>>;

pub fn repl_loop(session: &mut BitLang, limits: &Limits) -> io::Result<()> {
    let macro_names: MacroNames = Arc::new(RwLock::new(
        session.macros().iter().map(|(name, _)| name.to_string()).collect(),
    ));
    let mut editor = init_line_editor(session, Arc::clone(&macro_names))?;

    loop {
        let Some(submission) = read_submission_interactive(&mut editor)? else {
            // EOF or editor closed. End the session cleanly to avoid hanging when stdin is closed
            println!();
            io::stdout().flush()?;
            return Ok(());
        };

        let trimmed = submission.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(meta) = parse_meta(trimmed) {
            if handle_meta(session, meta, &macro_names) == Flow::Exit {
                return Ok(());
            }
            continue;
        }

        execute_buffer(session, trimmed, limits);

        // Test hook: if BITLANG_REPL_ONCE=1, exit after one execution
        if env::var("BITLANG_REPL_ONCE").ok().as_deref() == Some("1") {
            return Ok(());
        }
    }
}

fn init_line_editor(session: &BitLang, macro_names: MacroNames) -> io::Result<reedline::Reedline> {
    use reedline::{
        EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers, Reedline, ReedlineEvent,
        default_emacs_keybindings,
    };

    // Start from default emacs-like bindings and adjust:
    // - Enter -> InsertNewLine (do not submit)
    // - Ctrl+D -> Submit
    // - Ctrl+Z -> Submit (Windows)
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Enter, ReedlineEvent::Edit(vec![EditCommand::InsertNewline]));
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('d'), ReedlineEvent::Submit);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Char('z'), ReedlineEvent::Submit);

    // Up/down move within the current multiline buffer, not history.
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Up, ReedlineEvent::Up);
    keybindings.add_binding(KeyModifiers::NONE, KeyCode::Down, ReedlineEvent::Down);

    // Alt+Up/Alt+Down or Ctrl+Up/Ctrl+Down to navigate history items.
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Up, ReedlineEvent::PreviousHistory);
    keybindings.add_binding(KeyModifiers::ALT, KeyCode::Down, ReedlineEvent::NextHistory);
    keybindings.add_binding(KeyModifiers::CONTROL, KeyCode::Down, ReedlineEvent::NextHistory);

    let history = FileBackedHistory::new(1_000).map_err(|e| io::Error::other(e.to_string()))?;

    let highlighter = BitLangHighlighter::new(session, macro_names);
    let editor = Reedline::create()
        .with_highlighter(Box::new(highlighter))
        .with_history(Box::new(history))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    Ok(editor)
}

pub fn read_submission<R: io::BufRead>(stdin: &mut R) -> Option<String> {
    // Collect all lines until EOF
    let mut buffer = String::new();

    loop {
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => buffer.push_str(&line),
            Err(_) => return None,
        }
    }

    if buffer.is_empty() { None } else { Some(buffer) }
}

fn read_submission_interactive(editor: &mut reedline::Reedline) -> io::Result<Option<String>> {
    let prompt = DefaultPrompt::new(DefaultPromptSegment::Basic("bit".to_string()), DefaultPromptSegment::Empty);

    // Enter inserts a newline; Ctrl+D or Ctrl+Z submits the buffer
    match editor.read_line(&prompt) {
        Ok(Signal::Success(buffer)) => {
            // One history item per submitted buffer (program-level)
            if !buffer.trim().is_empty() {
                let _ = editor.history_mut().save(HistoryItem::from_command_line(buffer.clone()));
            }
            Ok(Some(buffer))
        }
        Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => Ok(None),
        Err(e) => {
            eprintln!("repl: editor error: {e}");
            let _ = io::stderr().flush();
            Ok(None)
        }
    }
}

/// Runs one program on the session.
/// - Program output goes to stdout.
/// - Errors are printed concisely to stderr.
/// - A newline is always written to stdout after execution (success or error)
///   so that the prompt begins at column 0 on the next iteration.
fn execute_buffer(session: &mut BitLang, buffer: &str, limits: &Limits) {
    if let Err(err) = cli_util::run_with_limits(session, buffer, limits) {
        let code = cli_util::canonical_code(session, buffer);
        cli_util::report_run_error(None, &code, &err, limits);
    }
    println!();
    let _ = io::stdout().flush();
}

/// Bare mode: read stdin until EOF, then process it line by line. Meta
/// commands run in place; code lines accumulate and run as one program
/// before the next meta command and at EOF.
pub fn execute_bare_once(session: &mut BitLang, limits: &Limits) -> io::Result<()> {
    let mut locked = io::BufReader::new(io::stdin().lock());
    let Some(submission) = read_submission(&mut locked) else {
        return Ok(());
    };
    run_script(session, &submission, limits);
    Ok(())
}

fn run_script(session: &mut BitLang, script: &str, limits: &Limits) {
    let macro_names: MacroNames = Arc::default();
    let mut pending = String::new();

    for line in script.lines() {
        match parse_meta(line) {
            Some(meta) => {
                flush_pending(session, &mut pending, limits);
                if handle_meta(session, meta, &macro_names) == Flow::Exit {
                    return;
                }
            }
            None => {
                pending.push_str(line);
                pending.push('\n');
            }
        }
    }
    flush_pending(session, &mut pending, limits);
}

fn flush_pending(session: &mut BitLang, pending: &mut String, limits: &Limits) {
    let code = std::mem::take(pending);
    if !code.trim().is_empty() {
        execute_buffer(session, code.trim(), limits);
    }
}

/// Colours friendly names, macro invocations and canonical symbols.
pub struct BitLangHighlighter {
    commands: Vec<(String, Op)>,
    macro_names: MacroNames,
}

impl BitLangHighlighter {
    fn new(session: &BitLang, macro_names: MacroNames) -> Self {
        let mut commands: Vec<(String, Op)> = session
            .commands()
            .iter()
            .map(|(token, op)| (token.to_string(), op))
            .collect();
        // Longest first so LOOP_START wins over any shorter prefix.
        commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { commands, macro_names }
    }

    /// Style for the token starting at `rest`, and its byte length.
    fn match_at(&self, rest: &str, macros: &[String]) -> (Style, usize) {
        if let Some((token, op)) = self.commands.iter().find(|(t, _)| rest.starts_with(t.as_str())) {
            return (theme::op_style(*op), token.len());
        }
        if let Some(name) = macros
            .iter()
            .filter(|n| rest.starts_with(n.as_str()))
            .max_by_key(|n| n.len())
        {
            return (theme::macro_style(), name.len());
        }
        let ch = rest.chars().next().unwrap_or('\0');
        let style = Op::from_symbol(ch).map_or_else(theme::comment_style, theme::op_style);
        (style, ch.len_utf8())
    }

    fn spans(&self, line: &str) -> Vec<(Style, String)> {
        let macros = self.macro_names.read().map(|n| n.clone()).unwrap_or_default();
        let mut spans: Vec<(Style, String)> = Vec::new();
        let mut pos = 0;
        while pos < line.len() {
            let (style, len) = self.match_at(&line[pos..], &macros);
            let piece = &line[pos..pos + len];
            match spans.last_mut() {
                Some((last, text)) if *last == style => text.push_str(piece),
                _ => spans.push((style, piece.to_string())),
            }
            pos += len;
        }
        spans
    }
}

impl Highlighter for BitLangHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut out = StyledText::new();
        for span in self.spans(line) {
            out.push(span);
        }
        out
    }
}

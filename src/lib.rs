//! A BitLang interpreter library.
//!
//! BitLang is a Brainfuck-style language: a fixed-size memory tape
//! (default 1,000 cells) with a single data pointer and eight instructions.
//! Programs are usually written with friendly names that are rewritten into
//! the canonical symbols before execution:
//!
//! | Friendly name | Symbol | Effect                                   |
//! |---------------|--------|------------------------------------------|
//! | `ON`          | `+`    | increment the current cell (wraps)       |
//! | `OFF`         | `-`    | decrement the current cell (wraps)       |
//! | `RIGHT`       | `>`    | move the pointer right                   |
//! | `LEFT`        | `<`    | move the pointer left                    |
//! | `OUTPUT`      | `.`    | send the current cell to the output sink |
//! | `INPUT`       | `,`    | store a value from the input source      |
//! | `LOOP_START`  | `[`    | skip past the matching `]` if cell is 0  |
//! | `LOOP_END`    | `]`    | jump back past the matching `[` if not 0 |
//!
//! Features and behaviors:
//! - Memory tape initialized to 0; it persists across runs on one session
//!   until [`BitLang::reset_memory`].
//! - Strict pointer bounds: moving left from cell 0 or right past the end
//!   returns an error.
//! - Macros: named snippets expanded before execution, recursively, with a
//!   cycle guard.
//! - Loops are matched before execution; unmatched brackets are reported as
//!   errors and nothing runs.
//! - Characters outside the instruction alphabet are ignored.
//!
//! Quick start:
//!
//! ```
//! use bitlang::BitLang;
//!
//! let mut bl = BitLang::with_memory(5).unwrap();
//! bl.define_macro("TRIPLE", "ON ON ON").unwrap();
//! bl.run("TRIPLE LOOP_START OFF RIGHT ON LEFT LOOP_END RIGHT").unwrap();
//! assert_eq!(bl.get_memory(0), 0);
//! assert_eq!(bl.get_memory(1), 3);
//! assert_eq!(bl.tape().cursor(), 1);
//! ```

pub mod engine;
pub mod error;
pub mod io;
pub mod macros;
pub mod program;
pub mod session;
pub mod tape;
pub mod translate;

pub mod cli_util;
pub mod commands;
pub mod config;
pub mod repl;
pub mod theme;

pub use engine::{Engine, EngineState, Step, StepControl};
pub use error::{BitLangError, CallbackError, TapeError};
pub use io::{InputSource, OutputSink};
pub use macros::MacroTable;
pub use program::{JumpTable, Op, Program};
pub use session::{BitLang, BitLangBuilder, RunReport};
pub use tape::{DEFAULT_MEMORY_SIZE, Tape};
pub use translate::{CommandTable, DEFAULT_COMMANDS, Translator};

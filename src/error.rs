use std::path::PathBuf;

use crate::program::Op;

/// Errors that can occur while translating or running BitLang code.
///
/// Instruction indices (`ip`) refer to positions in the canonical program,
/// i.e. after friendly names and macros have been expanded and comment
/// characters dropped.
#[derive(Debug, thiserror::Error)]
pub enum BitLangError {
    /// A `[` was never closed.
    #[error("Unmatched loop start at instruction {ip}")]
    UnmatchedLoopStart { ip: usize },

    /// A `]` appeared with no open loop.
    #[error("Unmatched loop end at instruction {ip}")]
    UnmatchedLoopEnd { ip: usize },

    /// The cursor attempted to move left of cell 0 or beyond the last cell.
    #[error("Pointer out of bounds at instruction {ip} (ptr={cursor}, op='{op}')")]
    OutOfBounds { ip: usize, cursor: usize, op: Op },

    /// Macro expansion kept changing the text after the pass limit.
    #[error("Macro expansion did not terminate after {passes} passes (last expanded '{name}')")]
    MacroCycle { name: String, passes: usize },

    /// Macro expansion produced more text than allowed.
    #[error("Macro expansion exceeded {limit} bytes")]
    MacroOverflow { limit: usize },

    /// The macro name would be indistinguishable from plain instructions.
    #[error("Invalid macro name '{name}': it collides with the instruction alphabet")]
    ReservedMacroName { name: String },

    /// A tape needs at least one cell.
    #[error("Memory size must be at least 1 cell")]
    InvalidMemorySize,

    /// An output or input callback failed.
    #[error("Callback failed at instruction {ip}: {source}")]
    Callback {
        ip: usize,
        #[source]
        source: CallbackError,
    },

    /// Execution aborted due to step limit.
    #[error("Execution aborted: step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize },

    /// Execution aborted due to cooperative cancellation (e.g., timeout)
    #[error("Execution aborted: cancelled")]
    Canceled,

    /// A macro file could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BitLangError {
    /// Instruction index the error points at, if it has one.
    pub fn ip(&self) -> Option<usize> {
        match self {
            Self::UnmatchedLoopStart { ip }
            | Self::UnmatchedLoopEnd { ip }
            | Self::OutOfBounds { ip, .. }
            | Self::Callback { ip, .. } => Some(*ip),
            _ => None,
        }
    }
}

/// Failure reported by an [`OutputSink`](crate::io::OutputSink) or
/// [`InputSource`](crate::io::InputSource).
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host asked the engine to stop.
    #[error("aborted by host")]
    Aborted,

    #[error("{0}")]
    Message(String),
}

/// Cursor movement outside the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TapeError {
    #[error("cannot move left of cell 0")]
    BelowStart,
    #[error("cannot move right of cell {last}")]
    PastEnd { last: usize },
}

//! Colours for the REPL editor.

use nu_ansi_term::{Color, Style};

use crate::program::Op;

/// Catppuccin Mocha accents.
pub mod mocha {
    use nu_ansi_term::Color;

    pub const SURFACE2: Color = Color::Rgb(108, 112, 134);
    pub const RED: Color = Color::Rgb(243, 139, 168);
    pub const GREEN: Color = Color::Rgb(166, 227, 161);
    pub const YELLOW: Color = Color::Rgb(249, 226, 175);
    pub const BLUE: Color = Color::Rgb(137, 180, 250);
    pub const MAUVE: Color = Color::Rgb(203, 166, 247);
    pub const PEACH: Color = Color::Rgb(250, 179, 135);
    pub const TEAL: Color = Color::Rgb(148, 226, 213);
    pub const SKY: Color = Color::Rgb(137, 220, 235);
}

/// Instruction colour groups:
/// movement in sky/teal, cell changes in green/red, I/O in yellow/peach,
/// loops in mauve.
pub fn op_color(op: Op) -> Color {
    match op {
        Op::MoveRight => mocha::SKY,
        Op::MoveLeft => mocha::TEAL,
        Op::Increment => mocha::GREEN,
        Op::Decrement => mocha::RED,
        Op::Output => mocha::YELLOW,
        Op::Input => mocha::PEACH,
        Op::LoopStart | Op::LoopEnd => mocha::MAUVE,
    }
}

pub fn op_style(op: Op) -> Style {
    Style::new().fg(op_color(op)).bold()
}

/// Macro invocations.
pub fn macro_style() -> Style {
    Style::new().fg(mocha::BLUE).italic()
}

/// Everything else, treated as a comment by the interpreter.
pub fn comment_style() -> Style {
    Style::new().fg(mocha::SURFACE2)
}

//! Canonical programs and loop resolution.
//!
//! A [`Program`] is the list of canonical instructions left after
//! translation, together with a precomputed [`JumpTable`] so that loop
//! control transfers are O(1) during execution.

use std::fmt;

use crate::error::BitLangError;

/// One canonical instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Increment,
    Decrement,
    MoveRight,
    MoveLeft,
    Output,
    Input,
    LoopStart,
    LoopEnd,
}

impl Op {
    /// All instructions, in the order of the default command table.
    pub const ALL: [Op; 8] = [
        Op::Increment,
        Op::Decrement,
        Op::MoveRight,
        Op::MoveLeft,
        Op::Output,
        Op::Input,
        Op::LoopStart,
        Op::LoopEnd,
    ];

    /// The canonical single-character symbol for this instruction.
    pub const fn symbol(self) -> char {
        match self {
            Op::Increment => '+',
            Op::Decrement => '-',
            Op::MoveRight => '>',
            Op::MoveLeft => '<',
            Op::Output => '.',
            Op::Input => ',',
            Op::LoopStart => '[',
            Op::LoopEnd => ']',
        }
    }

    pub const fn from_symbol(ch: char) -> Option<Op> {
        match ch {
            '+' => Some(Op::Increment),
            '-' => Some(Op::Decrement),
            '>' => Some(Op::MoveRight),
            '<' => Some(Op::MoveLeft),
            '.' => Some(Op::Output),
            ',' => Some(Op::Input),
            '[' => Some(Op::LoopStart),
            ']' => Some(Op::LoopEnd),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Bidirectional map between matching `[` and `]` positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    // partners[i] holds the matching index for a bracket at i, None elsewhere.
    partners: Vec<Option<usize>>,
}

impl JumpTable {
    /// Match every loop bracket in `ops` in a single left-to-right pass.
    pub fn resolve(ops: &[Op]) -> Result<Self, BitLangError> {
        let mut partners = vec![None; ops.len()];
        let mut stack: Vec<usize> = Vec::new();

        for (i, op) in ops.iter().enumerate() {
            match op {
                Op::LoopStart => stack.push(i),
                Op::LoopEnd => {
                    let Some(open) = stack.pop() else {
                        return Err(BitLangError::UnmatchedLoopEnd { ip: i });
                    };
                    partners[open] = Some(i);
                    partners[i] = Some(open);
                }
                _ => {}
            }
        }

        if let Some(open) = stack.last().copied() {
            return Err(BitLangError::UnmatchedLoopStart { ip: open });
        }

        Ok(Self { partners })
    }

    /// The matching bracket for the bracket at `ip`.
    pub fn partner(&self, ip: usize) -> Option<usize> {
        self.partners.get(ip).copied().flatten()
    }

    /// Iterate over `(position, partner)` for every bracket.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.partners
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i, p)))
    }
}

/// A validated canonical program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    ops: Vec<Op>,
    jumps: JumpTable,
}

impl Program {
    /// Build a program from canonical text. Characters outside the
    /// instruction alphabet are ignored.
    pub fn parse(text: &str) -> Result<Self, BitLangError> {
        let ops: Vec<Op> = text.chars().filter_map(Op::from_symbol).collect();
        Self::from_ops(ops)
    }

    pub fn from_ops(ops: Vec<Op>) -> Result<Self, BitLangError> {
        let jumps = JumpTable::resolve(&ops)?;
        Ok(Self { ops, jumps })
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn jumps(&self) -> &JumpTable {
        &self.jumps
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

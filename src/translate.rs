//! Friendly-name translation.
//!
//! Source text is rewritten into the canonical alphabet by plain substring
//! replacement, one command-table entry at a time in insertion order. Later
//! entries see the output of earlier ones, so a token that is a substring of
//! another token interacts with it depending on table order.

use tracing::trace;

use crate::error::BitLangError;
use crate::macros::MacroTable;
use crate::program::Op;

/// The stock friendly names, in replacement order.
pub const DEFAULT_COMMANDS: [(&str, Op); 8] = [
    ("ON", Op::Increment),
    ("OFF", Op::Decrement),
    ("RIGHT", Op::MoveRight),
    ("LEFT", Op::MoveLeft),
    ("OUTPUT", Op::Output),
    ("INPUT", Op::Input),
    ("LOOP_START", Op::LoopStart),
    ("LOOP_END", Op::LoopEnd),
];

/// Ordered mapping from friendly token to canonical instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    entries: Vec<(String, Op)>,
}

impl CommandTable {
    /// A table with no friendly names; only canonical symbols are understood.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Chainable form of [`insert`](Self::insert).
    pub fn with(mut self, token: impl Into<String>, op: Op) -> Self {
        self.insert(token, op);
        self
    }

    /// Add a token, or re-point an existing one without changing its
    /// position. Empty tokens are ignored.
    pub fn insert(&mut self, token: impl Into<String>, op: Op) {
        let token = token.into();
        if token.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = op,
            None => self.entries.push((token, op)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Op)> {
        self.entries.iter().map(|(t, op)| (t.as_str(), *op))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First token mapped to `op`, if any.
    pub fn token_for(&self, op: Op) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, o)| *o == op)
            .map(|(t, _)| t.as_str())
    }

    /// Replace every token with its canonical symbol.
    pub fn rewrite(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (token, op) in &self.entries {
            if out.contains(token.as_str()) {
                out = out.replace(token.as_str(), &op.symbol().to_string());
            }
        }
        out
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        DEFAULT_COMMANDS
            .iter()
            .fold(Self::empty(), |table, (token, op)| table.with(*token, *op))
    }
}

/// True when `text` would read as nothing but instructions and whitespace.
pub(crate) fn is_reserved(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || Op::from_symbol(c).is_some())
}

/// Turns friendly source into canonical text.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    commands: CommandTable,
}

impl Translator {
    pub fn new(commands: CommandTable) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Rewrite friendly names, then expand macros.
    pub fn translate(&self, source: &str, macros: &MacroTable) -> Result<String, BitLangError> {
        let rewritten = self.commands.rewrite(source);
        trace!(source_len = source.len(), rewritten_len = rewritten.len(), "rewrote friendly names");
        macros.expand(&rewritten, &self.commands)
    }

    /// Reject macro names that would match plain instruction text once
    /// friendly names are rewritten.
    pub fn check_macro_name(&self, name: &str) -> Result<(), BitLangError> {
        if is_reserved(&self.commands.rewrite(name)) {
            return Err(BitLangError::ReservedMacroName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_rewrites_every_friendly_name() {
        let table = CommandTable::default();
        let out = table.rewrite("ON OFF RIGHT LEFT OUTPUT INPUT LOOP_START LOOP_END");
        assert_eq!(out, "+ - > < . , [ ]");
    }

    #[test]
    fn canonical_text_passes_through() {
        let table = CommandTable::default();
        assert_eq!(table.rewrite("+[->+<]."), "+[->+<].");
    }

    #[test]
    fn replacement_follows_insertion_order() {
        // "ONE" contains "ON": with ON first, ONE never gets a chance.
        let on_first = CommandTable::empty()
            .with("ON", Op::Increment)
            .with("ONE", Op::Output);
        assert_eq!(on_first.rewrite("ONE"), "+E");

        let one_first = CommandTable::empty()
            .with("ONE", Op::Output)
            .with("ON", Op::Increment);
        assert_eq!(one_first.rewrite("ONE"), ".");
    }

    #[test]
    fn insert_overwrites_in_place() {
        let mut table = CommandTable::default();
        table.insert("ON", Op::Decrement);
        assert_eq!(table.len(), 8);
        assert_eq!(table.iter().next(), Some(("ON", Op::Decrement)));
        table.insert("", Op::Output);
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn token_for_finds_first_alias() {
        let table = CommandTable::default().with("INC", Op::Increment);
        assert_eq!(table.token_for(Op::Increment), Some("ON"));
        assert_eq!(CommandTable::empty().token_for(Op::Increment), None);
    }

    #[test]
    fn custom_tokens_are_used() {
        let table = CommandTable::empty()
            .with("inc", Op::Increment)
            .with("fwd", Op::MoveRight);
        assert_eq!(table.rewrite("inc fwd inc"), "+ > +");
    }

    #[test]
    fn reserved_names_are_detected() {
        let translator = Translator::default();
        assert!(translator.check_macro_name("DOUBLE").is_ok());
        assert!(translator.check_macro_name("STEP_RIGHT").is_ok());
        assert!(matches!(
            translator.check_macro_name("ON ON"),
            Err(BitLangError::ReservedMacroName { .. })
        ));
        assert!(matches!(
            translator.check_macro_name("+"),
            Err(BitLangError::ReservedMacroName { .. })
        ));
        assert!(translator.check_macro_name("").is_err());
    }
}

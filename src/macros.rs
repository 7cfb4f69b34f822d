//! Named instruction macros.
//!
//! A macro maps a name to a snippet of source (friendly names or canonical
//! symbols). Expansion replaces every occurrence of every name, in
//! definition order, and repeats until a pass changes nothing.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::BitLangError;
use crate::translate::{CommandTable, is_reserved};

/// Expansion passes allowed before a definition set is considered cyclic.
pub const MAX_EXPANSION_PASSES: usize = 64;

/// Largest expanded program, in bytes.
pub const MAX_EXPANDED_LEN: usize = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    entries: IndexMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite `name`. The body is not validated here; problems
    /// surface when a program using it is translated or run.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), BitLangError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(BitLangError::ReservedMacroName { name });
        }
        self.entries.insert(name, source.into());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Definitions in the order they were first made.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Define macros from `NAME=source` lines. Blank lines and lines without
    /// `=` are skipped, so notes can sit between definitions as long as they
    /// carry no `=`. Returns how many were defined.
    pub fn load_str(&mut self, text: &str) -> Result<usize, BitLangError> {
        let mut count = 0;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((name, source)) = line.split_once('=') else {
                continue;
            };
            self.define(name.trim(), source.trim())?;
            count += 1;
        }
        Ok(count)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, BitLangError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| BitLangError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.load_str(&text)?;
        debug!(path = %path.display(), count, "loaded macros");
        Ok(count)
    }

    /// Expand every macro invocation in already-rewritten `text`.
    ///
    /// Names and bodies go through the same friendly-name rewrite as the
    /// program, so they match and splice consistently.
    pub fn expand(&self, text: &str, commands: &CommandTable) -> Result<String, BitLangError> {
        if self.entries.is_empty() {
            return Ok(text.to_string());
        }

        let rules: Vec<(&str, String, String)> = self
            .entries
            .iter()
            .map(|(name, body)| (name.as_str(), commands.rewrite(name), commands.rewrite(body)))
            .collect();

        if let Some((name, _, _)) = rules.iter().find(|(_, pattern, _)| is_reserved(pattern)) {
            return Err(BitLangError::ReservedMacroName {
                name: name.to_string(),
            });
        }

        let mut expanded = text.to_string();
        let mut last_fired = "";
        for pass in 1..=MAX_EXPANSION_PASSES {
            let mut changed = false;
            for (name, pattern, body) in &rules {
                let hits = expanded.matches(pattern.as_str()).count();
                if hits == 0 {
                    continue;
                }
                // Size the result before building it.
                let grown = hits.saturating_mul(body.len().saturating_sub(pattern.len()));
                if expanded.len().saturating_add(grown) > MAX_EXPANDED_LEN {
                    return Err(BitLangError::MacroOverflow {
                        limit: MAX_EXPANDED_LEN,
                    });
                }
                expanded = expanded.replace(pattern.as_str(), body);
                last_fired = name;
                changed = true;
            }
            if !changed {
                return Ok(expanded);
            }
            trace!(pass, len = expanded.len(), "macro expansion pass");
        }

        Err(BitLangError::MacroCycle {
            name: last_fired.to_string(),
            passes: MAX_EXPANSION_PASSES,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(table: &MacroTable, text: &str) -> Result<String, BitLangError> {
        let commands = CommandTable::default();
        table.expand(&commands.rewrite(text), &commands)
    }

    #[test]
    fn text_without_macros_is_unchanged() {
        let mut table = MacroTable::new();
        table.define("DOUBLE", "ON ON").unwrap();
        assert_eq!(expand(&table, "+ - >").unwrap(), "+ - >");
        assert_eq!(MacroTable::new().expand("ab+c", &CommandTable::default()).unwrap(), "ab+c");
    }

    #[test]
    fn friendly_bodies_are_rewritten() {
        let mut table = MacroTable::new();
        table.define("DOUBLE", "ON ON").unwrap();
        assert_eq!(expand(&table, "DOUBLE").unwrap(), "+ +");
    }

    #[test]
    fn nested_macros_expand_recursively() {
        let mut table = MacroTable::new();
        table.define("QUAD", "DOUBLE DOUBLE").unwrap();
        table.define("DOUBLE", "ON ON").unwrap();
        assert_eq!(expand(&table, "QUAD").unwrap(), "+ + + +");
    }

    #[test]
    fn names_containing_friendly_tokens_still_match() {
        let mut table = MacroTable::new();
        table.define("STEP_RIGHT", "RIGHT ON").unwrap();
        assert_eq!(expand(&table, "STEP_RIGHT STEP_RIGHT").unwrap(), "> + > +");
    }

    #[test]
    fn redefinition_overwrites() {
        let mut table = MacroTable::new();
        table.define("X", "ON").unwrap();
        table.define("X", "OFF").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("X"), Some("OFF"));
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut table = MacroTable::new();
        table.define("LOOPY", "ON LOOPY").unwrap();
        let err = expand(&table, "LOOPY").unwrap_err();
        assert!(matches!(err, BitLangError::MacroCycle { ref name, passes } if name == "LOOPY" && passes == MAX_EXPANSION_PASSES));
    }

    #[test]
    fn mutual_recursion_is_a_cycle() {
        let mut table = MacroTable::new();
        table.define("PING", "PONG").unwrap();
        table.define("PONG", "PING").unwrap();
        assert!(matches!(expand(&table, "PING"), Err(BitLangError::MacroCycle { .. })));
    }

    #[test]
    fn exponential_growth_overflows() {
        let mut table = MacroTable::new();
        table.define("BOOM", "BOOMBOOM").unwrap();
        assert!(matches!(expand(&table, "BOOM"), Err(BitLangError::MacroOverflow { .. })));
    }

    #[test]
    fn overflow_is_caught_before_the_oversized_pass_is_built() {
        let mut table = MacroTable::new();
        table.define("A", "A".repeat(1000)).unwrap();
        // Pass 2 lands at exactly 1_000_000 bytes; pass 3 would need ~1 GB.
        let err = expand(&table, "A").unwrap_err();
        assert!(matches!(err, BitLangError::MacroOverflow { limit: MAX_EXPANDED_LEN }));
    }

    #[test]
    fn growth_up_to_the_limit_is_allowed() {
        let mut table = MacroTable::new();
        table.define("W", "xyz".repeat(1000)).unwrap();
        let text = "W ".repeat(300);
        let expanded = expand(&table, &text).unwrap();
        assert_eq!(expanded.len(), 300 * 3000 + 300);
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut table = MacroTable::new();
        assert!(matches!(table.define("", "ON"), Err(BitLangError::ReservedMacroName { .. })));
        assert!(matches!(table.define("++", "ON"), Err(BitLangError::ReservedMacroName { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn load_str_skips_noise() {
        let mut table = MacroTable::new();
        let text = "\n# note\nDOUBLE=ON ON\nnot a macro\n  TRIPLE = ON ON ON  \nEQ=a=b\n";
        assert_eq!(table.load_str(text).unwrap(), 3);
        assert_eq!(table.get("DOUBLE"), Some("ON ON"));
        assert_eq!(table.get("TRIPLE"), Some("ON ON ON"));
        assert_eq!(table.get("EQ"), Some("a=b"));
        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["DOUBLE", "TRIPLE", "EQ"]);
    }

    #[test]
    fn load_str_keeps_hash_prefixed_definitions() {
        let mut table = MacroTable::new();
        assert_eq!(table.load_str("#X=ON
# just a note
").unwrap(), 1);
        assert_eq!(table.get("#X"), Some("ON"));
    }

    #[test]
    fn load_file_reports_missing_path() {
        let mut table = MacroTable::new();
        let err = table.load_file("/definitely/not/here.macros").unwrap_err();
        assert!(matches!(err, BitLangError::Io { .. }));
    }
}

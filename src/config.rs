use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use cross_xdg::BaseDirs;
use tracing::debug;

use crate::program::Op;
use crate::translate::CommandTable;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "BITLANG_CONFIG";

/// User settings from `bitlang.toml`. Every field is optional; command-line
/// flags and environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub memory_size: Option<usize>,
    pub max_steps: Option<usize>,
    pub timeout_ms: Option<u64>,
    /// Replaces the default friendly-name table when present.
    pub commands: Option<CommandTable>,
}

impl Settings {
    /// Parse the small TOML subset we understand: `[interpreter]` and
    /// `[commands]` sections with `key = value` lines. Unknown sections,
    /// unknown keys and malformed values are ignored.
    pub fn parse(content: &str) -> Self {
        let mut section = String::new();
        let mut interpreter: HashMap<String, String> = HashMap::new();
        let mut commands: Option<CommandTable> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].trim().to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = unquote(key.trim());
            let value = unquote(strip_comment(value.trim()));

            match section.as_str() {
                "interpreter" => {
                    interpreter.insert(key.to_string(), value.to_string());
                }
                "commands" => {
                    let mut chars = value.chars();
                    if let (Some(ch), None) = (chars.next(), chars.next()) {
                        if let Some(op) = Op::from_symbol(ch) {
                            commands.get_or_insert_with(CommandTable::empty).insert(key, op);
                        }
                    }
                }
                _ => {}
            }
        }

        let get = |key: &str| interpreter.get(key).and_then(|v| v.parse().ok());
        Self {
            memory_size: get("memory_size").filter(|&n: &usize| n > 0),
            max_steps: get("max_steps"),
            timeout_ms: interpreter.get("timeout_ms").and_then(|v| v.parse().ok()),
            commands,
        }
    }

    /// The command table to use: the configured one, else the default.
    pub fn command_table(&self) -> CommandTable {
        self.commands.clone().unwrap_or_default()
    }
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Drop a trailing `# comment` unless the value is quoted.
fn strip_comment(s: &str) -> &str {
    if s.starts_with('"') {
        return match s[1..].find('"') {
            Some(end) => &s[..end + 2],
            None => s,
        };
    }
    match s.find('#') {
        Some(idx) => s[..idx].trim_end(),
        None => s,
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Settings loaded once per process.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| load_from_toml().unwrap_or_default())
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }

    // On Linux: resolves to /home/<user>/.config
    // On Windows: resolves to C:\Users\<user>\.config
    // On macOS: resolves to /Users/<user>/.config
    let base_dirs = BaseDirs::new().ok()?;
    let mut path = PathBuf::from(base_dirs.config_home());
    path.push("bitlang.toml");
    Some(path)
}

fn load_from_toml() -> Option<Settings> {
    let path = config_path()?;
    let content = fs::read_to_string(&path).ok()?;
    debug!(path = %path.display(), "loaded config");
    Some(Settings::parse(&content))
}

/// Resolve a limit: flag -> environment variable -> config file.
pub fn resolve<T: FromStr>(flag: Option<T>, env_key: &str, file: Option<T>) -> Option<T> {
    flag.or_else(|| env::var(env_key).ok().and_then(|s| s.trim().parse().ok()))
        .or(file)
}

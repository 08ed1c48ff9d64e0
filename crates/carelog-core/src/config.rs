use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, parser::ParserConfig, store::port::DEFAULT_QUERY_LIMIT, Result};

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Storage
    /// SQLite file; `None` keeps records in memory only.
    pub database_path: Option<PathBuf>,

    // Parser
    pub min_message_chars: usize,
    pub breast_side_ml: u32,
    pub strict_delete: bool,

    // Intake loop
    pub default_sender: String,
    pub query_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let parser = ParserConfig::default();
        Self {
            database_path: None,
            min_message_chars: parser.min_message_chars,
            breast_side_ml: parser.breast_side_ml,
            strict_delete: parser.strict_delete,
            default_sender: "local".to_string(),
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let database_path = lookup("CARELOG_DB_PATH")
            .and_then(non_empty)
            .map(PathBuf::from);

        let min_message_chars = parse_or(&lookup, "CARELOG_MIN_MESSAGE_CHARS", defaults.min_message_chars)?;
        let breast_side_ml = parse_or(&lookup, "CARELOG_BREAST_SIDE_ML", defaults.breast_side_ml)?;
        let strict_delete = lookup("CARELOG_STRICT_DELETE")
            .map(|s| parse_bool(&s))
            .unwrap_or(defaults.strict_delete);

        let default_sender = lookup("CARELOG_DEFAULT_SENDER")
            .and_then(non_empty)
            .unwrap_or(defaults.default_sender);
        let query_limit = parse_or(&lookup, "CARELOG_QUERY_LIMIT", defaults.query_limit)?;

        if min_message_chars == 0 {
            return Err(Error::Config(
                "CARELOG_MIN_MESSAGE_CHARS must be at least 1".to_string(),
            ));
        }
        if breast_side_ml == 0 {
            return Err(Error::Config(
                "CARELOG_BREAST_SIDE_ML must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_path,
            min_message_chars,
            breast_side_ml,
            strict_delete,
            default_sender,
            query_limit,
        })
    }

    /// The immutable parser settings shared by every message.
    pub fn parser(&self) -> ParserConfig {
        ParserConfig {
            min_message_chars: self.min_message_chars,
            breast_side_ml: self.breast_side_ml,
            strict_delete: self.strict_delete,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key).and_then(non_empty) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key}: invalid value {raw:?}"))),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Fill unset variables from a `.env` file; variables already set win.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in contents.lines().filter_map(dotenv_entry) {
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    }
}

/// `KEY=value`, optionally prefixed with `export` and with the value quoted.
fn dotenv_entry(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = ['"', '\'']
        .into_iter()
        .find_map(|q| value.strip_prefix(q)?.strip_suffix(q));
    Some((key, unquoted.unwrap_or(value)))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

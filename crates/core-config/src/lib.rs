//! Configuration loading and parsing.
//!
//! Parses `treeline.toml` (or an override path provided by the host)
//! extracting the options the core recognizes: `[indent] size` and
//! `expand_tab`, `[highlight] light`, and `[input] timeout` / `timeoutlen`
//! for the chord matcher. Unknown fields are ignored (TOML deserialization
//! tolerance) so the file can grow host-side options without breaking older
//! cores, and a file that fails to parse degrades to defaults rather than
//! surfacing an error to the editing session.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Widest indent unit we accept; anything larger is almost certainly a
/// misconfiguration and would flatten every document to a single level.
pub const INDENT_SIZE_MAX: usize = 16;

#[derive(Debug, Deserialize, Clone)]
pub struct IndentConfig {
    #[serde(default = "IndentConfig::default_size")]
    pub size: usize,
    #[serde(default = "IndentConfig::default_expand_tab")]
    pub expand_tab: bool,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            size: Self::default_size(),
            expand_tab: Self::default_expand_tab(),
        }
    }
}

impl IndentConfig {
    const fn default_size() -> usize {
        2
    }
    const fn default_expand_tab() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct HighlightConfig {
    /// Use the built-in fallback tokenizer instead of a host-provided
    /// syntax highlighter.
    #[serde(default)]
    pub light: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "InputConfig::default_timeout")]
    pub timeout: bool,
    /// Chord buffer reset delay in milliseconds.
    #[serde(default = "InputConfig::default_timeoutlen")]
    pub timeoutlen: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            timeoutlen: Self::default_timeoutlen(),
        }
    }
}

impl InputConfig {
    const fn default_timeout() -> bool {
        true
    }
    const fn default_timeoutlen() -> u32 {
        1000
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub indent: IndentConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path: local `treeline.toml` first, then the platform
/// config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("treeline.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("treeline").join("treeline.toml");
    }
    PathBuf::from("treeline.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                // Malformed file degrades to defaults; the session must start.
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Indent unit clamped to `1..=INDENT_SIZE_MAX`. The raw parsed value is
    /// retained in `file` so a later rewrite of the config round-trips.
    pub fn effective_indent_size(&self) -> usize {
        let raw = self.file.indent.size;
        let clamped = raw.clamp(1, INDENT_SIZE_MAX);
        if clamped != raw {
            info!(target: "config", raw, clamped, "indent_size_clamped");
        }
        clamped
    }

    /// Chord timeout in milliseconds; `None` when timeouts are disabled.
    pub fn keymap_timeout_ms(&self) -> Option<u32> {
        self.file.input.timeout.then_some(self.file.input.timeoutlen)
    }
}

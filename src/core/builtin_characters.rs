//! Built-in character definitions
//!
//! Characters are embedded from builtin_characters.toml at build time. The
//! first entry is used when no character is configured.

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub display_name: String,
    pub greeting: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinCharactersConfig {
    characters: Vec<Character>,
}

/// Load built-in characters from the embedded configuration
pub fn load_builtin_characters() -> Vec<Character> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_characters.toml");

    let config: BuiltinCharactersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_characters.toml");

    config.characters
}

/// Find a built-in character by ID (case-insensitive)
pub fn find_builtin_character(id: &str) -> Option<Character> {
    load_builtin_characters()
        .into_iter()
        .find(|c| c.id.eq_ignore_ascii_case(id))
}

pub fn default_character() -> Character {
    load_builtin_characters()
        .into_iter()
        .next()
        .expect("builtin_characters.toml defines at least one character")
}

/// Resolve the configured character, falling back to the default for
/// unknown ids.
pub fn resolve_character(requested: Option<&str>) -> Character {
    match requested {
        Some(id) => find_builtin_character(id).unwrap_or_else(|| {
            let fallback = default_character();
            warn!(requested = id, fallback = %fallback.id, "Unknown character; using default");
            fallback
        }),
        None => default_character(),
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::attachment::DEFAULT_MAX_ATTACHMENT_BYTES;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/v1/chat";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Chat endpoint URL the client posts to.
    pub endpoint: Option<String>,
    /// Seconds before an in-flight request is abandoned as failed.
    pub request_timeout_secs: Option<u64>,
    /// Largest image accepted as an attachment.
    pub max_attachment_bytes: Option<u64>,
    /// Id of the character to talk to.
    pub character: Option<String>,
    /// Show the character's greeting when a conversation starts.
    pub greeting: Option<bool>,
}

/// Keys accepted by `chatterbox set` / `chatterbox unset`.
pub const CONFIG_KEYS: &[&str] = &[
    "endpoint",
    "request-timeout",
    "max-attachment-bytes",
    "character",
    "greeting",
];

impl Config {
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_bytes
            .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES)
    }

    pub fn greeting_enabled(&self) -> bool {
        self.greeting.unwrap_or(true)
    }

    /// Apply `chatterbox set <key> <value>`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("A value is required for {key}"));
        }
        match key {
            "endpoint" => {
                reqwest::Url::parse(value).map_err(|e| format!("Invalid endpoint URL: {e}"))?;
                self.endpoint = Some(value.to_string());
            }
            "request-timeout" => {
                let secs = parse_positive(value, key)?;
                self.request_timeout_secs = Some(secs);
            }
            "max-attachment-bytes" => {
                let bytes = parse_positive(value, key)?;
                self.max_attachment_bytes = Some(bytes);
            }
            "character" => self.character = Some(value.to_string()),
            "greeting" => {
                let enabled = match value.to_ascii_lowercase().as_str() {
                    "on" | "true" | "yes" => true,
                    "off" | "false" | "no" => false,
                    _ => return Err(format!("Expected on/off for greeting, got {value}")),
                };
                self.greeting = Some(enabled);
            }
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Apply `chatterbox unset <key>`.
    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        match key {
            "endpoint" => self.endpoint = None,
            "request-timeout" => self.request_timeout_secs = None,
            "max-attachment-bytes" => self.max_attachment_bytes = None,
            "character" => self.character = None,
            "greeting" => self.greeting = None,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    pub fn print_all(&self) {
        println!("endpoint: {}", self.endpoint());
        println!("request-timeout: {}s", self.request_timeout().as_secs());
        println!("max-attachment-bytes: {}", self.max_attachment_bytes());
        println!(
            "character: {}",
            self.character.as_deref().unwrap_or("(default)")
        );
        println!(
            "greeting: {}",
            if self.greeting_enabled() { "on" } else { "off" }
        );
    }
}

fn parse_positive(value: &str, key: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) | Err(_) => Err(format!("{key} must be a positive whole number")),
        Ok(n) => Ok(n),
    }
}

fn unknown_key(key: &str) -> String {
    format!(
        "Unknown config key: {key}. Available keys: {}",
        CONFIG_KEYS.join(", ")
    )
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

//! Application settings loaded from `natillera.toml`.
//!
//! The file is optional: every field has a default, and `DATABASE_URL` in the
//! environment overrides the database URL from the file.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "natillera.toml";

/// Default database URL when neither the environment nor the file sets one
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/natillera.sqlite?mode=rwc";

/// Default attachment size limit (5 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: i64 = 5 * 1024 * 1024;

/// Configuration structure representing the entire `natillera.toml` file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database connection settings
    pub database: DatabaseSettings,
    /// Receipt upload limits
    pub attachments: AttachmentSettings,
}

/// `[database]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL understood by `sea_orm::Database::connect`
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[attachments]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttachmentSettings {
    /// Largest accepted file, in bytes
    pub max_size_bytes: i64,
    /// MIME types accepted for receipts
    pub allowed_content_types: Vec<String>,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            allowed_content_types: [
                "application/pdf",
                "image/jpeg",
                "image/png",
                "image/gif",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl AttachmentSettings {
    /// Whether `content_type` is on the allow-list (parameters such as
    /// `; charset=...` are ignored).
    #[must_use]
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types.iter().any(|t| *t == essence)
    }
}

/// Parses settings from a TOML string.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is malformed or a field has the wrong type.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from `path`, falling back to defaults when the file does
/// not exist, then applies the `DATABASE_URL` override.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let mut settings = if path.exists() {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        parse_settings(&contents)?
    } else {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        Settings::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        settings.database.url = url;
    }

    Ok(settings)
}

/// Loads settings from the default location (`./natillera.toml`)
///
/// # Errors
/// See [`load_settings`].
pub fn load_default_settings() -> Result<Settings> {
    load_settings(DEFAULT_SETTINGS_PATH)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [attachments]
            max_size_bytes = 1024
            allowed_content_types = ["application/pdf"]
        "#;

        let settings = parse_settings(toml_str).unwrap();
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.attachments.max_size_bytes, 1024);
        assert!(settings.attachments.allows("application/pdf"));
        assert!(!settings.attachments.allows("image/png"));
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.attachments.max_size_bytes, 5 * 1024 * 1024);
        assert!(settings.attachments.allows("image/jpeg"));
        assert!(settings.attachments.allows("IMAGE/PNG; charset=binary"));
        assert!(!settings.attachments.allows("text/html"));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = parse_settings("[database]\nurl = 42").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let settings = load_settings("does/not/exist/natillera.toml").unwrap();
        assert_eq!(settings.attachments.max_size_bytes, DEFAULT_MAX_ATTACHMENT_BYTES);
    }
}

//! Scratch table naming.

use chrono::Utc;

use crate::{Error, Result};

/// Prefix used when none is configured.
pub const DEFAULT_TABLE_PREFIX: &str = "mcp_test";

/// Name of the per-run scratch table: `<prefix>_<unix seconds>`.
///
/// Two runs started in the same second get the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// Generate a name from the current time.
    pub fn generate(prefix: &str) -> Result<Self> {
        Self::at(prefix, Utc::now().timestamp())
    }

    /// Build a name for a given unix timestamp.
    pub fn at(prefix: &str, unix_seconds: i64) -> Result<Self> {
        validate_prefix(prefix)?;
        Ok(Self(format!("{prefix}_{unix_seconds}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefixes end up spliced into SQL text, so only plain identifiers pass.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let mut chars = prefix.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTablePrefix(prefix.to_string()))
    }
}

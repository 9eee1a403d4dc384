//! Read-only git configuration files.
//!
//! Parses the INI dialect shared by `.git/config` and `.gitmodules` into a
//! flat list of entries and answers lookups by section, subsection and key.

mod error;
mod file;
mod parse;

pub use error::ConfigError;
pub use file::{ConfigEntry, ConfigFile};

/// Interpret a config value as a boolean the way git does.
///
/// A key with no `=` counts as true.
pub fn parse_bool(value: Option<&[u8]>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(true);
    };
    match value.to_ascii_lowercase().as_slice() {
        b"true" | b"yes" | b"on" | b"1" => Ok(true),
        b"false" | b"no" | b"off" | b"0" | b"" => Ok(false),
        _ => Err(ConfigError::InvalidBool(
            String::from_utf8_lossy(value).into_owned(),
        )),
    }
}

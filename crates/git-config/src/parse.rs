//! Parser for git's INI-like config format.

use bstr::{BString, ByteVec};

use crate::error::ConfigError;
use crate::file::ConfigEntry;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    filename: &'a str,
}

/// Parse config bytes into entries, in file order.
pub(crate) fn parse_entries(input: &[u8], filename: &str) -> Result<Vec<ConfigEntry>, ConfigError> {
    let mut p = Parser {
        input,
        pos: if input.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 },
        line: 1,
        filename,
    };
    let mut entries = Vec::new();
    let mut section: Option<(BString, Option<BString>)> = None;

    while let Some(c) = p.skip_blanks() {
        match c {
            b'\n' => p.newline(),
            b'#' | b';' => p.skip_line(),
            b'[' => {
                section = Some(p.section_header()?);
                p.end_of_line()?;
            }
            _ => {
                let Some((name, subsection)) = section.clone() else {
                    return Err(p.error("key outside of any section"));
                };
                let line = p.line;
                let (key, value) = p.key_value()?;
                entries.push(ConfigEntry {
                    section: name,
                    subsection,
                    key,
                    value,
                    line,
                });
            }
        }
    }
    Ok(entries)
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'.'
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Parse {
            file: self.filename.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    /// Skip spaces, tabs and carriage returns; return the next byte.
    fn skip_blanks(&mut self) -> Option<u8> {
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' || c == b'\r' {
                self.pos += 1;
            } else {
                return Some(c);
            }
        }
        None
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if c == b'\n' {
                self.newline();
                return;
            }
            self.pos += 1;
        }
    }

    fn end_of_line(&mut self) -> Result<(), ConfigError> {
        match self.skip_blanks() {
            None => Ok(()),
            Some(b'\n') => {
                self.newline();
                Ok(())
            }
            Some(b'#' | b';') => {
                self.skip_line();
                Ok(())
            }
            Some(c) => Err(self.error(format!("unexpected character {:?}", c as char))),
        }
    }

    fn section_header(&mut self) -> Result<(BString, Option<BString>), ConfigError> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty section name"));
        }
        let name = BString::from(self.input[start..self.pos].to_ascii_lowercase());

        let subsection = match self.skip_blanks() {
            Some(b'"') => {
                self.pos += 1;
                let mut sub = BString::from(Vec::new());
                loop {
                    match self.peek() {
                        Some(b'"') => {
                            self.pos += 1;
                            break;
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            let escaped = self
                                .peek()
                                .filter(|&c| c != b'\n')
                                .ok_or_else(|| self.error("unterminated escape in subsection"))?;
                            sub.push_byte(escaped);
                            self.pos += 1;
                        }
                        Some(b'\n') | None => {
                            return Err(self.error("unterminated subsection name"));
                        }
                        Some(c) => {
                            sub.push_byte(c);
                            self.pos += 1;
                        }
                    }
                }
                Some(sub)
            }
            _ => None,
        };

        if self.skip_blanks() != Some(b']') {
            return Err(self.error("expected ']' to close section header"));
        }
        self.pos += 1;
        Ok((name, subsection))
    }

    fn key_value(&mut self) -> Result<(BString, Option<BString>), ConfigError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'-') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty key name"));
        }
        let key = BString::from(self.input[start..self.pos].to_ascii_lowercase());

        match self.skip_blanks() {
            None => return Ok((key, None)),
            Some(b'\n' | b'#' | b';') => {
                self.end_of_line()?;
                return Ok((key, None));
            }
            Some(b'=') => self.pos += 1,
            Some(c) => return Err(self.error(format!("expected '=' after key, got {:?}", c as char))),
        }
        self.skip_blanks();
        Ok((key, Some(self.value()?)))
    }

    /// Value up to end of line: quotes, escapes, continuations and trailing
    /// comments handled; unquoted trailing whitespace dropped.
    fn value(&mut self) -> Result<BString, ConfigError> {
        let mut value = BString::from(Vec::new());
        let mut in_quote = false;
        // Length of `value` that must survive trailing-whitespace trimming.
        let mut keep = 0;

        while let Some(c) = self.peek() {
            match c {
                b'\n' if in_quote => return Err(self.error("newline inside quoted string")),
                b'\n' => {
                    self.newline();
                    break;
                }
                b'#' | b';' if !in_quote => {
                    self.skip_line();
                    break;
                }
                b'"' => {
                    in_quote = !in_quote;
                    self.pos += 1;
                }
                b'\\' => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some(b'\n') => {
                            self.newline();
                            continue;
                        }
                        Some(b'\r') if self.input.get(self.pos + 1) == Some(&b'\n') => {
                            self.pos += 1;
                            self.newline();
                            continue;
                        }
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'b') => b'\x08',
                        Some(b'\\') => b'\\',
                        Some(b'"') => b'"',
                        Some(other) => {
                            return Err(self.error(format!("invalid escape sequence: \\{}", other as char)))
                        }
                        None => return Err(self.error("backslash at end of file")),
                    };
                    value.push_byte(escaped);
                    self.pos += 1;
                    keep = value.len();
                    continue;
                }
                b'\r' if !in_quote => self.pos += 1,
                _ => {
                    value.push_byte(c);
                    self.pos += 1;
                }
            }
            if in_quote || !(c == b' ' || c == b'\t') {
                keep = value.len();
            }
        }
        if in_quote {
            return Err(self.error("unterminated quoted string"));
        }
        value.truncate(keep);
        Ok(value)
    }
}

use bstr::{BStr, BString, ByteSlice};

use crate::error::ConfigError;
use crate::parse::parse_entries;

/// One `key = value` line with the section it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// Lowercased section name.
    pub section: BString,
    /// Case-preserved subsection.
    pub subsection: Option<BString>,
    /// Lowercased key.
    pub key: BString,
    /// `None` for a bare boolean key.
    pub value: Option<BString>,
    pub line: usize,
}

/// A parsed config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    entries: Vec<ConfigEntry>,
}

impl ConfigFile {
    /// Parse config text. `filename` only appears in error messages.
    pub fn parse(input: &[u8], filename: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            entries: parse_entries(input, filename)?,
        })
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Last value of `section.subsection.key`; later lines override earlier ones.
    ///
    /// Section and key match case-insensitively, the subsection exactly.
    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&BStr> {
        self.entries
            .iter()
            .rev()
            .find(|e| self.matches(e, section, subsection, key))
            .and_then(|e| e.value.as_ref().map(|v| v.as_bstr()))
    }

    /// Every value of a multi-valued key, in file order.
    pub fn get_all(&self, section: &str, subsection: Option<&str>, key: &str) -> Vec<&BStr> {
        self.entries
            .iter()
            .filter(|e| self.matches(e, section, subsection, key))
            .filter_map(|e| e.value.as_ref().map(|v| v.as_bstr()))
            .collect()
    }

    /// Distinct subsection names of `section`, in order of first appearance.
    pub fn subsections(&self, section: &str) -> Vec<&BStr> {
        let mut out: Vec<&BStr> = Vec::new();
        for entry in &self.entries {
            if !entry.section.eq_ignore_ascii_case(section.as_bytes()) {
                continue;
            }
            if let Some(sub) = &entry.subsection {
                if !out.iter().any(|s| *s == sub.as_bstr()) {
                    out.push(sub.as_bstr());
                }
            }
        }
        out
    }

    fn matches(&self, e: &ConfigEntry, section: &str, subsection: Option<&str>, key: &str) -> bool {
        e.section.eq_ignore_ascii_case(section.as_bytes())
            && e.key.eq_ignore_ascii_case(key.as_bytes())
            && e.subsection.as_ref().map(|s| s.as_bytes()) == subsection.map(str::as_bytes)
    }
}

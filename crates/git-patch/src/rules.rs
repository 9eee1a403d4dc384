//! Checkout rules: which repository paths go into the patch, and where.
//!
//! One rule per line: `+:from=>to` maps the `from` subtree to `to`,
//! `+:path` includes a subtree at its own path, `-:path` excludes one and a
//! bare `path` is an include. The longest matching rule wins; without any
//! include rule the whole repository is included.

use std::fmt;

use bstr::{BStr, BString};
use git_submodule::MountScope;
use git_utils::path;

use crate::PatchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRule {
    pub from: BString,
    pub to: BString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRules {
    includes: Vec<IncludeRule>,
    excludes: Vec<BString>,
}

impl Default for CheckoutRules {
    fn default() -> Self {
        Self::include_all()
    }
}

impl CheckoutRules {
    /// Every path, unchanged.
    pub fn include_all() -> Self {
        CheckoutRules {
            includes: vec![IncludeRule {
                from: BString::default(),
                to: BString::default(),
            }],
            excludes: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("-:") {
                excludes.push(rule_path(rest, line)?);
                continue;
            }
            let rest = line.strip_prefix("+:").unwrap_or(line);
            let (from, to) = match rest.split_once("=>") {
                Some((from, to)) => (rule_path(from, line)?, rule_path(to, line)?),
                None => {
                    let from = rule_path(rest, line)?;
                    (from.clone(), from)
                }
            };
            includes.push(IncludeRule { from, to });
        }
        if includes.is_empty() {
            includes = Self::include_all().includes;
        }
        Ok(CheckoutRules { includes, excludes })
    }

    pub fn includes(&self) -> &[IncludeRule] {
        &self.includes
    }

    pub fn excludes(&self) -> &[BString] {
        &self.excludes
    }

    /// Where `path` goes in the patch, or `None` when it is excluded.
    pub fn map(&self, path: &BStr) -> Option<BString> {
        let include = self
            .includes
            .iter()
            .filter(|r| path::is_at_or_below(path, &r.from))
            .max_by_key(|r| r.from.len())?;
        let excluded = self
            .excludes
            .iter()
            .any(|e| path::is_at_or_below(path, e) && e.len() >= include.from.len());
        if excluded {
            return None;
        }
        let rest: &[u8] = &path[include.from.len()..];
        let rest = rest.strip_prefix(b"/").unwrap_or(rest);
        Some(path::join(&include.to, rest))
    }

    /// True when `dir` or anything below it may be included.
    pub fn touches(&self, dir: &BStr) -> bool {
        self.map(dir).is_some()
            || self
                .includes
                .iter()
                .any(|r| path::is_at_or_below(&r.from, dir))
    }

    /// Directories a clean patch starts from: the target of the repository
    /// root, or every include target when the root itself is not mapped.
    pub fn root_targets(&self) -> Vec<BString> {
        if let Some(root) = self.map(BStr::new("")) {
            return vec![root];
        }
        let mut targets: Vec<BString> = Vec::new();
        for rule in &self.includes {
            if !targets.contains(&rule.to) {
                targets.push(rule.to.clone());
            }
        }
        targets
    }
}

impl MountScope for CheckoutRules {
    fn touches(&self, path_from_root: &BStr) -> bool {
        CheckoutRules::touches(self, path_from_root)
    }
}

impl fmt::Display for CheckoutRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = |p: &BString| if p.is_empty() { ".".to_string() } else { p.to_string() };
        let mut first = true;
        let mut line = |f: &mut fmt::Formatter<'_>, text: String| {
            if !first {
                writeln!(f)?;
            }
            first = false;
            f.write_str(&text)
        };
        for rule in &self.includes {
            if rule.from == rule.to {
                line(f, format!("+:{}", shown(&rule.from)))?;
            } else {
                line(f, format!("+:{}=>{}", shown(&rule.from), shown(&rule.to)))?;
            }
        }
        for ex in &self.excludes {
            line(f, format!("-:{}", shown(ex)))?;
        }
        Ok(())
    }
}

fn rule_path(raw: &str, line: &str) -> Result<BString, PatchError> {
    let normalized = path::normalize(raw.trim().trim_end_matches('/'));
    if normalized.starts_with('/') || normalized.split('/').any(|s| s == "..") {
        return Err(PatchError::InvalidRule(line.to_string()));
    }
    Ok(normalized.into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::ByteSlice;

    fn map(rules: &CheckoutRules, path: &str) -> Option<String> {
        rules.map(BStr::new(path)).map(|p| p.to_str_lossy().into_owned())
    }

    #[test]
    fn empty_rules_include_everything() {
        let rules = CheckoutRules::parse("").unwrap();
        assert_eq!(map(&rules, "a/b.txt").as_deref(), Some("a/b.txt"));
        assert_eq!(map(&rules, "").as_deref(), Some(""));
        assert_eq!(rules, CheckoutRules::include_all());
    }

    #[test]
    fn include_with_target() {
        let rules = CheckoutRules::parse("+:src=>build/src\n").unwrap();
        assert_eq!(map(&rules, "src/main.rs").as_deref(), Some("build/src/main.rs"));
        assert_eq!(map(&rules, "src").as_deref(), Some("build/src"));
        assert_eq!(map(&rules, "srcx/main.rs"), None);
        assert_eq!(map(&rules, "docs/readme"), None);
    }

    #[test]
    fn longest_rule_wins() {
        let rules = CheckoutRules::parse("+:.\n-:docs\n+:docs/api=>api\n").unwrap();
        assert_eq!(map(&rules, "docs/guide.md"), None);
        assert_eq!(map(&rules, "docs/api/index.html").as_deref(), Some("api/index.html"));
        assert_eq!(map(&rules, "README").as_deref(), Some("README"));
    }

    #[test]
    fn exclude_only_rules_include_the_rest() {
        let rules = CheckoutRules::parse("-:lib").unwrap();
        assert_eq!(map(&rules, "lib/x"), None);
        assert_eq!(map(&rules, "a.txt").as_deref(), Some("a.txt"));
    }

    #[test]
    fn touches_parents_of_includes() {
        let rules = CheckoutRules::parse("+:vendor/lib/include").unwrap();
        assert!(rules.touches(BStr::new("vendor/lib")));
        assert!(rules.touches(BStr::new("vendor/lib/include/x")));
        assert!(!rules.touches(BStr::new("other")));
    }

    #[test]
    fn root_targets() {
        assert_eq!(CheckoutRules::parse("+:.=>out").unwrap().root_targets(), vec![BString::from("out")]);
        assert_eq!(
            CheckoutRules::parse("+:a=>x\n+:b=>y\n+:c=>x").unwrap().root_targets(),
            vec![BString::from("x"), BString::from("y")]
        );
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(matches!(CheckoutRules::parse("+:../x"), Err(PatchError::InvalidRule(_))));
        assert!(CheckoutRules::parse("-:/abs").is_err());
    }

    #[test]
    fn display_parses_back() {
        let rules = CheckoutRules::parse("+:.=>out\n-:out/tmp\nsrc").unwrap();
        assert_eq!(CheckoutRules::parse(&rules.to_string()).unwrap(), rules);
    }
}

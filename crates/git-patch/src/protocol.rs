//! Property map passed to the patch child process on stdin.
//!
//! One `key=value` pair per line. Backslash, `=`, CR and LF are escaped
//! with a backslash in both keys and values, so the first unescaped `=`
//! always separates the key.

use std::collections::BTreeMap;

use crate::PatchError;

pub type Properties = BTreeMap<String, String>;

pub const FROM_REVISION: &str = "patcher.fromRevision";
pub const TO_REVISION: &str = "patcher.toRevision";
pub const CHECKOUT_RULES: &str = "patcher.checkoutRules";
pub const CACHES_DIR: &str = "patcher.cachesDir";
pub const PATCH_FILE: &str = "patcher.patchFile";
pub const UPLOADED_KEY: &str = "patcher.uploadedKey";
pub const VERBOSE_TREE_WALK_LOG: &str = "patcher.verboseTreeWalkLog";
pub const DEBUG_ENABLED: &str = "VCS_DEBUG_ENABLED";

pub const ROOT_URL: &str = "url";
pub const ROOT_SUBMODULE_CHECKOUT: &str = "submoduleCheckout";
pub const ROOT_IGNORE_SUBMODULE_ERRORS: &str = "ignoreSubmoduleErrors";
pub const ROOT_AUTO_CRLF: &str = "serverSideAutoCrlf";
pub const ROOT_INCLUDE_CONTENT_HASHES: &str = "includeContentHashes";
pub const ROOT_USER_IN_ABSOLUTE_URLS: &str = "setSubmoduleUserInAbsoluteUrls";
pub const ROOT_USERNAME: &str = "username";

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

pub fn encode(properties: &Properties) -> String {
    let mut out = String::new();
    for (key, value) in properties {
        escape_into(&mut out, key);
        out.push('=');
        escape_into(&mut out, value);
        out.push('\n');
    }
    out
}

pub fn decode(text: &str) -> Result<Properties, PatchError> {
    let mut properties = Properties::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let mut key = String::new();
        let mut value = String::new();
        let mut in_value = false;
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            let target = if in_value { &mut value } else { &mut key };
            match c {
                '\\' => match chars.next() {
                    Some('n') => target.push('\n'),
                    Some('r') => target.push('\r'),
                    Some(c @ ('\\' | '=')) => target.push(c),
                    _ => return Err(PatchError::MalformedProperties(line.to_string())),
                },
                '=' if !in_value => in_value = true,
                c => target.push(c),
            }
        }
        if !in_value {
            return Err(PatchError::MalformedProperties(line.to_string()));
        }
        properties.insert(key, value);
    }
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_survive_encoding() {
        let mut props = Properties::new();
        props.insert(CHECKOUT_RULES.into(), "+:src=>out\n-:out/tmp\n".into());
        props.insert("weird=key".into(), "C:\\caches".into());
        props.insert(TO_REVISION.into(), String::new());
        let text = encode(&props);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("patcher.checkoutRules=+:src\\=>out\\n-:out/tmp\\n"));
        assert_eq!(decode(&text).unwrap(), props);
    }

    #[test]
    fn malformed_lines() {
        assert!(matches!(decode("no separator"), Err(PatchError::MalformedProperties(_))));
        assert!(decode("k=bad\\x").is_err());
        assert!(decode("k=trailing\\").is_err());
        assert!(decode("\n\nk=v\n").unwrap().contains_key("k"));
    }
}

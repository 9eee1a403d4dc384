//! Settings of one patch computation, as carried by the property map.

use std::path::PathBuf;

use git_submodule::SubmodulePolicy;
use git_transport::AuthSettings;

use crate::builder::BuildSettings;
use crate::content::ContentSettings;
use crate::protocol::{self, Properties};
use crate::rules::CheckoutRules;
use crate::PatchError;

/// The VCS root the patch is built for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootSettings {
    pub url: String,
    pub policy: SubmodulePolicy,
    pub auto_crlf: bool,
    pub include_content_hashes: bool,
    pub set_user_in_absolute_urls: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSettings {
    pub from_revision: Option<String>,
    pub to_revision: String,
    pub rules: CheckoutRules,
    pub caches_dir: PathBuf,
    pub patch_file: PathBuf,
    pub uploaded_key: Option<String>,
    pub verbose_tree_walk: bool,
    pub debug: bool,
    pub root: RootSettings,
}

fn required<'p>(props: &'p Properties, key: &'static str) -> Result<&'p str, PatchError> {
    props
        .get(key)
        .map(String::as_str)
        .ok_or(PatchError::MissingProperty(key))
}

fn optional<'p>(props: &'p Properties, key: &str) -> Option<&'p str> {
    props.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn flag(props: &Properties, key: &str) -> Result<bool, PatchError> {
    match optional(props, key) {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(PatchError::InvalidProperty {
            key: key.to_string(),
            value: v.to_string(),
        }),
    }
}

fn put_flag(props: &mut Properties, key: &str, value: bool) {
    if value {
        props.insert(key.to_string(), "true".to_string());
    }
}

impl RootSettings {
    pub fn from_properties(props: &Properties) -> Result<Self, PatchError> {
        let policy = match optional(props, protocol::ROOT_SUBMODULE_CHECKOUT) {
            Some(name) => name.parse::<SubmodulePolicy>().map_err(|e| PatchError::InvalidProperty {
                key: protocol::ROOT_SUBMODULE_CHECKOUT.to_string(),
                value: e.0,
            })?,
            None => SubmodulePolicy::IGNORE,
        };
        let ignore_errors = flag(props, protocol::ROOT_IGNORE_SUBMODULE_ERRORS)?;
        Ok(RootSettings {
            url: required(props, protocol::ROOT_URL)?.to_string(),
            policy: if ignore_errors {
                policy.with_errors_ignored(true)
            } else {
                policy
            },
            auto_crlf: flag(props, protocol::ROOT_AUTO_CRLF)?,
            include_content_hashes: flag(props, protocol::ROOT_INCLUDE_CONTENT_HASHES)?,
            set_user_in_absolute_urls: flag(props, protocol::ROOT_USER_IN_ABSOLUTE_URLS)?,
            username: optional(props, protocol::ROOT_USERNAME).map(str::to_string),
        })
    }

    pub fn write_properties(&self, props: &mut Properties) {
        props.insert(protocol::ROOT_URL.to_string(), self.url.clone());
        props.insert(protocol::ROOT_SUBMODULE_CHECKOUT.to_string(), self.policy.to_string());
        put_flag(props, protocol::ROOT_IGNORE_SUBMODULE_ERRORS, self.policy.ignores_errors());
        put_flag(props, protocol::ROOT_AUTO_CRLF, self.auto_crlf);
        put_flag(props, protocol::ROOT_INCLUDE_CONTENT_HASHES, self.include_content_hashes);
        put_flag(props, protocol::ROOT_USER_IN_ABSOLUTE_URLS, self.set_user_in_absolute_urls);
        if let Some(user) = &self.username {
            props.insert(protocol::ROOT_USERNAME.to_string(), user.clone());
        }
    }

    pub fn content(&self) -> ContentSettings {
        ContentSettings {
            auto_crlf: self.auto_crlf,
            include_content_hashes: self.include_content_hashes,
        }
    }
}

impl PatchSettings {
    pub fn from_properties(props: &Properties) -> Result<Self, PatchError> {
        Ok(PatchSettings {
            from_revision: optional(props, protocol::FROM_REVISION).map(str::to_string),
            to_revision: required(props, protocol::TO_REVISION)?.to_string(),
            rules: CheckoutRules::parse(required(props, protocol::CHECKOUT_RULES)?)?,
            caches_dir: PathBuf::from(required(props, protocol::CACHES_DIR)?),
            patch_file: PathBuf::from(required(props, protocol::PATCH_FILE)?),
            uploaded_key: optional(props, protocol::UPLOADED_KEY).map(str::to_string),
            verbose_tree_walk: flag(props, protocol::VERBOSE_TREE_WALK_LOG)?,
            debug: flag(props, protocol::DEBUG_ENABLED)?,
            root: RootSettings::from_properties(props)?,
        })
    }

    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        if let Some(from) = &self.from_revision {
            props.insert(protocol::FROM_REVISION.to_string(), from.clone());
        }
        props.insert(protocol::TO_REVISION.to_string(), self.to_revision.clone());
        props.insert(protocol::CHECKOUT_RULES.to_string(), self.rules.to_string());
        props.insert(protocol::CACHES_DIR.to_string(), self.caches_dir.display().to_string());
        props.insert(protocol::PATCH_FILE.to_string(), self.patch_file.display().to_string());
        if let Some(key) = &self.uploaded_key {
            props.insert(protocol::UPLOADED_KEY.to_string(), key.clone());
        }
        put_flag(&mut props, protocol::VERBOSE_TREE_WALK_LOG, self.verbose_tree_walk);
        put_flag(&mut props, protocol::DEBUG_ENABLED, self.debug);
        self.root.write_properties(&mut props);
        props
    }

    pub fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            policy: self.root.policy,
            rules: self.rules.clone(),
            content: self.root.content(),
            verbose_tree_walk: self.verbose_tree_walk,
        }
    }

    /// Credentials for submodule fetches.
    pub fn auth(&self) -> AuthSettings {
        let auth = AuthSettings::anonymous().with_username(self.root.username.clone());
        match &self.uploaded_key {
            Some(key) => auth.with_private_key(key.as_bytes().to_vec()),
            None => auth,
        }
    }
}

//! Submodule URL resolution against the parent repository's URL.

use git_transport::{GitUrl, TransportError};
use git_utils::path;

/// Absolute URL of a submodule declared with `submodule_url` inside the
/// repository fetched from `main_url`.
///
/// Relative URLs (starting with `.`) are resolved against the path of the
/// main URL, keeping its scheme, host and user. Absolute URLs are kept as
/// they are, except that the main URL's user is copied into a URL that needs
/// credentials but names no user, when `set_user_in_absolute_urls` is on.
pub fn resolve_submodule_url(
    main_url: &str,
    submodule_url: &str,
    set_user_in_absolute_urls: bool,
) -> Result<String, TransportError> {
    let main = GitUrl::parse(main_url)?;

    if !GitUrl::is_relative(submodule_url) {
        let sub = GitUrl::parse(submodule_url)?;
        return Ok(match &main.user {
            Some(user)
                if set_user_in_absolute_urls && sub.user.is_none() && sub.requires_credentials() =>
            {
                sub.with_user(Some(user.clone())).to_string()
            }
            _ => submodule_url.to_string(),
        });
    }

    let new_path = if main.path.is_empty() {
        submodule_url.to_string()
    } else {
        path::normalize(&format!("{}/{}", main.path, submodule_url))
    };
    Ok(main.with_path(new_path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_to_https() {
        assert_eq!(
            resolve_submodule_url("https://example.com/org/main.git", "../lib.git", false).unwrap(),
            "https://example.com/org/lib.git"
        );
        assert_eq!(
            resolve_submodule_url("https://example.com/org/main", "./sub", false).unwrap(),
            "https://example.com/org/main/sub"
        );
    }

    #[test]
    fn relative_keeps_user_and_scp_form() {
        assert_eq!(
            resolve_submodule_url("git@example.com:org/main.git", "../lib.git", false).unwrap(),
            "git@example.com:org/lib.git"
        );
        assert_eq!(
            resolve_submodule_url("https://bob@example.com/org/main.git", "../lib.git", false).unwrap(),
            "https://bob@example.com/org/lib.git"
        );
    }

    #[test]
    fn relative_to_local_path() {
        assert_eq!(
            resolve_submodule_url("/srv/git/main.git", "../lib.git", false).unwrap(),
            "/srv/git/lib.git"
        );
        assert_eq!(
            resolve_submodule_url("main.git", "../../lib.git", false).unwrap(),
            "../lib.git"
        );
    }

    #[test]
    fn absolute_urls_get_user_only_when_asked() {
        let main = "https://bob@example.com/org/main.git";
        let sub = "https://example.com/org/lib.git";
        assert_eq!(resolve_submodule_url(main, sub, false).unwrap(), sub);
        assert_eq!(
            resolve_submodule_url(main, sub, true).unwrap(),
            "https://bob@example.com/org/lib.git"
        );
        let own_user = "https://alice@example.com/org/lib.git";
        assert_eq!(resolve_submodule_url(main, own_user, true).unwrap(), own_user);
        assert_eq!(resolve_submodule_url(main, "/srv/lib.git", true).unwrap(), "/srv/lib.git");
    }

    #[test]
    fn unparsable_main_url() {
        assert!(resolve_submodule_url("", "../lib.git", false).is_err());
    }
}

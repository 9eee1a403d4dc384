//! Git URL parsing.
//!
//! Accepted forms:
//! - ssh://[user@]host[:port]/path
//! - git://host[:port]/path
//! - http[s]://[user@]host[:port]/path
//! - file:///path
//! - /local/path and ./relative/path
//! - [user@]host:path (scp-like ssh)

use crate::{GitUrl, Scheme, TransportError};

impl GitUrl {
    /// Parse a git URL string.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TransportError::InvalidUrl("empty URL".into()));
        }

        if let Some((scheme, rest)) = url.split_once("://") {
            let scheme = match scheme {
                "ssh" => Scheme::Ssh,
                "git" => Scheme::Git,
                "http" => Scheme::Http,
                "https" => Scheme::Https,
                "file" => return Ok(GitUrl::local(Scheme::File, rest)),
                other => return Err(TransportError::UnsupportedScheme(other.to_string())),
            };
            return parse_standard(scheme, rest);
        }

        if url.starts_with('/') || url.starts_with('.') || is_drive_path(url) {
            return Ok(GitUrl::local(Scheme::Local, url));
        }

        let Some((host_part, path)) = url.split_once(':') else {
            return Ok(GitUrl::local(Scheme::Local, url));
        };
        let (user, host) = match host_part.split_once('@') {
            Some((user, host)) => (Some(user.to_string()), host),
            None => (None, host_part),
        };
        if host.is_empty() {
            return Err(TransportError::InvalidUrl(format!(
                "empty host in scp-like URL: {url}"
            )));
        }
        Ok(GitUrl {
            scheme: Scheme::Ssh,
            host: Some(host.to_string()),
            port: None,
            user,
            path: path.to_string(),
        })
    }

    fn local(scheme: Scheme, path: &str) -> Self {
        GitUrl {
            scheme,
            host: None,
            port: None,
            user: None,
            path: path.to_string(),
        }
    }

    /// A submodule URL is relative to its parent when it starts with `.`.
    pub fn is_relative(url: &str) -> bool {
        url.starts_with('.')
    }

    /// Whether fetching from this URL may need a user name.
    ///
    /// Anything with a host needs one, as does any scheme except anonymous `git://`.
    pub fn requires_credentials(&self) -> bool {
        self.host.is_some() || !matches!(self.scheme, Scheme::Git | Scheme::Local)
    }

    /// Same location with a different path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        GitUrl {
            path: path.into(),
            ..self.clone()
        }
    }

    /// Same location with a different user.
    pub fn with_user(&self, user: Option<String>) -> Self {
        GitUrl {
            user,
            ..self.clone()
        }
    }
}

fn is_drive_path(url: &str) -> bool {
    let b = url.as_bytes();
    b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

/// Parse the part after `scheme://`: [user@]host[:port]/path
fn parse_standard(scheme: Scheme, rest: &str) -> Result<GitUrl, TransportError> {
    let (authority, path) = match rest.find('/') {
        Some(slash) => (&rest[..slash], &rest[slash..]),
        None => (rest, "/"),
    };

    let (user, host_port) = match authority.rsplit_once('@') {
        Some((user, host_port)) => (Some(user.to_string()), host_port),
        None => (None, authority),
    };

    let (host, port) = if let Some(v6) = host_port.strip_prefix('[') {
        let (host, after) = v6
            .split_once(']')
            .ok_or_else(|| TransportError::InvalidUrl("unclosed IPv6 bracket".into()))?;
        (host, after.strip_prefix(':').map(parse_port).transpose()?)
    } else if let Some((host, port)) = host_port.rsplit_once(':') {
        (host, Some(parse_port(port)?))
    } else {
        (host_port, None)
    };

    if host.is_empty() {
        return Err(TransportError::InvalidUrl("empty host".into()));
    }

    Ok(GitUrl {
        scheme,
        host: Some(host.to_string()),
        port,
        user,
        path: path.to_string(),
    })
}

fn parse_port(s: &str) -> Result<u16, TransportError> {
    s.parse::<u16>()
        .map_err(|_| TransportError::InvalidUrl(format!("invalid port: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ssh_url_with_port() {
        let url = GitUrl::parse("ssh://git@example.com:2222/org/repo.git").unwrap();
        assert_eq!(url.scheme, Scheme::Ssh);
        assert_eq!(url.host.as_deref(), Some("example.com"));
        assert_eq!(url.user.as_deref(), Some("git"));
        assert_eq!(url.port, Some(2222));
        assert_eq!(url.path, "/org/repo.git");
    }

    #[test]
    fn parse_scp_like() {
        let url = GitUrl::parse("git@example.com:org/repo.git").unwrap();
        assert_eq!(url.scheme, Scheme::Ssh);
        assert_eq!(url.user.as_deref(), Some("git"));
        assert_eq!(url.path, "org/repo.git");
        assert_eq!(url.to_string(), "git@example.com:org/repo.git");

        let anon = GitUrl::parse("example.com:org/repo.git").unwrap();
        assert_eq!(anon.user, None);
        assert_eq!(anon.to_string(), "example.com:org/repo.git");
    }

    #[test]
    fn parse_http_family() {
        let url = GitUrl::parse("https://user@example.com:8443/repo.git").unwrap();
        assert_eq!(url.scheme, Scheme::Https);
        assert_eq!(url.port, Some(8443));
        assert_eq!(url.user.as_deref(), Some("user"));
        assert_eq!(url.to_string(), "https://user@example.com:8443/repo.git");

        let git = GitUrl::parse("git://example.com/repo.git").unwrap();
        assert_eq!(git.scheme, Scheme::Git);
    }

    #[test]
    fn parse_local_forms() {
        assert_eq!(GitUrl::parse("/srv/repo.git").unwrap().scheme, Scheme::Local);
        assert_eq!(GitUrl::parse("../lib.git").unwrap().scheme, Scheme::Local);
        let file = GitUrl::parse("file:///srv/repo.git").unwrap();
        assert_eq!(file.scheme, Scheme::File);
        assert_eq!(file.path, "/srv/repo.git");
    }

    #[test]
    fn parse_errors() {
        assert!(GitUrl::parse("").is_err());
        assert!(GitUrl::parse("ftp://example.com/x").is_err());
        assert!(GitUrl::parse("https://example.com:port/x").is_err());
        assert!(GitUrl::parse("@:path").is_err());
    }

    #[test]
    fn credentials_required() {
        assert!(GitUrl::parse("https://example.com/r.git").unwrap().requires_credentials());
        assert!(GitUrl::parse("git@example.com:r.git").unwrap().requires_credentials());
        assert!(GitUrl::parse("git://example.com/r.git").unwrap().requires_credentials());
        assert!(!GitUrl::parse("/srv/r.git").unwrap().requires_credentials());
    }

    #[test]
    fn relative_urls() {
        assert!(GitUrl::is_relative("../lib.git"));
        assert!(GitUrl::is_relative("./lib.git"));
        assert!(!GitUrl::is_relative("https://example.com/lib.git"));
    }

    #[test]
    fn replace_parts() {
        let url = GitUrl::parse("https://example.com/org/main.git").unwrap();
        let moved = url.with_path("/org/lib.git").with_user(Some("bob".into()));
        assert_eq!(moved.to_string(), "https://bob@example.com/org/lib.git");
    }
}

//! Fetch ref specs of the form `[+]src:dst` with an optional single `*`.

use crate::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    pub force: bool,
    pub src: String,
    pub dst: String,
}

impl RefSpec {
    /// `+refs/*:refs/*`, mirroring every ref of the remote.
    pub fn mirror_all() -> Self {
        RefSpec {
            force: true,
            src: "refs/*".into(),
            dst: "refs/*".into(),
        }
    }

    pub fn parse(spec: &str) -> Result<Self, TransportError> {
        let (force, rest) = match spec.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let (src, dst) = rest
            .split_once(':')
            .ok_or_else(|| TransportError::InvalidRefSpec(spec.to_string()))?;
        let globs = (src.matches('*').count(), dst.matches('*').count());
        if src.is_empty() || !matches!(globs, (0, 0) | (1, 1)) {
            return Err(TransportError::InvalidRefSpec(spec.to_string()));
        }
        Ok(RefSpec {
            force,
            src: src.to_string(),
            dst: dst.to_string(),
        })
    }

    /// Local name for a remote ref, or `None` when the spec does not cover it.
    pub fn map(&self, remote_ref: &str) -> Option<String> {
        match self.src.split_once('*') {
            None => (remote_ref == self.src).then(|| self.dst.clone()),
            Some((prefix, suffix)) => {
                let middle = remote_ref.strip_prefix(prefix)?.strip_suffix(suffix)?;
                Some(self.dst.replacen('*', middle, 1))
            }
        }
    }
}

impl std::fmt::Display for RefSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.force {
            f.write_str("+")?;
        }
        write!(f, "{}:{}", self.src, self.dst)
    }
}

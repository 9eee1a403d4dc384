//! How submodules are treated during a walk.

use std::fmt;
use std::str::FromStr;

/// Whether mounts are expanded, and how deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckoutMode {
    /// Mounts stay opaque gitlink entries.
    #[default]
    Ignore,
    /// Mounts are expanded at every nesting level.
    Checkout,
    /// Only mounts of the root repository are expanded.
    CheckoutNonRecursive,
}

/// What happens when a mount cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorHandling {
    #[default]
    StopOnError,
    IgnoreErrors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubmodulePolicy {
    pub mode: CheckoutMode,
    pub errors: ErrorHandling,
}

impl SubmodulePolicy {
    pub const IGNORE: Self = Self::new(CheckoutMode::Ignore, ErrorHandling::StopOnError);
    pub const CHECKOUT: Self = Self::new(CheckoutMode::Checkout, ErrorHandling::StopOnError);

    pub const fn new(mode: CheckoutMode, errors: ErrorHandling) -> Self {
        Self { mode, errors }
    }

    /// Policy for the repositories mounted into a repository walked with `self`.
    pub fn sub_policy(self) -> Self {
        let mode = match self.mode {
            CheckoutMode::CheckoutNonRecursive => CheckoutMode::Ignore,
            other => other,
        };
        Self { mode, ..self }
    }

    pub fn with_errors_ignored(self, ignore: bool) -> Self {
        let errors = if ignore {
            ErrorHandling::IgnoreErrors
        } else {
            ErrorHandling::StopOnError
        };
        Self { errors, ..self }
    }

    pub fn checks_out(self) -> bool {
        self.mode != CheckoutMode::Ignore
    }

    pub fn ignores_errors(self) -> bool {
        self.errors == ErrorHandling::IgnoreErrors
    }
}

impl fmt::Display for SubmodulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.mode, self.errors) {
            (CheckoutMode::Ignore, _) => "IGNORE",
            (CheckoutMode::Checkout, ErrorHandling::StopOnError) => "CHECKOUT",
            (CheckoutMode::Checkout, ErrorHandling::IgnoreErrors) => "CHECKOUT_IGNORING_ERRORS",
            (CheckoutMode::CheckoutNonRecursive, ErrorHandling::StopOnError) => "NON_RECURSIVE_CHECKOUT",
            (CheckoutMode::CheckoutNonRecursive, ErrorHandling::IgnoreErrors) => {
                "NON_RECURSIVE_CHECKOUT_IGNORING_ERRORS"
            }
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown submodule checkout policy: {0}")]
pub struct UnknownPolicy(pub String);

impl FromStr for SubmodulePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use CheckoutMode::*;
        use ErrorHandling::*;
        let (mode, errors) = match s {
            "IGNORE" => (Ignore, StopOnError),
            "CHECKOUT" => (Checkout, StopOnError),
            "CHECKOUT_IGNORING_ERRORS" => (Checkout, IgnoreErrors),
            "NON_RECURSIVE_CHECKOUT" => (CheckoutNonRecursive, StopOnError),
            "NON_RECURSIVE_CHECKOUT_IGNORING_ERRORS" => (CheckoutNonRecursive, IgnoreErrors),
            other => return Err(UnknownPolicy(other.to_string())),
        };
        Ok(Self::new(mode, errors))
    }
}

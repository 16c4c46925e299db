//! Parse failure taxonomy and diagnostic severities.

use std::fmt;

use thiserror::Error;

/// Everything that can go wrong while declaring or parsing arguments.
///
/// Variants fall into three classes:
/// - immediately fatal: [`Error::InvalidSubcommand`] and the declaration
///   errors ([`Error::InvalidSize`], [`Error::UnhandledType`],
///   [`Error::InvalidType`], [`Error::Generic`]) abort the walk where they
///   occur;
/// - value errors: [`Error::MissingValue`], [`Error::InvalidValue`],
///   [`Error::Overflow`], [`Error::Underflow`] abort the current argument
///   list as soon as they are detected, since the destination state would
///   otherwise be indeterminate;
/// - deferred: [`Error::MissingPositionals`] and
///   [`Error::UnknownArguments`] are accumulated while the list is walked
///   and reported when it finishes, each naming every offender of its class
///   in one diagnostic.
///
/// A float magnitude below the smallest normal of the declared width is the
/// one recovered condition: it is reported as [`Error::Underflow`] with
/// [`Severity::Warning`] and the value is still stored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error("unrecognized arguments: {}", .tokens.join(", "))]
    UnknownArguments { tokens: Vec<String> },

    #[error("argument '{name}': expected one value")]
    MissingValue { name: String },

    #[error("argument '{name}': invalid value '{token}'")]
    InvalidValue { name: String, token: String },

    #[error("argument '{name}': value '{token}' is too large for the declared width")]
    Overflow { name: String, token: String },

    #[error("argument '{name}': value '{token}' is too small for the declared width")]
    Underflow { name: String, token: String },

    #[error("the following arguments are required: {}", .names.join(", "))]
    MissingPositionals { names: Vec<String> },

    #[error("invalid choice: '{token}' (choose from {})", .choices.join(", "))]
    InvalidSubcommand {
        /// One-line usage summary for the list the choice belonged to. Not
        /// part of the message; the default reporter prints it first.
        usage: String,
        token: String,
        choices: Vec<String>,
    },

    #[error("argument '{name}': declared size may not be zero")]
    InvalidSize { name: String },

    #[error("argument '{name}': unsupported width of {width} bytes")]
    UnhandledType { name: String, width: usize },

    #[error("argument '{name}': unsupported value type declaration")]
    InvalidType { name: String },
}

impl Error {
    /// Whether this error aborts the parse where it occurs rather than
    /// being folded into the end-of-list diagnostics.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Generic(_)
                | Error::InvalidSubcommand { .. }
                | Error::InvalidSize { .. }
                | Error::UnhandledType { .. }
                | Error::InvalidType { .. }
        )
    }

    /// Whether this error is reported only after its owning argument list
    /// finishes, together with any sibling failures.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            Error::UnknownArguments { .. } | Error::MissingPositionals { .. }
        )
    }
}

/// Severity attached to a reported diagnostic.
///
/// Everything is [`Severity::Error`] except the non-fatal float underflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

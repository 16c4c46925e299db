//! Resolution of one input token against an argument list.

use crate::arg::{Arg, ArgKind};

/// Result of matching a token, in resolution order: the built-in help
/// alias wins over everything, then named optionals, then the first
/// unprocessed positional as an unconditional fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenMatch<'t> {
    Help,
    Optional {
        index: usize,
        /// The substring after an inline `=`, when the token used the
        /// `name=value` form.
        inline: Option<&'t str>,
    },
    Positional { index: usize },
    None,
}

pub(crate) fn resolve<'t>(token: &'t str, args: &[Arg], processed: &[bool]) -> TokenMatch<'t> {
    // Tested first so a declared option can never shadow help.
    if token == "-h" || token == "--help" {
        return TokenMatch::Help;
    }

    for (index, arg) in args.iter().enumerate() {
        if !matches!(arg.kind, ArgKind::Optional { .. }) {
            continue;
        }
        for name in [arg.short.as_deref(), arg.long.as_deref()].into_iter().flatten() {
            if token == name {
                return TokenMatch::Optional { index, inline: None };
            }
            if let Some(rest) = token.strip_prefix(name) {
                if let Some(value) = rest.strip_prefix('=') {
                    return TokenMatch::Optional { index, inline: Some(value) };
                }
            }
        }
    }

    for (index, arg) in args.iter().enumerate() {
        if matches!(arg.kind, ArgKind::Positional(_) | ArgKind::Group(_)) && !processed[index] {
            return TokenMatch::Positional { index };
        }
    }

    TokenMatch::None
}

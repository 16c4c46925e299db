//! The immutable declaration tree: argument nodes, subcommands, builders.
//!
//! Declarations carry no per-parse state; the engine keeps its own state
//! tree per level, so one declaration tree can be parsed any number of
//! times (including concurrently constructed handlers firing per parse).

use std::fmt;

use crate::error::Error;
use crate::value::{ValueKind, Values};

/// A subcommand handler. Invoked with the composed payload only after the
/// whole top-level parse has succeeded.
pub type Handler = Box<dyn Fn(&Values<'_>)>;

/// One declared argument node.
#[derive(Debug)]
pub struct Arg {
    pub(crate) short: Option<String>,
    pub(crate) long: Option<String>,
    pub(crate) help: Option<String>,
    pub(crate) kind: ArgKind,
}

#[derive(Debug)]
pub enum ArgKind {
    /// Matched by declaration order, never by name.
    Positional(ValueKind),
    /// Matched by short/long name, optionally with an inline `=value`.
    /// A negatable boolean toggles on match instead of consuming a value.
    Optional { value: ValueKind, negatable: bool },
    /// A positional whose token selects one of the alternatives by exact
    /// name and recurses into its argument list.
    Group(Vec<Subcommand>),
}

/// One alternative of a subcommand group: its own argument list plus an
/// optional handler fed the composed payload.
pub struct Subcommand {
    pub(crate) name: String,
    pub(crate) help: Option<String>,
    pub(crate) args: Vec<Arg>,
    pub(crate) handler: Option<Handler>,
}

impl fmt::Debug for Subcommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subcommand")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("args", &self.args)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

fn normalize_short(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        trimmed.to_string()
    } else {
        format!("-{trimmed}")
    }
}

fn normalize_long(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        trimmed.to_string()
    } else {
        format!("--{trimmed}")
    }
}

impl Arg {
    /// A positional argument bound by declaration order.
    pub fn positional(name: impl Into<String>, kind: ValueKind) -> Self {
        Arg {
            short: None,
            long: Some(name.into()),
            help: None,
            kind: ArgKind::Positional(kind),
        }
    }

    /// A value-bearing optional matched by its long name (`--name value` or
    /// `--name=value`). Add a short spelling with [`Arg::short`].
    pub fn option(long: &str, kind: ValueKind) -> Self {
        Arg {
            short: None,
            long: Some(normalize_long(long)),
            help: None,
            kind: ArgKind::Optional { value: kind, negatable: false },
        }
    }

    /// A negatable boolean optional: the first match toggles it on, repeat
    /// matches are no-ops.
    pub fn flag(long: &str) -> Self {
        Arg {
            short: None,
            long: Some(normalize_long(long)),
            help: None,
            kind: ArgKind::Optional { value: ValueKind::Bool, negatable: true },
        }
    }

    /// A subcommand group positional. The matching token must equal one
    /// alternative's name exactly.
    pub fn group(name: impl Into<String>, alternatives: Vec<Subcommand>) -> Self {
        Arg {
            short: None,
            long: Some(name.into()),
            help: None,
            kind: ArgKind::Group(alternatives),
        }
    }

    /// Add a short name to an optional (`v` and `-v` are equivalent).
    pub fn short(mut self, short: &str) -> Self {
        self.short = Some(normalize_short(short));
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    /// Display key: the long name when present, else the short one.
    pub(crate) fn display_name(&self) -> &str {
        self.long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or_default()
    }

    /// Lookup key in a [`Values`] record: the display name stripped of
    /// leading dashes.
    pub(crate) fn key(&self) -> &str {
        self.display_name().trim_start_matches('-')
    }

    pub(crate) fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Whether the failure epilogue counts this node as a required
    /// positional. Variadic arrays are satisfiable by zero tokens and so
    /// contribute nothing.
    pub(crate) fn is_required_positional(&self) -> bool {
        match &self.kind {
            ArgKind::Positional(ValueKind::Array { count, .. }) => *count != 0,
            ArgKind::Positional(_) | ArgKind::Group(_) => true,
            ArgKind::Optional { .. } => false,
        }
    }
}

impl Subcommand {
    pub fn new(name: impl Into<String>) -> Self {
        Subcommand {
            name: name.into(),
            help: None,
            args: Vec::new(),
            handler: None,
        }
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn handler(mut self, handler: impl Fn(&Values<'_>) + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub(crate) fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }
}

/// Walk the whole declaration tree rejecting sizes and types parsing could
/// not honor. Runs once per parse before any token is consumed.
pub(crate) fn validate_tree(args: &[Arg]) -> Result<(), Error> {
    for arg in args {
        match &arg.kind {
            ArgKind::Positional(kind) | ArgKind::Optional { value: kind, .. } => {
                kind.validate(arg.display_name())?;
            }
            ArgKind::Group(alternatives) => {
                for alternative in alternatives {
                    validate_tree(&alternative.args)?;
                }
            }
        }
    }
    Ok(())
}

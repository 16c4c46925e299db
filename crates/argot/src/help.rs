//! Usage-line and help-body rendering.
//!
//! The renderer is handed the root argument list plus the ancestor path the
//! engine walked to reach the active level, so contextual help at any
//! nesting depth shows the route from the program name down to the active
//! subcommand.

use crate::Parser;
use crate::arg::{Arg, ArgKind};
use crate::engine::Step;
use crate::value::ValueKind;

/// Column at which entry help text starts; entries whose name portion runs
/// past it wrap onto an indented continuation line.
const HELP_COLUMN: usize = 24;

fn group_summary(arg: &Arg) -> String {
    let ArgKind::Group(alternatives) = &arg.kind else {
        return String::new();
    };
    let names: Vec<&str> = alternatives.iter().map(|sub| sub.name.as_str()).collect();
    format!("{{{}}}", names.join(","))
}

/// Upper-cased value placeholder derived from the display name: `--output`
/// becomes `OUTPUT`.
fn placeholder(arg: &Arg) -> String {
    arg.key().to_ascii_uppercase()
}

fn is_toggle(arg: &Arg) -> bool {
    matches!(
        arg.kind,
        ArgKind::Optional { value: ValueKind::Bool, negatable: true }
    )
}

/// The one-line usage summary for the active level.
pub(crate) fn usage_line(parser: &Parser, root: &[Arg], path: &[Step<'_>]) -> String {
    let mut out = format!("usage: {}", parser.program);

    // Ancestor levels contribute their positional names; the group hop on
    // the path renders as its braced choice set before descending.
    let mut level = root;
    for step in path {
        for arg in level {
            match &arg.kind {
                ArgKind::Group(_) if std::ptr::eq(arg, step.group) => {
                    out.push(' ');
                    out.push_str(&group_summary(arg));
                    out.push_str(" ...");
                    break;
                }
                ArgKind::Positional(_) => {
                    out.push(' ');
                    out.push_str(arg.key());
                }
                _ => {}
            }
        }
        level = &step.chosen.args;
    }

    out.push_str(" [-h]");
    for arg in level {
        if matches!(arg.kind, ArgKind::Optional { .. }) {
            out.push(' ');
            if is_toggle(arg) {
                out.push_str(&format!("[{}]", arg.display_name()));
            } else {
                out.push_str(&format!("[{} {}]", arg.display_name(), placeholder(arg)));
            }
        }
    }
    for arg in level {
        match &arg.kind {
            ArgKind::Positional(_) => {
                out.push(' ');
                out.push_str(arg.key());
            }
            ArgKind::Group(_) => {
                out.push(' ');
                out.push_str(&group_summary(arg));
                out.push_str(" ...");
            }
            ArgKind::Optional { .. } => {}
        }
    }
    out
}

fn push_entry(out: &mut String, depth: usize, left: &str, help: Option<&str>) {
    let indent = 2 * depth;
    out.push_str(&" ".repeat(indent));
    out.push_str(left);
    let Some(help) = help else {
        out.push('\n');
        return;
    };
    if indent + left.len() + 2 > HELP_COLUMN {
        out.push('\n');
        out.push_str(&" ".repeat(HELP_COLUMN));
    } else {
        out.push_str(&" ".repeat(HELP_COLUMN - indent - left.len()));
    }
    out.push_str(help);
    out.push('\n');
}

/// Full help body for the active level: usage line, program description
/// (root only), positional section, options section.
pub(crate) fn render(parser: &Parser, root: &[Arg], path: &[Step<'_>]) -> String {
    let active: &[Arg] = path
        .last()
        .map(|step| step.chosen.args.as_slice())
        .unwrap_or(root);

    let mut out = usage_line(parser, root, path);
    out.push('\n');

    if path.is_empty() {
        if let Some(description) = &parser.description {
            out.push('\n');
            out.push_str(description);
            out.push('\n');
        }
    }

    let has_positionals = active
        .iter()
        .any(|arg| matches!(arg.kind, ArgKind::Positional(_) | ArgKind::Group(_)));
    if has_positionals {
        out.push_str("\npositional arguments:\n");
        for arg in active {
            match &arg.kind {
                ArgKind::Positional(_) => {
                    push_entry(&mut out, 1, arg.key(), arg.help_text());
                }
                ArgKind::Group(alternatives) => {
                    push_entry(&mut out, 1, &group_summary(arg), arg.help_text());
                    for sub in alternatives {
                        push_entry(&mut out, 2, &sub.name, sub.help_text());
                    }
                }
                ArgKind::Optional { .. } => {}
            }
        }
    }

    out.push_str("\noptions:\n");
    push_entry(&mut out, 1, "-h, --help", Some("show this help message and exit"));
    for arg in active {
        if !matches!(arg.kind, ArgKind::Optional { .. }) {
            continue;
        }
        let mut left = String::new();
        if let Some(short) = &arg.short {
            left.push_str(short);
        }
        if let Some(long) = &arg.long {
            if !left.is_empty() {
                left.push_str(", ");
            }
            left.push_str(long);
        }
        if !is_toggle(arg) {
            left.push(' ');
            left.push_str(&placeholder(arg));
        }
        push_entry(&mut out, 1, &left, arg.help_text());
    }

    out
}

//! The recursive descent engine: token consumption, subcommand recursion,
//! payload composition, the failure epilogue, and the deferred dispatch
//! queue.
//!
//! Each argument list is walked with its own state (processed flags,
//! unknown tokens) kept apart from the immutable declarations, so a
//! declaration tree parses cleanly any number of times.

use crate::Parser;
use crate::arg::{Arg, ArgKind, Handler, Subcommand};
use crate::error::{Error, Severity};
use crate::help;
use crate::matcher::{self, TokenMatch};
use crate::value::{self, Value, ValueKind, Values};

/// One ancestor hop on the way from the root list to the active one: the
/// group node that was matched and the alternative its token selected.
pub(crate) struct Step<'s> {
    pub group: &'s Arg,
    pub chosen: &'s Subcommand,
}

/// A subcommand whose nested parse succeeded, waiting for the whole
/// top-level parse to succeed before its handler runs.
pub(crate) struct DispatchEntry<'s, 'a> {
    handler: &'s Handler,
    payload: Values<'a>,
}

pub(crate) enum LevelOutcome<'a> {
    Done(Values<'a>),
    Help(String),
}

pub(crate) struct Session<'s, 'a> {
    pub parser: &'s Parser,
    pub root: &'s [Arg],
    pub argv: &'a [String],
    pub cursor: usize,
    queue: Vec<DispatchEntry<'s, 'a>>,
}

impl<'s, 'a> Session<'s, 'a> {
    pub fn new(parser: &'s Parser, root: &'s [Arg], argv: &'a [String]) -> Self {
        Session { parser, root, argv, cursor: 0, queue: Vec::new() }
    }

    /// Run every queued handler in discovery order. Only called once the
    /// top-level parse has fully succeeded; a failed or help-short-circuited
    /// parse drops the queue unrun.
    pub fn dispatch(self) {
        for entry in self.queue {
            (entry.handler)(&entry.payload);
        }
    }

    /// Parse one argument list. `nested` marks a subcommand's own list,
    /// where an unmatched token is handed back to the enclosing level
    /// instead of being fatal here.
    pub fn run_level(
        &mut self,
        args: &'s [Arg],
        nested: bool,
        path: &mut Vec<Step<'s>>,
    ) -> Result<LevelOutcome<'a>, Error> {
        let mut processed = vec![false; args.len()];
        let mut unknown: Vec<String> = Vec::new();
        let mut values = compose_payload(args);

        while self.cursor < self.argv.len() {
            let token = self.argv[self.cursor].as_str();
            self.cursor += 1;

            match matcher::resolve(token, args, &processed) {
                TokenMatch::Help => {
                    return Ok(LevelOutcome::Help(help::render(self.parser, self.root, path)));
                }
                TokenMatch::Optional { index, inline } => {
                    self.bind_optional(&args[index], inline, &mut processed[index], &mut values)?;
                }
                TokenMatch::Positional { index } => {
                    let arg = &args[index];
                    match &arg.kind {
                        ArgKind::Positional(ValueKind::Array { elem, count }) => {
                            self.bind_array(arg, token, elem, *count, &mut values)?;
                            processed[index] = true;
                        }
                        ArgKind::Positional(kind) => {
                            let bound = self.coerce_reporting(kind, arg, token)?;
                            values.set(arg.key(), bound);
                            values.mark_explicit(arg.key());
                            processed[index] = true;
                        }
                        ArgKind::Group(alternatives) => {
                            processed[index] = true;
                            let outcome =
                                self.enter_subcommand(arg, alternatives, token, path)?;
                            if let Some(text) = outcome {
                                return Ok(LevelOutcome::Help(text));
                            }
                        }
                        // The matcher never routes a token here.
                        ArgKind::Optional { .. } => {}
                    }
                }
                TokenMatch::None => {
                    unknown.push(token.to_string());
                    if nested {
                        // Hand the token back so the enclosing level can try
                        // its own options against it.
                        self.cursor -= 1;
                        break;
                    }
                }
            }
        }

        self.epilogue(args, &processed, unknown, nested)?;
        Ok(LevelOutcome::Done(values))
    }

    fn bind_optional(
        &mut self,
        arg: &'s Arg,
        inline: Option<&'a str>,
        processed: &mut bool,
        values: &mut Values<'a>,
    ) -> Result<(), Error> {
        let ArgKind::Optional { value: kind, negatable } = &arg.kind else {
            return Ok(());
        };

        if *negatable && matches!(kind, ValueKind::Bool) {
            // A toggle takes no value; an inline `=value` would otherwise
            // be silently ignored.
            if let Some(value) = inline {
                let err = Error::InvalidValue {
                    name: arg.display_name().to_string(),
                    token: value.to_string(),
                };
                self.parser.report(Severity::Error, &err);
                return Err(err);
            }
            // First match flips the default; repeats are no-ops, never a
            // toggle back.
            if !*processed {
                values.set(arg.key(), Value::Bool(true));
                values.mark_explicit(arg.key());
            }
            *processed = true;
            return Ok(());
        }

        let raw = match inline {
            Some(v) => v,
            None => {
                if self.cursor >= self.argv.len() {
                    let err = Error::MissingValue { name: arg.display_name().to_string() };
                    self.parser.report(Severity::Error, &err);
                    return Err(err);
                }
                let next = self.argv[self.cursor].as_str();
                self.cursor += 1;
                next
            }
        };
        let bound = self.coerce_reporting(kind, arg, raw)?;
        values.set(arg.key(), bound);
        values.mark_explicit(arg.key());
        *processed = true;
        Ok(())
    }

    fn bind_array(
        &mut self,
        arg: &'s Arg,
        first: &'a str,
        elem: &ValueKind,
        count: usize,
        values: &mut Values<'a>,
    ) -> Result<(), Error> {
        // The matched token is already the first element.
        let available = 1 + self.argv.len() - self.cursor;
        let take = if count == 0 {
            available
        } else {
            if available < count {
                let err = Error::MissingValue { name: arg.display_name().to_string() };
                self.parser.report(Severity::Error, &err);
                return Err(err);
            }
            count
        };

        let mut elements = Vec::with_capacity(take);
        elements.push(self.coerce_reporting(elem, arg, first)?);
        for _ in 1..take {
            let token = self.argv[self.cursor].as_str();
            self.cursor += 1;
            elements.push(self.coerce_reporting(elem, arg, token)?);
        }
        values.set(arg.key(), Value::Array(elements));
        values.mark_explicit(arg.key());
        Ok(())
    }

    /// Returns `Some(help text)` when the nested level short-circuited on
    /// the help alias.
    fn enter_subcommand(
        &mut self,
        group: &'s Arg,
        alternatives: &'s [Subcommand],
        token: &'a str,
        path: &mut Vec<Step<'s>>,
    ) -> Result<Option<String>, Error> {
        let Some(chosen) = alternatives.iter().find(|sub| sub.name == token) else {
            // The tree location for usage cannot be determined past this
            // point, so an invalid choice is fatal rather than deferred.
            let err = Error::InvalidSubcommand {
                usage: help::usage_line(self.parser, self.root, path),
                token: token.to_string(),
                choices: alternatives.iter().map(|sub| sub.name.clone()).collect(),
            };
            self.parser.report(Severity::Error, &err);
            return Err(err);
        };

        path.push(Step { group, chosen });
        let outcome = self.run_level(&chosen.args, true, path)?;
        path.pop();

        match outcome {
            LevelOutcome::Help(text) => Ok(Some(text)),
            LevelOutcome::Done(payload) => {
                if let Some(handler) = &chosen.handler {
                    self.queue.push(DispatchEntry { handler, payload });
                }
                Ok(None)
            }
        }
    }

    /// End-of-list bookkeeping: unmet positionals at every level, leftover
    /// unknown tokens only at the top. The positional fallback binds any
    /// token while a positional is still pending, so at most one of the two
    /// classes can be non-empty for one level.
    fn epilogue(
        &self,
        args: &[Arg],
        processed: &[bool],
        unknown: Vec<String>,
        nested: bool,
    ) -> Result<(), Error> {
        let missing: Vec<String> = args
            .iter()
            .zip(processed)
            .filter(|(arg, done)| !**done && arg.is_required_positional())
            .map(|(arg, _)| arg.display_name().to_string())
            .collect();

        if !missing.is_empty() {
            let err = Error::MissingPositionals { names: missing };
            self.parser.report(Severity::Error, &err);
            return Err(err);
        }
        if !nested && !unknown.is_empty() {
            let err = Error::UnknownArguments { tokens: unknown };
            self.parser.report(Severity::Error, &err);
            return Err(err);
        }
        Ok(())
    }

    fn coerce_reporting(
        &self,
        kind: &ValueKind,
        arg: &Arg,
        token: &'a str,
    ) -> Result<Value<'a>, Error> {
        match value::coerce(kind, arg.display_name(), token) {
            Ok(coerced) => {
                if let Some(warning) = &coerced.warning {
                    self.parser.report(Severity::Warning, warning);
                }
                Ok(coerced.value)
            }
            Err(err) => {
                self.parser.report(Severity::Error, &err);
                Err(err)
            }
        }
    }
}

/// Compose the zeroed record for one argument list before any token binds:
/// one field per value-bearing node, positionals in declaration order
/// first, then optionals. Used for subcommand payloads and, uniformly, for
/// the top-level result.
pub(crate) fn compose_payload<'a>(args: &[Arg]) -> Values<'a> {
    let mut values = Values::default();
    for arg in args {
        if let ArgKind::Positional(kind) = &arg.kind {
            values.set(arg.key(), kind.default_value());
        }
    }
    for arg in args {
        if let ArgKind::Optional { value: kind, .. } = &arg.kind {
            values.set(arg.key(), kind.default_value());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::error::Error;
    use crate::value::{Value, ValueKind};
    use crate::{Arg, Outcome, Parser, Subcommand};

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn quiet() -> Parser {
        Parser::new("prog").error_hook(Some(Box::new(|_, _| {})))
    }

    fn copy_tree(seen: Rc<RefCell<Vec<(String, String)>>>) -> Vec<Arg> {
        vec![Arg::group(
            "command",
            vec![
                Subcommand::new("copy")
                    .help("Copy a file")
                    .arg(Arg::positional("file", ValueKind::Str { cap: 0 }))
                    .arg(Arg::positional("dest", ValueKind::Str { cap: 0 }))
                    .handler(move |payload| {
                        seen.borrow_mut().push((
                            payload.get_str("file").unwrap_or_default().to_string(),
                            payload.get_str("dest").unwrap_or_default().to_string(),
                        ));
                    }),
                Subcommand::new("probe").help("Do nothing"),
            ],
        )]
    }

    #[test]
    fn subcommand_dispatch_receives_payload() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let parser = quiet();

        let tokens = argv(&["copy", "a", "b"]);
        let outcome = parser.parse(&args, &tokens).unwrap();
        assert!(matches!(outcome, Outcome::Parsed(_)));
        assert_eq!(
            seen.borrow().as_slice(),
            [("a".to_string(), "b".to_string())]
        );
    }

    #[test]
    fn invalid_choice_is_fatal() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let tokens = argv(&["x"]);
        let err = quiet().parse(&args, &tokens).unwrap_err();
        let Error::InvalidSubcommand { token, choices, .. } = err else {
            panic!("expected InvalidSubcommand, got {err:?}");
        };
        assert_eq!(token, "x");
        assert_eq!(choices, ["copy", "probe"]);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn missing_group_positional_is_reported() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let tokens = argv(&[]);
        let err = quiet().parse(&args, &tokens).unwrap_err();
        assert_eq!(
            err,
            Error::MissingPositionals { names: vec!["command".to_string()] }
        );
    }

    #[test]
    fn trailing_unknown_token_suppresses_dispatch() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let tokens = argv(&["copy", "a", "b", "stray"]);
        let err = quiet().parse(&args, &tokens).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownArguments { tokens: vec!["stray".to_string()] }
        );
        assert!(seen.borrow().is_empty(), "handler must not run on failure");
    }

    #[test]
    fn outer_option_may_follow_subcommand_tokens() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut args = copy_tree(seen.clone());
        args.push(Arg::flag("verbose").short("v"));

        let tokens = argv(&["copy", "a", "b", "--verbose"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &tokens).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_bool("verbose"), Some(true));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn declarations_carry_no_state_between_parses() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let parser = quiet();

        let first = argv(&["copy", "a", "b"]);
        parser.parse(&args, &first).unwrap();
        let second = argv(&["copy", "c", "d"]);
        parser.parse(&args, &second).unwrap();

        assert_eq!(
            seen.borrow().as_slice(),
            [
                ("a".to_string(), "b".to_string()),
                ("c".to_string(), "d".to_string()),
            ]
        );
    }

    #[test]
    fn payload_without_handler_is_dropped_silently() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let tokens = argv(&["probe"]);
        let outcome = quiet().parse(&args, &tokens).unwrap();
        assert!(matches!(outcome, Outcome::Parsed(_)));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn negatable_flag_toggles_once() {
        let args = vec![Arg::flag("verbose").short("v")];
        let tokens = argv(&["--verbose", "-v", "--verbose"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &tokens).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_bool("verbose"), Some(true));
    }

    #[test]
    fn negatable_flag_rejects_an_inline_value() {
        let args = vec![Arg::flag("verbose").short("v")];
        let tokens = argv(&["--verbose=false"]);
        assert_eq!(
            quiet().parse(&args, &tokens).unwrap_err(),
            Error::InvalidValue {
                name: "--verbose".to_string(),
                token: "false".to_string(),
            }
        );
    }

    #[test]
    fn pending_positional_absorbs_option_looking_tokens() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        let parser = Parser::new("prog").error_hook(Some(Box::new(move |severity, err| {
            sink.borrow_mut().push((severity, err.clone()));
        })));

        // The fallback is unconditional: while a positional is pending, a
        // token is never unknown, so the missing and unknown diagnostics
        // cannot surface from the same level.
        let args = vec![
            Arg::positional("file", ValueKind::Str { cap: 0 }),
            Arg::positional("dest", ValueKind::Str { cap: 0 }),
        ];
        let tokens = argv(&["onlyone", "--stray=zz"]);
        let Outcome::Parsed(values) = parser.parse(&args, &tokens).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_str("dest"), Some("--stray=zz"));
        assert!(reports.borrow().is_empty());
    }

    #[test]
    fn option_value_forms() {
        let args = vec![Arg::option("output", ValueKind::Str { cap: 0 }).short("o")];

        let separate = argv(&["--output", "a.txt"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &separate).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_str("output"), Some("a.txt"));

        let inline = argv(&["--output=b.txt"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &inline).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_str("output"), Some("b.txt"));

        let truncated = argv(&["--output"]);
        assert_eq!(
            quiet().parse(&args, &truncated).unwrap_err(),
            Error::MissingValue { name: "--output".to_string() }
        );
    }

    #[test]
    fn variadic_array_consumes_all_and_is_satisfied_by_none() {
        let args = vec![Arg::positional(
            "files",
            ValueKind::Array { elem: Box::new(ValueKind::Str { cap: 0 }), count: 0 },
        )];

        let empty = argv(&[]);
        let Outcome::Parsed(values) = quiet().parse(&args, &empty).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(values.get_array("files"), Some(&[][..]));
        assert!(!values.is_explicit("files"));

        let three = argv(&["a", "b", "c"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &three).unwrap() else {
            panic!("expected Parsed");
        };
        let files = values.get_array("files").unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[2].as_str(), Some("c"));
    }

    #[test]
    fn fixed_count_array_requires_enough_tokens() {
        let args = vec![Arg::positional(
            "pair",
            ValueKind::Array { elem: Box::new(ValueKind::UInt { width: 1 }), count: 2 },
        )];

        let short = argv(&["1"]);
        assert_eq!(
            quiet().parse(&args, &short).unwrap_err(),
            Error::MissingValue { name: "pair".to_string() }
        );

        let exact = argv(&["1", "0x10"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &exact).unwrap() else {
            panic!("expected Parsed");
        };
        assert_eq!(
            values.get_array("pair"),
            Some(&[Value::UInt(1), Value::UInt(16)][..])
        );
    }

    #[test]
    fn coercion_failure_aborts_and_is_reported_once() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        let parser = Parser::new("prog").error_hook(Some(Box::new(move |severity, err| {
            sink.borrow_mut().push((severity, err.clone()));
        })));

        let args = vec![Arg::positional("count", ValueKind::UInt { width: 2 })];
        let tokens = argv(&["70000"]);
        let err = parser.parse(&args, &tokens).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
        assert_eq!(reports.borrow().len(), 1);
    }

    #[test]
    fn float_soft_underflow_is_a_warning_and_value_is_kept() {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        let parser = Parser::new("prog").error_hook(Some(Box::new(move |severity, err| {
            sink.borrow_mut().push((severity, err.clone()));
        })));

        let args = vec![Arg::positional("ratio", ValueKind::Float { width: 4 })];
        let tokens = argv(&["1e-40"]);
        let Outcome::Parsed(values) = parser.parse(&args, &tokens).unwrap() else {
            panic!("expected Parsed");
        };
        assert!(values.get_float("ratio").is_some());
        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, crate::Severity::Warning);
        assert!(matches!(reports[0].1, Error::Underflow { .. }));
    }

    #[test]
    fn invalid_declaration_fails_before_any_token() {
        let args = vec![Arg::positional("n", ValueKind::Int { width: 0 })];
        let tokens = argv(&["5"]);
        assert_eq!(
            quiet().parse(&args, &tokens).unwrap_err(),
            Error::InvalidSize { name: "n".to_string() }
        );
    }

    #[test]
    fn help_short_circuits_with_contextual_text() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let args = copy_tree(seen.clone());
        let tokens = argv(&["copy", "-h"]);
        let Outcome::Help(text) = quiet().parse(&args, &tokens).unwrap() else {
            panic!("expected Help");
        };
        assert!(text.contains("file"), "nested help should list nested args:\n{text}");
        assert!(text.contains("{copy,probe} ..."), "usage should show the ancestor path:\n{text}");
        assert!(seen.borrow().is_empty(), "help must not run handlers");
    }

    #[test]
    fn zero_copy_string_borrows_from_argv() {
        let args = vec![Arg::positional("file", ValueKind::Str { cap: 0 })];
        let tokens = argv(&["input.txt"]);
        let Outcome::Parsed(values) = quiet().parse(&args, &tokens).unwrap() else {
            panic!("expected Parsed");
        };
        let Some(Value::Str(cow)) = values.get("file") else {
            panic!("expected a string value");
        };
        assert!(matches!(cow, std::borrow::Cow::Borrowed(_)));
    }
}

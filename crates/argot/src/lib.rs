//! Declarative argument parsing with recursive subcommands, typed value
//! coercion, and generated usage/help text.
//!
//! A host program declares a tree of [`Arg`] nodes (positionals, named
//! options, and subcommand groups whose alternatives own nested argument
//! lists), then hands the process tokens to [`Parser::parse`]. The engine
//! walks the token vector, coerces values against each node's declared
//! [`ValueKind`] (with width-checked overflow/underflow and base
//! detection), and defers subcommand handlers until the whole top-level
//! parse has succeeded.
//!
//! Declarations are immutable; all per-parse state lives inside the engine,
//! so one tree can be parsed repeatedly. Failures come back as a typed
//! [`Error`] and the embedding program decides how to terminate; every
//! diagnostic also flows through a replaceable reporter hook that defaults
//! to stderr.
//!
//! ```no_run
//! use argot::{Arg, Outcome, Parser, Subcommand, ValueKind};
//!
//! let args = vec![
//!     Arg::group(
//!         "command",
//!         vec![
//!             Subcommand::new("copy")
//!                 .help("Copy a file")
//!                 .arg(Arg::positional("file", ValueKind::Str { cap: 0 }))
//!                 .arg(Arg::positional("dest", ValueKind::Str { cap: 0 }))
//!                 .handler(|payload| {
//!                     println!(
//!                         "{} -> {}",
//!                         payload.get_str("file").unwrap_or_default(),
//!                         payload.get_str("dest").unwrap_or_default(),
//!                     );
//!                 }),
//!         ],
//!     ),
//!     Arg::flag("verbose").short("v").help("Chatty output"),
//! ];
//!
//! let argv: Vec<String> = std::env::args().skip(1).collect();
//! let parser = Parser::new("example").description("Just an example");
//! match parser.parse(&args, &argv) {
//!     Ok(Outcome::Parsed(values)) => {
//!         let _ = values.get_bool("verbose");
//!     }
//!     Ok(Outcome::Help(text)) => print!("{text}"),
//!     Err(_) => std::process::exit(1),
//! }
//! ```

mod arg;
mod engine;
mod error;
mod help;
mod matcher;
mod value;

pub use arg::{Arg, ArgKind, Handler, Subcommand};
pub use error::{Error, Severity};
pub use value::{Value, ValueKind, Values};

/// Replaceable diagnostic sink: receives every reported error and warning.
pub type ErrorHook = Box<dyn Fn(Severity, &Error)>;

/// How a successful parse ended.
#[derive(Debug)]
pub enum Outcome<'a> {
    /// The token vector was fully consumed; these are the top-level values.
    /// Queued subcommand handlers have already run, in discovery order.
    Parsed(Values<'a>),
    /// The help alias was matched somewhere; this is the rendered text for
    /// the level it was matched at. No handlers were run.
    Help(String),
}

/// Parse context: program identity plus the diagnostic hook. Holds no
/// per-parse state, so one parser serves any number of parses.
pub struct Parser {
    pub(crate) program: String,
    pub(crate) description: Option<String>,
    hook: Option<ErrorHook>,
}

impl Parser {
    pub fn new(program: impl Into<String>) -> Self {
        Parser {
            program: program.into(),
            description: None,
            hook: None,
        }
    }

    /// Program description shown at the top of root-level help.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Install a diagnostic hook, or pass `None` to restore the default
    /// stderr printer.
    pub fn error_hook(mut self, hook: Option<ErrorHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub(crate) fn report(&self, severity: Severity, err: &Error) {
        match &self.hook {
            Some(hook) => hook(severity, err),
            None => {
                // An invalid subcommand choice prints its usage summary
                // ahead of the message, since no later epilogue will.
                if let Error::InvalidSubcommand { usage, .. } = err {
                    eprintln!("{usage}");
                }
                eprintln!("{}: {severity}: {err}", self.program);
            }
        }
    }

    /// Parse `argv` (without the program name) against the declared tree.
    ///
    /// On success, every queued subcommand handler has been invoked before
    /// this returns. On failure the queue is dropped unrun; the returned
    /// error (and any sibling deferred failures) have already been handed
    /// to the diagnostic hook. Borrowed string values in the result point
    /// into `argv`.
    pub fn parse<'s, 'a>(
        &'s self,
        args: &'s [Arg],
        argv: &'a [String],
    ) -> Result<Outcome<'a>, Error> {
        if let Err(err) = arg::validate_tree(args) {
            self.report(Severity::Error, &err);
            return Err(err);
        }

        let mut session = engine::Session::new(self, args, argv);
        let mut path = Vec::new();
        match session.run_level(args, false, &mut path)? {
            engine::LevelOutcome::Help(text) => Ok(Outcome::Help(text)),
            engine::LevelOutcome::Done(values) => {
                session.dispatch();
                Ok(Outcome::Parsed(values))
            }
        }
    }
}

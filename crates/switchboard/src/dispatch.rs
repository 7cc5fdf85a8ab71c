//! Command registry and dispatch.
//!
//! The registry maps command names to pre-bound invokers. Registration is a
//! sequential setup phase: names are validated, handlers are bound to their
//! schemas fail-fast, and duplicates are rejected with the first
//! registration left intact. After setup the map is read-only, so a shared
//! `Dispatcher` (e.g. behind an `Arc`) can serve concurrent dispatches
//! without locking.
//!
//! Observers registered on the dispatcher are notified synchronously, in
//! registration order, before every invocation of a found command, even if
//! the call subsequently fails. A not-found name notifies nobody.
//!
//! The `must_*` variants convert errors into panics. They exist for
//! process-initialization code; never call them in a request path.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::args::{usage, Arg};
use crate::bind::{BindError, BoundCommand, InvokeError};
use crate::handler::{CommandContext, IntoCommandHandler};
use crate::results::ResultsHandlerRef;

/// Name of the default command: the empty string.
pub const DEFAULT: &str = "";

/// Errors from registering a command or group.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The name is already taken; the existing registration is untouched.
    #[error("command '{0}' already registered")]
    Duplicate(String),

    /// The group name is already taken.
    #[error("group '{0}' already registered")]
    DuplicateGroup(String),

    /// The name violates the command-name syntax.
    #[error("invalid command name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// What rule it broke
        reason: &'static str,
    },

    /// The handler and schema are incompatible.
    #[error("command '{name}': {source}")]
    Bind {
        /// The command being registered
        name: String,
        /// The underlying bind failure
        #[source]
        source: BindError,
    },
}

/// Errors from dispatching a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No command registered under this name.
    #[error("command not found: '{0}'")]
    NotFound(String),

    /// No group registered under this name.
    #[error("group not found: '{0}'")]
    GroupNotFound(String),

    /// Conversion or invocation failed.
    #[error("command '{command}': {source}")]
    Invoke {
        /// The dispatched command
        command: String,
        /// The underlying failure
        #[source]
        source: InvokeError,
    },

    /// A results handler rejected the invocation results.
    #[error("results handler for '{command}' failed: {source}")]
    Results {
        /// The dispatched command
        command: String,
        /// The handler's error
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Returns `true` for the lookup-miss variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DispatchError::NotFound(_) | DispatchError::GroupNotFound(_)
        )
    }
}

/// Validates command-name syntax: no whitespace, at least one graphic
/// character, none of `| & ; ( ) < >`.
pub(crate) fn check_command_name(name: &str) -> Result<(), RegisterError> {
    if name.chars().any(char::is_whitespace) {
        return Err(RegisterError::InvalidName {
            name: name.to_owned(),
            reason: "contains whitespace",
        });
    }
    if !name.chars().any(|c| !c.is_control()) {
        return Err(RegisterError::InvalidName {
            name: name.to_owned(),
            reason: "contains no graphic characters",
        });
    }
    if name.contains(['|', '&', ';', '(', ')', '<', '>']) {
        return Err(RegisterError::InvalidName {
            name: name.to_owned(),
            reason: "contains a shell metacharacter",
        });
    }
    Ok(())
}

/// Observer notified before each invocation of a found command.
pub trait CommandObserver: Send + Sync {
    /// Receives the command name and the raw arguments as supplied.
    fn command_dispatched(&self, command: &str, args: &[String]);
}

struct FnObserver<F>(F);

impl<F> CommandObserver for FnObserver<F>
where
    F: Fn(&str, &[String]) + Send + Sync,
{
    fn command_dispatched(&self, command: &str, args: &[String]) {
        (self.0)(command, args)
    }
}

/// Creates an observer from a closure.
pub fn observer_fn<F>(f: F) -> Arc<dyn CommandObserver>
where
    F: Fn(&str, &[String]) + Send + Sync + 'static,
{
    Arc::new(FnObserver(f))
}

pub(crate) struct CommandEntry {
    pub(crate) description: String,
    pub(crate) bound: BoundCommand,
    pub(crate) results_handlers: Vec<ResultsHandlerRef>,
}

/// A flat command registry.
#[derive(Default)]
pub struct Dispatcher {
    pub(crate) commands: BTreeMap<String, CommandEntry>,
    observers: Vec<Arc<dyn CommandObserver>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty dispatcher with the given observers.
    pub fn with_observers(observers: Vec<Arc<dyn CommandObserver>>) -> Self {
        Self {
            commands: BTreeMap::new(),
            observers,
        }
    }

    /// Registers a command.
    ///
    /// Validates the name, binds the handler to the schema, and stores the
    /// pre-bound invoker. Fails without touching the registry on duplicate
    /// names, invalid name syntax, or handler/schema mismatch.
    pub fn add_command<M, H>(
        &mut self,
        name: &str,
        description: &str,
        handler: H,
        args: Vec<Arg>,
        results_handlers: Vec<ResultsHandlerRef>,
    ) -> Result<(), RegisterError>
    where
        H: IntoCommandHandler<M>,
    {
        if self.commands.contains_key(name) {
            return Err(RegisterError::Duplicate(name.to_owned()));
        }
        check_command_name(name)?;
        self.insert_entry(name, description, handler, args, results_handlers)
    }

    /// [`Self::add_command`], panicking on error. Setup-time only.
    pub fn must_add_command<M, H>(
        &mut self,
        name: &str,
        description: &str,
        handler: H,
        args: Vec<Arg>,
        results_handlers: Vec<ResultsHandlerRef>,
    ) where
        H: IntoCommandHandler<M>,
    {
        if let Err(err) = self.add_command(name, description, handler, args, results_handlers) {
            panic!("must_add_command: {err}");
        }
    }

    /// Registers the default command (empty name).
    ///
    /// The name-syntax check is skipped (the empty name is the point), but
    /// a duplicate default is still rejected.
    pub fn add_default_command<M, H>(
        &mut self,
        description: &str,
        handler: H,
        args: Vec<Arg>,
        results_handlers: Vec<ResultsHandlerRef>,
    ) -> Result<(), RegisterError>
    where
        H: IntoCommandHandler<M>,
    {
        if self.commands.contains_key(DEFAULT) {
            return Err(RegisterError::Duplicate(DEFAULT.to_owned()));
        }
        self.insert_entry(DEFAULT, description, handler, args, results_handlers)
    }

    /// [`Self::add_default_command`], panicking on error. Setup-time only.
    pub fn must_add_default_command<M, H>(
        &mut self,
        description: &str,
        handler: H,
        args: Vec<Arg>,
        results_handlers: Vec<ResultsHandlerRef>,
    ) where
        H: IntoCommandHandler<M>,
    {
        if let Err(err) = self.add_default_command(description, handler, args, results_handlers) {
            panic!("must_add_default_command: {err}");
        }
    }

    fn insert_entry<M, H>(
        &mut self,
        name: &str,
        description: &str,
        handler: H,
        args: Vec<Arg>,
        results_handlers: Vec<ResultsHandlerRef>,
    ) -> Result<(), RegisterError>
    where
        H: IntoCommandHandler<M>,
    {
        let bound = BoundCommand::bind(Box::new(handler.into_command_handler()), args).map_err(
            |source| RegisterError::Bind {
                name: name.to_owned(),
                source,
            },
        )?;
        self.commands.insert(
            name.to_owned(),
            CommandEntry {
                description: description.to_owned(),
                bound,
                results_handlers,
            },
        );
        Ok(())
    }

    /// Returns `true` if a command is registered under `name`.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns `true` if a default command is registered.
    pub fn has_default_command(&self) -> bool {
        self.commands.contains_key(DEFAULT)
    }

    /// Dispatches a command with positional string arguments.
    ///
    /// Looks up the pre-bound invoker by exact name, notifies observers,
    /// invokes, then runs the command's results handlers in order.
    pub fn dispatch(
        &self,
        ctx: &CommandContext,
        name: &str,
        args: &[String],
    ) -> Result<(), DispatchError> {
        let entry = self
            .commands
            .get(name)
            .ok_or_else(|| DispatchError::NotFound(name.to_owned()))?;
        for observer in &self.observers {
            observer.command_dispatched(name, args);
        }
        let results = entry
            .bound
            .invoke(ctx, args)
            .map_err(|source| DispatchError::Invoke {
                command: name.to_owned(),
                source,
            })?;
        for handler in &entry.results_handlers {
            handler
                .handle_results(&results)
                .map_err(|source| DispatchError::Results {
                    command: name.to_owned(),
                    source,
                })?;
        }
        Ok(())
    }

    /// [`Self::dispatch`], panicking on error. Setup-time only.
    pub fn must_dispatch(&self, ctx: &CommandContext, name: &str, args: &[String]) {
        if let Err(err) = self.dispatch(ctx, name, args) {
            panic!("must_dispatch: {err}");
        }
    }

    /// Dispatches the default command with no arguments.
    pub fn dispatch_default(&self, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.dispatch(ctx, DEFAULT, &[])
    }

    /// Dispatches a command by a name-keyed argument map, returning the
    /// result values instead of running results handlers.
    ///
    /// This is the HTTP-facing path: path variables, query parameters and
    /// body fields arrive as named strings. Observers see the supplied
    /// values rendered as `name=value` pairs in schema order.
    pub fn dispatch_named(
        &self,
        ctx: &CommandContext,
        name: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Vec<Value>, DispatchError> {
        let entry = self
            .commands
            .get(name)
            .ok_or_else(|| DispatchError::NotFound(name.to_owned()))?;
        if !self.observers.is_empty() {
            let rendered: Vec<String> = entry
                .bound
                .args()
                .iter()
                .filter_map(|arg| {
                    vars.get(&arg.name)
                        .map(|value| format!("{}={}", arg.name, value))
                })
                .collect();
            for observer in &self.observers {
                observer.command_dispatched(name, &rendered);
            }
        }
        entry
            .bound
            .invoke_named(ctx, vars)
            .map_err(|source| DispatchError::Invoke {
                command: name.to_owned(),
                source,
            })
    }

    /// Dispatches from a combined `[command, args..]` slice.
    ///
    /// An empty slice dispatches the default command. Returns the resolved
    /// command name; on error, the name travels inside the error.
    pub fn dispatch_args(
        &self,
        ctx: &CommandContext,
        command_and_args: &[String],
    ) -> Result<String, DispatchError> {
        match command_and_args.split_first() {
            None => {
                self.dispatch_default(ctx)?;
                Ok(DEFAULT.to_owned())
            }
            Some((command, args)) => {
                self.dispatch(ctx, command, args)?;
                Ok(command.clone())
            }
        }
    }

    /// Writes a sorted usage listing of all commands.
    pub fn print_commands(&self, app_name: &str, out: &mut dyn io::Write) -> io::Result<()> {
        for (name, entry) in &self.commands {
            print_command(out, app_name, name, entry)?;
        }
        Ok(())
    }
}

pub(crate) fn print_command(
    out: &mut dyn io::Write,
    app_name: &str,
    name: &str,
    entry: &CommandEntry,
) -> io::Result<()> {
    writeln!(out, "  {} {} {}", app_name, name, usage(entry.bound.args()))?;
    if !entry.description.is_empty() {
        writeln!(out, "      {}", entry.description)?;
    }
    if entry
        .bound
        .args()
        .iter()
        .any(|arg| arg.description.is_some())
    {
        for arg in entry.bound.args() {
            writeln!(
                out,
                "          <{}:{}> {}",
                arg.name,
                arg.kind.label(),
                arg.description.as_deref().unwrap_or("")
            )?;
        }
    }
    writeln!(out)
}

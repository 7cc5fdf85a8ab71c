//! Two-level command trees.
//!
//! A [`GroupDispatcher`] maps group names to nested [`Dispatcher`]s,
//! enabling namespaced commands like `db migrate`. The empty group name
//! hosts ungrouped commands; a group's default command lets the group name
//! itself act as a command.

use std::io;
use std::sync::Arc;

use crate::args::Arg;
use crate::dispatch::{
    check_command_name, print_command, CommandObserver, DispatchError, Dispatcher, RegisterError,
    DEFAULT,
};
use crate::handler::{CommandContext, IntoCommandHandler};
use crate::results::ResultsHandlerRef;

/// A registry of command groups, each holding its own flat registry.
#[derive(Default)]
pub struct GroupDispatcher {
    groups: std::collections::BTreeMap<String, Dispatcher>,
    observers: Vec<Arc<dyn CommandObserver>>,
}

impl GroupDispatcher {
    /// Creates an empty group dispatcher with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty group dispatcher with the given observers.
    ///
    /// Every group added later shares them.
    pub fn with_observers(observers: Vec<Arc<dyn CommandObserver>>) -> Self {
        Self {
            groups: std::collections::BTreeMap::new(),
            observers,
        }
    }

    /// Adds a group, returning its nested dispatcher for registration.
    ///
    /// The empty name is allowed and hosts ungrouped/default commands; any
    /// other name must satisfy the command-name syntax.
    pub fn add_group(&mut self, name: &str) -> Result<&mut Dispatcher, RegisterError> {
        if !name.is_empty() {
            check_command_name(name)?;
        }
        if self.groups.contains_key(name) {
            return Err(RegisterError::DuplicateGroup(name.to_owned()));
        }
        let sub = Dispatcher::with_observers(self.observers.clone());
        Ok(self.groups.entry(name.to_owned()).or_insert(sub))
    }

    /// [`Self::add_group`], panicking on error. Setup-time only.
    pub fn must_add_group(&mut self, name: &str) -> &mut Dispatcher {
        match self.add_group(name) {
            Ok(sub) => sub,
            Err(err) => panic!("must_add_group: {err}"),
        }
    }

    /// Registers the default command: empty group, empty name.
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
        let sub = self.add_group(DEFAULT)?;
        sub.add_default_command(description, handler, args, results_handlers)
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

    /// Returns `true` if `group` exists and has a default command, i.e.
    /// the group name alone is dispatchable.
    pub fn has_command(&self, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(Dispatcher::has_default_command)
    }

    /// Returns `true` if `group` contains a command named `name`.
    pub fn has_sub_command(&self, group: &str, name: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|sub| sub.has_command(name))
    }

    /// Dispatches `group name args..`.
    pub fn dispatch(
        &self,
        ctx: &CommandContext,
        group: &str,
        name: &str,
        args: &[String],
    ) -> Result<(), DispatchError> {
        let sub = self
            .groups
            .get(group)
            .ok_or_else(|| DispatchError::GroupNotFound(group.to_owned()))?;
        sub.dispatch(ctx, name, args)
    }

    /// [`Self::dispatch`], panicking on error. Setup-time only.
    pub fn must_dispatch(&self, ctx: &CommandContext, group: &str, name: &str, args: &[String]) {
        if let Err(err) = self.dispatch(ctx, group, name, args) {
            panic!("must_dispatch: {err}");
        }
    }

    /// Dispatches the default command of the default group.
    pub fn dispatch_default(&self, ctx: &CommandContext) -> Result<(), DispatchError> {
        self.dispatch(ctx, DEFAULT, DEFAULT, &[])
    }

    /// Dispatches from a combined `[group, command, args..]` slice.
    ///
    /// Resolution: an empty slice means the default command; a single
    /// element names a group whose default command runs; otherwise, if the
    /// named group has a default command the second element is already an
    /// argument, else it names the sub-command. Returns the resolved
    /// `(group, command)` pair.
    pub fn dispatch_args(
        &self,
        ctx: &CommandContext,
        command_and_args: &[String],
    ) -> Result<(String, String), DispatchError> {
        let (group, name, args) = match command_and_args {
            [] => (DEFAULT, DEFAULT, &[][..]),
            [group] => (group.as_str(), DEFAULT, &[][..]),
            [group, rest @ ..] => {
                let has_group_default = self
                    .groups
                    .get(group.as_str())
                    .is_some_and(Dispatcher::has_default_command);
                if has_group_default {
                    (group.as_str(), DEFAULT, rest)
                } else {
                    (group.as_str(), rest[0].as_str(), &rest[1..])
                }
            }
        };
        self.dispatch(ctx, group, name, args)?;
        Ok((group.to_owned(), name.to_owned()))
    }

    /// Writes a usage listing of all commands, sorted by group then name.
    ///
    /// A group's default command prints as the bare group name.
    pub fn print_commands(&self, app_name: &str, out: &mut dyn io::Write) -> io::Result<()> {
        for (group, sub) in &self.groups {
            for (name, entry) in &sub.commands {
                let full = match (group.is_empty(), name.is_empty()) {
                    (true, _) => name.clone(),
                    (false, true) => group.clone(),
                    (false, false) => format!("{group} {name}"),
                };
                print_command(out, app_name, &full, entry)?;
            }
        }
        Ok(())
    }
}

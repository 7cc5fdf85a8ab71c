//! Registration-time binding and per-call invocation.
//!
//! [`BoundCommand::bind`] is the one-time, fail-fast compatibility check
//! between a handler signature and its declared schema. The result is a
//! stateless invoker: each call converts raw input (positional strings or a
//! named map), runs the handler exactly once, and normalizes the outcome
//! into result values plus an error slot. Handler panics are caught at this
//! boundary and never propagate past it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;
use thiserror::Error;

use crate::args::{Arg, ArgValue, ConvertError, ParamKind};
use crate::handler::{CommandContext, CommandHandler};

/// Errors detected while binding a handler to its schema.
#[derive(Debug, Error)]
pub enum BindError {
    /// Schema length does not match the handler's parameter count.
    #[error("handler takes {handler} argument(s) but {declared} declared")]
    Arity {
        /// Parameter count of the handler
        handler: usize,
        /// Length of the declared schema
        declared: usize,
    },

    /// A declared argument kind cannot feed the handler parameter at the
    /// same position.
    #[error("argument '{name}' at position {position}: declared {declared} but the handler expects {expected}")]
    Kind {
        /// Declared argument name
        name: String,
        /// Zero-based position in the schema
        position: usize,
        /// Label of the declared kind
        declared: &'static str,
        /// The handler's parameter kind
        expected: ParamKind,
    },

    /// Two schema entries share a name.
    #[error("duplicate argument name '{0}' in schema")]
    DuplicateArg(String),
}

/// Errors from one invocation of a bound command.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Raw input could not be converted to the declared types.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The handler ran and returned an error.
    #[error("handler failed: {0}")]
    Handler(#[source] anyhow::Error),

    /// The handler panicked; the payload message is captured here.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// A pre-validated (handler, schema) pair.
///
/// Produced once per registration, invoked many times; holds no mutable
/// state, so a shared reference can serve concurrent callers.
pub struct BoundCommand {
    handler: Box<dyn CommandHandler>,
    args: Vec<Arg>,
}

impl BoundCommand {
    /// Validates that `args` can feed `handler` and fuses the two.
    ///
    /// Checks, in order: duplicate argument names, arity, and per-position
    /// kind compatibility (`Select` schema entries satisfy string
    /// parameters). Pure: no side effects on failure.
    pub fn bind(handler: Box<dyn CommandHandler>, args: Vec<Arg>) -> Result<Self, BindError> {
        let kinds = handler.param_kinds().to_vec();
        for (i, arg) in args.iter().enumerate() {
            if args[..i].iter().any(|prior| prior.name == arg.name) {
                return Err(BindError::DuplicateArg(arg.name.clone()));
            }
        }
        if kinds.len() != args.len() {
            return Err(BindError::Arity {
                handler: kinds.len(),
                declared: args.len(),
            });
        }
        for (i, (arg, expected)) in args.iter().zip(&kinds).enumerate() {
            if arg.kind.param_kind() != *expected {
                return Err(BindError::Kind {
                    name: arg.name.clone(),
                    position: i,
                    declared: arg.kind.label(),
                    expected: *expected,
                });
            }
        }
        Ok(Self { handler, args })
    }

    /// The declared schema, in order.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Converts positional input and invokes the handler.
    ///
    /// Values are consumed left-to-right against the schema; missing ones
    /// fall back to declared defaults.
    pub fn invoke(
        &self,
        ctx: &CommandContext,
        raw: &[String],
    ) -> Result<Vec<Value>, InvokeError> {
        let values = self.coerce_positional(raw)?;
        self.call(ctx, values)
    }

    /// Converts a name-keyed input map and invokes the handler.
    pub fn invoke_named(
        &self,
        ctx: &CommandContext,
        vars: &HashMap<String, String>,
    ) -> Result<Vec<Value>, InvokeError> {
        let values = self.coerce_named(vars)?;
        self.call(ctx, values)
    }

    fn coerce_positional(&self, raw: &[String]) -> Result<Vec<ArgValue>, ConvertError> {
        if raw.len() > self.args.len() {
            return Err(ConvertError::TooMany {
                expected: self.args.len(),
                given: raw.len(),
            });
        }
        let mut values = Vec::with_capacity(self.args.len());
        for (i, arg) in self.args.iter().enumerate() {
            values.push(self.coerce_one(arg, raw.get(i).map(String::as_str))?);
        }
        Ok(values)
    }

    fn coerce_named(&self, vars: &HashMap<String, String>) -> Result<Vec<ArgValue>, ConvertError> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(self.coerce_one(arg, vars.get(&arg.name).map(String::as_str))?);
        }
        Ok(values)
    }

    fn coerce_one(&self, arg: &Arg, raw: Option<&str>) -> Result<ArgValue, ConvertError> {
        match raw.or(arg.default.as_deref()) {
            Some(input) => arg.kind.coerce(&arg.name, input),
            None => Err(ConvertError::Missing(arg.name.clone())),
        }
    }

    fn call(
        &self,
        ctx: &CommandContext,
        values: Vec<ArgValue>,
    ) -> Result<Vec<Value>, InvokeError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.handler.invoke(ctx, values)));
        match outcome {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(err)) => Err(InvokeError::Handler(err)),
            Err(payload) => Err(InvokeError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl std::fmt::Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCommand")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

//! Handler interface and typed adapters.
//!
//! # Design Rationale
//!
//! Handlers are plain functions over native types. Instead of discovering a
//! function's signature at runtime, the supported shapes form a closed set:
//! `Fn(T1, .., Tn) -> Result<R, E>` for `n <= 6`, optionally with a leading
//! `&CommandContext` parameter. Each parameter type maps to a [`ParamKind`]
//! through the sealed [`FromArgValue`] trait, which is what lets
//! registration validate a schema against a handler signature up front
//! instead of failing on the first call.
//!
//! The result side is uniform: any `R: Serialize` becomes the command's
//! result values. A unit (or otherwise null) result contributes zero values;
//! anything else contributes exactly one JSON value. Handlers that produce
//! several logical values return a `serde_json::Value` array.
//!
//! # State Management
//!
//! [`CommandContext`] is passed through to handlers untouched. It carries
//! the command path, immutable app-lifetime state (`app_state`, shared via
//! `Arc`), and a per-dispatch [`Extensions`] container callers can populate
//! before dispatching. Cancellation, deadlines and the like travel inside
//! it as extension values; the dispatch core never inspects them.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::args::{ArgValue, ParamKind};

/// Type-safe container for injecting custom state into handlers.
///
/// Values are keyed by type. If you need to share state across threads,
/// store an `Arc<T>`.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates a new empty extensions container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type if any.
    pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(val))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Gets a reference to the value of the specified type.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Gets a mutable reference to the value of the specified type.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Gets a required reference, erroring if no value of the type exists.
    pub fn get_required<T: Send + Sync + 'static>(&self) -> Result<&T, anyhow::Error> {
        self.get::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "extension missing: type {} not found in context",
                std::any::type_name::<T>()
            )
        })
    }

    /// Removes the value of the specified type, returning it if it existed.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Returns `true` if a value of the specified type is present.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Returns `true` if no extensions are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish_non_exhaustive()
    }
}

/// Context passed through to command handlers, never inspected by the core.
#[derive(Debug)]
pub struct CommandContext {
    /// The command path being executed, e.g. `["db", "migrate"]`.
    pub command_path: Vec<String>,
    /// Immutable app-lifetime state shared across all dispatches.
    pub app_state: Arc<Extensions>,
    /// Per-dispatch state; populate before dispatching.
    pub extensions: Extensions,
}

impl CommandContext {
    /// Creates a context with the given path and shared app state.
    pub fn new(command_path: Vec<String>, app_state: Arc<Extensions>) -> Self {
        Self {
            command_path,
            app_state,
            extensions: Extensions::new(),
        }
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self {
            command_path: Vec::new(),
            app_state: Arc::new(Extensions::new()),
            extensions: Extensions::new(),
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for String {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for bool {}
    impl Sealed for serde_json::Value {}
}

/// Native parameter types a handler may take.
///
/// Sealed: the supported set is `String`, `i64`, `f64`, `bool` and
/// `serde_json::Value` (for composite arguments), matching the
/// [`ParamKind`]s a schema can produce.
pub trait FromArgValue: sealed::Sealed + Sized {
    /// The kind this parameter type accepts.
    fn param_kind() -> ParamKind;

    /// Unwraps a coerced value; `None` on a kind mismatch (which binding
    /// rules out for values produced from a validated schema).
    fn from_arg_value(value: ArgValue) -> Option<Self>;
}

impl FromArgValue for String {
    fn param_kind() -> ParamKind {
        ParamKind::Str
    }

    fn from_arg_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl FromArgValue for i64 {
    fn param_kind() -> ParamKind {
        ParamKind::Int
    }

    fn from_arg_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl FromArgValue for f64 {
    fn param_kind() -> ParamKind {
        ParamKind::Float
    }

    fn from_arg_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Float(x) => Some(x),
            _ => None,
        }
    }
}

impl FromArgValue for bool {
    fn param_kind() -> ParamKind {
        ParamKind::Bool
    }

    fn from_arg_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromArgValue for Value {
    fn param_kind() -> ParamKind {
        ParamKind::Json
    }

    fn from_arg_value(value: ArgValue) -> Option<Self> {
        match value {
            ArgValue::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Converts a handler's return value into the result-value contract.
fn results_from<R: Serialize>(value: R) -> Result<Vec<Value>, anyhow::Error> {
    match serde_json::to_value(value)? {
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

/// The closed handler interface the dispatch core invokes.
///
/// `param_kinds` declares the native parameter types in order, and is what
/// registration validates a schema against. `invoke` receives values already
/// coerced to those kinds and returns the normalized result values.
///
/// Closures of supported shapes get this for free through
/// [`IntoCommandHandler`]; implement it directly only for handlers whose
/// parameter list is not known at compile time.
pub trait CommandHandler: Send + Sync + 'static {
    /// Native parameter kinds, in declaration order.
    fn param_kinds(&self) -> &[ParamKind];

    /// Invokes the handler with coerced values.
    fn invoke(&self, ctx: &CommandContext, args: Vec<ArgValue>)
        -> Result<Vec<Value>, anyhow::Error>;
}

/// Conversion into a [`CommandHandler`], implemented for the supported
/// closure shapes plus anything already a `CommandHandler`.
///
/// The `Marker` parameter only disambiguates the closure impls; callers
/// never name it.
pub trait IntoCommandHandler<Marker> {
    /// The produced handler type.
    type Handler: CommandHandler;

    /// Performs the conversion.
    fn into_command_handler(self) -> Self::Handler;
}

impl<H: CommandHandler> IntoCommandHandler<()> for H {
    type Handler = H;

    fn into_command_handler(self) -> H {
        self
    }
}

/// Marker for handlers without a context parameter.
#[doc(hidden)]
#[derive(Debug)]
pub struct Plain(());

/// Marker for handlers taking a leading `&CommandContext`.
#[doc(hidden)]
#[derive(Debug)]
pub struct WithContext(());

/// Adapter lifting a closure into [`CommandHandler`].
///
/// Built by [`IntoCommandHandler`]; not constructed directly.
pub struct FnCommand<F, Marker> {
    f: F,
    kinds: Vec<ParamKind>,
    _marker: PhantomData<fn() -> Marker>,
}

impl<F, Marker> fmt::Debug for FnCommand<F, Marker> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

macro_rules! impl_fn_command {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, E, $($ty),*> CommandHandler for FnCommand<F, (Plain, R, E, $($ty),*)>
        where
            F: Fn($($ty),*) -> Result<R, E> + Send + Sync + 'static,
            R: Serialize + 'static,
            E: Into<anyhow::Error> + 'static,
            $($ty: FromArgValue + 'static,)*
        {
            fn param_kinds(&self) -> &[ParamKind] {
                &self.kinds
            }

            fn invoke(
                &self,
                _ctx: &CommandContext,
                args: Vec<ArgValue>,
            ) -> Result<Vec<Value>, anyhow::Error> {
                let mut values = args.into_iter();
                $(
                    let $ty = $ty::from_arg_value(
                        values
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("argument count mismatch"))?,
                    )
                    .ok_or_else(|| anyhow::anyhow!("argument kind mismatch"))?;
                )*
                let out = (self.f)($($ty),*).map_err(Into::into)?;
                results_from(out)
            }
        }

        impl<F, R, E, $($ty),*> IntoCommandHandler<(Plain, R, E, $($ty),*)> for F
        where
            F: Fn($($ty),*) -> Result<R, E> + Send + Sync + 'static,
            R: Serialize + 'static,
            E: Into<anyhow::Error> + 'static,
            $($ty: FromArgValue + 'static,)*
        {
            type Handler = FnCommand<F, (Plain, R, E, $($ty),*)>;

            fn into_command_handler(self) -> Self::Handler {
                FnCommand {
                    f: self,
                    kinds: vec![$($ty::param_kind()),*],
                    _marker: PhantomData,
                }
            }
        }

        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, E, $($ty),*> CommandHandler for FnCommand<F, (WithContext, R, E, $($ty),*)>
        where
            F: Fn(&CommandContext, $($ty),*) -> Result<R, E> + Send + Sync + 'static,
            R: Serialize + 'static,
            E: Into<anyhow::Error> + 'static,
            $($ty: FromArgValue + 'static,)*
        {
            fn param_kinds(&self) -> &[ParamKind] {
                &self.kinds
            }

            fn invoke(
                &self,
                ctx: &CommandContext,
                args: Vec<ArgValue>,
            ) -> Result<Vec<Value>, anyhow::Error> {
                let mut values = args.into_iter();
                $(
                    let $ty = $ty::from_arg_value(
                        values
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("argument count mismatch"))?,
                    )
                    .ok_or_else(|| anyhow::anyhow!("argument kind mismatch"))?;
                )*
                let out = (self.f)(ctx, $($ty),*).map_err(Into::into)?;
                results_from(out)
            }
        }

        impl<F, R, E, $($ty),*> IntoCommandHandler<(WithContext, R, E, $($ty),*)> for F
        where
            F: Fn(&CommandContext, $($ty),*) -> Result<R, E> + Send + Sync + 'static,
            R: Serialize + 'static,
            E: Into<anyhow::Error> + 'static,
            $($ty: FromArgValue + 'static,)*
        {
            type Handler = FnCommand<F, (WithContext, R, E, $($ty),*)>;

            fn into_command_handler(self) -> Self::Handler {
                FnCommand {
                    f: self,
                    kinds: vec![$($ty::param_kind()),*],
                    _marker: PhantomData,
                }
            }
        }
    };
}

impl_fn_command!();
impl_fn_command!(T1);
impl_fn_command!(T1, T2);
impl_fn_command!(T1, T2, T3);
impl_fn_command!(T1, T2, T3, T4);
impl_fn_command!(T1, T2, T3, T4, T5);
impl_fn_command!(T1, T2, T3, T4, T5, T6);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lift<M, H: IntoCommandHandler<M>>(h: H) -> H::Handler {
        h.into_command_handler()
    }

    #[test]
    fn test_extensions_insert_get_remove() {
        struct MyState {
            value: i32,
        }

        let mut ext = Extensions::new();
        assert!(ext.is_empty());

        ext.insert(MyState { value: 42 });
        assert!(ext.contains::<MyState>());
        assert_eq!(ext.get::<MyState>().unwrap().value, 42);

        let removed = ext.remove::<MyState>();
        assert_eq!(removed.unwrap().value, 42);
        assert!(ext.is_empty());
    }

    #[test]
    fn test_extensions_replace_returns_old() {
        struct Counter(i32);

        let mut ext = Extensions::new();
        ext.insert(Counter(1));
        let old = ext.insert(Counter(2));
        assert_eq!(old.unwrap().0, 1);
        assert_eq!(ext.get::<Counter>().unwrap().0, 2);
    }

    #[test]
    fn test_extensions_get_required() {
        struct Present;
        #[derive(Debug)]
        struct Missing;

        let mut ext = Extensions::new();
        ext.insert(Present);

        assert!(ext.get_required::<Present>().is_ok());
        let err = ext.get_required::<Missing>().unwrap_err();
        assert!(err.to_string().contains("extension missing"));
    }

    #[test]
    fn test_command_context_app_state() {
        struct Config {
            debug: bool,
        }

        let mut app_state = Extensions::new();
        app_state.insert(Config { debug: true });

        let ctx = CommandContext::new(vec!["list".into()], Arc::new(app_state));
        assert!(ctx.app_state.get::<Config>().unwrap().debug);
        assert!(ctx.extensions.is_empty());
    }

    #[test]
    fn test_plain_closure_adaptation() {
        let handler = lift(|name: String, count: i64| {
            Ok::<_, anyhow::Error>(format!("{name} x{count}"))
        });

        assert_eq!(handler.param_kinds(), &[ParamKind::Str, ParamKind::Int]);

        let ctx = CommandContext::default();
        let results = handler
            .invoke(&ctx, vec![ArgValue::Str("widget".into()), ArgValue::Int(3)])
            .unwrap();
        assert_eq!(results, vec![json!("widget x3")]);
    }

    #[test]
    fn test_context_closure_adaptation() {
        struct Greeting(String);

        let handler = lift(|ctx: &CommandContext, name: String| {
            let greeting = ctx.app_state.get_required::<Greeting>()?;
            Ok::<_, anyhow::Error>(format!("{}, {name}", greeting.0))
        });

        let mut app_state = Extensions::new();
        app_state.insert(Greeting("Hi".into()));
        let ctx = CommandContext::new(Vec::new(), Arc::new(app_state));

        let results = handler
            .invoke(&ctx, vec![ArgValue::Str("World".into())])
            .unwrap();
        assert_eq!(results, vec![json!("Hi, World")]);
    }

    #[test]
    fn test_zero_arity_handler() {
        let handler = lift(|| Ok::<_, anyhow::Error>(7i64));
        assert!(handler.param_kinds().is_empty());

        let ctx = CommandContext::default();
        let results = handler.invoke(&ctx, Vec::new()).unwrap();
        assert_eq!(results, vec![json!(7)]);
    }

    #[test]
    fn test_json_parameter() {
        let handler = lift(|payload: Value| {
            Ok::<_, anyhow::Error>(payload.get("n").cloned().unwrap_or(Value::Null))
        });
        assert_eq!(handler.param_kinds(), &[ParamKind::Json]);

        let ctx = CommandContext::default();
        let results = handler
            .invoke(&ctx, vec![ArgValue::Json(json!({"n": 5}))])
            .unwrap();
        assert_eq!(results, vec![json!(5)]);
    }

    #[test]
    fn test_unit_result_yields_no_values() {
        let handler = lift(|_flag: bool| Ok::<_, anyhow::Error>(()));

        let ctx = CommandContext::default();
        let results = handler.invoke(&ctx, vec![ArgValue::Bool(true)]).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_struct_result_serializes() {
        #[derive(Serialize)]
        struct Report {
            total: i64,
            ok: bool,
        }

        let handler = lift(|total: i64| Ok::<_, anyhow::Error>(Report { total, ok: true }));

        let ctx = CommandContext::default();
        let results = handler.invoke(&ctx, vec![ArgValue::Int(5)]).unwrap();
        assert_eq!(results, vec![json!({"total": 5, "ok": true})]);
    }

    #[test]
    fn test_handler_error_propagates() {
        let handler = lift(|n: i64| {
            if n == 0 {
                Err(anyhow::anyhow!("zero is not allowed"))
            } else {
                Ok(n)
            }
        });

        let ctx = CommandContext::default();
        let err = handler.invoke(&ctx, vec![ArgValue::Int(0)]).unwrap_err();
        assert!(err.to_string().contains("zero is not allowed"));
    }

    #[test]
    fn test_custom_error_type() {
        #[derive(Debug)]
        struct TooBig(i64);

        impl fmt::Display for TooBig {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} is too big", self.0)
            }
        }

        impl std::error::Error for TooBig {}

        let handler = lift(|n: i64| if n > 10 { Err(TooBig(n)) } else { Ok(n) });

        let ctx = CommandContext::default();
        let err = handler.invoke(&ctx, vec![ArgValue::Int(99)]).unwrap_err();
        assert!(err.to_string().contains("99 is too big"));
    }

    #[test]
    fn test_manual_command_handler_impl() {
        struct Echo;

        impl CommandHandler for Echo {
            fn param_kinds(&self) -> &[ParamKind] {
                &[ParamKind::Str]
            }

            fn invoke(
                &self,
                _ctx: &CommandContext,
                args: Vec<ArgValue>,
            ) -> Result<Vec<Value>, anyhow::Error> {
                match args.into_iter().next() {
                    Some(ArgValue::Str(s)) => Ok(vec![json!(s)]),
                    _ => Err(anyhow::anyhow!("expected one string")),
                }
            }
        }

        let handler = lift(Echo);
        let ctx = CommandContext::default();
        let results = handler
            .invoke(&ctx, vec![ArgValue::Str("ping".into())])
            .unwrap();
        assert_eq!(results, vec![json!("ping")]);
    }
}

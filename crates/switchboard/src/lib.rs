//! Typed command dispatch over string arguments.
//!
//! `switchboard` registers named commands, converts loosely-typed string or
//! map input into strongly-typed handler parameters, invokes the handler,
//! and hands the normalized results to pluggable result handlers. The same
//! dispatch core backs a CLI print path and (via `switchboard-http`) an
//! HTTP routing adapter.
//!
//! # Features
//!
//! - **Command registry**: flat ([`Dispatcher`]) and two-level grouped
//!   ([`GroupDispatcher`]) command trees, with a distinguished default
//!   command (the empty name)
//! - **Typed binding**: a command's argument schema ([`Arg`]/[`ArgKind`])
//!   is validated against the handler signature once, at registration
//! - **Per-call coercion**: strings, decimal integers and floats,
//!   case-insensitive booleans, enumerated selects, and JSON composites,
//!   with declared defaults for missing input
//! - **Result handlers**: ordered post-processing of successful results
//!   (printing, JSON, ad-hoc closures)
//! - **Observers**: synchronous notification of every dispatch of a found
//!   command
//!
//! # Example
//!
//! ```rust
//! use switchboard::{Arg, ArgKind, CommandContext, Dispatcher};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_command(
//!     "greet",
//!     "greets someone by name",
//!     |name: String| Ok::<_, anyhow::Error>(format!("Hello, {name}")),
//!     vec![Arg::new("name", ArgKind::Str)],
//!     vec![switchboard::results::from_fn(|results| {
//!         for value in results {
//!             println!("{value}");
//!         }
//!         Ok(())
//!     })],
//! )?;
//!
//! let ctx = CommandContext::default();
//! dispatcher.dispatch(&ctx, "greet", &["World".to_owned()])?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! # Error boundaries
//!
//! Registration fails fast: bad names, duplicate names, and handler/schema
//! mismatches are [`RegisterError`]s, raised before anything is stored.
//! Dispatch-time failures ([`DispatchError`]) cover lookup misses,
//! per-argument conversion, handler errors, and handler panics. A panic is
//! caught at the invoker boundary and surfaces as an error, never as an
//! unwound stack. Every `must_*` variant panics instead of returning and
//! belongs in process initialization only.

mod args;
mod bind;
mod dispatch;
mod group;
mod handler;

pub mod results;
pub mod serialize;

pub use args::{usage, Arg, ArgKind, ArgValue, ConvertError, ParamKind};

pub use bind::{BindError, BoundCommand, InvokeError};

pub use dispatch::{
    observer_fn, CommandObserver, DispatchError, Dispatcher, RegisterError, DEFAULT,
};

pub use group::GroupDispatcher;

pub use handler::{
    CommandContext, CommandHandler, Extensions, FnCommand, FromArgValue, IntoCommandHandler,
};

pub use results::{ResultsHandler, ResultsHandlerRef};

pub use serialize::SerializeError;

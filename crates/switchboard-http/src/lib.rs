//! Axum adapter for `switchboard` commands.
//!
//! A [`CommandRoute`] binds one command handler to an argument schema and
//! turns it into an axum handler function. Incoming requests are translated
//! into the command's named-argument map:
//!
//! - path variables map directly, by name;
//! - query parameters merge in via [`CommandRoute::with_query_params`]
//!   (repeated keys joined with `";"`, empty values skipped);
//! - the request body feeds a single argument
//!   ([`CommandRoute::body_arg`]) or is flattened field-by-field from a
//!   JSON object ([`CommandRoute::json_body_fields`]).
//!
//! Results become JSON responses through a pluggable [`ResultsWriter`];
//! failures go through an [`ErrorResponder`] so every request gets a
//! response. Argument conversion failures answer `400`, handler errors and
//! panics answer `500`.
//!
//! ```no_run
//! use axum::routing::get;
//! use axum::Router;
//! use switchboard::{Arg, ArgKind};
//! use switchboard_http::CommandRoute;
//!
//! let greet = CommandRoute::new(
//!     "greet",
//!     |name: String, polite: bool| {
//!         Ok::<_, anyhow::Error>(if polite {
//!             format!("Good day, {name}")
//!         } else {
//!             format!("Hi {name}")
//!         })
//!     },
//!     vec![
//!         Arg::new("name", ArgKind::Str),
//!         Arg::new("polite", ArgKind::Bool).default_value("false"),
//!     ],
//! )
//! .with_query_params();
//!
//! let app: Router = Router::new().route("/greet/:name", get(greet.into_handler()));
//! ```

mod respond;
mod route;

pub use respond::{ErrorResponder, JsonResultsWriter, ResultsWriter, StatusErrorResponder};
pub use route::CommandRoute;

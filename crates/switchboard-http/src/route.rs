//! Axum route construction for a single bound command.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use switchboard::{
    Arg, BoundCommand, CommandContext, Extensions, IntoCommandHandler,
};

use crate::respond::{ErrorResponder, JsonResultsWriter, ResultsWriter, StatusErrorResponder};

/// Where the request body feeds into the argument map, if anywhere.
enum BodySource {
    None,
    /// The whole body, verbatim, under one argument name.
    Arg(String),
    /// A JSON object body, one argument per field. An explicit mapping
    /// restricts and renames the fields; without one every field is taken
    /// under its own name.
    JsonFields(Option<HashMap<String, String>>),
}

/// One command exposed as an axum route.
///
/// Path variables become named arguments; query parameters and the request
/// body can be merged in via the builder methods. Binding the handler to its
/// argument schema happens here, once, so a bad route panics at process
/// initialization instead of per request.
///
/// ```no_run
/// use axum::routing::get;
/// use axum::Router;
/// use switchboard::{Arg, ArgKind};
/// use switchboard_http::CommandRoute;
///
/// let greet = CommandRoute::new(
///     "greet",
///     |name: String| Ok::<_, anyhow::Error>(format!("Hello, {name}")),
///     vec![Arg::new("name", ArgKind::Str)],
/// );
/// let app: Router = Router::new().route("/greet/:name", get(greet.into_handler()));
/// ```
pub struct CommandRoute {
    name: String,
    bound: BoundCommand,
    use_query_params: bool,
    body_source: BodySource,
    writer: Arc<dyn ResultsWriter>,
    responder: Arc<dyn ErrorResponder>,
    app_state: Arc<Extensions>,
}

impl CommandRoute {
    /// Binds `handler` against `args` under a route name used for logging
    /// and the dispatch context.
    ///
    /// Panics if the schema does not fit the handler. Routes are built at
    /// startup, where a panic is the right failure mode.
    pub fn new<M, H>(name: &str, handler: H, args: Vec<Arg>) -> Self
    where
        H: IntoCommandHandler<M>,
    {
        let bound = match BoundCommand::bind(Box::new(handler.into_command_handler()), args) {
            Ok(bound) => bound,
            Err(err) => panic!("route '{name}': {err}"),
        };
        Self {
            name: name.to_owned(),
            bound,
            use_query_params: false,
            body_source: BodySource::None,
            writer: Arc::new(JsonResultsWriter),
            responder: Arc::new(StatusErrorResponder),
            app_state: Arc::new(Extensions::new()),
        }
    }

    /// Merges query parameters into the argument map. Repeated keys are
    /// joined with `";"`; empty values are skipped. A query key overrides a
    /// path variable of the same name.
    pub fn with_query_params(mut self) -> Self {
        self.use_query_params = true;
        self
    }

    /// Feeds the whole request body, as UTF-8 text, to the argument `name`.
    ///
    /// Requests where `name` is already bound by a path variable or query
    /// parameter are rejected.
    pub fn body_arg(mut self, name: &str) -> Self {
        self.body_source = BodySource::Arg(name.to_owned());
        self
    }

    /// Flattens a JSON object body into the argument map, one argument per
    /// field. String fields pass through verbatim; everything else keeps its
    /// JSON rendering. Malformed bodies get a `400`.
    pub fn json_body_fields(mut self) -> Self {
        self.body_source = BodySource::JsonFields(None);
        self
    }

    /// Like [`Self::json_body_fields`], but only the mapped fields are
    /// taken, each under its mapped argument name.
    pub fn map_json_body_fields(mut self, fields_to_args: HashMap<String, String>) -> Self {
        self.body_source = BodySource::JsonFields(Some(fields_to_args));
        self
    }

    /// Replaces the default JSON results writer.
    pub fn with_results_writer(mut self, writer: Arc<dyn ResultsWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Replaces the default status-code error responder.
    pub fn with_error_responder(mut self, responder: Arc<dyn ErrorResponder>) -> Self {
        self.responder = responder;
        self
    }

    /// Shared application state handed to the handler via its context.
    pub fn with_app_state(mut self, app_state: Arc<Extensions>) -> Self {
        self.app_state = app_state;
        self
    }

    /// Produces the axum handler function for this route.
    pub fn into_handler(
        self,
    ) -> impl Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>>
           + Clone
           + Send
           + 'static {
        let route = Arc::new(self);
        move |req: Request| {
            let route = route.clone();
            Box::pin(async move { route.call(req).await })
        }
    }

    async fn call(&self, req: Request) -> Response {
        let (mut parts, body) = req.into_parts();
        let mut vars = path_vars(&mut parts).await;
        if self.use_query_params {
            merge_query_params(&mut vars, &parts);
        }
        if let Err(response) = self.merge_body(&mut vars, body).await {
            return response;
        }

        let ctx = CommandContext::new(vec![self.name.clone()], self.app_state.clone());
        match self.bound.invoke_named(&ctx, &vars) {
            Ok(results) => {
                tracing::info!(
                    target: "switchboard_http",
                    command = %self.name,
                    results = results.len(),
                    "command dispatched"
                );
                match catch_unwind(AssertUnwindSafe(|| self.writer.write_results(&results))) {
                    Ok(response) => response,
                    Err(_) => {
                        tracing::error!(
                            target: "switchboard_http",
                            command = %self.name,
                            "results writer panicked"
                        );
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                }
            }
            Err(err) => {
                tracing::error!(
                    target: "switchboard_http",
                    command = %self.name,
                    error = %err,
                    "command failed"
                );
                self.responder.respond(&err)
            }
        }
    }

    async fn merge_body(
        &self,
        vars: &mut HashMap<String, String>,
        body: Body,
    ) -> Result<(), Response> {
        let name_taken = match &self.body_source {
            BodySource::None => return Ok(()),
            BodySource::Arg(name) if vars.contains_key(name) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = name_taken {
            tracing::error!(
                target: "switchboard_http",
                command = %self.name,
                arg = %name,
                "body argument already bound by the request"
            );
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("argument '{name}' already bound"),
            )
                .into_response());
        }

        let bytes = to_bytes(body, usize::MAX).await.map_err(|err| {
            tracing::error!(
                target: "switchboard_http",
                command = %self.name,
                error = %err,
                "failed to read request body"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })?;

        match &self.body_source {
            BodySource::None => {}
            BodySource::Arg(name) => {
                vars.insert(name.clone(), String::from_utf8_lossy(&bytes).into_owned());
            }
            BodySource::JsonFields(mapping) => {
                let parsed: Value = serde_json::from_slice(&bytes).map_err(|err| {
                    (StatusCode::BAD_REQUEST, format!("invalid JSON body: {err}"))
                        .into_response()
                })?;
                let Value::Object(fields) = parsed else {
                    return Err(
                        (StatusCode::BAD_REQUEST, "JSON body is not an object".to_owned())
                            .into_response(),
                    );
                };
                match mapping {
                    None => {
                        for (field, value) in fields {
                            vars.insert(field, stringify(value));
                        }
                    }
                    Some(fields_to_args) => {
                        for (field, arg) in fields_to_args {
                            if let Some(value) = fields.get(field) {
                                vars.insert(arg.clone(), stringify(value.clone()));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Path variables as a plain string map; routes without any yield an empty
/// map rather than a rejection.
async fn path_vars(parts: &mut Parts) -> HashMap<String, String> {
    match Path::<HashMap<String, String>>::from_request_parts(parts, &()).await {
        Ok(Path(vars)) => vars,
        Err(_) => HashMap::new(),
    }
}

fn merge_query_params(vars: &mut HashMap<String, String>, parts: &Parts) {
    let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) else {
        return;
    };
    let mut merged: HashMap<String, String> = HashMap::new();
    for (key, value) in pairs {
        if value.is_empty() {
            continue;
        }
        match merged.get_mut(&key) {
            Some(joined) => {
                joined.push(';');
                joined.push_str(&value);
            }
            None => {
                merged.insert(key, value);
            }
        }
    }
    vars.extend(merged);
}

/// JSON field rendering for the string argument map: strings verbatim,
/// everything else as its JSON text.
fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

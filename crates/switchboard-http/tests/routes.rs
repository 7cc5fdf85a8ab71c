//! Request-to-response coverage for command routes, driven through the
//! router with `tower::ServiceExt::oneshot`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use switchboard::{Arg, ArgKind, CommandContext, Extensions};
use switchboard_http::CommandRoute;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn greet_route() -> CommandRoute {
    CommandRoute::new(
        "greet",
        |name: String| Ok::<_, anyhow::Error>(format!("Hello, {name}")),
        vec![Arg::new("name", ArgKind::Str)],
    )
}

#[tokio::test]
async fn path_variable_feeds_the_argument() {
    let app = Router::new().route("/greet/:name", get(greet_route().into_handler()));
    let response = app
        .oneshot(Request::get("/greet/World").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("Hello, World"));
}

#[tokio::test]
async fn missing_argument_is_bad_request() {
    let app = Router::new().route("/greet", get(greet_route().into_handler()));
    let response = app
        .oneshot(Request::get("/greet").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("missing required argument 'name'"));
}

#[tokio::test]
async fn query_parameters_merge_with_semicolon_join() {
    let route = CommandRoute::new(
        "tags",
        |tags: String| Ok::<_, anyhow::Error>(tags),
        vec![Arg::new("tags", ArgKind::Str)],
    )
    .with_query_params();
    let app = Router::new().route("/tags", get(route.into_handler()));
    let response = app
        .oneshot(
            Request::get("/tags?tags=a&tags=&tags=b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("a;b"));
}

#[tokio::test]
async fn unit_result_is_no_content() {
    let route = CommandRoute::new("ping", || Ok::<_, anyhow::Error>(()), vec![]);
    let app = Router::new().route("/ping", get(route.into_handler()));
    let response = app
        .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn handler_error_is_internal_server_error() {
    let route = CommandRoute::new(
        "fail",
        || Err::<(), _>(anyhow::anyhow!("backend unavailable")),
        vec![],
    );
    let app = Router::new().route("/fail", get(route.into_handler()));
    let response = app
        .oneshot(Request::get("/fail").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("backend unavailable"));
}

#[tokio::test]
async fn handler_panic_is_contained_as_internal_server_error() {
    let route = CommandRoute::new(
        "div",
        |a: i64, b: i64| Ok::<_, anyhow::Error>(a / b),
        vec![Arg::new("a", ArgKind::Int), Arg::new("b", ArgKind::Int)],
    )
    .with_query_params();
    let app = Router::new().route("/div", get(route.into_handler()));
    let response = app
        .oneshot(Request::get("/div?a=1&b=0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("panicked"));
}

#[tokio::test]
async fn request_body_feeds_a_named_argument() {
    let route = CommandRoute::new(
        "echo",
        |text: String| Ok::<_, anyhow::Error>(text.to_uppercase()),
        vec![Arg::new("text", ArgKind::Str)],
    )
    .body_arg("text");
    let app = Router::new().route("/echo", post(route.into_handler()));
    let response = app
        .oneshot(Request::post("/echo").body(Body::from("hello")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("HELLO"));
}

#[tokio::test]
async fn body_fed_composite_argument() {
    let route = CommandRoute::new(
        "sum",
        |numbers: Value| {
            let total: i64 = numbers
                .as_array()
                .map(|a| a.iter().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            Ok::<_, anyhow::Error>(total)
        },
        vec![Arg::new("numbers", ArgKind::Json)],
    )
    .body_arg("numbers");
    let app = Router::new().route("/sum", post(route.into_handler()));
    let response = app
        .oneshot(Request::post("/sum").body(Body::from("[1, 2, 3]")).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!(6));
}

#[tokio::test]
async fn body_argument_conflicting_with_path_variable_is_rejected() {
    let route = CommandRoute::new(
        "echo",
        |text: String| Ok::<_, anyhow::Error>(text),
        vec![Arg::new("text", ArgKind::Str)],
    )
    .body_arg("text");
    let app = Router::new().route("/echo/:text", post(route.into_handler()));
    let response = app
        .oneshot(
            Request::post("/echo/already-here")
                .body(Body::from("from the body"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("already bound"));
}

#[tokio::test]
async fn json_body_fields_flatten_into_arguments() {
    let route = CommandRoute::new(
        "resize",
        |width: i64, height: i64, label: String| {
            Ok::<_, anyhow::Error>(format!("{label}: {width}x{height}"))
        },
        vec![
            Arg::new("width", ArgKind::Int),
            Arg::new("height", ArgKind::Int),
            Arg::new("label", ArgKind::Str),
        ],
    )
    .json_body_fields();
    let app = Router::new().route("/resize", post(route.into_handler()));
    let response = app
        .oneshot(
            Request::post("/resize")
                .body(Body::from(
                    json!({"width": 800, "height": 600, "label": "thumbnail"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("thumbnail: 800x600"));
}

#[tokio::test]
async fn mapped_json_body_fields_rename_and_restrict() {
    let route = CommandRoute::new(
        "resize",
        |width: i64| Ok::<_, anyhow::Error>(width * 2),
        vec![Arg::new("width", ArgKind::Int)],
    )
    .map_json_body_fields(HashMap::from([("w".to_owned(), "width".to_owned())]));
    let app = Router::new().route("/resize", post(route.into_handler()));
    let response = app
        .oneshot(
            Request::post("/resize")
                .body(Body::from(json!({"w": 21, "ignored": true}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!(42));
}

#[tokio::test]
async fn malformed_json_body_is_bad_request() {
    let route = CommandRoute::new(
        "resize",
        |width: i64| Ok::<_, anyhow::Error>(width),
        vec![Arg::new("width", ArgKind::Int)],
    )
    .json_body_fields();
    let app = Router::new().route("/resize", post(route.into_handler()));
    let response = app
        .oneshot(
            Request::post("/resize")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn app_state_reaches_the_handler_context() {
    struct Greeting(&'static str);

    let mut state = Extensions::new();
    state.insert(Greeting("Welcome"));
    let route = CommandRoute::new(
        "greet",
        |ctx: &CommandContext, name: String| {
            let greeting = ctx.app_state.get_required::<Greeting>()?;
            Ok::<_, anyhow::Error>(format!("{}, {name}", greeting.0))
        },
        vec![Arg::new("name", ArgKind::Str)],
    )
    .with_app_state(Arc::new(state));
    let app = Router::new().route("/greet/:name", get(route.into_handler()));
    let response = app
        .oneshot(Request::get("/greet/Ada").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("Welcome, Ada"));
}

#[tokio::test]
async fn multiple_path_variables_and_defaults() {
    let route = CommandRoute::new(
        "move",
        |from: String, to: String, force: bool| {
            Ok::<_, anyhow::Error>(format!("{from} -> {to} (force: {force})"))
        },
        vec![
            Arg::new("from", ArgKind::Str),
            Arg::new("to", ArgKind::Str),
            Arg::new("force", ArgKind::Bool).default_value("false"),
        ],
    )
    .with_query_params();
    let app = Router::new().route("/move/:from/:to", get(route.into_handler()));

    let response = app
        .clone()
        .oneshot(Request::get("/move/a/b").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!("a -> b (force: false)"));

    let response = app
        .oneshot(
            Request::get("/move/a/b?force=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!("a -> b (force: true)"));
}

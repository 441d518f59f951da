use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    normalize_path::NormalizePath, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::metrics::track_metrics;
use crate::state::AppState;
use crate::{health, projects, users};

pub const API_PREFIX: &str = "/v1/api";

/// Every public route below the API prefix with the methods it answers.
pub const ROUTES: &[(&str, &[&str])] = &[
    ("/", &["GET"]),
    ("/users", &["GET", "POST"]),
    ("/users/auth", &["POST"]),
    ("/users/:email", &["GET"]),
    ("/projects", &["GET", "POST"]),
    ("/projects/:id", &["GET", "PUT", "DELETE"]),
    ("/sys/health", &["GET"]),
    ("/sys/health/metrics", &["GET"]),
];

async fn index() -> Json<BTreeMap<String, Vec<&'static str>>> {
    let routes = ROUTES
        .iter()
        .map(|(path, methods)| {
            let full = match *path {
                "/" => API_PREFIX.to_string(),
                p => format!("{API_PREFIX}{p}"),
            };
            (full, methods.to_vec())
        })
        .collect();
    Json(routes)
}

pub fn build_app(state: AppState) -> Router {
    let routes = Router::new()
        .nest(
            API_PREFIX,
            Router::new()
                .route("/", get(index))
                .merge(users::router())
                .merge(projects::router())
                .merge(health::router()),
        )
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state);
    with_middleware(routes)
}

/// Wraps a fully routed app in the shared middleware chain. Trailing slashes
/// are trimmed before routing, so `/v1/api/projects/` reaches `/v1/api/projects`.
fn with_middleware(routes: Router) -> Router {
    Router::new()
        .fallback_service(NormalizePath::trim_trailing_slash(routes))
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{app, send};

    #[tokio::test]
    async fn index_lists_every_route() {
        let res = send(&app(), Method::GET, API_PREFIX, None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(body["/v1/api/projects/:id"], serde_json::json!(["GET", "PUT", "DELETE"]));
        assert_eq!(body.as_object().unwrap().len(), ROUTES.len());
    }

    #[tokio::test]
    async fn every_listed_route_is_wired() {
        let app = app();
        for (path, methods) in ROUTES {
            let path = path
                .replace(":email", "someone@example.com")
                .replace(":id", "missing");
            let uri = match path.as_str() {
                "/" => API_PREFIX.to_string(),
                p => format!("{API_PREFIX}{p}"),
            };
            for method in *methods {
                let method = Method::from_bytes(method.as_bytes()).unwrap();
                let res = send(&app, method.clone(), &uri, None, None).await;
                assert_ne!(res.status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
                // A router miss is a bodiless 404; handler 404s carry a message.
                assert!(
                    !(res.status == StatusCode::NOT_FOUND && res.body.is_empty()),
                    "{method} {uri} is not routed"
                );
            }
        }
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let res = send(&app(), Method::GET, "/v1/api/nothing-here", None, None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn trailing_slash_is_ignored() {
        let app = app();
        let res = send(&app, Method::GET, "/v1/api/projects/", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json(), serde_json::json!([]));

        let res = send(&app, Method::GET, "/v1/api/", None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json().as_object().unwrap().len(), ROUTES.len());
    }

    #[tokio::test]
    async fn panicking_handler_answers_500() {
        async fn boom() -> &'static str {
            panic!("handler blew up")
        }
        let app = with_middleware(Router::new().route("/boom", get(boom)));

        let res = send(&app, Method::GET, "/boom", None, None).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        // The service keeps answering after a panic.
        let res = send(&app, Method::GET, "/boom/", None, None).await;
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn json_content_type_is_the_default() {
        let req = axum::http::Request::builder()
            .uri("/v1/api/projects")
            .body(axum::body::Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    }
}

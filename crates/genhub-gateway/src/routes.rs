use axum::{
    http::{HeaderValue, Method, Uri},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{admin, ai, claim, profile, session};

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/claim", post(claim::claim_serial))
        .route("/api/admin/delete-user", post(admin::delete_user))
        .route("/api/admin/reset-user", post(admin::reset_user))
        .route("/api/admin/update-user", post(admin::update_user))
        .route("/api/generate-bio", post(ai::generate_bio))
        .route("/api/models", get(ai::list_models))
        .route("/api/features", get(profile::features))
        .route("/api/profile", post(profile::update_own_profile))
        .route("/api/profile/:slug", get(profile::public_profile))
        .route("/api/profile/:slug/vcard", get(profile::vcard))
        .fallback(page_shell)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::guard_requests,
        ));

    let router = match cors_layer(&state.config.allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
            .allow_credentials(true),
    )
}

async fn health() -> &'static str {
    "OK"
}

/// Anything the router does not know. Unknown API paths get a JSON 404;
/// page paths that made it past the guard get the client shell.
async fn page_shell(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::NotFound(format!("no route for {}", path)).into_response();
    }
    Html(SHELL).into_response()
}

const SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>GenHub</title>
<link rel="stylesheet" href="/assets/app.css">
</head>
<body>
<div id="app"></div>
<script type="module" src="/assets/app.js"></script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    fn page(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("genhub_session={}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(res: &axum::response::Response) -> &str {
        res.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let h = Harness::new();
        let res = h.send(page("/health", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn anonymous_is_sent_to_login() {
        let h = Harness::new();
        let res = h.send(page("/dashboard/cards", None)).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&res), "/login");

        let res = h.send(page("/jane", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = h.send(page("/pricing", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dotted_dashboard_path_is_guarded() {
        let h = Harness::new();
        let res = h.send(page("/dashboard/report.pdf", None)).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&res), "/login");

        let res = h.send(page("/robots.txt", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unactivated_account_goes_to_activate() {
        let h = Harness::new();
        let pending = h.seed_user("u1", false, false);
        let res = h.send(page("/settings", Some(&pending))).await;
        assert_eq!(location(&res), "/activate");

        let active = h.seed_user("u2", true, false);
        let res = h.send(page("/activate", Some(&active))).await;
        assert_eq!(location(&res), "/dashboard");
        let res = h.send(page("/login", Some(&active))).await;
        assert_eq!(location(&res), "/dashboard");
        let res = h.send(page("/dashboard", Some(&active))).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unreachable_auth_respects_policy() {
        let open = Harness::builder().failing_auth(true).build();
        let res = open.send(page("/dashboard", Some("anything"))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let closed = Harness::builder().failing_auth(false).build();
        let res = closed.send(page("/dashboard", Some("anything"))).await;
        assert_eq!(location(&res), "/login");

        let (status, json) = closed.get("/api/features", Some("anything")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "authentication service unavailable");
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_404() {
        let h = Harness::new();
        let (status, json) = h.get("/api/nothing-here", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("/api/nothing-here"));
    }
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    AppState,
    config::Config,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery, FormToken},
    models::{DeleteReportedBody, LinkRow, PageQuery, PageResponse, TitleRow, UserRow},
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/titles/paginate", get(paginate_titles))
        .route("/titles/{id}", delete(delete_title))
        .route("/links/paginate", get(paginate_links))
        .route("/links/delete-reported", post(delete_reported_links))
        .route("/links/{id}", delete(delete_link))
        .route("/users/paginate", get(paginate_users))
        .route("/users/{id}", delete(delete_user))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// A blank `FORM_TOKEN` turns the form token check off.
pub fn token_check_disabled(config: &Config) -> bool {
    config.form_token.trim().is_empty()
}

fn verify_token(state: &AppState, provided: Option<&str>) -> AppResult<()> {
    let expected = state.config.form_token.trim();
    if token_check_disabled(&state.config) || provided == Some(expected) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

pub async fn paginate_titles(
    State(state): State<Arc<AppState>>,
    AppQuery(q): AppQuery<PageQuery>,
) -> AppResult<Json<PageResponse<TitleRow>>> {
    verify_token(&state, q.token.as_deref())?;
    Ok(Json(state.catalog.paginate_titles(&q).await?))
}

pub async fn paginate_links(
    State(state): State<Arc<AppState>>,
    AppQuery(q): AppQuery<PageQuery>,
) -> AppResult<Json<PageResponse<LinkRow>>> {
    verify_token(&state, q.token.as_deref())?;
    Ok(Json(state.catalog.paginate_links(&q).await?))
}

pub async fn paginate_users(
    State(state): State<Arc<AppState>>,
    AppQuery(q): AppQuery<PageQuery>,
) -> AppResult<Json<PageResponse<UserRow>>> {
    verify_token(&state, q.token.as_deref())?;
    Ok(Json(state.catalog.paginate_users(&q).await?))
}

pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    FormToken(token): FormToken,
) -> AppResult<Json<String>> {
    verify_token(&state, token.as_deref())?;
    if !state.catalog.delete_title(id).await? {
        return Err(AppError::not_found(format!("title {id}")));
    }
    info!(title_id = id, "title deleted");
    Ok(Json("Title deleted successfully.".to_string()))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    FormToken(token): FormToken,
) -> AppResult<Json<String>> {
    verify_token(&state, token.as_deref())?;
    if !state.catalog.delete_link(id).await? {
        return Err(AppError::not_found(format!("link {id}")));
    }
    info!(link_id = id, "link deleted");
    Ok(Json("Link deleted successfully.".to_string()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    FormToken(token): FormToken,
) -> AppResult<Json<String>> {
    verify_token(&state, token.as_deref())?;
    if !state.catalog.delete_user(id).await? {
        return Err(AppError::not_found(format!("user {id}")));
    }
    info!(user_id = id, "user deleted");
    Ok(Json("User deleted successfully.".to_string()))
}

pub async fn delete_reported_links(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<DeleteReportedBody>,
) -> AppResult<Json<String>> {
    verify_token(&state, body.token.as_deref())?;
    if body.reports < 1 {
        return Err(AppError::bad_request("reports must be at least 1"));
    }
    let deleted = state.catalog.delete_reported_links(body.reports).await?;
    info!(min_reports = body.reports, deleted = deleted, "reported links deleted");
    Ok(Json(format!("Deleted {deleted} links with {} or more reports.", body.reports)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        catalog::tests::{seed_link, seed_title, seed_user, test_catalog},
        config::{Config, SchedulerConfig, TableConfig},
        models::TitleType,
    };

    async fn app() -> (Router, Arc<AppState>) {
        app_with_token("secret").await
    }

    async fn app_with_token(token: &str) -> (Router, Arc<AppState>) {
        let config = Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            form_token: token.to_string(),
            scheduler: SchedulerConfig::default(),
            table: TableConfig::default(),
        };
        let state = Arc::new(AppState { config: Arc::new(config), catalog: test_catalog().await });
        (router(state.clone()), state)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(json.to_string())
            },
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn paginate_titles_returns_page_shape() {
        let (app, state) = app().await;
        for i in 0..3 {
            seed_title(&state.catalog, &format!("Alien {i}"), TitleType::Movie, i).await;
        }
        seed_title(&state.catalog, "Firefly", TitleType::Series, 9).await;

        let (status, body) =
            send(app, Method::GET, "/titles/paginate?page=1&perPage=2&type=movie&_token=secret", None)
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalPages"], json!(1.5));
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["type"], "movie");
        assert!(items[0].get("release_date").is_some());
    }

    #[tokio::test]
    async fn paginate_rejects_bad_token() {
        let (app, _) = app().await;

        let (status, body) = send(app, Method::GET, "/users/paginate?_token=nope", None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("token"));
    }

    #[tokio::test]
    async fn paginate_links_nests_title_reference() {
        let (app, state) = app().await;
        let t = seed_title(&state.catalog, "Heat", TitleType::Movie, 1).await;
        seed_link(&state.catalog, t, "vidzi", 2).await;

        let (status, body) = send(app, Method::GET, "/links/paginate?_token=secret", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["title"]["title"], "Heat");
        assert_eq!(body["items"][0]["flag_count"], 2);
    }

    #[tokio::test]
    async fn delete_title_then_not_found() {
        let (app, state) = app().await;
        let t = seed_title(&state.catalog, "Heat", TitleType::Movie, 1).await;
        let uri = format!("/titles/{t}");

        let (status, body) =
            send(app.clone(), Method::DELETE, &uri, Some(json!({ "_token": "secret" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Title deleted successfully."));

        let (status, body) =
            send(app, Method::DELETE, &uri, Some(json!({ "_token": "secret" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn delete_user_requires_token() {
        let (app, state) = app().await;
        let u = seed_user(&state.catalog, "alice", 1).await;

        let (status, _) =
            send(app, Method::DELETE, &format!("/users/{u}"), Some(json!({}))).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        let left = state.catalog.paginate_users(&PageQuery::default()).await.unwrap();
        assert_eq!(left.items.len(), 1);
    }

    #[tokio::test]
    async fn delete_reported_links_validates_threshold() {
        let (app, state) = app().await;
        let t = seed_title(&state.catalog, "Heat", TitleType::Movie, 1).await;
        seed_link(&state.catalog, t, "vidzi", 12).await;

        let (status, _) = send(
            app.clone(),
            Method::POST,
            "/links/delete-reported",
            Some(json!({ "_token": "secret", "reports": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app,
            Method::POST,
            "/links/delete-reported",
            Some(json!({ "_token": "secret", "reports": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Deleted 1 links with 10 or more reports."));
    }

    #[tokio::test]
    async fn delete_without_body_is_forbidden() {
        let (app, state) = app().await;
        let u = seed_user(&state.catalog, "alice", 1).await;

        let (status, body) = send(app, Method::DELETE, &format!("/users/{u}"), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("token"));
    }

    #[tokio::test]
    async fn malformed_requests_answer_json_errors() {
        let (app, _) = app().await;

        let (status, body) =
            send(app.clone(), Method::GET, "/titles/paginate?page=abc&_token=secret", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) =
            send(app.clone(), Method::DELETE, "/links/abc", Some(json!({ "_token": "secret" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(
            app,
            Method::POST,
            "/links/delete-reported",
            Some(json!({ "_token": "secret", "reports": "many" })),
        )
        .await;
        assert!(status.is_client_error());
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn paginate_far_past_last_page_is_empty() {
        let (app, state) = app().await;
        seed_title(&state.catalog, "Heat", TitleType::Movie, 1).await;

        let (status, body) = send(
            app,
            Method::GET,
            "/titles/paginate?page=18446744073709551615&perPage=100&_token=secret",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"], json!([]));
        assert_eq!(body["totalPages"], json!(0.01));
    }

    #[tokio::test]
    async fn blank_form_token_disables_check() {
        let (app, state) = app_with_token("  ").await;
        assert!(token_check_disabled(&state.config));

        let (status, _) = send(app, Method::GET, "/users/paginate", None).await;

        assert_eq!(status, StatusCode::OK);
    }
}

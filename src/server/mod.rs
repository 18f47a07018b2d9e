//! HTTP review shell.
//!
//! Routes:
//! - `GET /`, `POST /login`, `POST /logout` are open.
//! - Everything else requires the session cookie set by `/login`.

mod error;
mod handlers;
mod page;
mod session;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tracing::info;

use crate::config::ServerConfig;
use crate::export::TableLayout;
use crate::extract::Extractor;

pub use error::ApiError;
pub use session::SessionStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
    pub sessions: SessionStore,
    /// SHA-256 of `server.password`; `None` accepts any login.
    pub password_hash: Option<[u8; 32]>,
    pub layout: TableLayout,
    pub concurrency: usize,
    /// Budget for the unpacked content of one uploaded zip.
    pub max_expanded_bytes: u64,
}

/// Unpacked zip content may be this many times `server.max_upload_mb`.
pub const ZIP_EXPANSION_FACTOR: u64 = 10;

impl AppState {
    pub fn new(extractor: Extractor, config: &ServerConfig, layout: TableLayout) -> Self {
        Self {
            extractor: Arc::new(extractor),
            sessions: SessionStore::new(Duration::from_secs(config.session_ttl_secs)),
            password_hash: (!config.password.is_empty())
                .then(|| session::hash_secret(&config.password)),
            layout,
            concurrency: 4,
            max_expanded_bytes: (config.max_upload_mb as u64)
                .saturating_mul(1024 * 1024)
                .saturating_mul(ZIP_EXPANSION_FACTOR),
        }
    }
}

/// Id of the authenticated session, injected by [`require_session`].
#[derive(Clone, Debug)]
pub struct SessionId(pub String);

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let protected = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/convert", post(handlers::convert))
        .route("/batch", post(handlers::batch))
        .route("/progress", get(handlers::progress))
        .route("/document", get(handlers::preview_document))
        .route("/table", get(handlers::get_table).put(handlers::put_table))
        .route("/table/rows", post(handlers::add_row))
        .route("/download", get(handlers::download))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/", get(handlers::index))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .merge(protected)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let id = handlers::cookie_session(req.headers())
        .map(String::from)
        .ok_or(ApiError::Unauthorized)?;

    if !state.sessions.touch(&id).await {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(SessionId(id));
    Ok(next.run(req).await)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(bind: &str, state: AppState, max_upload_bytes: usize) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Review server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state, max_upload_bytes))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down review server");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceDocument;
    use crate::error::PipelineError;
    use crate::export::Table;
    use crate::extract::{Entity, EntityExtractor, ExtractedDocument};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{self, StatusCode, header};
    use http_body_util::BodyExt;
    use std::io::Write;
    use tower::ServiceExt;

    const BOUNDARY: &str = "labextract-test-boundary";

    struct FakeExtractor;

    #[async_trait]
    impl EntityExtractor for FakeExtractor {
        async fn extract(&self, doc: &SourceDocument) -> Result<ExtractedDocument, PipelineError> {
            if String::from_utf8_lossy(&doc.bytes).contains("fail") {
                return Err(PipelineError::extraction("processor unavailable"));
            }
            Ok(ExtractedDocument {
                text: String::new(),
                entities: vec![
                    Entity::new("TestTypeandResult", "WBC\nNormal"),
                    Entity::new("TestTypeandResult", "Hemoglobin\nLow\n13.2"),
                    Entity::new("dateoftest", "2024-07-18"),
                ],
            })
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn app() -> Router {
        let config = ServerConfig {
            password: "secret".to_string(),
            ..ServerConfig::default()
        };
        let state = AppState::new(
            Extractor::from_backend(Box::new(FakeExtractor)),
            &config,
            TableLayout::DateHeader,
        );
        router(state, 10 * 1024 * 1024)
    }

    fn multipart(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in files {
            write!(
                body,
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .unwrap();
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        write!(body, "--{BOUNDARY}--\r\n").unwrap();
        body
    }

    fn upload_request(uri: &str, cookie: Option<&str>, files: &[(&str, &[u8])]) -> Request {
        let mut builder = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(multipart(files))).unwrap()
    }

    fn get(uri: &str, cookie: &str) -> Request {
        http::Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    async fn login(app: &Router) -> String {
        let req = http::Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("password=secret"))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_shows_login_form_without_session() {
        let response = app()
            .oneshot(http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("action=\"/login\""));
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("password=guess"))
            .unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let app = app();
        let response = app
            .clone()
            .oneshot(get("/table", "labextract_session=forged"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(upload_request("/upload", None, &[("a.pdf", b"%PDF-1.4")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_upload_review_edit_download() {
        let app = app();
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(upload_request("/upload", Some(&cookie), &[("report.pdf", b"%PDF-1.4 cbc")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["date"], "2024-07-18");
        assert_eq!(body["records"], 2);
        assert_eq!(body["table"]["rows"][1][1], "Low 13.2");

        let response = app.clone().oneshot(get("/document", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(body_string(response).await, "%PDF-1.4 cbc");

        let add_row = http::Request::builder()
            .method("POST")
            .uri("/table/rows")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(add_row).await.unwrap();
        let table: Table = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(table.rows.len(), 3);

        let mut edited = table.clone();
        edited.rows[2] = vec!["Platelets".to_string(), "250".to_string()];
        let put = http::Request::builder()
            .method("PUT")
            .uri("/table")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&edited).unwrap()))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/download", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("edited_results.csv")
        );
        assert_eq!(
            body_string(response).await,
            "TestType,2024-07-18\nWBC,Normal\nHemoglobin,Low 13.2\nPlatelets,250\n"
        );
    }

    #[tokio::test]
    async fn test_put_table_accepts_csv() {
        let app = app();
        let cookie = login(&app).await;

        let put = http::Request::builder()
            .method("PUT")
            .uri("/table")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
            .body(Body::from("TestType,2024-07-18\nWBC,5.4\nSodium,High 150\n"))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/table", &cookie)).await.unwrap();
        let table: Table = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(table.headers, vec!["TestType", "2024-07-18"]);
        assert_eq!(table.rows[1], vec!["Sodium", "High 150"]);
    }

    #[tokio::test]
    async fn test_put_table_rejects_malformed_json() {
        let app = app();
        let cookie = login(&app).await;

        let put = http::Request::builder()
            .method("PUT")
            .uri("/table")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"headers\": 3}"))
            .unwrap();
        let response = app.oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_before_upload_is_not_found() {
        let app = app();
        let cookie = login(&app).await;
        let response = app.oneshot(get("/download", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_errors() {
        let app = app();
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(upload_request("/upload", Some(&cookie), &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(upload_request("/upload", Some(&cookie), &[("scan.png", b"\x89PNG\r\n")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = app
            .oneshot(upload_request("/upload", Some(&cookie), &[("bad.pdf", b"%PDF fail")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_convert_returns_csv_attachment() {
        let app = app();
        let cookie = login(&app).await;
        let response = app
            .oneshot(upload_request("/convert", Some(&cookie), &[("report.pdf", b"%PDF-1.4")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_DISPOSITION]
                .to_str()
                .unwrap()
                .contains("test_results.csv")
        );
        assert!(body_string(response).await.starts_with("TestType,2024-07-18\nWBC,Normal\n"));
    }

    #[tokio::test]
    async fn test_batch_merges_and_reports_progress() {
        let app = app();
        let cookie = login(&app).await;

        let response = app.clone().oneshot(get("/progress", &cookie)).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["complete"], false);

        let response = app
            .clone()
            .oneshot(upload_request(
                "/batch",
                Some(&cookie),
                &[("a.pdf", b"%PDF a"), ("b.pdf", b"%PDF fail"), ("c.pdf", b"%PDF c")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["processed"], 2);
        assert_eq!(body["failed"][0]["name"], "b.pdf");
        // two rows, blank separator, second header, two rows
        assert_eq!(body["table"]["rows"].as_array().unwrap().len(), 6);

        let response = app.oneshot(get("/progress", &cookie)).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["complete"], true);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let app = app();
        let cookie = login(&app).await;

        let logout = http::Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(logout).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app.oneshot(get("/progress", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_zip_budget_follows_upload_limit() {
        let config = ServerConfig {
            max_upload_mb: 2,
            ..ServerConfig::default()
        };
        let state = AppState::new(
            Extractor::from_backend(Box::new(FakeExtractor)),
            &config,
            TableLayout::DateHeader,
        );
        assert_eq!(state.max_expanded_bytes, 2 * 1024 * 1024 * ZIP_EXPANSION_FACTOR);
    }

    #[tokio::test]
    async fn test_batch_rejects_zip_expanding_past_budget() {
        let config = ServerConfig {
            password: "secret".to_string(),
            ..ServerConfig::default()
        };
        let mut state = AppState::new(
            Extractor::from_backend(Box::new(FakeExtractor)),
            &config,
            TableLayout::DateHeader,
        );
        state.max_expanded_bytes = 4 * 1024;
        let app = router(state, 10 * 1024 * 1024);
        let cookie = login(&app).await;

        let mut member = b"%PDF-1.4 ".to_vec();
        member.extend(std::iter::repeat_n(0u8, 64 * 1024));
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("big.pdf", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&member).unwrap();
        let bundle = writer.finish().unwrap().into_inner();

        let response = app
            .oneshot(upload_request("/batch", Some(&cookie), &[("bundle.zip", bundle.as_slice())]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body_string(response).await.contains("bundle.zip"));
    }

    #[tokio::test]
    async fn test_open_server_accepts_any_password() {
        let state = AppState::new(
            Extractor::from_backend(Box::new(FakeExtractor)),
            &ServerConfig::default(),
            TableLayout::DateHeader,
        );
        assert!(state.password_hash.is_none());

        let req = http::Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("password=anything"))
            .unwrap();
        let response = router(state, 1024 * 1024).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}

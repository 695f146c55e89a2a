//! REST API Server for the equity dossier
//!
//! GET for a plain lookup, multipart POST when investor documents are
//! attached. Every response uses the [`ApiResponse`] envelope.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::documents::DocumentKind;
use crate::dossier::DossierService;
use crate::error::DossierError;
use crate::models::UploadedDocument;

/// Upload cap for one multipart request.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct DossierQuery {
    #[serde(default)]
    pub q: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<DossierService>,
}

fn status_for(error: &DossierError) -> StatusCode {
    if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else if error.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn failure(error: DossierError) -> (StatusCode, Json<ApiResponse>) {
    let status = status_for(&error);
    warn!(status = status.as_u16(), "Dossier request failed: {}", error);
    (status, Json(ApiResponse::error(error.to_string())))
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Dossier Endpoints
/// =============================

async fn get_dossier(
    State(state): State<ApiState>,
    Query(params): Query<DossierQuery>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("Received dossier request: {}", params.q);

    match state.service.build(&params.q, &[]).await {
        Ok(dossier) => (StatusCode::OK, Json(ApiResponse::success(dossier))),
        Err(e) => failure(e),
    }
}

/// Split a multipart body into the query text and the uploaded documents.
async fn read_upload_form(
    mut multipart: Multipart,
) -> Result<(String, Vec<UploadedDocument>), DossierError> {
    let mut query = String::new();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DossierError::InvalidRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("query") => {
                query = field
                    .text()
                    .await
                    .map_err(|e| DossierError::InvalidRequest(e.to_string()))?;
            }
            Some("documents") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                if file_name.is_empty() {
                    continue;
                }
                DocumentKind::from_file_name(&file_name)?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| DossierError::InvalidRequest(e.to_string()))?;
                uploads.push(UploadedDocument {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    Ok((query, uploads))
}

async fn post_dossier(
    State(state): State<ApiState>,
    multipart: Multipart,
) -> (StatusCode, Json<ApiResponse>) {
    let (query, uploads) = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(e) => return failure(e),
    };

    info!(
        "Received dossier request with {} document(s): {}",
        uploads.len(),
        query
    );

    match state.service.build(&query, &uploads).await {
        Ok(dossier) => (StatusCode::OK, Json(ApiResponse::success(dossier))),
        Err(e) => failure(e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(service: Arc<DossierService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/dossier", get(get_dossier).post(post_dossier))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    service: Arc<DossierService>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DocumentAnalyst;
    use crate::forum::ForumFetcher;
    use crate::market_data::{MarketDataError, MarketDataProvider};
    use crate::models::{HistoryWindow, PriceSeries, QuoteMetadata};
    use crate::news::NewsFetcher;
    use crate::resolver::{RetryPolicy, Sleeper, TickerResolver};
    use crate::screener::ScreenerClient;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use reqwest::Client;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Knows no symbols at all.
    struct EmptyProvider;

    #[async_trait]
    impl MarketDataProvider for EmptyProvider {
        fn id(&self) -> &'static str {
            "empty"
        }

        async fn quote_metadata(&self, symbol: &str) -> Result<QuoteMetadata, MarketDataError> {
            Err(MarketDataError::SymbolNotFound(symbol.to_string()))
        }

        async fn price_history(
            &self,
            symbol: &str,
            _window: HistoryWindow,
        ) -> Result<PriceSeries, MarketDataError> {
            Err(MarketDataError::NoDataForRange(symbol.to_string()))
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn router() -> Router {
        let client = Client::new();
        let resolver = TickerResolver::new(Arc::new(EmptyProvider), RetryPolicy::default())
            .with_sleeper(Arc::new(NoSleep));
        let service = DossierService::new(
            resolver,
            NewsFetcher::new(client.clone()),
            ForumFetcher::new(client.clone()),
            ScreenerClient::new(client),
            DocumentAnalyst::new(None),
        );
        create_router(Arc::new(service))
    }

    async fn body_json(response: axum::response::Response) -> ApiResponse {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_request(query: &str, file_name: &str) -> Request<Body> {
        let boundary = "dossier-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"query\"\r\n\r\n{q}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"documents\"; filename=\"{f}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nbytes\r\n--{b}--\r\n",
            b = boundary,
            q = query,
            f = file_name
        );
        Request::builder()
            .method("POST")
            .uri("/api/dossier")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/dossier?q=%20%20")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Query is empty"));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/api/dossier?q=zzzz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body.data.is_none());
        assert_eq!(
            body.error.as_deref(),
            Some("No exchange listing found for 'zzzz' after 2 attempt(s)")
        );
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_bad_request() {
        let response = router()
            .oneshot(multipart_request("INFY", "notes.docx"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body.error.unwrap().contains("notes.docx"));
    }

    #[tokio::test]
    async fn test_multipart_query_reaches_resolver() {
        let response = router()
            .oneshot(multipart_request("zzzz", "q1.pdf"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

use std::time::Instant;

use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

// 5xx 响应体最多记录这么多字节
const MAX_LOGGED_BODY: usize = 64 * 1024;

/// 记录每个请求的开始与结束（状态码、耗时）
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!(%method, %path, "incoming request");

    let response = next.run(req).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        duration = ?start.elapsed(),
        "request completed"
    );

    response
}

/// 5xx 响应时把响应体写进错误日志，再原样返回给客户端
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(%method, %path, status = parts.status.as_u16(), "unreadable error body: {}", e);
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        %method,
        %path,
        status = parts.status.as_u16(),
        body = %String::from_utf8_lossy(&bytes),
        "server error"
    );

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, middleware::from_fn, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/boom", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
            .route("/ok", get(|| async { "fine" }))
            .layer(from_fn(log_errors))
            .layer(from_fn(log_requests))
    }

    async fn body_of(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_server_error_body_survives_logging() {
        let req = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "boom");
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let req = Request::builder().uri("/ok").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "fine");
    }
}

//! Shared helpers: throwaway HTTP servers on ephemeral ports.

use axum::Router;
use mangia_client::Config;

/// Serve `app` on an ephemeral local port, returning its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Config pointed at a test server, with budgets small enough that
/// timeout/retry tests finish quickly.
pub fn test_config(base_url: &str) -> Config {
    Config {
        api_url: base_url.to_string(),
        request_timeout_ms: 150,
        max_retries: 2,
        retry_delay_ms: 20,
        ..Config::default()
    }
}

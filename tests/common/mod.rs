// tests/common/mod.rs

use axum::Router;
use tokio::net::TcpListener;

/// Serves a fixture router on an ephemeral local port and returns its base
/// URL. The server task lives until the test's runtime shuts down.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

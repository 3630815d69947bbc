use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use env_logger::Env;

/// Initialize logging.
///
/// Defaults to `info` for everything; `RUST_LOG` overrides it.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Logs method, path, status and latency of every request.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed();
    if status.is_server_error() {
        log::error!("{} {} -> {} ({:?})", method, path, status.as_u16(), elapsed);
    } else {
        log::info!("{} {} -> {} ({:?})", method, path, status.as_u16(), elapsed);
    }
    response
}

//! HTTP server: routes, the completion gate and the proxy

pub mod routes;
pub mod state;

use crate::gate::{gate, GATED_ROUTES};
use crate::proxy;
use anyhow::Result;
use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/models", get(routes::list_models))
        .route("/api/models/instance", post(routes::create_instance))
        .route("/api/auth/me", get(routes::me))
        .route("/api/auth/sign-in", get(routes::sign_in))
        .route("/api/auth/logout", post(routes::logout));

    for &path in GATED_ROUTES {
        app = app.route(
            path,
            any(proxy::forward).layer(middleware::from_fn_with_state(Arc::clone(&state), gate)),
        );
    }

    app.layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(state: AppState, port: u16) -> Result<()> {
    let gated = state.limiter.is_some();
    let app = router(Arc::new(state));

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            log::error!("Port {} is already in use", port);
            eprintln!("Try a different port with:");
            eprintln!("  chatgate serve --port <PORT>");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("Server running on http://localhost:{}", port);
    log::info!("Rate limiting {}", if gated { "enabled" } else { "disabled" });
    println!("Server running on http://localhost:{}", port);
    println!("\nAPI Endpoints:");
    println!("  GET    /health                          - Health check");
    println!("  GET    /api/models                      - Model catalog");
    println!("  POST   /api/models/instance             - Resolve a client config");
    println!("  GET    /api/auth/me                     - Current user");
    println!("  GET    /api/auth/sign-in                - Sign-in prompt");
    println!("  POST   /api/auth/logout                 - Clear the token cookie");
    println!("  POST   /api/llmchat/chat/completions    - Proxy to llmchat");
    println!("  POST   /api/ixcoach/chat/completions    - Proxy to OpenAI");
    println!("  POST   /api/ixcoach/anthropic/v1/messages - Proxy to Anthropic");

    axum::serve(listener, app).await?;
    Ok(())
}

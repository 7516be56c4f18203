use anyhow::Result;
use axum::Router;
use photo_journal::{config, routes, state::AppState};
use std::io::ErrorKind;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-journal with config: {:?}", cfg);

    let missing = cfg.storage.missing();
    if !missing.is_empty() {
        tracing::warn!(
            "Media host not configured, photo operations will fail. Missing: {}",
            missing.join(", ")
        );
    }
    if cfg.allowed_emails.is_empty() {
        tracing::warn!("ALLOWED_EMAILS is empty; no account can keep a session");
    } else {
        tracing::info!("{} allow-listed email(s)", cfg.allowed_emails.len());
    }

    // --- Initialize shared state ---
    let state = AppState::from_config(&cfg);

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

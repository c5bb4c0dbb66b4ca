// Event Threads Server

use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use event_threads::{app_state::AppState, config::Config, thread_interface::create_thread_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("event_threads=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(config.clone()).await?;

    let repaired = app_state.service.reconcile_counters().await?;
    if repaired > 0 {
        info!("Repaired {} like counters at startup", repaired);
    }

    let app = create_thread_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Event threads server listening on http://{}", listener.local_addr()?);
    info!("  GET    /api/v1/subjects/{{id}}/comments                     - Fetch thread");
    info!("  POST   /api/v1/subjects/{{id}}/comments                     - Post comment");
    info!("  POST   /api/v1/subjects/{{id}}/comments/{{parent}}/replies    - Post reply");
    info!("  POST   /api/v1/likes/{{kind}}/{{id}}                          - Toggle like");

    axum::serve(listener, app).await?;
    Ok(())
}

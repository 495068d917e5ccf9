use axum::extract::DefaultBodyLimit;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wellness_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::cors::cors_layer,
    routes, AppState,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    {
        let profiles = app_state.profile_service.clone();
        let mut events = profiles.events().subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        profiles.forget(event.user_id);
                        if !event.rederives_profile() {
                            continue;
                        }
                        match profiles.get_by_id(event.user_id).await {
                            Ok(Some(profile)) => {
                                profiles.refresh(profile.id, &profile.email).await;
                            }
                            Ok(None) => {}
                            Err(e) => tracing::warn!(
                                user_id = %event.user_id,
                                error = ?e,
                                "Could not reload profile after session event"
                            ),
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Session event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    info!("Serving uploads from: {}", config.uploads_dir);

    let app = routes::api_router(app_state, config.api_rps)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

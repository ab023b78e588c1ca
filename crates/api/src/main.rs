use finadvise_api::{build_router, state::AppState};
use finadvise_config::Settings;
use finadvise_db::{connect, indexes::ensure_indexes};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "finadvise_api=debug,finadvise_services=debug,finadvise_db=debug,finadvise_transcript=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting FinAdvise API on {}:{}", settings.app.host, settings.app.port);
    info!(
        quiet_period_ms = settings.transcript.quiet_period_ms,
        takeover_policy = %settings.transcript.takeover_policy,
        end_policy = %settings.transcript.end_policy,
        "Transcript config"
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone())?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

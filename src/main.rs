use dotenvy::dotenv;
use salon_buddy::{
    api::{self, AppState},
    config,
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the main application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;
    let policy = app_config.booking_policy()?;
    info!(
        bind_addr = %app_config.server.bind_addr,
        utc_offset = %policy.utc_offset,
        "Successfully processed application configuration."
    );

    // 4. Connect and create tables
    let db = config::database::create_connection(&app_config.database.url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Serve until ctrl-c or SIGTERM
    let app = api::build_app(AppState::new(db, policy));
    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", app_config.server.bind_addr, e))?;
    info!("Listening on {}", app_config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

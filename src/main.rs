use dotenvy::dotenv;
use lesson_market::{config, errors::Result};
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

    // 2. Load .env file (non-fatal, env vars can be set externally)
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()?;
    info!(database_url = %app_config.database_url, "Loaded application configuration");

    // 4. Initialize the database
    let db = config::database::create_connection()
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {e}"))?;
    config::database::create_tables(&db).await?;

    // 5. Seed the initial catalog (first run only)
    let seed = config::catalog::load_config(&app_config.seed_config_path)
        .inspect_err(|e| error!("Failed to load seed catalog: {e}"))?;
    config::catalog::seed_initial_catalog(&db, &seed)
        .await
        .inspect_err(|e| error!("Failed to seed initial catalog: {e}"))?;

    // 6. The HTTP host mounts its routes over these services; from here the
    // store is ready for it.
    info!("Lesson marketplace store ready");

    Ok(())
}

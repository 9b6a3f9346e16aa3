use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tally={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Arc::new(engine::Engine::builder().database(db.clone()).build());

    if let Some(server_settings) = settings.server {
        let engine = Arc::clone(&engine);
        let db = db.clone();
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let bind = server_settings
                .bind
                .unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server_settings.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            if let Err(err) = server::run_with_listener(engine, db, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if settings.scheduler.as_ref().is_some_and(|s| s.enabled) {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            tracing::info!("Found scheduler settings...");
            let scans: Vec<Box<dyn server::ScheduledTask>> = vec![
                Box::new(server::LoanReminderTask),
                Box::new(server::OverdueLoanTask),
            ];
            server::run_daily(engine, scans, server::DAILY).await;
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

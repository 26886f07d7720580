use std::sync::Arc;

use payout_engine::{
    chain::EthersConnector,
    config::Config,
    errors::ConfigError,
    server,
    store::PgLedger,
    PayoutEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .clone()
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;

    let ledger = PgLedger::connect(&database_url).await?;
    ledger.migrate().await?;

    let bind_addr = config.bind_addr.clone();
    let engine = Arc::new(PayoutEngine::new(
        Arc::new(config),
        Arc::new(ledger),
        Arc::new(EthersConnector),
    ));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Payout engine listening on {}", bind_addr);

    axum::serve(listener, server::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Payout engine stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", err);
    }
}

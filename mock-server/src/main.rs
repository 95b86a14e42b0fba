use mock_server::{config::Config, serve, spawn_applier, Db};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let db = Db::default();
    if let Some(every) = config.apply_interval {
        spawn_applier(db.clone(), every);
        tracing::info!(?every, "applying networking actions periodically");
    }

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    serve(listener, db).await?;
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use reservo::activity::ActivityHub;
use reservo::auth::{ModuleGatePolicy, SessionAuth};
use reservo::backend::{CatalogSeed, LocalBackend};
use reservo::config::Config;
use reservo::engine::Engine;
use reservo::wire;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    reservo::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let seed = match &config.catalog {
        Some(path) => CatalogSeed::load(path)?,
        None => CatalogSeed::default(),
    };

    let activity = Arc::new(ActivityHub::new());
    let backend = Arc::new(LocalBackend::open(config.wal_path(), seed, activity)?);
    let policy = Arc::new(ModuleGatePolicy::new(config.reservations_module));
    let engine = Arc::new(Engine::with_backend(backend, policy));
    let auth = Arc::new(SessionAuth::new(config.password.clone()));
    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("reservo listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!(
        "  catalog: {}",
        config
            .catalog
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    info!("  max_connections: {max_connections}");
    info!(
        "  reservations module: {}",
        if config.reservations_module { "enabled" } else { "disabled" }
    );

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(reservo::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(reservo::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(reservo::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();
                let auth = auth.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine, auth).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(reservo::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    info!("reservo stopped");
    Ok(())
}

use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tokio::sync::mpsc;

use pi_minilog::{AppConfig, AppState, EventLogger, PinRegistry, StaticCredentials};

#[cfg(feature = "hardware-gpio")]
use pi_minilog::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use pi_minilog::MockGpioBackend;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MINILOG_CONFIG").ok());
    let config =
        AppConfig::load(config_path).unwrap_or_else(|e| panic!("Failed to load config: {e}"));

    let backend = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(
                LibgpiodBackend::new(&config.chip)
                    .unwrap_or_else(|e| panic!("Failed to init libgpiod backend: {e}")),
            )
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            Arc::new(MockGpioBackend::default())
        }
    };

    let registry = Arc::new(PinRegistry::new(&config, backend));
    let logger = Arc::new(
        EventLogger::open(registry.clone(), config.log_file.clone())
            .unwrap_or_else(|e| panic!("Failed to open log file: {e}")),
    );
    registry
        .init(logger.clone())
        .unwrap_or_else(|e| panic!("Failed to set up pins: {e}"));
    info!(
        "Watching {} pins, logging to {}",
        registry.mapping().len(),
        config.log_file.display()
    );

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let app_state = AppState {
        registry,
        logger,
        auth: Arc::new(StaticCredentials::new(config.users.clone())),
        shutdown: shutdown_tx,
    };

    let http_cfg = config.http.clone();
    let server = HttpServer::new(move || {
        let scope_path = http_cfg.path.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.dashboard_scope(&scope_path))
    });

    let bind_addrs: String;
    let http_cfg = config.http.clone();
    let server = match (&http_cfg.unix_socket, &http_cfg.host) {
        (Some(socket_path), Some(host)) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            bind_addrs = format!("{} and {}", socket_path, host);

            server.bind_uds(socket_path)?.bind(host)?
        }
        (Some(socket_path), None) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            bind_addrs = socket_path.clone();

            server.bind_uds(socket_path)?
        }
        (None, Some(host)) => {
            bind_addrs = host.clone();

            server.bind(host)?
        }
        (None, None) => unreachable!("validated config has a listener"),
    };

    info!("Starting server on {}...", bind_addrs);

    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(async move {
        if shutdown_rx.recv().await.is_some() {
            info!("Stopping server");
            handle.stop(true).await;
        }
    });

    server.await
}

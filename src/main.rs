use log::info;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tokio::sync::mpsc;

use gpio_gesture::{
    AppConfig, AppState, BackendKind, EventHub, GestureError, InputEvent, MonotonicClock, Session,
    SessionHandle, SysfsLevelSource, SysfsProvisioner,
};

#[cfg(feature = "hardware-gpio")]
use gpio_gesture::LibgpiodLevelSource;

fn start_session(
    config: &AppConfig,
    tx: mpsc::UnboundedSender<InputEvent>,
) -> Result<SessionHandle, GestureError> {
    match config.backend {
        BackendKind::Sysfs => {
            if config.provision {
                SysfsProvisioner::new(&config.sysfs_root).provision_all(&config.lines)?;
            }
            let source = SysfsLevelSource::new(&config.sysfs_root, config.poll_mode);
            Session::start(config, source, MonotonicClock, tx)
        }
        #[cfg(feature = "hardware-gpio")]
        BackendKind::Libgpiod => {
            Session::start(config, LibgpiodLevelSource::new()?, MonotonicClock, tx)
        }
        #[cfg(not(feature = "hardware-gpio"))]
        BackendKind::Libgpiod => Err(GestureError::Config(
            "libgpiod backend requires the hardware-gpio feature".into(),
        )),
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GPIO_GESTURE_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config = Arc::new(AppConfig::load_from_file(&config_path).map_err(io::Error::other)?);

    let hub = Arc::new(EventHub::new(&config));
    let (tx, rx) = mpsc::unbounded_channel();
    {
        let hub = hub.clone();
        actix_web::rt::spawn(async move { hub.pump(rx).await });
    }
    let session = start_session(&config, tx).map_err(io::Error::other)?;
    hub.seed_levels(session.initial_levels());

    let app_state = AppState { hub };
    let http_cfg = config.http.clone();
    let server = HttpServer::new(move || {
        let scope_path = http_cfg.path.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.api_scope(&scope_path))
    });

    let bind_addrs: String;
    let http_cfg = config.http.clone();
    let server = match (&http_cfg.unix_socket, &http_cfg.host) {
        (Some(socket_path), Some(host)) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            bind_addrs = format!("{} and {}", socket_path, host);

            server.bind_uds(socket_path)?.bind_auto_h2c(host)?
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

            server.bind_auto_h2c(host)?
        }
        _ => {
            return Err(io::Error::other(
                "Config error: either 'unix_socket' or 'host' must be specified",
            ));
        }
    };

    info!("Starting server on {}...", bind_addrs);

    let served = server.run().await;
    if let Err(e) = session.stop() {
        log::error!("session ended with error: {e}");
    }
    served
}

use std::sync::Arc;

use tracing::{info, warn};

use launcher_utils::{ensure_dir, runtime_paths};

mod config;
mod daemon;
mod lock;
mod manager;
mod settings;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let logs = manager::LogStore::new(2000);
    let log_writer = logs.daemon_writer();
    tracing_subscriber::fmt().with_writer(log_writer).init();

    let paths = runtime_paths();
    ensure_dir(&paths.runtime_dir)?;

    // single-instance lock
    let _guard = match lock::acquire(&paths.lock_path) {
        Ok(guard) => guard,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
            warn!("launcher daemon already running (lock held), exiting");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // if a socket file exists, see if a daemon is alive
    if paths.socket_path.exists() {
        if launcher_ipc::socket::socket_alive(&paths.socket_path).await {
            warn!("launcher daemon already running (socket alive), exiting");
            return Ok(());
        }
        // stale socket file
        launcher_ipc::socket::remove_stale_socket(&paths.socket_path)?;
    }

    let config = match config::load_config() {
        Ok(Some(config)) => config,
        Ok(None) => config::LauncherConfig::default(),
        Err(err) => {
            warn!("ignoring invalid launcher config: {err}");
            config::LauncherConfig::default()
        }
    };

    let cdn = cdn_client::CdnClient::new(
        &config.cdn_root,
        &config.metadata_filename,
        &config.events_filename,
    )
    .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;

    let state = manager::SessionState::shared(logs);

    let listener = launcher_ipc::socket::bind(&paths.socket_path)?;
    info!("launcherd listening at {:?}", paths.socket_path);

    daemon::serve(listener, state, Arc::new(config), Arc::new(cdn)).await
}

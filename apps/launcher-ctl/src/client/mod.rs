mod commands;

use std::time::Duration;

use tokio::process::Command;

use launcher_utils::{ensure_dir, runtime_paths};

pub use commands::core::{close, daemon_logs_tail, logs_tail, ping, shutdown, status, LogsTailInfo};
pub use commands::install::{cancel_download, check_updates, install};
pub use commands::launch::{launch, sandbox, uninstall, LaunchFlags};
pub use commands::library::{
    elevated, events, interfaces, library_default, library_get, library_set, load_state,
    location_get, location_set, relaunch_elevated, save_state, set_metaverse, use_interface,
};

pub(crate) async fn connect_or_start() -> anyhow::Result<launcher_ipc::framing::FramedStream> {
    let paths = runtime_paths();
    ensure_dir(&paths.runtime_dir)?;

    if let Ok(stream) = launcher_ipc::socket::connect(&paths.socket_path).await {
        return Ok(launcher_ipc::framing::framed(stream));
    }

    start_daemon_detached().await?;

    for _ in 0..30 {
        if let Ok(stream) = launcher_ipc::socket::connect(&paths.socket_path).await {
            return Ok(launcher_ipc::framing::framed(stream));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    anyhow::bail!("failed to connect to launcherd after starting it");
}

/// For commands where starting a daemon makes no sense, shutdown above all.
pub(crate) async fn connect_only() -> anyhow::Result<launcher_ipc::framing::FramedStream> {
    let paths = runtime_paths();
    launcher_ipc::socket::connect(&paths.socket_path)
        .await
        .map(launcher_ipc::framing::framed)
        .map_err(|_| anyhow::anyhow!("launcher daemon is not running"))
}

async fn start_daemon_detached() -> anyhow::Result<()> {
    // 1) Dev: run an arbitrary command via shell
    // Example:
    //   ORBIT_LAUNCHERD_CMD='cargo run -p launcherd' cargo run -p launcher-ctl -- ping
    if let Ok(cmd) = std::env::var("ORBIT_LAUNCHERD_CMD") {
        let mut c = Command::new("sh");
        c.arg("-lc").arg(cmd);
        c.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        return Ok(());
    }

    // 2) Dev/prod: explicit binary path
    // Example:
    //   ORBIT_LAUNCHERD_PATH=target/debug/orbit-launcherd cargo run -p launcher-ctl -- ping
    if let Ok(path) = std::env::var("ORBIT_LAUNCHERD_PATH") {
        Command::new(path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;
        return Ok(());
    }

    // 3) Default: hope orbit-launcherd is on PATH
    Command::new("orbit-launcherd")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    Ok(())
}

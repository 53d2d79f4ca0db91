use anyhow::Result;

use launcher_core::proto::{Envelope, Event, Outbound, Request, Response};

use crate::client::connect_or_start;

pub async fn check_updates() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::CheckForUpdates {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::UpdateCheck {
            update_available,
            latest_version,
            installed_version,
        } => {
            let latest = latest_version.as_deref().unwrap_or("unknown");
            let installed = installed_version.as_deref().unwrap_or("none");
            if update_available {
                Ok(format!(
                    "update available: {latest} (installed: {installed})"
                ))
            } else {
                Ok(format!("up to date: latest={latest} installed={installed}"))
            }
        }
        Response::Error(err) => Err(anyhow::anyhow!("update check failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

/// Streams phase and progress events until the final response arrives.
pub async fn install() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::DownloadAndInstall {},
    };
    launcher_ipc::framing::send_request(&mut framed, &req).await?;

    let mut last_percent: i64 = -1;
    loop {
        match launcher_ipc::framing::read_outbound(&mut framed).await? {
            Outbound::Event(Event::InstallerPhase { phase }) => {
                println!("phase: {phase:?}");
            }
            Outbound::Event(Event::DownloadProgress { fraction, .. }) => {
                let percent = (fraction * 100.0).round() as i64;
                if percent != last_percent {
                    last_percent = percent;
                    println!("downloading: {percent}%");
                }
            }
            Outbound::Response(env) => {
                return match env.payload {
                    Response::InstallFinished { name, install_path } => {
                        Ok(format!("installed {name} at {install_path}"))
                    }
                    Response::Error(err) => {
                        Err(anyhow::anyhow!("install failed: {}", err.message))
                    }
                    other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
                };
            }
        }
    }
}

pub async fn cancel_download() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::CancelDownload {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::DownloadCancelled { cancelled } => {
            if cancelled {
                Ok("Download cancelled.".to_string())
            } else {
                Ok("No download in flight.".to_string())
            }
        }
        Response::Error(err) => Err(anyhow::anyhow!("cancel failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

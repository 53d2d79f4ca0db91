use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::info;

use cdn_client::CdnClient;
use launcher_core::proto::*;
use launcher_core::PROTOCOL_VERSION;
use launcher_ipc::framing::{self, FramedStream};

use crate::config::LauncherConfig;
use crate::manager::logs::now_millis;
use crate::manager::{install, launch, library, privileges, process_guard, updates};
use crate::manager::{ManagerError, SharedState};
use crate::settings;

pub async fn serve(
    listener: UnixListener,
    state: SharedState,
    config: Arc<LauncherConfig>,
    cdn: Arc<CdnClient>,
) -> std::io::Result<()> {
    let start_ms = now_millis();
    loop {
        let (stream, _addr) = listener.accept().await?;
        let state = Arc::clone(&state);
        let config = Arc::clone(&config);
        let cdn = Arc::clone(&cdn);
        tokio::spawn(async move {
            let _ = handle_conn(stream, state, config, cdn, start_ms).await;
        });
    }
}

async fn send_response(
    framed: &mut FramedStream,
    id: RequestId,
    payload: Response,
) -> std::io::Result<()> {
    framing::send_outbound(framed, &Outbound::Response(Envelope { id, payload })).await
}

fn error_response(err: ManagerError) -> Response {
    Response::Error(err.into())
}

async fn handle_conn(
    stream: UnixStream,
    state: SharedState,
    config: Arc<LauncherConfig>,
    cdn: Arc<CdnClient>,
    daemon_start_ms: u64,
) -> std::io::Result<()> {
    let mut framed = framing::framed(stream);

    while let Some(req_env) = framing::read_request(&mut framed).await? {
        let req_id = req_env.id;

        match req_env.payload {
            Request::Shutdown {} => {
                send_response(&mut framed, req_id, Response::ShutdownAck {}).await?;
                process::exit(0);
            }

            Request::Ping {
                protocol_version, ..
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    let resp = Response::Error(ChannelError {
                        code: ErrorCode::UnsupportedProtocol,
                        message: format!(
                            "unsupported protocol version: client={protocol_version} daemon={PROTOCOL_VERSION}"
                        ),
                        details: [
                            ("client_protocol".into(), protocol_version.to_string()),
                            ("daemon_protocol".into(), PROTOCOL_VERSION.to_string()),
                        ]
                        .into_iter()
                        .collect(),
                    });
                    send_response(&mut framed, req_id, resp).await?;
                    continue;
                }
                let resp = Response::Pong {
                    daemon_version: env!("CARGO_PKG_VERSION").to_string(),
                    protocol_version: PROTOCOL_VERSION,
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::Status {} => {
                let resp = {
                    let session = state.lock().await;
                    Response::Status {
                        daemon: DaemonStatus {
                            daemon_version: env!("CARGO_PKG_VERSION").to_string(),
                            protocol_version: PROTOCOL_VERSION,
                            pid: process::id() as i32,
                            uptime_ms: now_millis().saturating_sub(daemon_start_ms),
                        },
                        interface: session.interface.clone(),
                        install: session.install_phase,
                    }
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::CheckForUpdates {} => {
                let resp = match updates::check_for_updates(&state, cdn.as_ref()).await {
                    Ok(check) => Response::UpdateCheck {
                        update_available: check.update_available,
                        latest_version: check.latest_version,
                        installed_version: check.installed_version,
                    },
                    Err(err) => error_response(err),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::DownloadAndInstall {} => {
                handle_install(&mut framed, req_id, &state, &config, &cdn).await?;
            }

            Request::CancelDownload {} => {
                let cancelled = {
                    let session = state.lock().await;
                    match &session.download {
                        Some(active) => {
                            active.cancel.cancel();
                            true
                        }
                        None => false,
                    }
                };
                if cancelled {
                    info!("cancelling active download");
                }
                send_response(&mut framed, req_id, Response::DownloadCancelled { cancelled })
                    .await?;
            }

            Request::LaunchInterface { options } => {
                let resp =
                    match launch::launch_interface(&state, &config, cdn.as_ref(), options).await {
                        Ok(launch::LaunchOutcome::Launched { mode, pid }) => {
                            Response::Launched { mode, pid }
                        }
                        Ok(launch::LaunchOutcome::Blocked(reason)) => {
                            Response::LaunchBlocked { reason }
                        }
                        Err(err) => error_response(err),
                    };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::LaunchSandbox { folder } => {
                let resp = match launch::launch_sandbox(&config, &folder) {
                    Ok(pid) => Response::SandboxLaunched { pid },
                    Err(err) => error_response(err),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::UninstallInterface { folder } => {
                let resp = match launch::spawn_uninstaller(&config, &folder) {
                    Ok(_) => Response::UninstallStarted {},
                    Err(err) => error_response(err),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::RequestClose {} => {
                if process_guard::is_running(&config.interface_exe) {
                    let resp = Response::CloseBlocked {
                        process: config.interface_exe.clone(),
                    };
                    send_response(&mut framed, req_id, resp).await?;
                } else {
                    send_response(&mut framed, req_id, Response::CloseAck {}).await?;
                    info!("close requested, exiting");
                    process::exit(0);
                }
            }

            Request::GetLibraryFolder {} => {
                let resp = {
                    let mut session = state.lock().await;
                    match library::resolve_library_path(&mut session, &launcher_utils::data_dir())
                    {
                        Ok(path) => Response::LibraryFolder {
                            path: path.to_string_lossy().into_owned(),
                        },
                        Err(err) => error_response(err),
                    }
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::SetLibraryFolder { path } => {
                let resp = {
                    let mut session = state.lock().await;
                    match library::set_library_path(&mut session, path, &launcher_utils::data_dir())
                    {
                        Ok(path) => Response::LibraryFolder {
                            path: path.to_string_lossy().into_owned(),
                        },
                        Err(err) => error_response(err),
                    }
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::SetCurrentInterface { path } => {
                {
                    let mut session = state.lock().await;
                    session.select_interface(PathBuf::from(&path), &config.settings_dir_name);
                }
                info!("selected interface at {path}");
                send_response(&mut framed, req_id, Response::CurrentInterface { path }).await?;
            }

            Request::ListInterfaces {} => {
                let resp = {
                    let mut session = state.lock().await;
                    match library::resolve_library_path(&mut session, &launcher_utils::data_dir())
                    {
                        Ok(library_path) => Response::Interfaces {
                            interfaces: library::scan(&config.interface_exe, &library_path),
                        },
                        Err(err) => error_response(err),
                    }
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::GetLocation {} => {
                let scope = { state.lock().await.interface_settings.clone() };
                let resp = match scope {
                    Some(scope) => match settings::get_string(settings::LOCATION_KEY, &scope) {
                        Ok(path) => Response::Location { path },
                        Err(err) => error_response(ManagerError::Settings(err)),
                    },
                    None => Response::Location { path: None },
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::SetLocation { path } => {
                let scope = { state.lock().await.interface_settings.clone() };
                let resp = match scope {
                    Some(scope) => match settings::set_string(settings::LOCATION_KEY, &path, &scope)
                    {
                        Ok(()) => Response::LocationSet {},
                        Err(err) => error_response(ManagerError::Settings(err)),
                    },
                    None => Response::Error(ChannelError {
                        code: ErrorCode::BadRequest,
                        message: "select an interface before setting a location".into(),
                        details: Default::default(),
                    }),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::FetchEvents {} => {
                let resp = match cdn.fetch_events().await {
                    Ok(document) => Response::Events { document },
                    Err(err) => error_response(err.into()),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::SaveState { state: snapshot } => {
                let resp =
                    match settings::set(settings::STATE_KEY, &snapshot, &launcher_utils::data_dir())
                    {
                        Ok(()) => Response::StateSaved {},
                        Err(err) => error_response(ManagerError::Settings(err)),
                    };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::LoadState {} => {
                let resp = match settings::get(settings::STATE_KEY, &launcher_utils::data_dir()) {
                    Ok(snapshot) => Response::State { state: snapshot },
                    Err(err) => error_response(ManagerError::Settings(err)),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::SetMetaverseUrl { url } => {
                {
                    let mut session = state.lock().await;
                    session.metaverse_url = url.clone();
                }
                match &url {
                    Some(url) => info!("metaverse server set to {url}"),
                    None => info!("metaverse server override cleared"),
                }
                send_response(&mut framed, req_id, Response::MetaverseUrlSet {}).await?;
            }

            Request::IsElevated {} => {
                let resp = Response::Elevated {
                    elevated: privileges::is_elevated(),
                };
                send_response(&mut framed, req_id, resp).await?;
            }

            Request::RelaunchElevated {} => match privileges::relaunch_elevated(&config).await {
                Ok(()) => {
                    send_response(&mut framed, req_id, Response::RelaunchAck {}).await?;
                    info!("handing over to elevated instance");
                    process::exit(0);
                }
                Err(err) => {
                    send_response(&mut framed, req_id, error_response(err)).await?;
                }
            },

            Request::LogsTail { lines } => {
                let (lines, truncated) = {
                    let session = state.lock().await;
                    session.logs.tail_interface(lines)
                };
                send_response(&mut framed, req_id, Response::LogsTail { lines, truncated })
                    .await?;
            }

            Request::DaemonLogsTail { lines } => {
                let (lines, truncated) = {
                    let session = state.lock().await;
                    session.logs.tail_daemon(lines)
                };
                send_response(&mut framed, req_id, Response::LogsTail { lines, truncated })
                    .await?;
            }
        }
    }

    Ok(())
}

/// Run the install pipeline on its own task, forwarding its phase and
/// progress events to this connection as they happen, then reply with the
/// final outcome. The pipeline keeps running if the client goes away; the
/// single-flight slot is released by the task itself.
async fn handle_install(
    framed: &mut FramedStream,
    req_id: RequestId,
    state: &SharedState,
    config: &Arc<LauncherConfig>,
    cdn: &Arc<CdnClient>,
) -> std::io::Result<()> {
    let (tx, mut rx) = mpsc::channel(32);
    let install_state = Arc::clone(state);
    let install_config = Arc::clone(config);
    let install_cdn = Arc::clone(cdn);
    let mut task = tokio::spawn(async move {
        install::run(
            install_state,
            install_config.as_ref(),
            install_cdn.as_ref(),
            cdn_client::shared_client(),
            tx,
        )
        .await
    });

    let joined = loop {
        tokio::select! {
            joined = &mut task => break joined,
            event = rx.recv() => match event {
                Some(event) => {
                    framing::send_outbound(framed, &Outbound::Event(event)).await?;
                }
                None => break (&mut task).await,
            },
        }
    };

    // events that raced the task finishing
    while let Ok(event) = rx.try_recv() {
        framing::send_outbound(framed, &Outbound::Event(event)).await?;
    }

    let result = match joined {
        Ok(result) => result,
        Err(e) => Err(ManagerError::Message(format!("install task failed: {e}"))),
    };
    let payload = match result {
        Ok(success) => Response::InstallFinished {
            name: success.name,
            install_path: success.install_path.to_string_lossy().into_owned(),
        },
        Err(err) => Response::Error(err.into()),
    };
    send_response(framed, req_id, payload).await
}

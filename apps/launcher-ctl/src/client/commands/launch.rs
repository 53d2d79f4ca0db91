use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, FuzzySelect};

use launcher_core::proto::{
    Envelope, InstalledInterface, LaunchBlock, LaunchMode, LaunchOptions, Request, Response,
};

use crate::client::connect_or_start;

/// Interface executable inside an install folder, appended when the user
/// picks an install interactively instead of passing --exec.
const INTERFACE_EXE: &str = "interface.exe";

pub struct LaunchFlags {
    pub url: Option<String>,
    pub check_updates: bool,
    pub params: Option<String>,
    pub allow_multiple: bool,
    pub no_steamvr: bool,
    pub no_oculus: bool,
    pub restart: bool,
    pub child: bool,
    pub no_login_prompt: bool,
    pub max_restarts: Option<u32>,
}

pub async fn launch(exec: Option<PathBuf>, flags: LaunchFlags) -> Result<String> {
    let exec = match exec {
        Some(exec) => exec,
        None => {
            let interfaces = super::library::list_interfaces().await?;
            let location =
                prompt_interface_selection(&interfaces, "Select an interface to launch")?;
            PathBuf::from(location).join(INTERFACE_EXE)
        }
    };

    let options = LaunchOptions {
        exec: exec.to_string_lossy().into_owned(),
        custom_path: flags.url,
        check_for_updates: flags.check_updates,
        custom_parameters: flags.params,
        allow_multiple_instances: flags.allow_multiple,
        no_steam_vr: flags.no_steamvr,
        no_oculus: flags.no_oculus,
        auto_restart: flags.restart,
        launch_as_child: flags.child,
        dont_prompt_for_login: flags.no_login_prompt,
        max_restarts: flags.max_restarts,
    };

    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::LaunchInterface { options },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Launched { mode, pid } => {
            let mode = match mode {
                LaunchMode::Supervised => "supervised",
                LaunchMode::Detached => "detached",
            };
            match pid {
                Some(pid) => Ok(format!("launched {mode} interface (pid {pid})")),
                None => Ok(format!("launched {mode} interface")),
            }
        }
        Response::LaunchBlocked { reason } => match reason {
            LaunchBlock::UpdateAvailable { latest_version } => Ok(format!(
                "not launching: update {} is available, install it first",
                latest_version.as_deref().unwrap_or("unknown")
            )),
            LaunchBlock::AlreadyRunning { url_forwarded } => {
                if url_forwarded {
                    Ok("interface already running; forwarded the url to it".to_string())
                } else {
                    Ok("interface already running".to_string())
                }
            }
        },
        Response::Error(err) => Err(anyhow::anyhow!("launch failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn sandbox(folder: Option<String>) -> Result<String> {
    let folder = resolve_folder(folder, "Select an install to run the sandbox from").await?;

    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::LaunchSandbox { folder },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::SandboxLaunched { pid } => match pid {
            Some(pid) => Ok(format!("sandbox started (pid {pid})")),
            None => Ok("sandbox started".to_string()),
        },
        Response::Error(err) => Err(anyhow::anyhow!("sandbox launch failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn uninstall(folder: Option<String>) -> Result<String> {
    let folder = resolve_folder(folder, "Select an install to remove").await?;

    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::UninstallInterface { folder },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::UninstallStarted {} => Ok("Uninstaller started.".to_string()),
        Response::Error(err) => Err(anyhow::anyhow!("uninstall failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

async fn resolve_folder(folder: Option<String>, prompt: &str) -> Result<String> {
    match folder {
        Some(folder) => Ok(folder),
        None => {
            let interfaces = super::library::list_interfaces().await?;
            prompt_interface_selection(&interfaces, prompt)
        }
    }
}

fn prompt_interface_selection(
    interfaces: &[InstalledInterface],
    prompt: &str,
) -> Result<String> {
    if interfaces.is_empty() {
        anyhow::bail!("no installed interfaces found in the library");
    }
    let labels = interfaces
        .iter()
        .map(format_interface_label)
        .collect::<Vec<_>>();
    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to read interface selection")?;

    interfaces
        .get(selection)
        .map(|interface| interface.location.clone())
        .context("Invalid interface selection")
}

fn format_interface_label(interface: &InstalledInterface) -> String {
    format!(
        "{} {} ({})",
        interface.name, interface.version, interface.location
    )
}

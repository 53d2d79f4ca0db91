use anyhow::{Context, Result};

use launcher_core::proto::{Envelope, InstalledInterface, Request, Response};

use crate::client::connect_or_start;

pub(crate) async fn list_interfaces() -> Result<Vec<InstalledInterface>> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::ListInterfaces {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Interfaces { interfaces } => Ok(interfaces),
        Response::Error(err) => Err(anyhow::anyhow!("failed to list interfaces: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn interfaces() -> Result<String> {
    let interfaces = list_interfaces().await?;
    if interfaces.is_empty() {
        return Ok("no interfaces installed".to_string());
    }

    let mut out = String::new();
    for interface in &interfaces {
        out.push_str(&format!(
            "{} {}\n    {}\n",
            interface.name, interface.version, interface.location
        ));
    }
    Ok(out.trim_end().to_string())
}

pub async fn library_get() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::GetLibraryFolder {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LibraryFolder { path } => Ok(path),
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to read library folder: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn library_set(path: String) -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SetLibraryFolder { path: Some(path) },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LibraryFolder { path } => Ok(format!("library folder set to {path}")),
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to set library folder: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn library_default() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SetLibraryFolder { path: None },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LibraryFolder { path } => Ok(format!("library folder reset to {path}")),
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to reset library folder: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn use_interface(path: String) -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SetCurrentInterface { path },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::CurrentInterface { path } => Ok(format!("current interface set to {path}")),
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to select interface: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn location_get() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::GetLocation {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Location { path } => match path {
            Some(path) => Ok(path),
            None => Ok("no location set".to_string()),
        },
        Response::Error(err) => Err(anyhow::anyhow!("failed to read location: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn location_set(path: String) -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SetLocation { path },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LocationSet {} => Ok("location saved".to_string()),
        Response::Error(err) => Err(anyhow::anyhow!("failed to set location: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn events() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::FetchEvents {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Events { document } => {
            serde_json::to_string_pretty(&document).context("Failed to render events document")
        }
        Response::Error(err) => Err(anyhow::anyhow!("failed to fetch events: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn save_state(state: String) -> Result<String> {
    let state: serde_json::Value =
        serde_json::from_str(&state).context("state must be valid JSON")?;

    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SaveState { state },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::StateSaved {} => Ok("state saved".to_string()),
        Response::Error(err) => Err(anyhow::anyhow!("failed to save state: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn load_state() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::LoadState {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::State { state } => match state {
            Some(state) => {
                serde_json::to_string_pretty(&state).context("Failed to render saved state")
            }
            None => Ok("no saved state".to_string()),
        },
        Response::Error(err) => Err(anyhow::anyhow!("failed to load state: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn set_metaverse(url: Option<String>) -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::SetMetaverseUrl { url: url.clone() },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::MetaverseUrlSet {} => match url {
            Some(url) => Ok(format!("metaverse server set to {url}")),
            None => Ok("metaverse server override cleared".to_string()),
        },
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to set metaverse server: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn elevated() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::IsElevated {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Elevated { elevated } => {
            if elevated {
                Ok("daemon is running with elevated privileges".to_string())
            } else {
                Ok("daemon is not elevated".to_string())
            }
        }
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to query privileges: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn relaunch_elevated() -> Result<String> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::RelaunchElevated {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::RelaunchAck {} => Ok("daemon restarting with elevated privileges".to_string()),
        Response::Error(err) => Err(anyhow::anyhow!(
            "failed to relaunch elevated: {}",
            err.message
        )),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

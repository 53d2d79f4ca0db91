use anyhow::Result;

use launcher_core::proto::{
    DaemonStatus, Envelope, InstallPhase, InterfaceStatus, LogLine, Request, Response,
};
use launcher_core::PROTOCOL_VERSION;

use crate::client::{connect_only, connect_or_start};

pub struct StatusInfo {
    pub daemon: DaemonStatus,
    pub interface: InterfaceStatus,
    pub install: InstallPhase,
}

pub struct LogsTailInfo {
    pub lines: Vec<LogLine>,
    pub truncated: bool,
}

pub async fn ping() -> Result<String> {
    let mut framed = connect_or_start().await?;

    let req = Envelope {
        id: 1,
        payload: Request::Ping {
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
        },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Pong {
            daemon_version,
            protocol_version,
        } => Ok(format!(
            "pong: daemon={daemon_version} protocol={protocol_version}"
        )),
        Response::Error(err) => Err(anyhow::anyhow!("ping failed: {}", err.message)),
        other => Ok(format!("unexpected: {other:?}")),
    }
}

pub async fn status() -> Result<StatusInfo> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::Status {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::Status {
            daemon,
            interface,
            install,
        } => Ok(StatusInfo {
            daemon,
            interface,
            install,
        }),
        Response::Error(err) => Err(anyhow::anyhow!("status failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn shutdown() -> Result<String> {
    let mut framed = connect_only().await?;

    let req = Envelope {
        id: 1,
        payload: Request::Shutdown {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::ShutdownAck {} => Ok("Daemon acknowledged shutdown request.".to_string()),
        other => Ok(format!("unexpected: {other:?}")),
    }
}

pub async fn close() -> Result<String> {
    let mut framed = connect_only().await?;

    let req = Envelope {
        id: 1,
        payload: Request::RequestClose {},
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::CloseAck {} => Ok("Daemon is closing.".to_string()),
        Response::CloseBlocked { process } => Ok(format!(
            "Not closing: {process} is still running. Close it first."
        )),
        Response::Error(err) => Err(anyhow::anyhow!("close failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn logs_tail(lines: usize) -> Result<LogsTailInfo> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::LogsTail { lines },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LogsTail { lines, truncated } => Ok(LogsTailInfo { lines, truncated }),
        Response::Error(err) => Err(anyhow::anyhow!("logs tail failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

pub async fn daemon_logs_tail(lines: usize) -> Result<LogsTailInfo> {
    let mut framed = connect_or_start().await?;
    let req = Envelope {
        id: 1,
        payload: Request::DaemonLogsTail { lines },
    };

    launcher_ipc::framing::send_request(&mut framed, &req).await?;
    let resp = launcher_ipc::framing::read_response(&mut framed).await?;

    match resp.payload {
        Response::LogsTail { lines, truncated } => Ok(LogsTailInfo { lines, truncated }),
        Response::Error(err) => Err(anyhow::anyhow!("daemon logs tail failed: {}", err.message)),
        other => Err(anyhow::anyhow!("unexpected response: {other:?}")),
    }
}

use serde::{Deserialize, Serialize};

use super::{ChannelError, InstalledInterface, LogLine, RequestId, SessionId, UnixMillis};

/// Mid-request notifications, interleaved with the final response on the
/// connection that started the work. Correlated by session id where more
/// than one could ever be in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    InstallerPhase { phase: InstallPhase },
    DownloadProgress { session: SessionId, fraction: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Outbound {
    Response(Envelope<Response>),
    Event(Event),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub payload: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Request {
    Ping { client_version: String, protocol_version: u32 },

    Status {},

    CheckForUpdates {},

    DownloadAndInstall {},

    CancelDownload {},

    LaunchInterface { options: LaunchOptions },

    LaunchSandbox { folder: String },

    UninstallInterface { folder: String },

    RequestClose {},

    GetLibraryFolder {},

    SetLibraryFolder {
        #[serde(default)]
        path: Option<String>,
    },

    SetCurrentInterface { path: String },

    ListInterfaces {},

    GetLocation {},
    SetLocation { path: String },

    FetchEvents {},

    SaveState { state: serde_json::Value },
    LoadState {},

    SetMetaverseUrl {
        #[serde(default)]
        url: Option<String>,
    },

    IsElevated {},
    RelaunchElevated {},

    LogsTail { lines: usize },
    DaemonLogsTail { lines: usize },

    Shutdown {},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    Pong { daemon_version: String, protocol_version: u32 },

    Status {
        daemon: DaemonStatus,
        interface: InterfaceStatus,
        install: InstallPhase,
    },

    UpdateCheck {
        update_available: bool,
        latest_version: Option<String>,
        installed_version: Option<String>,
    },

    InstallFinished { name: String, install_path: String },

    DownloadCancelled { cancelled: bool },

    Launched { mode: LaunchMode, pid: Option<i32> },
    LaunchBlocked { reason: LaunchBlock },

    SandboxLaunched { pid: Option<i32> },

    UninstallStarted {},

    CloseAck {},
    CloseBlocked { process: String },

    LibraryFolder { path: String },
    CurrentInterface { path: String },

    Interfaces { interfaces: Vec<InstalledInterface> },

    Location { path: Option<String> },
    LocationSet {},

    Events { document: serde_json::Value },

    StateSaved {},
    State { state: Option<serde_json::Value> },

    MetaverseUrlSet {},

    Elevated { elevated: bool },
    RelaunchAck {},

    LogsTail { lines: Vec<LogLine>, truncated: bool },

    ShutdownAck {},

    Error(ChannelError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub daemon_version: String,
    pub protocol_version: u32,
    pub pid: i32,
    pub uptime_ms: u64,
}

/// Status of the supervised interface child, if any. Detached launches are
/// not tracked here once spawned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", content = "data")]
pub enum InterfaceStatus {
    Idle {},

    Running { pid: i32, mode: LaunchMode, started_at_ms: UnixMillis },

    Exited { exit: ExitInfo, at_ms: UnixMillis },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Installer pipeline phase. `Succeeded`/`Failed` are terminal; the machine
/// returns to `Idle` once the outcome has been reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallPhase {
    Idle,
    CheckingPrereqs,
    Downloading,
    Verifying,
    Installing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaunchMode {
    Supervised,
    Detached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LaunchBlock {
    UpdateAvailable { latest_version: Option<String> },
    AlreadyRunning { url_forwarded: bool },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchOptions {
    pub exec: String,

    /// Deep-link URL to open in the interface (`--url`).
    #[serde(default)]
    pub custom_path: Option<String>,

    /// Run an update check first and report instead of launching when one
    /// is available.
    #[serde(default)]
    pub check_for_updates: bool,

    /// Extra parameters, comma-separated, appended verbatim.
    #[serde(default)]
    pub custom_parameters: Option<String>,

    #[serde(default)]
    pub allow_multiple_instances: bool,

    #[serde(default)]
    pub no_steam_vr: bool,

    #[serde(default)]
    pub no_oculus: bool,

    #[serde(default)]
    pub auto_restart: bool,

    /// Supervised child when true, detached via the launch script otherwise.
    #[serde(default)]
    pub launch_as_child: bool,

    #[serde(default)]
    pub dont_prompt_for_login: bool,

    /// Cap for the auto-restart loop. Absent means unbounded, which is the
    /// documented upstream policy.
    #[serde(default)]
    pub max_restarts: Option<u32>,
}

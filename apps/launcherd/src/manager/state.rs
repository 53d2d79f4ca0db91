use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use launcher_core::proto::{InstallPhase, InterfaceStatus, SessionId};

use super::logs::LogStore;

pub type SharedState = Arc<Mutex<SessionState>>;

/// Cancellation handle for the transfer currently in flight. Present only
/// while bytes are moving; the install pipeline registers and clears it.
pub struct ActiveDownload {
    pub id: SessionId,
    pub cancel: CancellationToken,
}

/// Everything the daemon remembers across requests. One instance, behind a
/// mutex; long pipelines take the lock only for short reads and updates.
pub struct SessionState {
    /// Install library root. Resolved lazily from settings on first use.
    pub(crate) library_path: Option<PathBuf>,
    /// Install folder of the selected interface.
    pub(crate) current_interface: Option<PathBuf>,
    /// Settings dir of the selected interface. `Some` exactly when
    /// `current_interface` is.
    pub(crate) interface_settings: Option<PathBuf>,
    /// Metaverse server override, exported to spawned interfaces.
    pub(crate) metaverse_url: Option<String>,
    pub(crate) install_phase: InstallPhase,
    /// Single-flight flag for the whole download-and-install pipeline.
    pub(crate) install_active: bool,
    pub(crate) download: Option<ActiveDownload>,
    pub(crate) next_session: SessionId,
    pub(crate) interface: InterfaceStatus,
    pub(crate) logs: LogStore,
}

impl SessionState {
    pub fn shared(logs: LogStore) -> SharedState {
        Arc::new(Mutex::new(SessionState {
            library_path: None,
            current_interface: None,
            interface_settings: None,
            metaverse_url: None,
            install_phase: InstallPhase::Idle,
            install_active: false,
            download: None,
            next_session: 1,
            interface: InterfaceStatus::Idle {},
            logs,
        }))
    }

    pub fn select_interface(&mut self, install_path: PathBuf, settings_dir_name: &str) {
        self.interface_settings = Some(install_path.join(settings_dir_name));
        self.current_interface = Some(install_path);
    }

    pub fn next_session_id(&mut self) -> SessionId {
        let id = self.next_session;
        self.next_session += 1;
        id
    }
}

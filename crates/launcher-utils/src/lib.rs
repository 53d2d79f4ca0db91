use std::path::{Path, PathBuf};

pub struct RuntimePaths {
    pub runtime_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
}

/// Runtime namespace for the launcher daemon's socket and lock.
const APP_ID: &str = "orbit-launcher";

pub fn runtime_paths() -> RuntimePaths {
    // XDG runtime dir when the session provides one (Linux).
    if let Some(xdg) = std::env::var_os("XDG_RUNTIME_DIR") {
        return mk(PathBuf::from(xdg).join(APP_ID));
    }

    // TMPDIR covers macOS and doubles as a Linux fallback.
    if let Some(tmp) = std::env::var_os("TMPDIR") {
        return mk(PathBuf::from(tmp).join(APP_ID));
    }

    mk(std::env::temp_dir().join(APP_ID))
}

fn mk(runtime_dir: PathBuf) -> RuntimePaths {
    RuntimePaths {
        socket_path: runtime_dir.join("launcherd.sock"),
        lock_path: runtime_dir.join("launcherd.lock"),
        runtime_dir,
    }
}

/// Default data directory: also the default interface library and the scope
/// for the launcher's own settings keys.
pub fn data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        return data.join("orbit").join("launcher");
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".orbit").join("launcher");
    }

    PathBuf::from("orbit-launcher")
}

pub fn ensure_dir(p: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(p)
}

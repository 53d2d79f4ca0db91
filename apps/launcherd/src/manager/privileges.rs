use std::process::Stdio;

use crate::config::LauncherConfig;

use super::error::ManagerError;

/// Cheap local probe, no prompting.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // Effective UID zero is the closest analogue of an elevated token.
    unsafe { libc::geteuid() == 0 }
}

/// Cheap local probe, no prompting.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    // fltmc exits zero only under an elevated token.
    std::process::Command::new("fltmc")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Hand the current executable to the elevation helper and return. The
/// caller decides when to exit; until then both instances may briefly
/// coexist.
pub async fn relaunch_elevated(config: &LauncherConfig) -> Result<(), ManagerError> {
    let helper = config.elevate_helper_path();
    let target = std::env::current_exe()
        .map_err(|e| ManagerError::io("resolving current executable", e))?;

    let mut cmd = tokio::process::Command::new(&helper);
    cmd.arg("-k").arg(&target);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.spawn().map_err(|e| {
        ManagerError::Message(format!(
            "failed to start elevation helper {}: {e}",
            helper.display()
        ))
    })?;
    Ok(())
}

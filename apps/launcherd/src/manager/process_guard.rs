use std::ffi::OsStr;

use sysinfo::System;
use tracing::warn;

use crate::config::LauncherConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningApps {
    pub sandbox: bool,
    pub interface: bool,
}

/// Exact image-name match against the current process table. An empty table
/// means enumeration is degraded; that is logged and reported as nothing
/// running so the caller is never blocked forever.
pub fn check_running_apps(config: &LauncherConfig) -> RunningApps {
    let system = System::new_all();
    if system.processes().is_empty() {
        warn!("process enumeration returned nothing, treating guards as clear");
        return RunningApps::default();
    }

    let interface = OsStr::new(&config.interface_exe);
    let sandbox = OsStr::new(&config.sandbox_image);
    let mut running = RunningApps::default();
    for process in system.processes().values() {
        if process.name() == sandbox {
            running.sandbox = true;
        }
        if process.name() == interface {
            running.interface = true;
        }
    }
    running
}

/// Single-image variant used by launch and close guards.
pub fn is_running(image: &str) -> bool {
    let system = System::new_all();
    if system.processes().is_empty() {
        warn!("process enumeration returned nothing, treating {image} as not running");
        return false;
    }
    let image = OsStr::new(image);
    system
        .processes()
        .values()
        .any(|process| process.name() == image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_matches_an_unlikely_image_name() {
        assert!(!is_running("orbit-definitely-not-a-real-process.exe"));
    }
}

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Daemon configuration, read once at startup from `config.json` in the
/// launcher data dir. Every field has a default so a missing or partial
/// file still yields a working daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Root URL of the release CDN.
    #[serde(default = "default_cdn_root")]
    pub cdn_root: String,
    /// Release metadata document, resolved against `cdn_root`.
    #[serde(default = "default_metadata_filename")]
    pub metadata_filename: String,
    /// Events document, resolved against `cdn_root`.
    #[serde(default = "default_events_filename")]
    pub events_filename: String,
    /// Display name used for install folders when the release metadata
    /// carries no name of its own.
    #[serde(default = "default_interface_name")]
    pub interface_name: String,
    /// Image name of the interface executable, also the file probed for
    /// when scanning the library.
    #[serde(default = "default_interface_exe")]
    pub interface_exe: String,
    /// Image name of the server sandbox process.
    #[serde(default = "default_sandbox_image")]
    pub sandbox_image: String,
    /// Sandbox console executable, relative to an install folder.
    #[serde(default = "default_sandbox_launch_path")]
    pub sandbox_launch_path: String,
    /// Uninstaller executable, relative to an install folder.
    #[serde(default = "default_uninstaller_exe")]
    pub uninstaller_exe: String,
    /// Name the installer is downloaded under before verification.
    #[serde(default = "default_pre_installer_name")]
    pub pre_installer_name: String,
    /// Name of a verified installer, kept in the library for reuse.
    #[serde(default = "default_post_installer_name")]
    pub post_installer_name: String,
    /// Per-version settings directory inside an install folder.
    #[serde(default = "default_settings_dir_name")]
    pub settings_dir_name: String,
    /// Helper script used for detached launches. Relative paths resolve
    /// beside the daemon executable.
    #[serde(default)]
    pub launch_script: Option<PathBuf>,
    /// Elevation helper. Relative paths resolve beside the daemon
    /// executable.
    #[serde(default)]
    pub elevate_helper: Option<PathBuf>,
    /// Environment variable handed to interface processes when a metaverse
    /// server override is active.
    #[serde(default = "default_metaverse_env_var")]
    pub metaverse_env_var: String,
}

fn default_cdn_root() -> String {
    "https://cdn.orbitverse.net".to_string()
}

fn default_metadata_filename() -> String {
    "orbitMeta.json".to_string()
}

fn default_events_filename() -> String {
    "orbitEvents.json".to_string()
}

fn default_interface_name() -> String {
    "Orbit Interface".to_string()
}

fn default_interface_exe() -> String {
    "interface.exe".to_string()
}

fn default_sandbox_image() -> String {
    "server-console.exe".to_string()
}

fn default_sandbox_launch_path() -> String {
    "server-console/server-console.exe".to_string()
}

fn default_uninstaller_exe() -> String {
    "Uninstall.exe".to_string()
}

fn default_pre_installer_name() -> String {
    "Orbit_Setup_Latest.exe".to_string()
}

fn default_post_installer_name() -> String {
    "Orbit_Setup_Latest_READY.exe".to_string()
}

fn default_settings_dir_name() -> String {
    "launcher_settings".to_string()
}

fn default_metaverse_env_var() -> String {
    "ORBIT_METAVERSE_URL".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            cdn_root: default_cdn_root(),
            metadata_filename: default_metadata_filename(),
            events_filename: default_events_filename(),
            interface_name: default_interface_name(),
            interface_exe: default_interface_exe(),
            sandbox_image: default_sandbox_image(),
            sandbox_launch_path: default_sandbox_launch_path(),
            uninstaller_exe: default_uninstaller_exe(),
            pre_installer_name: default_pre_installer_name(),
            post_installer_name: default_post_installer_name(),
            settings_dir_name: default_settings_dir_name(),
            launch_script: None,
            elevate_helper: None,
            metaverse_env_var: default_metaverse_env_var(),
        }
    }
}

impl LauncherConfig {
    pub fn launch_script_path(&self) -> PathBuf {
        resolve_beside_exe(
            self.launch_script
                .clone()
                .unwrap_or_else(|| PathBuf::from("bat/launcher.bat")),
        )
    }

    pub fn elevate_helper_path(&self) -> PathBuf {
        resolve_beside_exe(
            self.elevate_helper
                .clone()
                .unwrap_or_else(|| PathBuf::from("elevate.exe")),
        )
    }
}

fn resolve_beside_exe(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
    {
        Some(dir) => dir.join(path),
        None => path,
    }
}

pub fn config_path() -> PathBuf {
    launcher_utils::data_dir().join("config.json")
}

/// `Ok(None)` when no config file exists; `Err` only for a file that exists
/// but does not parse.
pub fn load_config() -> Result<Option<LauncherConfig>, String> {
    let path = config_path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };
    let config: LauncherConfig = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: LauncherConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cdn_root, "https://cdn.orbitverse.net");
        assert_eq!(config.interface_exe, "interface.exe");
        assert_eq!(config.post_installer_name, "Orbit_Setup_Latest_READY.exe");
        assert_eq!(config.settings_dir_name, "launcher_settings");
    }

    #[test]
    fn partial_config_keeps_remaining_defaults() {
        let config: LauncherConfig =
            serde_json::from_str(r#"{"cdn_root": "https://mirror.example.net/"}"#).unwrap();
        assert_eq!(config.cdn_root, "https://mirror.example.net/");
        assert_eq!(config.metadata_filename, "orbitMeta.json");
    }

    #[test]
    fn absolute_helper_paths_are_kept_as_is() {
        let config = LauncherConfig {
            launch_script: Some(PathBuf::from("/opt/orbit/launcher.bat")),
            ..LauncherConfig::default()
        };
        assert_eq!(
            config.launch_script_path(),
            PathBuf::from("/opt/orbit/launcher.bat")
        );
    }
}

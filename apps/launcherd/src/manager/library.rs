use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use launcher_core::proto::InstalledInterface;

use crate::settings;

use super::error::ManagerError;
use super::state::SessionState;
use super::version_paths;

/// Library root for this session. Memory wins; otherwise the persisted
/// setting; otherwise the default data dir, which is persisted so every
/// later resolution agrees.
pub fn resolve_library_path(
    session: &mut SessionState,
    scope: &Path,
) -> Result<PathBuf, ManagerError> {
    if let Some(path) = &session.library_path {
        return Ok(path.clone());
    }

    match settings::get_string(settings::LIBRARY_KEY, scope).map_err(ManagerError::Settings)? {
        Some(stored) if !stored.trim().is_empty() => {
            let path = PathBuf::from(stored);
            session.library_path = Some(path.clone());
            Ok(path)
        }
        _ => {
            let default = launcher_utils::data_dir();
            settings::set_string(
                settings::LIBRARY_KEY,
                &default.to_string_lossy(),
                scope,
            )
            .map_err(ManagerError::Settings)?;
            session.library_path = Some(default.clone());
            Ok(default)
        }
    }
}

/// Explicit set; `None` reverts to the default data dir. Persisted first so
/// a crash cannot leave memory and disk disagreeing.
pub fn set_library_path(
    session: &mut SessionState,
    path: Option<String>,
    scope: &Path,
) -> Result<PathBuf, ManagerError> {
    let path = match path {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => launcher_utils::data_dir(),
    };
    settings::set_string(settings::LIBRARY_KEY, &path.to_string_lossy(), scope)
        .map_err(ManagerError::Settings)?;
    session.library_path = Some(path.clone());
    Ok(path)
}

/// Walk the library root for install folders that carry the interface
/// executable and decode into name/version entries. Entries that do not
/// decode are skipped and logged, never fatal.
pub fn scan(interface_exe: &str, library: &Path) -> Vec<InstalledInterface> {
    let entries = match std::fs::read_dir(library) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read library {}: {e}", library.display());
            return Vec::new();
        }
    };

    let mut interfaces = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() || !dir.join(interface_exe).is_file() {
            continue;
        }
        match version_paths::decode(&dir.to_string_lossy()) {
            Ok((name, version)) => interfaces.push(InstalledInterface {
                name,
                version,
                location: dir.to_string_lossy().into_owned(),
            }),
            Err(e) => {
                debug!("skipping library entry {}: {e}", dir.display());
            }
        }
    }
    interfaces.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::logs::LogStore;
    use crate::manager::state::SessionState;

    fn install(dir: &Path, folder: &str, with_exe: bool) {
        let path = dir.join(folder);
        std::fs::create_dir_all(&path).unwrap();
        if with_exe {
            std::fs::write(path.join("interface.exe"), b"stub").unwrap();
        }
    }

    #[test]
    fn scan_keeps_only_decodable_folders_with_executables() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "Orbit Interface-2_0_5", true);
        install(dir.path(), "Orbit Interface-2_1_0", false);
        install(dir.path(), "downloads", true);
        std::fs::write(dir.path().join("Orbit_Setup_Latest_READY.exe"), b"x").unwrap();

        let found = scan("interface.exe", dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Orbit Interface");
        assert_eq!(found[0].version, "2_0_5");
    }

    #[test]
    fn scan_of_missing_library_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan("interface.exe", &dir.path().join("nope")).is_empty());
    }

    #[tokio::test]
    async fn set_then_resolve_round_trips_through_settings() {
        let scope = tempfile::tempdir().unwrap();
        let state = SessionState::shared(LogStore::new(100));

        {
            let mut session = state.lock().await;
            set_library_path(&mut session, Some("/srv/orbit/library".into()), scope.path())
                .unwrap();
        }

        // A fresh session resolves the same path from disk.
        let fresh = SessionState::shared(LogStore::new(100));
        let mut session = fresh.lock().await;
        let resolved = resolve_library_path(&mut session, scope.path()).unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/orbit/library"));
    }
}

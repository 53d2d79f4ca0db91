use std::path::{Path, PathBuf};
use std::process::Stdio;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cdn_client::installer_asset;
use launcher_core::proto::{Event, InstallPhase, SessionId};

use crate::config::LauncherConfig;

use super::download::{self, DownloadRequest};
use super::error::ManagerError;
use super::library;
use super::privileges;
use super::process_guard::{self, RunningApps};
use super::source::ReleaseFeed;
use super::state::{ActiveDownload, SharedState};
use super::version_paths;

#[derive(Debug)]
pub struct InstallSuccess {
    /// Release tag that was installed.
    pub name: String,
    pub install_path: PathBuf,
}

/// Prerequisite probes, gathered before the pipeline starts so nothing in
/// it re-samples the system behind the guards' back.
struct Prereqs {
    running: RunningApps,
    elevated: bool,
}

/// Download-and-install session. Single flight: a second call while one is
/// active is rejected immediately. Phase changes and download progress are
/// reported through `events`, correlated by session id; the terminal phase
/// is emitted exactly once, after which the machine reads Idle again.
pub async fn run(
    state: SharedState,
    config: &LauncherConfig,
    feed: &dyn ReleaseFeed,
    client: &Client,
    events: mpsc::Sender<Event>,
) -> Result<InstallSuccess, ManagerError> {
    let session = claim_session(&state).await?;
    let prereqs = Prereqs {
        running: process_guard::check_running_apps(config),
        elevated: privileges::is_elevated(),
    };
    let result = run_pipeline(&state, config, prereqs, feed, client, &events, session).await;
    finish_session(&state, &events, result.is_ok()).await;
    result
}

async fn claim_session(state: &SharedState) -> Result<SessionId, ManagerError> {
    let mut session = state.lock().await;
    if session.install_active {
        return Err(ManagerError::DownloadInProgress);
    }
    session.install_active = true;
    Ok(session.next_session_id())
}

async fn finish_session(state: &SharedState, events: &mpsc::Sender<Event>, ok: bool) {
    let terminal = if ok {
        InstallPhase::Succeeded
    } else {
        InstallPhase::Failed
    };
    {
        let mut session = state.lock().await;
        session.download = None;
        session.install_active = false;
        session.install_phase = InstallPhase::Idle;
    }
    let _ = events.send(Event::InstallerPhase { phase: terminal }).await;
}

async fn set_phase(state: &SharedState, events: &mpsc::Sender<Event>, phase: InstallPhase) {
    {
        let mut session = state.lock().await;
        session.install_phase = phase;
    }
    let _ = events.send(Event::InstallerPhase { phase }).await;
}

async fn run_pipeline(
    state: &SharedState,
    config: &LauncherConfig,
    prereqs: Prereqs,
    feed: &dyn ReleaseFeed,
    client: &Client,
    events: &mpsc::Sender<Event>,
    session_id: SessionId,
) -> Result<InstallSuccess, ManagerError> {
    set_phase(state, events, InstallPhase::CheckingPrereqs).await;
    check_prereqs(config, &prereqs)?;

    let releases = feed.release_meta().await?;
    let latest = releases
        .first()
        .cloned()
        .ok_or_else(|| ManagerError::SourceUnavailable("release feed is empty".into()))?;

    let library = {
        let mut session = state.lock().await;
        library::resolve_library_path(&mut session, &launcher_utils::data_dir())?
    };

    let ready_installer = library.join(&config.post_installer_name);
    if plan_installer_source(&ready_installer, &latest.md5)? == InstallerPlan::DownloadFresh {
        set_phase(state, events, InstallPhase::Downloading).await;
        let asset = installer_asset(&releases).ok_or_else(|| {
            ManagerError::DownloadFailed("no installer asset in the latest release".into())
        })?;
        let fresh_installer = library.join(&config.pre_installer_name);

        let cancel = CancellationToken::new();
        {
            let mut session = state.lock().await;
            session.download = Some(ActiveDownload {
                id: session_id,
                cancel: cancel.clone(),
            });
        }
        let downloaded = download::download(
            client,
            DownloadRequest {
                url: &asset.browser_download_url,
                target: &fresh_installer,
                bytes_expected: asset.size,
            },
            session_id,
            cancel,
            events,
        )
        .await;
        {
            let mut session = state.lock().await;
            session.download = None;
        }
        downloaded?;

        set_phase(state, events, InstallPhase::Verifying).await;
        verify_and_promote(&fresh_installer, &ready_installer, &latest.md5)?;
    }

    set_phase(state, events, InstallPhase::Installing).await;
    let name = latest
        .name
        .clone()
        .unwrap_or_else(|| config.interface_name.clone());
    let version = version_paths::sanitize_version(&latest.tag_name);
    let install_path = library.join(version_paths::encode(&name, &version));
    run_silent_installer(&ready_installer, &install_path).await?;
    info!("installed {} into {}", latest.tag_name, install_path.display());

    Ok(InstallSuccess {
        name: latest.tag_name,
        install_path,
    })
}

/// Guards, in order: sandbox, interface, elevation. All local probes; the
/// release feed has not been touched when any of these fail.
fn check_prereqs(config: &LauncherConfig, prereqs: &Prereqs) -> Result<(), ManagerError> {
    if prereqs.running.sandbox {
        return Err(ManagerError::GuardConflict {
            message: "Your server sandbox is running. Please close it before proceeding."
                .into(),
            process: config.sandbox_image.clone(),
        });
    }
    if prereqs.running.interface {
        return Err(ManagerError::GuardConflict {
            message: "An instance of Interface is running. Please close it before proceeding."
                .into(),
            process: config.interface_exe.clone(),
        });
    }
    if !prereqs.elevated {
        return Err(ManagerError::NotElevated);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum InstallerPlan {
    UseExisting,
    DownloadFresh,
}

/// Hash-compare a cached verified installer against the published digest.
/// A match reuses it and skips the download entirely; a stale copy is
/// removed before downloading fresh.
fn plan_installer_source(
    ready_installer: &Path,
    expected_md5: &str,
) -> Result<InstallerPlan, ManagerError> {
    if !ready_installer.is_file() {
        return Ok(InstallerPlan::DownloadFresh);
    }
    let digest = download::md5_file(ready_installer)?;
    if digest.eq_ignore_ascii_case(expected_md5) {
        info!("verified installer already present, skipping download");
        return Ok(InstallerPlan::UseExisting);
    }
    info!("cached installer is stale, downloading a fresh copy");
    if let Err(e) = std::fs::remove_file(ready_installer) {
        warn!("could not remove stale installer: {e}");
    }
    Ok(InstallerPlan::DownloadFresh)
}

/// Verify the fresh download, then promote it to the verified name. The
/// pre-verification file never survives: copied on success, removed either
/// way.
fn verify_and_promote(
    fresh_installer: &Path,
    ready_installer: &Path,
    expected_md5: &str,
) -> Result<(), ManagerError> {
    let digest = download::md5_file(fresh_installer)?;
    if !digest.eq_ignore_ascii_case(expected_md5) {
        let _ = std::fs::remove_file(fresh_installer);
        return Err(ManagerError::DownloadFailed(format!(
            "installer hash mismatch: expected {expected_md5}, got {digest}"
        )));
    }
    std::fs::copy(fresh_installer, ready_installer)
        .map_err(|e| ManagerError::io("staging verified installer", e))?;
    if let Err(e) = std::fs::remove_file(fresh_installer) {
        warn!("could not remove pre-verification installer: {e}");
    }
    Ok(())
}

async fn run_silent_installer(
    installer: &Path,
    install_path: &Path,
) -> Result<(), ManagerError> {
    let mut cmd = tokio::process::Command::new(installer);
    cmd.arg("/S");
    cmd.arg(format!("/D={}", install_path.display()));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let status = match cmd.status().await {
        Ok(status) => status,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ManagerError::InstallFailed {
                message: "Please try running the launcher as an administrator.".into(),
                code: None,
            });
        }
        Err(e) => {
            return Err(ManagerError::InstallFailed {
                message: format!("failed to run installer: {e}"),
                code: None,
            });
        }
    };
    translate_installer_exit(status.code())
}

/// Installer exit codes worth a dedicated message; everything else is the
/// generic failure.
fn translate_installer_exit(code: Option<i32>) -> Result<(), ManagerError> {
    match code {
        Some(0) => Ok(()),
        Some(2) => Err(ManagerError::InstallFailed {
            message: "An instance of Interface is running. Please close it before proceeding."
                .into(),
            code: Some(2),
        }),
        code => Err(ManagerError::InstallFailed {
            message: "Installation failed. Please try again.".into(),
            code,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cdn_client::{CdnError, ReleaseAsset, ReleaseEntry};

    use crate::manager::logs::LogStore;
    use crate::manager::state::SessionState;

    use super::*;

    struct FakeFeed {
        releases: Vec<ReleaseEntry>,
        calls: AtomicUsize,
    }

    impl FakeFeed {
        fn new(releases: Vec<ReleaseEntry>) -> Self {
            Self {
                releases,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ReleaseFeed for FakeFeed {
        async fn release_meta(&self) -> Result<Vec<ReleaseEntry>, CdnError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.releases.clone())
        }
    }

    fn release(tag: &str, md5: &str, assets: Vec<ReleaseAsset>) -> ReleaseEntry {
        ReleaseEntry {
            tag_name: tag.to_string(),
            name: None,
            md5: md5.to_string(),
            assets,
        }
    }

    fn unreachable_asset() -> ReleaseAsset {
        ReleaseAsset {
            content_type: "application/x-msdownload".to_string(),
            browser_download_url: "http://127.0.0.1:9/Orbit_Setup_Latest.exe".to_string(),
            size: Some(64),
        }
    }

    async fn test_state(library: &Path) -> SharedState {
        let state = SessionState::shared(LogStore::new(100));
        state.lock().await.library_path = Some(library.to_path_buf());
        state
    }

    fn phases(rx: &mut mpsc::Receiver<Event>) -> Vec<InstallPhase> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::InstallerPhase { phase } = event {
                out.push(phase);
            }
        }
        out
    }

    fn clear_prereqs() -> Prereqs {
        Prereqs {
            running: RunningApps::default(),
            elevated: true,
        }
    }

    #[tokio::test]
    async fn sandbox_guard_fails_before_any_feed_access() {
        let library = tempfile::tempdir().unwrap();
        let state = test_state(library.path()).await;
        let config = LauncherConfig::default();
        let feed = FakeFeed::new(vec![release("2.1.0", "ABC123", vec![])]);
        let (tx, mut rx) = mpsc::channel(256);

        let prereqs = Prereqs {
            running: RunningApps {
                sandbox: true,
                interface: false,
            },
            elevated: true,
        };
        let err = run_pipeline(
            &state,
            &config,
            prereqs,
            &feed,
            cdn_client::shared_client(),
            &tx,
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ManagerError::GuardConflict { .. }));
        assert_eq!(feed.calls(), 0);
        assert_eq!(phases(&mut rx), vec![InstallPhase::CheckingPrereqs]);
    }

    #[tokio::test]
    async fn unelevated_fails_before_any_feed_access() {
        let library = tempfile::tempdir().unwrap();
        let state = test_state(library.path()).await;
        let config = LauncherConfig::default();
        let feed = FakeFeed::new(vec![release("2.1.0", "ABC123", vec![])]);
        let (tx, _rx) = mpsc::channel(256);

        let prereqs = Prereqs {
            running: RunningApps::default(),
            elevated: false,
        };
        let err = run_pipeline(
            &state,
            &config,
            prereqs,
            &feed,
            cdn_client::shared_client(),
            &tx,
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ManagerError::NotElevated));
        assert_eq!(feed.calls(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn matching_cached_installer_skips_the_download() {
        let library = tempfile::tempdir().unwrap();
        let config = LauncherConfig::default();
        let ready = library.path().join(&config.post_installer_name);
        std::fs::copy("/bin/true", &ready).unwrap();
        // Lowercased digest, compared case-insensitively against our
        // uppercase hashing.
        let digest = download::md5_file(&ready).unwrap().to_lowercase();

        let state = test_state(library.path()).await;
        // No assets at all: a download attempt would fail loudly.
        let feed = FakeFeed::new(vec![release("2.1.0", &digest, vec![])]);
        let (tx, mut rx) = mpsc::channel(256);

        let success = run_pipeline(
            &state,
            &config,
            clear_prereqs(),
            &feed,
            cdn_client::shared_client(),
            &tx,
            1,
        )
        .await
        .unwrap();

        assert_eq!(success.name, "2.1.0");
        assert_eq!(
            success.install_path,
            library.path().join("Orbit Interface-2_1_0")
        );
        assert_eq!(feed.calls(), 1);
        let seen = phases(&mut rx);
        assert_eq!(
            seen,
            vec![InstallPhase::CheckingPrereqs, InstallPhase::Installing]
        );
        assert!(!seen.contains(&InstallPhase::Downloading));
    }

    #[tokio::test]
    async fn stale_cached_installer_is_removed_before_downloading() {
        let library = tempfile::tempdir().unwrap();
        let config = LauncherConfig::default();
        let ready = library.path().join(&config.post_installer_name);
        std::fs::write(&ready, b"older installer build").unwrap();

        let state = test_state(library.path()).await;
        let feed = FakeFeed::new(vec![release(
            "2.1.0",
            "00000000000000000000000000000000",
            vec![unreachable_asset()],
        )]);
        let (tx, mut rx) = mpsc::channel(256);

        let err = run_pipeline(
            &state,
            &config,
            clear_prereqs(),
            &feed,
            cdn_client::shared_client(),
            &tx,
            1,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ManagerError::DownloadFailed(_)));
        assert!(!ready.exists());
        assert!(phases(&mut rx).contains(&InstallPhase::Downloading));
    }

    #[tokio::test]
    async fn second_claim_is_rejected_while_active() {
        let library = tempfile::tempdir().unwrap();
        let state = test_state(library.path()).await;

        let first = claim_session(&state).await.unwrap();
        let second = claim_session(&state).await.unwrap_err();
        assert!(matches!(second, ManagerError::DownloadInProgress));

        let (tx, _rx) = mpsc::channel(8);
        finish_session(&state, &tx, false).await;
        let third = claim_session(&state).await.unwrap();
        assert!(third > first);
    }

    #[test]
    fn installer_exit_codes_translate() {
        assert!(translate_installer_exit(Some(0)).is_ok());

        let busy = translate_installer_exit(Some(2)).unwrap_err();
        match busy {
            ManagerError::InstallFailed { message, code } => {
                assert!(message.contains("instance of Interface"));
                assert_eq!(code, Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let generic = translate_installer_exit(Some(5)).unwrap_err();
        assert!(matches!(
            generic,
            ManagerError::InstallFailed { code: Some(5), .. }
        ));
        assert!(matches!(
            translate_installer_exit(None).unwrap_err(),
            ManagerError::InstallFailed { code: None, .. }
        ));
    }

    #[tokio::test]
    async fn verify_and_promote_rejects_mismatched_download() {
        let library = tempfile::tempdir().unwrap();
        let fresh = library.path().join("Orbit_Setup_Latest.exe");
        let ready = library.path().join("Orbit_Setup_Latest_READY.exe");
        std::fs::write(&fresh, b"corrupted during transit").unwrap();

        let err = verify_and_promote(&fresh, &ready, "11111111111111111111111111111111")
            .unwrap_err();
        assert!(matches!(err, ManagerError::DownloadFailed(_)));
        assert!(!fresh.exists());
        assert!(!ready.exists());
    }

    #[tokio::test]
    async fn verify_and_promote_stages_matching_download() {
        let library = tempfile::tempdir().unwrap();
        let fresh = library.path().join("Orbit_Setup_Latest.exe");
        let ready = library.path().join("Orbit_Setup_Latest_READY.exe");
        std::fs::write(&fresh, b"installer payload").unwrap();
        let digest = download::md5_file(&fresh).unwrap();

        verify_and_promote(&fresh, &ready, &digest).unwrap();
        assert!(!fresh.exists());
        assert_eq!(std::fs::read(&ready).unwrap(), b"installer payload");
    }
}

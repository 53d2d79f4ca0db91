use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use launcher_core::proto::{
    ExitInfo, InterfaceStatus, LaunchBlock, LaunchMode, LaunchOptions, LogStream,
};

use crate::config::LauncherConfig;

use super::error::ManagerError;
use super::logs::{now_millis, LogStore};
use super::process_guard;
use super::source::ReleaseFeed;
use super::state::SharedState;
use super::updates;

pub enum LaunchOutcome {
    Launched { mode: LaunchMode, pid: Option<i32> },
    Blocked(LaunchBlock),
}

/// Interface argv from the request options. Order matters to the interface:
/// the deep link leads, VR disables come after any custom parameters.
pub fn build_parameters(options: &LaunchOptions) -> Vec<String> {
    let mut parameters = Vec::new();
    if let Some(url) = &options.custom_path {
        parameters.push(format!("--url \"{url}\""));
    }
    if let Some(custom) = &options.custom_parameters {
        for parameter in custom.split(',') {
            parameters.push(parameter.to_string());
        }
    }
    if options.allow_multiple_instances {
        parameters.push("--allowMultipleInstances".to_string());
    }
    if options.no_steam_vr && !options.no_oculus {
        parameters.push(r#"--disable-displays="OpenVR (Vive)""#.to_string());
        parameters.push(r#"--disable-inputs="OpenVR (Vive)""#.to_string());
    }
    if options.no_oculus && !options.no_steam_vr {
        parameters.push(r#"--disable-displays="Oculus Rift""#.to_string());
        parameters.push(r#"--disable-inputs="Oculus Rift""#.to_string());
    }
    if options.no_oculus && options.no_steam_vr {
        parameters.push(r#"--disable-displays="OpenVR (Vive),Oculus Rift""#.to_string());
        parameters.push(r#"--disable-inputs="OpenVR (Vive),Oculus Rift""#.to_string());
    }
    if options.auto_restart && options.launch_as_child {
        parameters.push("--suppress-settings-reset".to_string());
    }
    if options.dont_prompt_for_login {
        parameters.push("--no-login-suggestion".to_string());
    }
    parameters
}

/// The launch script re-quotes its second argument, so every character the
/// script's own parsing would eat is carried as a placeholder token and
/// restored on the far side. Arguments containing a literal placeholder
/// token are not representable.
pub fn encode_detached_args(parameters: &[String]) -> String {
    parameters
        .join(" ")
        .replace(' ', "#20")
        .replace('"', "#40")
        .replace('=', "#60")
        .replace(',', "#80")
}

pub fn decode_detached_args(encoded: &str) -> String {
    encoded
        .replace("#20", " ")
        .replace("#40", "\"")
        .replace("#60", "=")
        .replace("#80", ",")
}

pub async fn launch_interface(
    state: &SharedState,
    config: &LauncherConfig,
    feed: &dyn ReleaseFeed,
    options: LaunchOptions,
) -> Result<LaunchOutcome, ManagerError> {
    if options.check_for_updates {
        let check = updates::check_for_updates(state, feed).await?;
        if check.update_available {
            return Ok(LaunchOutcome::Blocked(LaunchBlock::UpdateAvailable {
                latest_version: check.latest_version,
            }));
        }
    }

    if !options.allow_multiple_instances && process_guard::is_running(&config.interface_exe) {
        let url_forwarded = match &options.custom_path {
            Some(url) => match webbrowser::open(url) {
                Ok(_) => true,
                Err(e) => {
                    warn!("could not forward {url} to the running interface: {e}");
                    false
                }
            },
            None => false,
        };
        return Ok(LaunchOutcome::Blocked(LaunchBlock::AlreadyRunning {
            url_forwarded,
        }));
    }

    let exec = PathBuf::from(&options.exec);
    let parameters = build_parameters(&options);
    let (logs, env) = {
        let session = state.lock().await;
        let env = session
            .metaverse_url
            .clone()
            .map(|url| (config.metaverse_env_var.clone(), url));
        (session.logs.clone(), env)
    };

    if options.launch_as_child {
        let spec = RespawnSpec {
            exec,
            parameters,
            env,
        };
        let pid = spawn_supervised(state, logs, spec, &options).await?;
        Ok(LaunchOutcome::Launched {
            mode: LaunchMode::Supervised,
            pid: Some(pid),
        })
    } else {
        let pid = spawn_detached(config, logs, &exec, &parameters, env).await?;
        Ok(LaunchOutcome::Launched {
            mode: LaunchMode::Detached,
            pid,
        })
    }
}

/// Everything needed to spawn the interface again with the same command
/// line.
struct RespawnSpec {
    exec: PathBuf,
    parameters: Vec<String>,
    env: Option<(String, String)>,
}

async fn spawn_supervised(
    state: &SharedState,
    logs: LogStore,
    spec: RespawnSpec,
    options: &LaunchOptions,
) -> Result<i32, ManagerError> {
    let mut child = spawn_child(&spec.exec, &spec.parameters, spec.env.as_ref())
        .map_err(|e| ManagerError::Message(format!("failed to launch interface: {e}")))?;
    let pid = child.id().map(|id| id as i32).unwrap_or_default();
    forward_output(&mut child, &logs);

    {
        let mut session = state.lock().await;
        session.interface = InterfaceStatus::Running {
            pid,
            mode: LaunchMode::Supervised,
            started_at_ms: now_millis(),
        };
    }

    let supervise_state = state.clone();
    let auto_restart = options.auto_restart;
    let max_restarts = options.max_restarts;
    tokio::spawn(async move {
        supervise(supervise_state, logs, spec, auto_restart, max_restarts, child).await;
    });
    Ok(pid)
}

/// Wait on the interface, recording every exit. A nonzero exit code
/// respawns the same command line while auto-restart allows; an explicit
/// kill (no exit code) or a clean exit ends supervision.
async fn supervise(
    state: SharedState,
    logs: LogStore,
    spec: RespawnSpec,
    auto_restart: bool,
    max_restarts: Option<u32>,
    mut child: Child,
) {
    let mut restarts: u32 = 0;
    loop {
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                warn!("lost track of interface process: {e}");
                let mut session = state.lock().await;
                session.interface = InterfaceStatus::Exited {
                    exit: ExitInfo {
                        code: None,
                        signal: None,
                    },
                    at_ms: now_millis(),
                };
                return;
            }
        };

        let exit = exit_info(&status);
        info!("interface exited with {:?}", exit.code);
        {
            let mut session = state.lock().await;
            session.interface = InterfaceStatus::Exited {
                exit: exit.clone(),
                at_ms: now_millis(),
            };
        }

        if !should_restart(auto_restart, exit.code) {
            return;
        }
        if let Some(cap) = max_restarts {
            if restarts >= cap {
                warn!("interface keeps exiting, restart cap of {cap} reached");
                return;
            }
        }

        restarts += 1;
        info!("restarting interface (attempt {restarts})");
        child = match spawn_child(&spec.exec, &spec.parameters, spec.env.as_ref()) {
            Ok(child) => child,
            Err(e) => {
                warn!("failed to restart interface: {e}");
                return;
            }
        };
        let pid = child.id().map(|id| id as i32).unwrap_or_default();
        forward_output(&mut child, &logs);
        let mut session = state.lock().await;
        session.interface = InterfaceStatus::Running {
            pid,
            mode: LaunchMode::Supervised,
            started_at_ms: now_millis(),
        };
    }
}

/// Nonzero exit codes are crashes worth restarting; a missing code means
/// the process was killed on purpose.
fn should_restart(auto_restart: bool, code: Option<i32>) -> bool {
    auto_restart && matches!(code, Some(code) if code != 0)
}

fn exit_info(status: &std::process::ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = std::os::unix::process::ExitStatusExt::signal(status);
    #[cfg(not(unix))]
    let signal = None;
    ExitInfo {
        code: status.code(),
        signal,
    }
}

fn spawn_child(
    exec: &Path,
    parameters: &[String],
    env: Option<&(String, String)>,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(exec);
    cmd.args(parameters);
    if let Some((key, value)) = env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.spawn()
}

fn forward_output(child: &mut Child, logs: &LogStore) {
    if let Some(stdout) = child.stdout.take() {
        let stdout_logs = logs.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                stdout_logs.push_interface(LogStream::Stdout, line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let stderr_logs = logs.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                stderr_logs.push_interface(LogStream::Stderr, line);
            }
        });
    }
}

async fn spawn_detached(
    config: &LauncherConfig,
    logs: LogStore,
    exec: &Path,
    parameters: &[String],
    env: Option<(String, String)>,
) -> Result<Option<i32>, ManagerError> {
    let script = config.launch_script_path();
    let mut cmd = Command::new(&script);
    cmd.arg(format!("\"{}\"", exec.display()));
    cmd.arg(encode_detached_args(parameters));
    if let Some((key, value)) = &env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        ManagerError::Message(format!(
            "failed to start launch script {}: {e}",
            script.display()
        ))
    })?;
    let pid = child.id().map(|id| id as i32);
    forward_output(&mut child, &logs);
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => info!("launch script exited with {:?}", status.code()),
            Err(e) => warn!("lost track of launch script: {e}"),
        }
    });
    Ok(pid)
}

pub fn launch_sandbox(config: &LauncherConfig, folder: &str) -> Result<Option<i32>, ManagerError> {
    spawn_fire_and_forget(&Path::new(folder).join(&config.sandbox_launch_path), "sandbox")
}

pub fn spawn_uninstaller(
    config: &LauncherConfig,
    folder: &str,
) -> Result<Option<i32>, ManagerError> {
    spawn_fire_and_forget(&Path::new(folder).join(&config.uninstaller_exe), "uninstaller")
}

fn spawn_fire_and_forget(exec: &Path, what: &str) -> Result<Option<i32>, ManagerError> {
    let mut cmd = Command::new(exec);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    let child = cmd.spawn().map_err(|e| {
        ManagerError::Message(format!("failed to start {what} {}: {e}", exec.display()))
    })?;
    Ok(child.id().map(|id| id as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LaunchOptions {
        LaunchOptions {
            exec: "/srv/orbit/library/Orbit Interface-2_1_0/interface.exe".into(),
            ..LaunchOptions::default()
        }
    }

    #[test]
    fn parameters_for_defaults_are_empty() {
        assert!(build_parameters(&options()).is_empty());
    }

    #[test]
    fn url_leads_and_custom_parameters_split_on_commas() {
        let opts = LaunchOptions {
            custom_path: Some("orbit://welcome/home".into()),
            custom_parameters: Some("--foo,--bar baz".into()),
            allow_multiple_instances: true,
            ..options()
        };
        assert_eq!(
            build_parameters(&opts),
            vec![
                r#"--url "orbit://welcome/home""#.to_string(),
                "--foo".to_string(),
                "--bar baz".to_string(),
                "--allowMultipleInstances".to_string(),
            ]
        );
    }

    #[test]
    fn vr_disable_flags_cover_each_combination() {
        let steam = LaunchOptions {
            no_steam_vr: true,
            ..options()
        };
        assert_eq!(
            build_parameters(&steam),
            vec![
                r#"--disable-displays="OpenVR (Vive)""#.to_string(),
                r#"--disable-inputs="OpenVR (Vive)""#.to_string(),
            ]
        );

        let oculus = LaunchOptions {
            no_oculus: true,
            ..options()
        };
        assert_eq!(
            build_parameters(&oculus),
            vec![
                r#"--disable-displays="Oculus Rift""#.to_string(),
                r#"--disable-inputs="Oculus Rift""#.to_string(),
            ]
        );

        let both = LaunchOptions {
            no_steam_vr: true,
            no_oculus: true,
            ..options()
        };
        assert_eq!(
            build_parameters(&both),
            vec![
                r#"--disable-displays="OpenVR (Vive),Oculus Rift""#.to_string(),
                r#"--disable-inputs="OpenVR (Vive),Oculus Rift""#.to_string(),
            ]
        );
    }

    #[test]
    fn settings_reset_suppressed_only_for_supervised_restarts() {
        let supervised = LaunchOptions {
            auto_restart: true,
            launch_as_child: true,
            dont_prompt_for_login: true,
            ..options()
        };
        assert_eq!(
            build_parameters(&supervised),
            vec![
                "--suppress-settings-reset".to_string(),
                "--no-login-suggestion".to_string(),
            ]
        );

        let detached = LaunchOptions {
            auto_restart: true,
            launch_as_child: false,
            ..options()
        };
        assert!(build_parameters(&detached).is_empty());
    }

    #[test]
    fn detached_encoding_round_trips() {
        let parameters = vec![
            r#"--url "wss://orbit.example.net:42?x=1,y=2""#.to_string(),
            r#"--disable-displays="OpenVR (Vive),Oculus Rift""#.to_string(),
            "--no-login-suggestion".to_string(),
        ];
        let encoded = encode_detached_args(&parameters);
        for forbidden in [' ', '"', '=', ','] {
            assert!(
                !encoded.contains(forbidden),
                "encoded form still contains {forbidden:?}: {encoded}"
            );
        }
        assert_eq!(decode_detached_args(&encoded), parameters.join(" "));
    }

    #[test]
    fn restart_only_on_nonzero_exit_codes() {
        assert!(should_restart(true, Some(1)));
        assert!(should_restart(true, Some(-11)));
        assert!(!should_restart(true, Some(0)));
        assert!(!should_restart(true, None));
        assert!(!should_restart(false, Some(1)));
    }
}

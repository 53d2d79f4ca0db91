use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::{sleep, Duration};

use launcher_core::proto::{InterfaceStatus, LaunchMode, LogLine, LogStream};

mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    Ping,
    Status,
    CheckUpdates,
    Install,
    Cancel,
    Launch {
        #[arg(long, value_name = "EXEC")]
        exec: Option<PathBuf>,

        #[arg(long, value_name = "URL")]
        url: Option<String>,

        #[arg(long = "check-updates")]
        check_updates: bool,

        #[arg(long, value_name = "PARAMS")]
        params: Option<String>,

        #[arg(long = "allow-multiple")]
        allow_multiple: bool,

        #[arg(long = "no-steamvr")]
        no_steamvr: bool,

        #[arg(long = "no-oculus")]
        no_oculus: bool,

        #[arg(long)]
        restart: bool,

        #[arg(long)]
        child: bool,

        #[arg(long = "no-login-prompt")]
        no_login_prompt: bool,

        #[arg(long = "max-restarts", value_name = "N")]
        max_restarts: Option<u32>,
    },
    Sandbox {
        folder: Option<String>,
    },
    Uninstall {
        folder: Option<String>,
    },
    Close,
    Library {
        #[command(subcommand)]
        cmd: LibraryCmd,
    },
    Interfaces,
    Use {
        path: String,
    },
    Location {
        #[command(subcommand)]
        cmd: LocationCmd,
    },
    Events,
    State {
        #[command(subcommand)]
        cmd: StateCmd,
    },
    Metaverse {
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        #[arg(long)]
        clear: bool,
    },
    Elevated,
    RelaunchElevated,
    Logs {
        #[arg(short = 'n', long = "lines", default_value_t = 200)]
        lines: usize,

        #[arg(short = 'f', long = "follow")]
        follow: bool,

        #[arg(long = "daemon-logs")]
        daemon_logs: bool,
    },
    Shutdown,
}

#[derive(Subcommand)]
enum LibraryCmd {
    Get,
    Set { path: String },
    Default,
}

#[derive(Subcommand)]
enum LocationCmd {
    Get,
    Set { path: String },
}

#[derive(Subcommand)]
enum StateCmd {
    Get,
    Set { json: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.cmd {
        Cmd::Ping => {
            let resp = client::ping().await?;
            println!("{resp}");
        }
        Cmd::Status => {
            let status = client::status().await?;
            println!(
                "daemon: v{} (pid {}, up {}s, protocol {})",
                status.daemon.daemon_version,
                status.daemon.pid,
                status.daemon.uptime_ms / 1000,
                status.daemon.protocol_version,
            );
            match status.interface {
                InterfaceStatus::Idle {} => println!("interface: idle"),
                InterfaceStatus::Running {
                    pid,
                    mode,
                    started_at_ms,
                } => {
                    let mode = match mode {
                        LaunchMode::Supervised => "supervised",
                        LaunchMode::Detached => "detached",
                    };
                    println!("interface: running {mode} (pid {pid}, since {started_at_ms})");
                }
                InterfaceStatus::Exited { exit, at_ms } => match (exit.code, exit.signal) {
                    (Some(code), _) => println!("interface: exited with code {code} at {at_ms}"),
                    (None, Some(signal)) => {
                        println!("interface: killed by signal {signal} at {at_ms}")
                    }
                    (None, None) => println!("interface: exited at {at_ms}"),
                },
            }
            println!("install: {:?}", status.install);
        }
        Cmd::CheckUpdates => {
            let resp = client::check_updates().await?;
            println!("{resp}");
        }
        Cmd::Install => {
            let resp = client::install().await?;
            println!("{resp}");
        }
        Cmd::Cancel => {
            let resp = client::cancel_download().await?;
            println!("{resp}");
        }
        Cmd::Launch {
            exec,
            url,
            check_updates,
            params,
            allow_multiple,
            no_steamvr,
            no_oculus,
            restart,
            child,
            no_login_prompt,
            max_restarts,
        } => {
            let flags = client::LaunchFlags {
                url,
                check_updates,
                params,
                allow_multiple,
                no_steamvr,
                no_oculus,
                restart,
                child,
                no_login_prompt,
                max_restarts,
            };
            let resp = client::launch(exec, flags).await?;
            println!("{resp}");
        }
        Cmd::Sandbox { folder } => {
            let resp = client::sandbox(folder).await?;
            println!("{resp}");
        }
        Cmd::Uninstall { folder } => {
            let resp = client::uninstall(folder).await?;
            println!("{resp}");
        }
        Cmd::Close => {
            let resp = client::close().await?;
            println!("{resp}");
        }
        Cmd::Library { cmd } => {
            let resp = match cmd {
                LibraryCmd::Get => client::library_get().await?,
                LibraryCmd::Set { path } => client::library_set(path).await?,
                LibraryCmd::Default => client::library_default().await?,
            };
            println!("{resp}");
        }
        Cmd::Interfaces => {
            let resp = client::interfaces().await?;
            println!("{resp}");
        }
        Cmd::Use { path } => {
            let resp = client::use_interface(path).await?;
            println!("{resp}");
        }
        Cmd::Location { cmd } => {
            let resp = match cmd {
                LocationCmd::Get => client::location_get().await?,
                LocationCmd::Set { path } => client::location_set(path).await?,
            };
            println!("{resp}");
        }
        Cmd::Events => {
            let resp = client::events().await?;
            println!("{resp}");
        }
        Cmd::State { cmd } => {
            let resp = match cmd {
                StateCmd::Get => client::load_state().await?,
                StateCmd::Set { json } => client::save_state(json).await?,
            };
            println!("{resp}");
        }
        Cmd::Metaverse { url, clear } => {
            let url = match (url, clear) {
                (_, true) => None,
                (Some(url), false) => Some(url),
                (None, false) => {
                    anyhow::bail!("pass --url <URL> to set a server or --clear to remove it")
                }
            };
            let resp = client::set_metaverse(url).await?;
            println!("{resp}");
        }
        Cmd::Elevated => {
            let resp = client::elevated().await?;
            println!("{resp}");
        }
        Cmd::RelaunchElevated => {
            let resp = client::relaunch_elevated().await?;
            println!("{resp}");
        }
        Cmd::Logs {
            lines,
            follow,
            daemon_logs,
        } => {
            if follow {
                follow_logs(lines, daemon_logs).await?;
            } else {
                let tail = fetch_tail(lines, daemon_logs).await?;
                if tail.truncated {
                    eprintln!("(older lines omitted; raise -n to see more)");
                }
                for entry in tail.lines {
                    print_log_line(&entry);
                }
            }
        }
        Cmd::Shutdown => {
            let resp = client::shutdown().await?;
            println!("{resp}");
        }
    }
    Ok(())
}

async fn fetch_tail(lines: usize, daemon_logs: bool) -> anyhow::Result<client::LogsTailInfo> {
    if daemon_logs {
        client::daemon_logs_tail(lines).await
    } else {
        client::logs_tail(lines).await
    }
}

/// Re-poll the tail once a second, printing only entries not yet seen. The
/// store keys entries by millisecond timestamp, so ties on the newest stamp
/// are deduplicated by content.
async fn follow_logs(lines: usize, daemon_logs: bool) -> anyhow::Result<()> {
    let mut newest_ms = 0u64;
    let mut printed_at_newest: Vec<String> = Vec::new();

    loop {
        for entry in fetch_tail(lines, daemon_logs).await?.lines {
            let fresh = if entry.at_ms > newest_ms {
                newest_ms = entry.at_ms;
                printed_at_newest.clear();
                true
            } else if entry.at_ms == newest_ms {
                !printed_at_newest.contains(&entry.line)
            } else {
                false
            };
            if fresh {
                printed_at_newest.push(entry.line.clone());
                print_log_line(&entry);
            }
        }

        sleep(Duration::from_secs(1)).await;
    }
}

fn print_log_line(entry: &LogLine) {
    let tag = match entry.stream {
        LogStream::Stdout => "stdout",
        LogStream::Stderr => "stderr",
    };
    println!("[{tag}] {}", entry.line.trim_end());
}

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use blogsentry_core::{storage::Database, AppConfig, Pipeline, SchedulerService};

fn pid_file_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("blogsentry")
        .join("daemon.pid")
}

fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// PID of the running daemon, if any. A stale PID file is removed.
pub(crate) fn running_pid() -> Option<u32> {
    let pid_path = pid_file_path();
    let contents = fs::read_to_string(&pid_path).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;

    if process_alive(pid) {
        return Some(pid);
    }

    let _ = fs::remove_file(&pid_path);
    None
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&pid_path, format!("{}\n", std::process::id()))?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

pub async fn start(db: Database, config: Arc<AppConfig>) -> Result<()> {
    if let Some(pid) = running_pid() {
        println!("Daemon is already running (PID: {})", pid);
        return Ok(());
    }

    println!("Starting blogsentry daemon...");

    let pipeline = Pipeline::new(db, config.clone())?;
    write_pid_file()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    println!(
        "Daemon started (PID: {}). Press Ctrl+C or run 'blogsentry daemon stop' to stop.",
        std::process::id()
    );
    if config.sync.run_interval_secs == 0 {
        println!("  Scheduled runs are disabled (run_interval_secs = 0)");
    } else {
        println!("  Run interval: {} seconds", config.sync.run_interval_secs);
        println!("  Run on startup: {}", config.sync.run_on_startup);
    }
    println!("  Cleanup interval: {} seconds", config.sync.cleanup_interval_secs);

    SchedulerService::new(Arc::new(pipeline)).run(shutdown_rx).await;

    remove_pid_file();
    println!("Daemon stopped.");

    Ok(())
}

/// Poll until `pid` exits or `timeout` elapses; true when it exited
#[cfg_attr(not(unix), allow(dead_code))]
async fn wait_for_exit<F>(pid: u32, timeout: Duration, is_alive: F) -> bool
where
    F: Fn(u32) -> bool,
{
    let started = tokio::time::Instant::now();
    let mut last_notice = started;

    while started.elapsed() < timeout {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if !is_alive(pid) {
            return true;
        }
        if last_notice.elapsed() >= Duration::from_secs(10) {
            println!(
                "  A pipeline run is still finishing ({}s elapsed)...",
                started.elapsed().as_secs()
            );
            last_notice = tokio::time::Instant::now();
        }
    }

    !is_alive(pid)
}

pub async fn stop(timeout_secs: u64, force: bool) -> Result<()> {
    let Some(pid) = running_pid() else {
        println!("Daemon is not running.");
        return Ok(());
    };

    println!("Stopping daemon (PID: {})...", pid);

    #[cfg(unix)]
    {
        use std::process::Command;

        let output = Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .output()?;

        if !output.status.success() {
            println!("Failed to stop daemon. You may need to kill it manually: kill {}", pid);
            return Ok(());
        }

        // The daemon finishes a run in progress before it exits
        if wait_for_exit(pid, Duration::from_secs(timeout_secs), process_alive).await {
            remove_pid_file();
            println!("Daemon stopped successfully.");
            return Ok(());
        }

        if !force {
            println!(
                "Daemon is still finishing a run after {}s; it will exit when the run completes.",
                timeout_secs
            );
            println!("Use 'blogsentry daemon stop --force' to kill it (may repeat the last digest).");
            return Ok(());
        }

        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
        remove_pid_file();
        println!("Daemon forcefully terminated.");
    }

    #[cfg(not(unix))]
    {
        let _ = (timeout_secs, force);
        println!("Please stop the daemon manually (PID: {})", pid);
    }

    Ok(())
}

pub async fn status() -> Result<()> {
    match running_pid() {
        Some(pid) => {
            println!("Daemon is running (PID: {})", pid);
            println!("PID file: {}", pid_file_path().display());
        }
        None => println!("Daemon is not running."),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_sees_process_exit() {
        let checks = AtomicU32::new(0);
        let exited = wait_for_exit(42, Duration::from_secs(600), |_| {
            checks.fetch_add(1, Ordering::SeqCst) < 45
        })
        .await;

        assert!(exited);
        assert_eq!(checks.load(Ordering::SeqCst), 46);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_gives_up_after_timeout() {
        let started = tokio::time::Instant::now();
        let exited = wait_for_exit(42, Duration::from_secs(5), |_| true).await;

        assert!(!exited);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(7));
    }
}

// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle of the signal-cli daemon subprocess.
//!
//! [`DaemonProcess::start`] prepares the working directory, clears a stale
//! socket, launches the daemon and waits for the socket to appear.
//! [`supervise`] restarts the daemon when it exits unexpectedly, within a
//! bounded [`RestartPolicy`], and stops it gracefully on shutdown.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use sigil_core::SigilError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::TransportStatus;

/// Interval between checks for the daemon socket.
const ENDPOINT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything needed to launch the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub cli_path: String,
    pub account: String,
    pub config_dir: PathBuf,
    pub socket_path: PathBuf,
    pub start_timeout: Duration,
    pub restart: RestartPolicy,
    pub shutdown_grace: Duration,
}

impl DaemonConfig {
    /// Command-line arguments selecting socket daemon mode.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.account.clone(),
            "--config".to_string(),
            self.config_dir.display().to_string(),
            "daemon".to_string(),
            "--socket".to_string(),
            self.socket_path.display().to_string(),
            "--receive-mode".to_string(),
            "on-connection".to_string(),
            "--no-receive-stdout".to_string(),
        ]
    }
}

/// Bounded restart-on-exit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub delay: Duration,
}

impl RestartPolicy {
    /// Delay before the next restart, or `None` once the budget is spent.
    pub fn next_delay(&self, restarts_so_far: u32) -> Option<Duration> {
        (restarts_so_far < self.max_restarts).then_some(self.delay)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

/// A running daemon subprocess.
#[derive(Debug)]
pub struct DaemonProcess {
    child: Child,
}

impl DaemonProcess {
    /// Launches the daemon and blocks until its socket exists.
    ///
    /// Fails with [`SigilError::DaemonStartTimeout`] when the socket does not
    /// appear within `config.start_timeout`; the half-started process is
    /// killed in that case.
    pub async fn start(config: &DaemonConfig) -> Result<Self, SigilError> {
        tokio::fs::create_dir_all(&config.config_dir)
            .await
            .map_err(|e| daemon_error(format!("cannot create {}", config.config_dir.display()), e))?;
        if let Some(parent) = config.socket_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| daemon_error(format!("cannot create {}", parent.display()), e))?;
        }
        remove_stale_socket(&config.socket_path).await?;

        info!(
            cli = %config.cli_path,
            socket = %config.socket_path.display(),
            "starting signal daemon"
        );
        let mut child = Command::new(&config.cli_path)
            .args(config.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| daemon_error(format!("failed to spawn `{}`", config.cli_path), e))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.trim().is_empty() {
                        debug!(target: "sigil_signal::daemon::stderr", "{line}");
                    }
                }
            });
        }

        match wait_for_endpoint(&config.socket_path, config.start_timeout).await {
            Ok(()) => {
                info!(pid = ?child.id(), "signal daemon is accepting connections");
                Ok(Self { child })
            }
            Err(e) => {
                let _ = child.kill().await;
                Err(e)
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Waits for the process to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Sends SIGTERM, waits up to `grace`, then kills.
    pub async fn stop(mut self, grace: Duration) {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(%status, "daemon already exited");
            return;
        }
        if let Some(pid) = self.child.id() {
            terminate(pid);
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "signal daemon stopped"),
            Ok(Err(e)) => warn!(error = %e, "failed to reap signal daemon"),
            Err(_) => {
                warn!(?grace, "signal daemon ignored SIGTERM, killing");
                if let Err(e) = self.child.kill().await {
                    error!(error = %e, "failed to kill signal daemon");
                }
            }
        }
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

fn daemon_error(message: String, source: std::io::Error) -> SigilError {
    SigilError::Daemon {
        message: format!("{message}: {source}"),
        source: Some(Box::new(source)),
    }
}

async fn remove_stale_socket(path: &Path) -> Result<(), SigilError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(daemon_error(
            format!("cannot remove stale socket {}", path.display()),
            e,
        )),
    }
}

/// Polls until `path` exists or `timeout` elapses.
pub async fn wait_for_endpoint(path: &Path, timeout: Duration) -> Result<(), SigilError> {
    let poll = async {
        loop {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(ENDPOINT_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| SigilError::DaemonStartTimeout {
            endpoint: path.display().to_string(),
            waited: timeout,
        })
}

/// Keeps the daemon running until `shutdown` fires.
///
/// An unexpected exit triggers a restart after the policy delay; once the
/// restart budget is spent the status becomes [`TransportStatus::Failed`].
pub async fn supervise(
    config: DaemonConfig,
    mut process: DaemonProcess,
    status: watch::Sender<TransportStatus>,
    shutdown: CancellationToken,
) {
    let mut restarts = 0u32;
    loop {
        let exit = tokio::select! {
            exit = process.wait() => Some(exit),
            () = shutdown.cancelled() => None,
        };
        match exit {
            Some(Ok(code)) => warn!(status = %code, "signal daemon exited"),
            Some(Err(e)) => warn!(error = %e, "signal daemon wait failed"),
            None => {
                process.stop(config.shutdown_grace).await;
                crate::publish(&status, TransportStatus::Stopped);
                return;
            }
        }

        let Some(delay) = config.restart.next_delay(restarts) else {
            error!(restarts, "signal daemon restart budget exhausted");
            crate::publish(&status, TransportStatus::Failed(format!(
                "daemon exited {restarts} times"
            )));
            return;
        };
        restarts += 1;
        crate::publish(&status, TransportStatus::DaemonRestarting { attempt: restarts });
        info!(attempt = restarts, ?delay, "restarting signal daemon");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = shutdown.cancelled() => {
                crate::publish(&status, TransportStatus::Stopped);
                return;
            }
        }

        match DaemonProcess::start(&config).await {
            Ok(next) => process = next,
            Err(e) => {
                error!(error = %e, "signal daemon failed to restart");
                crate::publish(&status, TransportStatus::Failed(e.to_string()));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> DaemonConfig {
        DaemonConfig {
            cli_path: "signal-cli".into(),
            account: "+15550000000".into(),
            config_dir: dir.join("cfg"),
            socket_path: dir.join("signal.sock"),
            start_timeout: Duration::from_millis(300),
            restart: RestartPolicy::default(),
            shutdown_grace: Duration::from_secs(1),
        }
    }

    #[test]
    fn args_select_socket_daemon_mode() {
        let cfg = config(Path::new("/data"));
        assert_eq!(
            cfg.args(),
            vec![
                "-a",
                "+15550000000",
                "--config",
                "/data/cfg",
                "daemon",
                "--socket",
                "/data/signal.sock",
                "--receive-mode",
                "on-connection",
                "--no-receive-stdout",
            ]
        );
    }

    #[test]
    fn restart_policy_is_bounded() {
        let policy = RestartPolicy::default();
        for n in 0..5 {
            assert_eq!(policy.next_delay(n), Some(Duration::from_secs(5)));
        }
        assert_eq!(policy.next_delay(5), None);
        assert_eq!(policy.next_delay(9), None);
    }

    #[tokio::test]
    async fn endpoint_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = wait_for_endpoint(&dir.path().join("missing.sock"), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, SigilError::DaemonStartTimeout { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn endpoint_wait_sees_late_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.sock");
        let writer = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tokio::fs::write(writer, b"").await.unwrap();
        });
        wait_for_endpoint(&path, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn stale_socket_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"").unwrap();
        remove_stale_socket(&path).await.unwrap();
        assert!(!path.exists());
        remove_stale_socket(&path).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_fails_when_socket_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        // `sleep` rejects the daemon arguments and never creates the socket.
        cfg.cli_path = "sleep".into();
        let err = DaemonProcess::start(&cfg).await.unwrap_err();
        assert!(matches!(err, SigilError::DaemonStartTimeout { .. }));
        assert!(cfg.config_dir.exists());
    }
}

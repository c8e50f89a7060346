// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-command execution for the two controller-initiated RPCs
//! (`exec`, `ready_probe`). Commands run through `/bin/sh -c` with a bounded
//! timeout via a dedicated subprocess-with-timeout helper rather than
//! inlining `Command::new` at each call site.

use std::time::Duration;

use async_trait::async_trait;
use e2epool_channel::CommandExecutor;
use e2epool_wire::ExecResultPayload;
use tokio::process::Command;

pub struct ShellCommandExecutor {
    readiness_cmd: Option<String>,
}

impl ShellCommandExecutor {
    pub fn new(readiness_cmd: Option<String>) -> Self {
        Self { readiness_cmd }
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn exec(&self, cmd: &str, timeout: Duration) -> ExecResultPayload {
        run_with_timeout(cmd, timeout).await
    }

    async fn ready(&self) -> bool {
        match &self.readiness_cmd {
            None => true,
            Some(cmd) => run_with_timeout(cmd, Duration::from_secs(30)).await.exit_code == 0,
        }
    }
}

/// Runs `cmd` via `/bin/sh -c` and collects its exit code and output,
/// treating a timeout the same as a non-zero exit so callers never need a
/// third outcome.
async fn run_with_timeout(cmd: &str, timeout: Duration) -> ExecResultPayload {
    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            return ExecResultPayload { exit_code: -1, stdout: String::new(), stderr: e.to_string() }
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => ExecResultPayload {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(e)) => ExecResultPayload { exit_code: -1, stdout: String::new(), stderr: e.to_string() },
        Err(_) => ExecResultPayload {
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("command timed out after {timeout:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_captures_stdout_and_zero_exit_code() {
        let executor = ShellCommandExecutor::new(None);
        let result = executor.exec("echo -n hello", Duration::from_secs(5)).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello");
    }

    #[tokio::test]
    async fn exec_captures_nonzero_exit_code_and_stderr() {
        let executor = ShellCommandExecutor::new(None);
        let result = executor.exec("echo -n oops >&2; exit 7", Duration::from_secs(5)).await;
        assert_eq!(result.exit_code, 7);
        assert_eq!(result.stderr, "oops");
    }

    #[tokio::test]
    async fn exec_treats_timeout_as_nonzero_exit() {
        let executor = ShellCommandExecutor::new(None);
        let result = executor.exec("sleep 5", Duration::from_millis(50)).await;
        assert_eq!(result.exit_code, -1);
        assert!(result.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn ready_is_true_without_a_configured_readiness_command() {
        let executor = ShellCommandExecutor::new(None);
        assert!(executor.ready().await);
    }

    #[tokio::test]
    async fn ready_reflects_the_configured_readiness_command_exit_code() {
        let executor = ShellCommandExecutor::new(Some("exit 0".to_string()));
        assert!(executor.ready().await);

        let executor = ShellCommandExecutor::new(Some("exit 1".to_string()));
        assert!(!executor.ready().await);
    }
}

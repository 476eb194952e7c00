//! External command execution for the supervision toolset.

use async_trait::async_trait;
use tokio::process::Command;

use super::error::SupervisorError;

/// Runs a named external program and returns its stdout.
///
/// Injected into [`super::Service`] so the state machine can be exercised
/// without the real s6 binaries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SupervisorError>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String, SupervisorError> {
        let cmd_line = command_line(program, args);
        tracing::debug!("exec: {cmd_line}");

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| SupervisorError::Command {
                command: cmd_line.clone(),
                reason: format!("failed to execute: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SupervisorError::Command {
                command: cmd_line,
                reason: format!("exit {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Render a program and its arguments as a single shell-like line.
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_args() {
        assert_eq!(command_line("s6-svc", &["-u", "/svc/site.tld"]), "s6-svc -u /svc/site.tld");
        assert_eq!(command_line("true", &[]), "true");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let out = SystemCommandRunner.run("echo", &["true"]).await;
        assert_eq!(out.ok().as_deref(), Some("true"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_command_error() {
        let err = SystemCommandRunner.run("false", &[]).await;
        assert!(matches!(err, Err(SupervisorError::Command { .. })));
    }

    #[tokio::test]
    async fn missing_program_is_command_error() {
        let err = SystemCommandRunner
            .run("hera-definitely-not-a-program", &["-x"])
            .await;
        match err {
            Err(SupervisorError::Command { command, .. }) => {
                assert_eq!(command, "hera-definitely-not-a-program -x");
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }
}

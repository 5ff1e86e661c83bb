//! Shell command runner

use async_trait::async_trait;
use dms_core::{Error, Result, Rule};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::traits::RuleRunner;

/// Runs the rule argument through `sh -c` and returns its stdout
///
/// There is no timeout: a command that never exits holds its caller forever.
pub struct CommandRunner;

#[async_trait]
impl RuleRunner for CommandRunner {
    async fn run(&self, rule: &Rule) -> Result<String> {
        debug!("Running command for {}: {}", rule.name, rule.argument);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&rule.argument)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::run(format!("Failed to start '{}': {}", rule.argument, e)))?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Command for {} exited with {}", rule.name, code);
            return Err(Error::run(format!(
                "'{}' exited with {}: {}",
                rule.argument,
                code,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| Error::run(format!("Output of '{}' is not UTF-8: {}", rule.argument, e)))
    }

    fn kind_name(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_core::RuleKind;

    fn command(arg: &str) -> Rule {
        Rule::new("cmd", RuleKind::Command, arg, 0)
    }

    #[tokio::test]
    async fn test_echo() {
        let out = CommandRunner.run(&command("echo ok")).await.unwrap();
        assert_eq!(out, "ok\n");
    }

    #[tokio::test]
    async fn test_true_has_empty_output() {
        let out = CommandRunner.run(&command("true")).await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_shell_features() {
        let out = CommandRunner
            .run(&command("printf 'a\\nb\\n' | wc -l"))
            .await
            .unwrap();
        assert_eq!(out.trim(), "2");
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = CommandRunner
            .run(&command("echo nope >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            Error::RunError(msg) => {
                assert!(msg.contains("exited with 3"));
                assert!(msg.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let err = CommandRunner
            .run(&command("printf '\\377\\376'"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RunError(_)));
    }
}

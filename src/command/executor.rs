use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::template::RenderedCommand;
use crate::errors::CommandError;

/// Captured result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr.
    pub output: String,
    pub exit_code: i32,
}

/// Runs rendered commands. The orchestrator only talks to this trait so
/// tests can script process behavior.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, command: &RenderedCommand) -> Result<CommandOutput, CommandError>;
}

/// Spawns real processes with `tokio::process`. No shell is involved and
/// no timeout is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, command: &RenderedCommand) -> Result<CommandOutput, CommandError> {
        let rendered = command.to_string();
        tracing::debug!(command = %rendered, "spawning");

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &command.cwd {
            process.current_dir(cwd);
        }

        let output = process.output().await.map_err(|source| CommandError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            tracing::warn!(
                command = %rendered,
                exit_code = ?output.status.code(),
                "command failed"
            );
            return Err(CommandError::Failed {
                command: rendered,
                exit_code: output.status.code(),
                output: combined,
            });
        }

        Ok(CommandOutput {
            output: combined,
            exit_code: output.status.code().unwrap_or(0),
        })
    }
}

/// Run `commands` in order, stopping at the first failure. Returns the
/// concatenated output of every step.
pub async fn run_all(
    executor: &dyn Executor,
    commands: &[RenderedCommand],
) -> Result<String, CommandError> {
    let mut output = String::new();
    for command in commands {
        let step = executor.execute(command).await?;
        output.push_str(&step.output);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sh(script: &str) -> RenderedCommand {
        RenderedCommand {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            cwd: None,
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr() {
        let out = ProcessExecutor
            .execute(&sh("echo out; echo err >&2"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure_with_output() {
        let err = ProcessExecutor
            .execute(&sh("echo broken >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            CommandError::Failed {
                exit_code, output, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(output, "broken\n");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cmd = RenderedCommand {
            program: "dockhand-definitely-not-a-program".into(),
            args: vec![],
            cwd: None,
        };
        let err = ProcessExecutor.execute(&cmd).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let out = ProcessExecutor
            .execute(&sh("pwd").with_cwd(dir.path()))
            .await
            .unwrap();
        let reported = std::path::PathBuf::from(out.output.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    struct Recording {
        seen: Mutex<Vec<String>>,
        fail_on: &'static str,
    }

    #[async_trait]
    impl Executor for Recording {
        async fn execute(&self, command: &RenderedCommand) -> Result<CommandOutput, CommandError> {
            let line = command.to_string();
            self.seen.lock().unwrap().push(line.clone());
            if command.has_arg(self.fail_on) {
                return Err(CommandError::Failed {
                    command: line,
                    exit_code: Some(1),
                    output: String::new(),
                });
            }
            Ok(CommandOutput {
                output: format!("{}\n", command.args.join(" ")),
                exit_code: 0,
            })
        }
    }

    #[tokio::test]
    async fn test_run_all_concatenates_and_stops_on_failure() {
        let executor = Recording {
            seen: Mutex::new(Vec::new()),
            fail_on: "two",
        };
        let commands = vec![sh("one"), sh("two"), sh("three")];
        let result = run_all(&executor, &commands[..1]).await.unwrap();
        assert_eq!(result, "-c one\n");

        assert!(run_all(&executor, &commands).await.is_err());
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 3); // "one" twice, then "two"; "three" never runs
    }
}

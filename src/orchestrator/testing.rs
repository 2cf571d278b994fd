//! Test doubles for the orchestrator: a scripted executor that imitates
//! the filesystem effects of `ssh-keygen` and `git clone` and tracks which
//! compose projects are up.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use super::Orchestrator;
use crate::command::{CommandOutput, Executor, RenderedCommand};
use crate::config::Settings;
use crate::errors::CommandError;

pub const PASSWORD: &str = "hunter2";

#[derive(Default)]
struct State {
    commands: Vec<RenderedCommand>,
    running: HashSet<String>,
    fail_teardown: bool,
    fail_program: Option<String>,
}

#[derive(Default)]
pub struct FakeExecutor {
    state: Mutex<State>,
}

impl FakeExecutor {
    /// Make every `compose down` fail.
    pub fn fail_teardown(&self) {
        self.state.lock().unwrap().fail_teardown = true;
    }

    /// Make every invocation of `program` fail.
    pub fn fail_program(&self, program: &str) {
        self.state.lock().unwrap().fail_program = Some(program.to_string());
    }

    /// Display strings of every command seen, in order.
    pub fn commands(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.commands.iter().map(|c| c.to_string()).collect()
    }

    pub fn last(&self) -> String {
        self.commands().pop().unwrap_or_default()
    }

    pub fn last_cwd(&self) -> Option<PathBuf> {
        let state = self.state.lock().unwrap();
        state.commands.last().and_then(|c| c.cwd.clone())
    }

    /// Whether any command had `needle` as its program or as one argument.
    pub fn ran(&self, needle: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .commands
            .iter()
            .any(|c| c.program == needle || c.has_arg(needle))
    }
}

fn arg_after<'a>(command: &'a RenderedCommand, flag: &str) -> Option<&'a str> {
    let pos = command.args.iter().position(|a| a == flag)?;
    command.args.get(pos + 1).map(String::as_str)
}

fn failed(command: &RenderedCommand, output: &str) -> CommandError {
    CommandError::Failed {
        command: command.to_string(),
        exit_code: Some(1),
        output: output.to_string(),
    }
}

fn ok(output: impl Into<String>) -> Result<CommandOutput, CommandError> {
    Ok(CommandOutput {
        output: output.into(),
        exit_code: 0,
    })
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, command: &RenderedCommand) -> Result<CommandOutput, CommandError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.clone());

        if state.fail_program.as_deref() == Some(command.program.as_str()) {
            return Err(failed(command, "scripted failure"));
        }

        match command.program.as_str() {
            "ssh-keygen" => {
                let private = arg_after(command, "-f").unwrap_or_default();
                let comment = arg_after(command, "-C").unwrap_or_default();
                std::fs::write(private, "PRIVATE KEY\n").unwrap();
                std::fs::write(format!("{}.pub", private), format!("ssh-rsa AAAAB3Nza {}\n", comment))
                    .unwrap();
                ok("")
            }
            "git" if command.has_arg("clone") => {
                let worktree = command.args.last().cloned().unwrap_or_default();
                std::fs::create_dir_all(worktree).unwrap();
                ok("Cloning...\n")
            }
            "git" => ok("Already up to date.\n"),
            "docker" => {
                let project = arg_after(command, "--project-name")
                    .unwrap_or_default()
                    .to_string();
                if command.has_arg("down") {
                    if state.fail_teardown {
                        return Err(failed(command, "teardown failed\n"));
                    }
                    state.running.remove(&project);
                    ok("")
                } else if command.has_arg("up") {
                    state.running.insert(project);
                    ok("")
                } else if command.has_arg("ps") {
                    if state.running.contains(&project) {
                        ok("4f1c2a9e7b3d\n")
                    } else {
                        ok("")
                    }
                } else if command.has_arg("logs") {
                    ok("web-1  | listening\n")
                } else {
                    ok("")
                }
            }
            other => Err(CommandError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, other.to_string()),
            }),
        }
    }
}

/// Settings rooted in a fresh temp dir with a known password and no delay.
pub fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.storage.data_dir = dir.path().to_path_buf();
    settings.auth.password = Some(PASSWORD.to_string());
    settings.auth.password_delay_ms = 0;
    settings.auth.secret = Some("6b6579".to_string());
    settings
}

pub fn harness() -> (TempDir, Arc<FakeExecutor>, Orchestrator) {
    let dir = tempfile::tempdir().unwrap();
    let fake = Arc::new(FakeExecutor::default());
    let orch = Orchestrator::from_settings(&settings(&dir), fake.clone()).unwrap();
    (dir, fake, orch)
}

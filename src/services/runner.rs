use std::process::{Command, Output};

use tracing::debug;

use crate::config::RemoteHostConfig;

use super::ServiceError;

/// Runs a shell command somewhere and hands back its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &str) -> Result<String, ServiceError>;
}

/// `sh -c` on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    fn run(&self, command: &str) -> Result<String, ServiceError> {
        debug!(command, "running local command");
        let output = Command::new("sh").arg("-c").arg(command).output();
        collect(command, output)
    }
}

/// The `ssh` executable, non-interactive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshRunner {
    pub address: String,
    pub username: String,
    pub port: u16,
    pub identity_file: Option<String>,
}

impl SshRunner {
    pub fn from_config(config: &RemoteHostConfig) -> Self {
        Self {
            address: config.address.clone(),
            username: config.username.clone(),
            port: config.port,
            identity_file: config.identity_file.clone(),
        }
    }

    fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.clone());
        }
        args.push(format!("{}@{}", self.username, self.address));
        args.push(command.to_string());
        args
    }
}

impl CommandRunner for SshRunner {
    fn run(&self, command: &str) -> Result<String, ServiceError> {
        debug!(command, host = %self.address, "running remote command");
        let output = Command::new("ssh").args(self.args(command)).output();
        collect(command, output)
    }
}

fn collect(command: &str, output: std::io::Result<Output>) -> Result<String, ServiceError> {
    let output = output.map_err(|e| ServiceError::Command {
        command: command.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ServiceError::Command {
            command: command.to_string(),
            reason: format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Single-quote `arg` for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Answers commands from a table and remembers what was asked.
    #[derive(Default)]
    pub struct FakeRunner {
        pub answers: HashMap<String, Result<String, String>>,
        pub seen: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        pub fn answer(mut self, command: &str, output: &str) -> Self {
            self.answers.insert(command.to_string(), Ok(output.to_string()));
            self
        }

        pub fn fail(mut self, command: &str, reason: &str) -> Self {
            self.answers.insert(command.to_string(), Err(reason.to_string()));
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, command: &str) -> Result<String, ServiceError> {
            self.seen.lock().unwrap().push(command.to_string());
            match self.answers.get(command) {
                Some(Ok(out)) => Ok(out.clone()),
                Some(Err(reason)) => Err(ServiceError::Command {
                    command: command.to_string(),
                    reason: reason.clone(),
                }),
                None => Err(ServiceError::Command {
                    command: command.to_string(),
                    reason: "unexpected command".to_string(),
                }),
            }
        }
    }
}

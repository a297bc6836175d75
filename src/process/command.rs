/*!
 * Command Specification
 * What to launch: a shell command line or a program with arguments
 */

use super::config::ExecConfig;
use crate::core::{ExecError, ExecResult};
use std::fmt;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;

/// A command to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Command line run through the configured shell with `-c`
    Shell(String),
    /// Program executed directly, no shell involved
    Exec { program: PathBuf, args: Vec<String> },
}

impl CommandSpec {
    pub fn shell(line: impl Into<String>) -> Self {
        CommandSpec::Shell(line.into())
    }

    pub fn exec<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Exec {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Join several command lines into one, run in order by the shell
    pub fn sequence<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        CommandSpec::Shell(joined)
    }

    /// Reject commands that cannot possibly run
    pub fn validate(&self) -> ExecResult<()> {
        match self {
            CommandSpec::Shell(line) if line.trim().is_empty() => {
                Err(ExecError::InvalidConfig("empty command".to_string()))
            }
            CommandSpec::Exec { program, .. } if program.as_os_str().is_empty() => {
                Err(ExecError::InvalidConfig("empty program path".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Build the std command; stdio is configured by the job
    pub(crate) fn to_command(&self, config: &ExecConfig) -> Command {
        let mut cmd = match self {
            CommandSpec::Shell(line) => {
                let mut cmd = Command::new(&config.shell);
                cmd.arg("-c").arg(line);
                cmd
            }
            CommandSpec::Exec { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };

        if let Some(ref lang) = config.lang {
            cmd.env("LANG", lang);
        }
        if config.process_group {
            cmd.process_group(0);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(line) => f.write_str(line),
            CommandSpec::Exec { program, args } => {
                write!(f, "{}", program.display())?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Shell(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        CommandSpec::Shell(line)
    }
}

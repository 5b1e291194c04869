/// Narrow subprocess capability
use crate::config::types::{Result, TmpdirError};
use std::process::{Command, Stdio};

/// Captured result of one command invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner {
    /// Run `argv[0]` with the remaining arguments and wait for it.
    /// `Err` means the command could not be launched at all.
    fn run(&self, argv: &[String]) -> Result<CommandOutput>;
}

/// Runs commands on the host with stdin closed and stderr inherited
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TmpdirError::Command("empty command line".to_string()))?;

        log::debug!("Running {:?}", argv);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| TmpdirError::Command(format!("Failed to launch {}: {}", program, e)))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Returns scripted answers in order and records every argv it was given
    #[derive(Default)]
    pub struct ScriptedRunner {
        answers: RefCell<VecDeque<Result<CommandOutput>>>,
        pub calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, stdout: &str) -> Self {
            self.answers.borrow_mut().push_back(Ok(CommandOutput {
                status: Some(0),
                stdout: stdout.to_string(),
            }));
            self
        }

        pub fn exit(self, code: i32, stdout: &str) -> Self {
            self.answers.borrow_mut().push_back(Ok(CommandOutput {
                status: Some(code),
                stdout: stdout.to_string(),
            }));
            self
        }

        pub fn launch_failure(self) -> Self {
            self.answers
                .borrow_mut()
                .push_back(Err(TmpdirError::Command("no such program".to_string())));
            self
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, argv: &[String]) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(argv.to_vec());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TmpdirError::Command("no scripted answer".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_an_error() {
        assert!(matches!(
            SystemCommandRunner.run(&[]),
            Err(TmpdirError::Command(_))
        ));
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let argv = vec!["/nonexistent/private-tmpdir-no-such-binary".to_string()];
        assert!(SystemCommandRunner.run(&argv).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), "echo common gpu; exit 3".to_string()];
        let out = match SystemCommandRunner.run(&argv) {
            Ok(out) => out,
            Err(_) => return, // no /bin/sh in this environment
        };
        assert_eq!(out.stdout.trim(), "common gpu");
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
    }
}

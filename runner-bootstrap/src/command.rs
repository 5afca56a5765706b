//! A narrow capability interface for invoking external tools, so the
//! orchestration can be exercised in tests without touching the system.

use crate::error::{self, Result};
use log::trace;
use snafu::{ensure, ResultExt};
use std::process::Command;

pub(crate) trait CommandRunner {
    /// Runs `bin_path` with `args`, failing if the process cannot be spawned
    /// or exits non-zero.
    fn run(&self, bin_path: &str, args: &[&str]) -> Result<()>;
}

/// Runs commands on the real system.
pub(crate) struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, bin_path: &str, args: &[&str]) -> Result<()> {
        trace!("calling '{}' with '{:?}'", bin_path, args);
        let output = Command::new(bin_path)
            .args(args)
            .output()
            .context(error::ExecutionFailureSnafu { bin_path })?;

        trace!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        trace!("stderr: {}", String::from_utf8_lossy(&output.stderr));

        ensure!(
            output.status.success(),
            error::CommandFailureSnafu { bin_path, output }
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use std::sync::Mutex;

    /// Records invocations instead of running them, optionally failing any
    /// invocation of one binary.
    pub(crate) struct FakeRunner {
        commands: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeRunner {
        pub(crate) fn new() -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        pub(crate) fn failing_on(bin_path: &str) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                fail_on: Some(bin_path.to_string()),
            }
        }

        /// The recorded command lines, in invocation order.
        pub(crate) fn recorded(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, bin_path: &str, args: &[&str]) -> Result<()> {
            self.commands
                .lock()
                .unwrap()
                .push(format!("{} {}", bin_path, args.join(" ")));
            if self.fail_on.as_deref() == Some(bin_path) {
                return error::CommandFailureSnafu {
                    bin_path,
                    output: Output {
                        status: ExitStatus::from_raw(1 << 8),
                        stdout: Vec::new(),
                        stderr: b"simulated failure".to_vec(),
                    },
                }
                .fail();
            }
            Ok(())
        }
    }
}

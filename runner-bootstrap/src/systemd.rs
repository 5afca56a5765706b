//! Thin wrappers around the systemctl operations the bootstrap needs.

use crate::command::CommandRunner;
use crate::error::Result;

/// SystemdUnit stores the systemd unit being manipulated
pub(crate) struct SystemdUnit<'a> {
    unit: &'a str,
}

impl<'a> SystemdUnit<'a> {
    pub(crate) fn new(unit: &'a str) -> Self {
        SystemdUnit { unit }
    }

    /// Asks a running unit to reload its configuration in place.
    pub(crate) fn reload(&self, runner: &dyn CommandRunner) -> Result<()> {
        runner.run(constants::SYSTEMCTL_BIN, &["reload", self.unit])
    }

    /// Enables the unit and starts it immediately.
    pub(crate) fn enable_now(&self, runner: &dyn CommandRunner) -> Result<()> {
        runner.run(constants::SYSTEMCTL_BIN, &["enable", "--now", self.unit])
    }
}

/// Rebuilds the unit index after unit files changed on disk.
pub(crate) fn daemon_reload(runner: &dyn CommandRunner) -> Result<()> {
    runner.run(constants::SYSTEMCTL_BIN, &["daemon-reload"])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::test_support::FakeRunner;

    #[test]
    fn unit_operations() {
        let runner = FakeRunner::new();
        SystemdUnit::new("docker.service").reload(&runner).unwrap();
        daemon_reload(&runner).unwrap();
        SystemdUnit::new("gha-runner.service")
            .enable_now(&runner)
            .unwrap();
        assert_eq!(
            runner.recorded(),
            vec![
                "/usr/bin/systemctl reload docker.service".to_string(),
                "/usr/bin/systemctl daemon-reload".to_string(),
                "/usr/bin/systemctl enable --now gha-runner.service".to_string(),
            ]
        );
    }
}

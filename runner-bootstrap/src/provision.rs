//! Prepares the runner's persistent work directory and opens up the Docker
//! control socket for the job container.

use crate::command::CommandRunner;
use crate::error::Result;
use std::path::Path;

/// Ensures the work directory exists on the stateful partition, world-writable
/// and owned by root, then bind-mounts it onto the runtime path the job
/// container expects.  No cleanup is attempted on failure; a half-provisioned
/// VM is recreated, not repaired.
pub(crate) fn provision_work_dir(
    runner: &dyn CommandRunner,
    persistent_dir: &Path,
    runtime_dir: &Path,
) -> Result<()> {
    let persistent = persistent_dir.display().to_string();
    let runtime = runtime_dir.display().to_string();

    runner.run(
        constants::INSTALL_BIN,
        &[
            "--directory",
            "--owner",
            "root",
            "--group",
            "root",
            "--mode",
            "0777",
            "--verbose",
            &persistent,
        ],
    )?;

    runner.run(
        constants::MOUNT_BIN,
        &["--bind", &persistent, &runtime, "-o", "rw,nodev,relatime"],
    )
}

/// Makes the engine's control socket world read-writable so non-root
/// processes, the job container included, can drive Docker through the
/// bind-mounted socket.
pub(crate) fn open_docker_socket(runner: &dyn CommandRunner, socket: &Path) -> Result<()> {
    let socket = socket.display().to_string();
    runner.run(constants::CHMOD_BIN, &["a=rw", &socket])
}
